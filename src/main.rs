//! Messengers 命令行入口
//!
//! # 命令概览
//!
//! - `demo` - 向两个上下文发送一批消息，在主线程上驱动主上下文并输出统计
//! - `check-config` - 验证配置文件
//! - `version` - 显示版本信息
//!
//! # 使用示例
//!
//! ```bash
//! # 发送 20 条消息，间隔 10ms
//! messengers demo --count 20 --delay-ms 10
//!
//! # 使用自定义配置文件
//! messengers -c messengers.yaml demo
//!
//! # 检查配置文件
//! messengers check-config -c messengers.yaml
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use messengers::{
    payload, Logger, LoggerConfig, MessengerConfig, Messengers, OnMessageReceive, Payload,
    PrimaryMode, Tag,
};

/// Messengers - 跨线程消息通知
#[derive(Parser)]
#[command(name = "messengers")]
#[command(version, about = "跨线程消息通知演示与工具", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "messengers.yaml", global = true)]
    config: PathBuf,

    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 子命令
    #[command(subcommand)]
    command: Option<Commands>,
}

/// 可用的子命令
#[derive(Subcommand)]
enum Commands {
    /// 运行演示
    ///
    /// 交替发送偶数和奇数标识的消息，第 i 条延时 i * delay_ms。
    Demo {
        /// 消息数量（1 - 10000）
        #[arg(
            short = 'n',
            long,
            default_value_t = 10,
            value_parser = clap::value_parser!(u32).range(1..=MAX_DEMO_COUNT)
        )]
        count: u32,

        /// 相邻两条消息的延时间隔（毫秒）
        #[arg(short, long, default_value_t = 20)]
        delay_ms: u64,
    },

    /// 验证配置文件
    CheckConfig {
        /// 配置文件路径（不指定则使用全局 -c 选项）
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 查看版本信息
    Version,
}

/// 演示最多发送的消息数
const MAX_DEMO_COUNT: i64 = 10_000;

/// 第 `index` 条演示消息的标识和延时
fn demo_message(index: u32, delay_ms: u64) -> (Tag, Duration) {
    let tag = Tag::try_from(index).map_or(Tag::MAX, |i| i.saturating_add(1));
    let delay = Duration::from_millis(delay_ms.saturating_mul(u64::from(index)));
    (tag, delay)
}

/// 统计收到的消息，并记录投递线程
#[derive(Default)]
struct DemoListener {
    received: AtomicUsize,
}

impl OnMessageReceive for DemoListener {
    fn on_receive(&self, tag: Tag, payload: Option<Payload>) {
        let index = payload
            .and_then(|p| p.downcast::<u32>().ok())
            .map(|i| *i);
        let current = thread::current();
        info!(
            tag = tag,
            index = ?index,
            thread = current.name().unwrap_or("<unnamed>"),
            "收到消息"
        );
        self.received.fetch_add(1, Ordering::Relaxed);
    }
}

/// 运行演示
fn run_demo(config: MessengerConfig, count: u32, delay_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    let messengers = Messengers::init_global(&config)?;
    let listener = Arc::new(DemoListener::default());

    for i in 0..count {
        // 偶数标识 -> 工作线程，奇数标识 -> 主上下文
        let (tag, delay) = demo_message(i, delay_ms);
        messengers.send(tag, delay, payload(i), &listener)?;
    }
    info!(count = count, "消息已全部发送");

    let (_, last) = demo_message(count, delay_ms);
    let wait = last.saturating_add(Duration::from_millis(100));
    match messengers.main_looper() {
        Some(main) => {
            main.run_for(wait)?;
        }
        None => thread::sleep(wait),
    }

    println!();
    println!("演示结果");
    println!("═══════════════════════════════════════");
    println!("  发送: {}", count);
    println!("  收到: {}", listener.received.load(Ordering::Relaxed));
    println!();
    println!("工作上下文:");
    println!("{}", serde_json::to_string_pretty(&messengers.worker().stats())?);
    println!("主上下文:");
    println!("{}", serde_json::to_string_pretty(&messengers.primary().stats())?);
    println!("═══════════════════════════════════════");
    println!();

    Ok(())
}

/// 检查配置文件
fn check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("检查配置文件: {}", path.display());
    println!();

    if !path.exists() {
        println!("⚠️  警告: 配置文件不存在，将使用默认配置");
        println!();
        print_config(&MessengerConfig::default());
        return Ok(());
    }

    match MessengerConfig::from_file(path) {
        Ok(config) => {
            println!("✅ 配置文件有效！");
            println!();
            print_config(&config);
            Ok(())
        }
        Err(e) => {
            println!("❌ 配置文件无效: {} ({})", e, e.error_code());
            Err(Box::new(e))
        }
    }
}

fn print_config(config: &MessengerConfig) {
    let yes_no = |b: bool| if b { "是" } else { "否" };

    println!("配置内容:");
    println!("────────────────────────────────────────");
    println!("  [工作上下文]");
    println!("    线程名称:       {}", config.worker.thread_name);
    println!();
    println!("  [主上下文]");
    println!(
        "    运行方式:       {}",
        match config.primary.mode {
            PrimaryMode::Hosted => "hosted (宿主驱动)",
            PrimaryMode::Thread => "thread (独占线程)",
        }
    );
    println!("    名称:           {}", config.primary.thread_name);
    println!();
    println!("  [日志配置]");
    println!("    日志级别:       {}", config.logging.level);
    println!("    JSON 格式:      {}", yes_no(config.logging.json_format));
    println!("    文件输出:       {}", yes_no(config.logging.file_output));
    if let Some(ref dir) = config.logging.log_dir {
        println!("    日志目录:       {}", dir.display());
    }
    println!("    轮转策略:       {}", config.logging.rotation);
    println!("────────────────────────────────────────");
}

/// 打印版本信息
fn print_version() {
    println!();
    println!("Messengers - 跨线程消息通知");
    println!("═══════════════════════════════════════");
    println!("  版本:             {}", messengers::VERSION);
    println!();
    println!("构建信息:");
    println!("  目标平台:         {}", std::env::consts::ARCH);
    println!("  操作系统:         {}", std::env::consts::OS);
    println!("═══════════════════════════════════════");
    println!();
}

/// 加载配置文件，不存在时使用默认配置
fn load_config(path: &Path) -> Result<MessengerConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(MessengerConfig::from_file(path)?)
    } else {
        Ok(MessengerConfig::default())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Demo { count, delay_ms }) => {
            let mut config = load_config(&cli.config)?;
            if let Some(level) = cli.log_level {
                config.logging.level = level;
            }

            let _guard = Logger::init(LoggerConfig::from_log_config(&config.logging))?;
            info!(config = %cli.config.display(), "启动演示");
            run_demo(config, count, delay_ms)?;
        }

        // 默认显示版本信息
        Some(Commands::Version) | None => {
            print_version();
        }

        Some(Commands::CheckConfig { config }) => {
            let config_path = config.unwrap_or(cli.config);
            check_config(&config_path)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_message_alternates_routes() {
        assert_eq!(demo_message(0, 20), (1, Duration::ZERO));
        assert_eq!(demo_message(1, 20), (2, Duration::from_millis(20)));
    }

    #[test]
    fn test_demo_message_saturates_on_extreme_input() {
        let (tag, delay) = demo_message(u32::MAX, u64::MAX);
        assert_eq!(tag, Tag::MAX);
        assert_eq!(delay, Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_demo_count_is_bounded() {
        assert!(Cli::try_parse_from(["messengers", "demo", "-n", "10000"]).is_ok());
        assert!(Cli::try_parse_from(["messengers", "demo", "-n", "10001"]).is_err());
        assert!(Cli::try_parse_from(["messengers", "demo", "-n", "0"]).is_err());
        assert!(Cli::try_parse_from(["messengers", "demo", "--delay-ms", "18446744073709551615"]).is_ok());
    }
}
