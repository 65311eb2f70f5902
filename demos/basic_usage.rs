//! 基本使用示例
//!
//! 本示例展示了 Messengers 的基本使用方法，包括：
//!
//! - 创建分发器（主上下文由本线程驱动）
//! - 在后台线程完成工作后通知主线程
//! - 取消消息、监听器释放后的静默丢弃
//!
//! # 运行示例
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use messengers::{payload, MessengerConfig, Messengers, OnMessageReceive, Payload, Tag};

/// 下载完成（奇数，投递到主上下文）
const TAG_DOWNLOAD_DONE: Tag = 1;
/// 开始解析（偶数，投递到工作线程）
const TAG_PARSE: Tag = 2;
/// 超时提醒（奇数）
const TAG_TIMEOUT: Tag = 3;

/// 模拟界面更新逻辑
struct Screen {
    name: &'static str,
}

impl OnMessageReceive for Screen {
    fn on_receive(&self, tag: Tag, payload: Option<Payload>) {
        let text = payload
            .and_then(|p| p.downcast::<String>().ok())
            .map(|s| *s)
            .unwrap_or_default();
        println!(
            "   [{}] 线程 {:?} 收到消息 {}: {}",
            self.name,
            thread::current().name().unwrap_or("<unnamed>"),
            tag,
            text
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Messengers 基本使用示例 ===\n");

    // -------------------------------------------------------------------------
    // 1. 创建分发器
    // -------------------------------------------------------------------------
    println!("1. 使用默认配置创建分发器...");
    let config = MessengerConfig::default();
    println!("   - 工作线程: {}", config.worker.thread_name);
    println!("   - 主上下文: {}", config.primary.thread_name);

    let messengers = Arc::new(Messengers::new(&config)?);
    let main = messengers
        .main_looper()
        .cloned()
        .ok_or("默认配置应使用宿主驱动的主上下文")?;
    main.bind_current_thread()?;
    println!("   ✅ 分发器创建成功\n");

    // -------------------------------------------------------------------------
    // 2. 后台线程完成工作后通知主线程
    // -------------------------------------------------------------------------
    println!("2. 后台线程发送消息...");
    let screen = Arc::new(Screen { name: "screen" });

    let producer = {
        let messengers = messengers.clone();
        let screen = screen.clone();
        thread::spawn(move || -> messengers::Result<()> {
            messengers.send_payload(TAG_PARSE, payload("page.html".to_string()), &screen)?;
            thread::sleep(Duration::from_millis(30));
            messengers.send_payload(TAG_DOWNLOAD_DONE, payload("下载完成".to_string()), &screen)?;
            Ok(())
        })
    };
    producer.join().map_err(|_| "生产者线程 panic")??;

    main.run_for(Duration::from_millis(100))?;
    println!();

    // -------------------------------------------------------------------------
    // 3. 取消消息
    // -------------------------------------------------------------------------
    println!("3. 取消超时提醒...");
    messengers.send_delayed(TAG_TIMEOUT, Duration::from_millis(50), &screen)?;
    let cancelled = messengers.remove(TAG_TIMEOUT, &screen);
    println!("   取消了 {} 条消息", cancelled);
    main.run_for(Duration::from_millis(100))?;
    println!();

    // -------------------------------------------------------------------------
    // 4. 监听器释放后消息被静默丢弃
    // -------------------------------------------------------------------------
    println!("4. 释放监听器...");
    let dialog = Arc::new(Screen { name: "dialog" });
    messengers.send_payload(TAG_TIMEOUT, payload("不会出现".to_string()), &dialog)?;
    drop(dialog);
    main.run_for(Duration::from_millis(50))?;

    // -------------------------------------------------------------------------
    // 5. 统计
    // -------------------------------------------------------------------------
    println!("\n5. 统计信息:");
    println!("{}", serde_json::to_string_pretty(&messengers.worker().stats())?);
    println!("{}", serde_json::to_string_pretty(&messengers.primary().stats())?);

    println!("\n=== 示例完成 ===");
    Ok(())
}
