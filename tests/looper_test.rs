//! 消息循环集成测试
//!
//! 通过 `Looper` trait 统一测试两种消息循环的约定：任务只在所属线程上执行、
//! 同一时刻最多执行一个、不早于延时执行、`remove_all` 丢弃未执行任务。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use messengers::{Looper, MainLooper, MessengerError, ThreadLooper};

/// 每个任务检查是否有其他任务同时在执行
fn post_overlap_probes(looper: &dyn Looper, count: usize) -> (Arc<AtomicBool>, Arc<AtomicUsize>) {
    let running = Arc::new(AtomicBool::new(false));
    let overlapped = Arc::new(AtomicBool::new(false));
    let done = Arc::new(AtomicUsize::new(0));

    for i in 0..count {
        let running = running.clone();
        let overlapped = overlapped.clone();
        let done = done.clone();
        looper
            .post_delayed(
                Box::new(move || {
                    if running.swap(true, Ordering::SeqCst) {
                        overlapped.store(true, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(1));
                    running.store(false, Ordering::SeqCst);
                    done.fetch_add(1, Ordering::SeqCst);
                }),
                Duration::from_millis((i % 5) as u64),
            )
            .unwrap();
    }
    (overlapped, done)
}

#[test]
fn test_thread_looper_runs_tasks_one_at_a_time() {
    let looper: Arc<dyn Looper> = Arc::new(ThreadLooper::spawn("lt-serial").unwrap());
    let (overlapped, done) = post_overlap_probes(looper.as_ref(), 50);

    let deadline = Instant::now() + Duration::from_secs(5);
    while done.load(Ordering::SeqCst) < 50 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(done.load(Ordering::SeqCst), 50);
    assert!(!overlapped.load(Ordering::SeqCst));
}

#[test]
fn test_main_looper_runs_tasks_one_at_a_time() {
    let looper = Arc::new(MainLooper::with_manual_clock("lt-main-serial"));
    let (overlapped, done) = post_overlap_probes(looper.as_ref(), 50);

    looper.advance(Duration::from_millis(10)).unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 50);
    assert!(!overlapped.load(Ordering::SeqCst));
}

#[test]
fn test_thread_looper_is_current_thread_inside_task() {
    let looper = Arc::new(ThreadLooper::spawn("lt-affinity").unwrap());
    let (tx, rx) = mpsc::channel();

    let inner = looper.clone();
    looper
        .post_delayed(
            Box::new(move || {
                let _ = tx.send(inner.is_current_thread());
            }),
            Duration::ZERO,
        )
        .unwrap();

    assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap());
    assert!(!looper.is_current_thread());
}

#[test]
fn test_thread_looper_orders_by_delay() {
    let looper = ThreadLooper::spawn("lt-order").unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = mpsc::channel();

    for (n, delay) in [(3, 60_u64), (1, 0), (2, 30)] {
        let log = log.clone();
        let tx = tx.clone();
        looper
            .post_delayed(
                Box::new(move || {
                    log.lock().unwrap().push(n);
                    let _ = tx.send(());
                }),
                Duration::from_millis(delay),
            )
            .unwrap();
    }

    for _ in 0..3 {
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
    }
    assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_main_looper_driven_from_foreign_thread_is_rejected() {
    let looper = Arc::new(MainLooper::new("lt-owner"));
    looper.bind_current_thread().unwrap();

    let other = looper.clone();
    let results = thread::spawn(move || {
        (
            other.run_pending(),
            other.run_for(Duration::from_millis(1)),
            other.bind_current_thread(),
        )
    })
    .join()
    .unwrap();

    assert!(matches!(results.0, Err(MessengerError::WrongThread { .. })));
    assert!(matches!(results.1, Err(MessengerError::WrongThread { .. })));
    assert!(matches!(results.2, Err(MessengerError::WrongThread { .. })));
}

#[test]
fn test_main_looper_wakes_for_cross_thread_post() {
    let looper = Arc::new(MainLooper::new("lt-wakeup"));
    let hits = Arc::new(AtomicUsize::new(0));

    let poster = looper.clone();
    let counter = hits.clone();
    let quitter = looper.clone();
    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        poster
            .post_delayed(
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    quitter.quit();
                }),
                Duration::ZERO,
            )
            .unwrap();
    });

    // run 在收到跨线程投递的任务后被唤醒，任务调用 quit 后返回
    let start = Instant::now();
    assert_eq!(looper.run().unwrap(), 1);
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    producer.join().unwrap();
}

#[test]
fn test_remove_all_through_trait_object() {
    let main = Arc::new(MainLooper::with_manual_clock("lt-clear"));
    let looper: Arc<dyn Looper> = main.clone();
    let hits = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let hits = hits.clone();
        looper
            .post_delayed(
                Box::new(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
                Duration::from_millis(5),
            )
            .unwrap();
    }
    looper.remove_all();

    assert_eq!(main.advance(Duration::from_millis(10)).unwrap(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(looper.name(), "lt-clear");
}
