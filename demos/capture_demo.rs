//! Demonstration of SenseShift keyboard tap counting.
//!
//! This example shows how to:
//! 1. Check for Input Monitoring permission
//! 2. Start a collector feeding a tap accumulator
//! 3. Read the tap count once per window
//!
//! Run with: cargo run --example capture_demo
//!
//! Note: Requires Input Monitoring permission on macOS.
//! Grant permission in System Settings > Privacy & Security > Input Monitoring

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sense_shift::{
    clock::SystemClock,
    collector::{check_permission, Collector},
    core::TapAccumulator,
    transparency::TransparencyLog,
    PRIVACY_DECLARATION,
};

fn main() {
    println!("SenseShift - Tap Capture Demo");
    println!("=============================");
    println!();

    println!("{PRIVACY_DECLARATION}");
    println!();

    print!("Checking Input Monitoring permission... ");
    if check_permission() {
        println!("OK ✓");
    } else {
        println!("FAILED ✗");
        println!();
        println!("Please grant Input Monitoring permission:");
        println!("1. Open System Settings");
        println!("2. Go to Privacy & Security > Input Monitoring");
        println!("3. Add this application");
        println!("4. Restart this demo");
        return;
    }
    println!();

    let taps = Arc::new(TapAccumulator::new(Arc::new(SystemClock)));
    let mut collector = Collector::new(taps.clone());
    let transparency_log = TransparencyLog::new();

    println!("Counting key presses for 30 seconds...");
    println!("Try typing!");
    println!();

    if let Err(e) = collector.start() {
        eprintln!("Error starting collector: {e}");
        return;
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let start = std::time::Instant::now();
    let mut windows = 0;

    while running.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(30) {
        std::thread::sleep(Duration::from_millis(250));

        if let Some(count) = taps.check_and_reset() {
            windows += 1;
            transparency_log.record_taps(count);
            println!(
                "Window #{windows}: {count} taps ({:.1} per second)",
                count as f64 / taps.window().as_secs_f64()
            );
        }
    }

    collector.stop();

    println!();
    println!("Window in progress: {} taps so far", taps.peek().count);
    println!();
    println!("{}", transparency_log.summary());
}
