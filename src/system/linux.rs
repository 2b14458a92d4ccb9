//! Backlight brightness from sysfs.

use std::path::Path;

const BACKLIGHT_DIR: &str = "/sys/class/backlight";

/// Brightness of the first backlight device that reports one.
pub(super) fn backlight_brightness() -> Option<f32> {
    let entries = std::fs::read_dir(BACKLIGHT_DIR).ok()?;
    entries
        .filter_map(|e| e.ok())
        .find_map(|entry| read_device(&entry.path()))
}

fn read_device(device: &Path) -> Option<f32> {
    let current = read_number(&device.join("brightness"))?;
    let max = read_number(&device.join("max_brightness"))?;
    fraction(current, max)
}

fn read_number(path: &Path) -> Option<f64> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn fraction(current: f64, max: f64) -> Option<f32> {
    if max <= 0.0 {
        return None;
    }
    Some((current / max).clamp(0.0, 1.0) as f32)
}
