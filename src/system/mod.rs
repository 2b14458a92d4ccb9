//! Best-effort readings of instantaneous system signals.
//!
//! Missing hardware or permissions yield `None`; nothing here is an error.

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
mod linux;

use sysinfo::System;

/// Instantaneous system readings taken once per sampler tick.
pub trait SystemProbe: Send + Sync {
    /// Main display brightness in `[0, 1]`.
    fn brightness(&self) -> Option<f32>;

    /// Seconds since boot.
    fn uptime_seconds(&self) -> Option<f64>;
}

/// Probe for the machine the agent is running on.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProbe;

impl SystemProbe for HostProbe {
    fn brightness(&self) -> Option<f32> {
        #[cfg(target_os = "macos")]
        {
            macos::display_brightness()
        }
        #[cfg(target_os = "linux")]
        {
            linux::backlight_brightness()
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }

    fn uptime_seconds(&self) -> Option<f64> {
        match System::uptime() {
            0 => None,
            secs => Some(secs as f64),
        }
    }
}

/// Fixed readings, for tests and dry runs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StaticProbe {
    pub brightness: Option<f32>,
    pub uptime_seconds: Option<f64>,
}

impl SystemProbe for StaticProbe {
    fn brightness(&self) -> Option<f32> {
        self.brightness
    }

    fn uptime_seconds(&self) -> Option<f64> {
        self.uptime_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_uptime_is_positive_when_present() {
        if let Some(uptime) = HostProbe.uptime_seconds() {
            assert!(uptime > 0.0);
        }
    }

    #[test]
    fn test_host_brightness_is_a_fraction_when_present() {
        if let Some(level) = HostProbe.brightness() {
            assert!((0.0..=1.0).contains(&level));
        }
    }
}
