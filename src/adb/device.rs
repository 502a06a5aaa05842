//! Device control utilities for Android automation.

use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use super::connection::{run_adb, AdbError};

static SIZE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)x(\d+)").expect("valid size regex"));

/// Tap at the specified coordinates.
///
/// # Arguments
/// * `x` - X coordinate.
/// * `y` - Y coordinate.
/// * `device_id` - Optional ADB device ID.
/// * `delay_ms` - Delay in milliseconds after tap (default 1000).
pub fn tap(x: i32, y: i32, device_id: Option<&str>, delay_ms: Option<u64>) -> Result<(), AdbError> {
    run_adb(
        device_id,
        &["shell", "input", "tap", &x.to_string(), &y.to_string()],
    )?;
    thread::sleep(Duration::from_millis(delay_ms.unwrap_or(1000)));
    Ok(())
}

/// Swipe from one point to another.
///
/// # Arguments
/// * `duration_ms` - Duration of swipe in milliseconds (auto-calculated if None).
/// * `delay_ms` - Delay in milliseconds after swipe (default 1000).
pub fn swipe(
    start: (i32, i32),
    end: (i32, i32),
    duration_ms: Option<u64>,
    device_id: Option<&str>,
    delay_ms: Option<u64>,
) -> Result<(), AdbError> {
    let duration = duration_ms.unwrap_or_else(|| swipe_duration(start, end));

    run_adb(
        device_id,
        &[
            "shell",
            "input",
            "swipe",
            &start.0.to_string(),
            &start.1.to_string(),
            &end.0.to_string(),
            &end.1.to_string(),
            &duration.to_string(),
        ],
    )?;

    thread::sleep(Duration::from_millis(delay_ms.unwrap_or(1000)));
    Ok(())
}

/// Swipe duration derived from distance, clamped to [300, 1000] ms.
fn swipe_duration(start: (i32, i32), end: (i32, i32)) -> u64 {
    let dist_sq = ((start.0 - end.0).pow(2) + (start.1 - end.1).pow(2)) as u64;
    (dist_sq / 2000).clamp(300, 1000)
}

/// Physical screen size in pixels, from `wm size`.
pub fn screen_size(device_id: Option<&str>) -> Result<(u32, u32), AdbError> {
    let stdout = run_adb(device_id, &["shell", "wm", "size"])?;
    parse_screen_size(&stdout).ok_or(AdbError::UnexpectedOutput(stdout))
}

/// Parse `wm size` output, preferring an override size when present.
fn parse_screen_size(stdout: &str) -> Option<(u32, u32)> {
    let line = stdout
        .lines()
        .find(|l| l.contains("Override size"))
        .or_else(|| stdout.lines().find(|l| l.contains("Physical size")))?;
    let caps = SIZE_RE.captures(line)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}
