//! Input utilities for Android device text input.

use base64::{engine::general_purpose::STANDARD, Engine};

use super::connection::{run_adb, AdbError};

const ADB_KEYBOARD_IME: &str = "com.android.adbkeyboard/.AdbIME";

/// Type text into the currently focused input field using ADB Keyboard.
///
/// # Note
/// Requires ADB Keyboard to be installed on the device.
/// See: https://github.com/senzhk/ADBKeyBoard
pub fn type_text(text: &str, device_id: Option<&str>) -> Result<(), AdbError> {
    let encoded_text = STANDARD.encode(text.as_bytes());
    run_adb(
        device_id,
        &[
            "shell",
            "am",
            "broadcast",
            "-a",
            "ADB_INPUT_B64",
            "--es",
            "msg",
            &encoded_text,
        ],
    )?;
    Ok(())
}

/// Clear text in the currently focused input field.
pub fn clear_text(device_id: Option<&str>) -> Result<(), AdbError> {
    run_adb(device_id, &["shell", "am", "broadcast", "-a", "ADB_CLEAR_TEXT"])?;
    Ok(())
}

/// Detect current keyboard and switch to ADB Keyboard if needed.
///
/// # Returns
/// The original keyboard IME identifier for later restoration.
pub fn detect_and_set_adb_keyboard(device_id: Option<&str>) -> Result<String, AdbError> {
    let current_ime = run_adb(
        device_id,
        &["shell", "settings", "get", "secure", "default_input_method"],
    )?
    .trim()
    .to_string();

    if !current_ime.contains(ADB_KEYBOARD_IME) {
        run_adb(device_id, &["shell", "ime", "set", ADB_KEYBOARD_IME])?;
    }

    // Warm up the keyboard
    type_text("", device_id)?;

    Ok(current_ime)
}

/// Restore the original keyboard IME.
pub fn restore_keyboard(ime: &str, device_id: Option<&str>) -> Result<(), AdbError> {
    if ime.is_empty() || ime.contains(ADB_KEYBOARD_IME) {
        return Ok(());
    }
    run_adb(device_id, &["shell", "ime", "set", ime])?;
    Ok(())
}
