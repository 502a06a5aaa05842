//! ADB connection management and command plumbing.

use std::process::Command;
use thiserror::Error;

/// Type of ADB connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionType {
    Usb,
    Wifi,
    Remote,
}

/// Information about a connected device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub device_id: String,
    pub status: String,
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

/// ADB errors.
#[derive(Error, Debug)]
pub enum AdbError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Command execution failed: {0}")]
    CommandFailed(String),
    #[error("Unexpected output: {0}")]
    UnexpectedOutput(String),
    #[error("Malformed UI hierarchy: {0}")]
    MalformedHierarchy(String),
}

/// The adb binary every device command runs through.
const ADB: &str = "adb";

/// Port `adb connect` uses when the address has none.
const DEFAULT_TCP_PORT: u16 = 5555;

/// Manages ADB connections to Android devices.
///
/// # Example
/// ```rust,no_run
/// use ui_agent::adb::ADBConnection;
///
/// let conn = ADBConnection::new();
/// let devices = conn.list_devices();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ADBConnection;

impl ADBConnection {
    pub fn new() -> Self {
        Self
    }

    /// Connect to a remote device via TCP/IP (`host[:port]`, port defaults to 5555).
    ///
    /// Returns the normalized `host:port` address, which is also the device
    /// serial for later `-s` commands.
    pub fn connect(&self, address: &str) -> Result<String, AdbError> {
        let address = normalize_address(address);

        let output = Command::new(ADB)
            .args(["connect", &address])
            .output()
            .map_err(|e| AdbError::Connection(e.to_string()))?;

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        if connect_succeeded(&combined) {
            tracing::info!("Connected to {}", address);
            Ok(address)
        } else {
            Err(AdbError::Connection(combined.trim().to_string()))
        }
    }

    /// List all connected devices.
    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
        let stdout = run_adb(None, &["devices", "-l"])?;
        Ok(parse_device_list(&stdout))
    }
}

/// Append the default adb TCP port when `address` has none.
fn normalize_address(address: &str) -> String {
    let address = address.trim();
    if address.contains(':') {
        address.to_string()
    } else {
        format!("{}:{}", address, DEFAULT_TCP_PORT)
    }
}

/// `adb connect` exits cleanly even on failure; only its message tells.
fn connect_succeeded(output: &str) -> bool {
    let output = output.to_lowercase();
    output.contains("connected to") && !output.contains("failed") && !output.contains("unable")
}

/// Parse `adb devices -l` output.
fn parse_device_list(stdout: &str) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    for line in stdout.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let device_id = parts[0].to_string();
        let connection_type = if device_id.contains(':') {
            ConnectionType::Remote
        } else if parts.iter().any(|p| p.starts_with("usb:")) {
            ConnectionType::Usb
        } else {
            ConnectionType::Wifi
        };

        let model = parts
            .iter()
            .find(|p| p.starts_with("model:"))
            .map(|m| m.trim_start_matches("model:").to_string());

        devices.push(DeviceInfo {
            device_id,
            status: parts[1].to_string(),
            connection_type,
            model,
        });
    }

    devices
}

/// Get ADB command prefix with optional device specifier.
pub(crate) fn get_adb_prefix(device_id: Option<&str>) -> Vec<String> {
    match device_id {
        Some(id) => vec![ADB.to_string(), "-s".to_string(), id.to_string()],
        None => vec![ADB.to_string()],
    }
}

/// Run `adb [-s id] <args>` and return stdout.
pub(crate) fn run_adb(device_id: Option<&str>, args: &[&str]) -> Result<String, AdbError> {
    let prefix = get_adb_prefix(device_id);

    let output = Command::new(&prefix[0])
        .args(&prefix[1..])
        .args(args)
        .output()
        .map_err(|e| AdbError::CommandFailed(e.to_string()))?;

    if !output.status.success() {
        return Err(AdbError::CommandFailed(format!(
            "adb {} exited with {}: {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
