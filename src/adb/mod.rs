//! ADB (Android Debug Bridge) module: the platform tree source and action
//! surface for a connected device.

mod connection;
mod device;
mod hierarchy;
pub mod input;
mod surface;

pub use connection::{ADBConnection, AdbError, ConnectionType, DeviceInfo};
pub use device::{screen_size, swipe, tap};
pub use hierarchy::{dump_hierarchy, parse_hierarchy};
pub use input::{clear_text, detect_and_set_adb_keyboard, restore_keyboard, type_text};
pub use surface::AdbSurface;
