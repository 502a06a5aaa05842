//! [`ActionSurface`] backed by an ADB-connected device.

use super::connection::AdbError;
use super::device::{screen_size, swipe, tap};
use super::hierarchy::dump_hierarchy;
use super::input::{clear_text, detect_and_set_adb_keyboard, restore_keyboard, type_text};
use crate::agent::{ActionSurface, ScrollDirection, SurfaceError, UiElement, UiTreeNode};

/// Drives a device through `adb shell` commands.
pub struct AdbSurface {
    device_id: Option<String>,
    delay_ms: u64,
    screen: Option<(u32, u32)>,
}

impl AdbSurface {
    /// Create a surface for `device_id` (or the only attached device).
    pub fn new(device_id: Option<String>) -> Self {
        Self {
            device_id,
            delay_ms: 500,
            screen: None,
        }
    }

    /// Settle delay after each input, in milliseconds.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    fn device(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    fn screen(&mut self) -> Result<(u32, u32), AdbError> {
        if let Some(size) = self.screen {
            return Ok(size);
        }
        let size = screen_size(self.device())?;
        self.screen = Some(size);
        Ok(size)
    }

    fn tap_element(&self, element: &UiElement) -> Result<(), SurfaceError> {
        if element.bounds.is_empty() {
            return Err(SurfaceError::Rejected(format!(
                "{} has no on-screen area",
                element.element_class
            )));
        }
        let (x, y) = element.bounds.center();
        tap(x, y, self.device(), Some(self.delay_ms)).map_err(rejected)
    }
}

fn rejected(e: AdbError) -> SurfaceError {
    SurfaceError::Rejected(e.to_string())
}

/// Swipe endpoints that move content in `direction`.
///
/// Scrolling down reveals content further down, so the finger moves up.
fn scroll_gesture(direction: ScrollDirection, width: u32, height: u32) -> ((i32, i32), (i32, i32)) {
    let (w, h) = (width as i32, height as i32);
    let (cx, cy) = (w / 2, h / 2);
    match direction {
        ScrollDirection::Down => ((cx, h * 7 / 10), (cx, h * 3 / 10)),
        ScrollDirection::Up => ((cx, h * 3 / 10), (cx, h * 7 / 10)),
        ScrollDirection::Right => ((w * 8 / 10, cy), (w * 2 / 10, cy)),
        ScrollDirection::Left => ((w * 2 / 10, cy), (w * 8 / 10, cy)),
    }
}

impl ActionSurface for AdbSurface {
    fn live_tree(&mut self) -> Result<Option<UiTreeNode>, SurfaceError> {
        dump_hierarchy(self.device()).map_err(|e| SurfaceError::Unavailable(e.to_string()))
    }

    fn click(&mut self, element: &UiElement) -> Result<(), SurfaceError> {
        self.tap_element(element)
    }

    fn set_text(&mut self, element: &UiElement, text: &str) -> Result<(), SurfaceError> {
        self.tap_element(element)?;

        let device = self.device();
        let original_ime = detect_and_set_adb_keyboard(device).map_err(rejected)?;
        let typed = clear_text(device).and_then(|_| type_text(text, device));

        // Restore the keyboard even when typing failed.
        if let Err(e) = restore_keyboard(&original_ime, device) {
            tracing::warn!("Failed to restore keyboard {}: {}", original_ime, e);
        }
        typed.map_err(rejected)
    }

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), SurfaceError> {
        let (width, height) = self.screen().map_err(rejected)?;
        let (start, end) = scroll_gesture(direction, width, height);
        swipe(start, end, None, self.device(), Some(self.delay_ms)).map_err(rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Bounds;

    #[test]
    fn test_scroll_gesture_directions() {
        let (start, end) = scroll_gesture(ScrollDirection::Down, 1000, 2000);
        assert_eq!(start, (500, 1400));
        assert_eq!(end, (500, 600));

        let (start, end) = scroll_gesture(ScrollDirection::Left, 1000, 2000);
        assert!(start.0 < end.0);
        assert_eq!(start.1, 1000);
    }

    #[test]
    fn test_zero_area_element_rejected() {
        let surface = AdbSurface::new(None);
        let element = UiElement {
            identifier: None,
            text: String::new(),
            element_class: "android.view.View".to_string(),
            bounds: Bounds::default(),
            clickable: true,
            editable: false,
        };
        assert!(matches!(
            surface.tap_element(&element),
            Err(SurfaceError::Rejected(_))
        ));
    }
}
