//! PageDriver - the live page the engine talks to.
//!
//! Every widget protocol is written against this trait and nothing else.
//! Two implementations ship with the crate:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  PageDriver (object-safe async trait)                          │
//! ├────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────────┐   ┌───────────────────────────┐  │
//! │  │  ChromiumDriver          │   │  MockPage                 │  │
//! │  │  (feature "browser")     │   │  (always available)       │  │
//! │  │  CDP via chromiumoxide   │   │  simulated DOM + widgets  │  │
//! │  └──────────────────────────┘   └───────────────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Element handles are opaque and may go stale at any time; a stale handle
//! yields [`DriverError::StaleElement`], never a panic. Callers that need a
//! fresh handle re-run `find`.

use crate::locator::Locator;
use crate::result::DriverResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to an element on the page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef(String);

impl ElementRef {
    /// Wrap a driver-specific handle
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Driver-specific handle
    #[must_use]
    pub fn handle(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keys the widget protocols press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Enter,
    Escape,
    Tab,
    ArrowDown,
}

impl Key {
    /// DOM `KeyboardEvent.key` value
    #[must_use]
    pub const fn dom_key(&self) -> &'static str {
        match self {
            Self::Enter => "Enter",
            Self::Escape => "Escape",
            Self::Tab => "Tab",
            Self::ArrowDown => "ArrowDown",
        }
    }

    /// Windows virtual key code
    #[must_use]
    pub const fn key_code(&self) -> i64 {
        match self {
            Self::Enter => 13,
            Self::Escape => 27,
            Self::Tab => 9,
            Self::ArrowDown => 40,
        }
    }
}

/// Events the protocols synthesize on an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DomEvent {
    Input,
    Change,
    Blur,
    /// `keyup` carrying the typed character
    KeyUp(char),
}

impl DomEvent {
    /// DOM event type name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Change => "change",
            Self::Blur => "blur",
            Self::KeyUp(_) => "keyup",
        }
    }
}

/// An `<option>` of a native select
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub text: String,
    pub value: String,
}

impl SelectOption {
    #[must_use]
    pub fn new(text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: value.into(),
        }
    }
}

/// Serialized, exclusive access to one browser page
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// First element matching the locator
    async fn find(&self, locator: &Locator) -> DriverResult<Option<ElementRef>>;

    /// Every element matching the locator, in document order
    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<ElementRef>>;

    /// First descendant of `root` matching the locator
    async fn find_within(
        &self,
        root: &ElementRef,
        locator: &Locator,
    ) -> DriverResult<Option<ElementRef>>;

    /// Nearest following sibling whose class list contains `class_fragment`
    async fn adjacent(
        &self,
        element: &ElementRef,
        class_fragment: &str,
    ) -> DriverResult<Option<ElementRef>>;

    /// Rendered text, trimmed
    async fn text(&self, element: &ElementRef) -> DriverResult<String>;

    async fn attribute(&self, element: &ElementRef, name: &str) -> DriverResult<Option<String>>;

    /// Current form value (`.value`)
    async fn value(&self, element: &ElementRef) -> DriverResult<String>;

    async fn is_displayed(&self, element: &ElementRef) -> DriverResult<bool>;

    async fn is_enabled(&self, element: &ElementRef) -> DriverResult<bool>;

    /// Whether the element is the document's active element
    async fn is_focused(&self, element: &ElementRef) -> DriverResult<bool>;

    async fn scroll_into_view(&self, element: &ElementRef) -> DriverResult<()>;

    async fn focus(&self, element: &ElementRef) -> DriverResult<()>;

    /// Plain click
    async fn click(&self, element: &ElementRef) -> DriverResult<()>;

    /// Full pointer sequence: mousemove, mousedown, mouseup, click
    async fn pointer_click(&self, element: &ElementRef) -> DriverResult<()>;

    async fn clear(&self, element: &ElementRef) -> DriverResult<()>;

    /// Type text as keystrokes
    async fn send_keys(&self, element: &ElementRef, text: &str) -> DriverResult<()>;

    async fn press_key(&self, element: &ElementRef, key: Key) -> DriverResult<()>;

    /// Write `.value` directly, then dispatch `events` in order
    async fn set_value(
        &self,
        element: &ElementRef,
        value: &str,
        events: &[DomEvent],
    ) -> DriverResult<()>;

    /// Dispatch a synthetic event
    async fn dispatch(&self, element: &ElementRef, event: DomEvent) -> DriverResult<()>;

    /// Options of a native select
    async fn options(&self, element: &ElementRef) -> DriverResult<Vec<SelectOption>>;

    /// Select an option by index and fire `input` and `change`
    async fn select_index(&self, element: &ElementRef, index: usize) -> DriverResult<()>;

    /// Replace a composite selector's holder options with a single selected
    /// `(value, text)` option and raise the framework's select and change
    /// notifications. Returns false when the page has no framework hook.
    async fn force_selection(
        &self,
        holder: &ElementRef,
        value: &str,
        text: &str,
    ) -> DriverResult<bool>;

    /// Blur whatever element holds focus
    async fn blur_active(&self) -> DriverResult<()>;

    async fn current_url(&self) -> DriverResult<String>;

    async fn navigate(&self, url: &str) -> DriverResult<()>;

    /// Evaluate a script expression and return its JSON value
    async fn evaluate(&self, script: &str) -> DriverResult<serde_json::Value>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_element_ref_handle() {
        let el = ElementRef::new("e12");
        assert_eq!(el.handle(), "e12");
        assert_eq!(el.to_string(), "e12");
    }

    #[test]
    fn test_key_codes() {
        assert_eq!(Key::Enter.dom_key(), "Enter");
        assert_eq!(Key::Escape.key_code(), 27);
        assert_eq!(Key::ArrowDown.key_code(), 40);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(DomEvent::KeyUp('a').name(), "keyup");
        assert_eq!(DomEvent::Change.name(), "change");
    }

    #[test]
    fn test_driver_is_object_safe() {
        fn takes(_: Option<&dyn PageDriver>) {}
        takes(None);
    }
}
