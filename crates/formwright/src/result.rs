//! Result and error types for Formwright.
//!
//! Two layers: [`DriverError`] is what the page reports for a single
//! interaction, [`FillError`] is what a field fill (or a session) ends with.
//! Transient driver errors are retried inside the widget protocols and only
//! surface as a `FillError` once the retries are spent.

use thiserror::Error;

/// Result type for page interactions
pub type DriverResult<T> = Result<T, DriverError>;

/// Result type for Formwright operations
pub type FillResult<T> = Result<T, FillError>;

/// Errors reported by a [`crate::PageDriver`] for a single interaction
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// The element handle no longer refers to a node in the document
    #[error("stale element reference: {handle}")]
    StaleElement {
        /// Handle that went stale
        handle: String,
    },

    /// The element exists but cannot receive the interaction yet
    #[error("element not interactable: {message}")]
    NotInteractable {
        /// Error message
        message: String,
    },

    /// Any other interaction failure the driver considers retryable
    #[error("transient interaction error: {message}")]
    Transient {
        /// Error message
        message: String,
    },

    /// Locator could not be evaluated (bad selector, unsupported strategy)
    #[error("invalid locator {locator}: {message}")]
    InvalidLocator {
        /// Locator that failed
        locator: String,
        /// Error message
        message: String,
    },

    /// Script evaluation failed
    #[error("script failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// Connection to the browser session was lost
    #[error("browser session lost: {message}")]
    SessionLost {
        /// Error message
        message: String,
    },

    /// Operation is not supported by this driver
    #[error("unsupported operation: {operation}")]
    Unsupported {
        /// Operation name
        operation: String,
    },
}

impl DriverError {
    /// Create a transient error
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create a not-interactable error
    #[must_use]
    pub fn not_interactable(message: impl Into<String>) -> Self {
        Self::NotInteractable {
            message: message.into(),
        }
    }

    /// Create a script error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Whether a fresh attempt may succeed where this one failed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StaleElement { .. } | Self::NotInteractable { .. } | Self::Transient { .. }
        )
    }
}

/// Errors that can occur while filling a form
#[derive(Debug, Error)]
pub enum FillError {
    /// Element never appeared within its timeout
    #[error("element {locator} not found after {ms}ms")]
    ElementNotFound {
        /// Locator that was searched
        locator: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Native select has no option matching the target value
    #[error("no option matched value '{value}'")]
    NoMatchingOption {
        /// Target display value
        value: String,
    },

    /// Widget never reached a verifiable committed state
    #[error("selection for '{value}' was not committed: {detail}")]
    Unverified {
        /// Value that was being committed
        value: String,
        /// What the verification observed
        detail: String,
    },

    /// Composite selector gave up after its bounded retries
    #[error("search-select fill failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Last failure observed
        last: String,
    },

    /// Page interaction error
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Mapping configuration could not be used
    #[error("mapping error: {message}")]
    Mapping {
        /// Error message
        message: String,
    },

    /// Policy record could not be read
    #[error("record error: {message}")]
    Record {
        /// Error message
        message: String,
    },

    /// Browser executable not found
    #[error("Browser not found. Install Chromium or set CHROMIUM_PATH ({message})")]
    BrowserNotFound {
        /// Last launch error observed
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl FillError {
    /// Create a mapping error
    #[must_use]
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    /// Create a record error
    #[must_use]
    pub fn record(message: impl Into<String>) -> Self {
        Self::Record {
            message: message.into(),
        }
    }

    /// Whether the failure came from transient page state
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Driver(err) => err.is_transient(),
            Self::Unverified { .. } => true,
            _ => false,
        }
    }
}
