//! Element locator strategies.
//!
//! A [`Locator`] is a description, never a live handle: it is resolved
//! against the live document each time an element is touched.
//!
//! # Example
//!
//! ```
//! use page_fuzzer::Locator;
//!
//! // Absolute XPath (what discovery produces)
//! let field = Locator::xpath("/html[1]/body[1]/form[1]/input[2]");
//! assert_eq!(field.strategy(), "xpath");
//!
//! // By ID
//! let email = Locator::id("email");
//! assert_eq!(email.to_string(), "id:email");
//!
//! // Plain strings are CSS selectors
//! let submit: Locator = "button[type=submit]".into();
//! assert_eq!(submit.strategy(), "css");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Locator Enum
// ============================================================================

/// Element locator strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "value")]
pub enum Locator {
    /// CSS selector.
    ///
    /// # Example
    /// ```ignore
    /// Locator::Css("form#login input[name='user']")
    /// ```
    #[serde(rename = "css")]
    Css(String),

    /// XPath expression.
    ///
    /// # Example
    /// ```ignore
    /// Locator::XPath("/html[1]/body[1]/div[3]/input[1]")
    /// ```
    #[serde(rename = "xpath")]
    XPath(String),

    /// Element ID.
    #[serde(rename = "id")]
    Id(String),

    /// First element with the given `name` attribute.
    #[serde(rename = "name")]
    Name(String),
}

impl Locator {
    /// Creates a CSS locator.
    #[inline]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Creates an XPath locator.
    #[inline]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    /// Creates an ID locator.
    #[inline]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Creates a name attribute locator.
    #[inline]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Returns the strategy name used by the page scripts.
    #[must_use]
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Css(_) => "css",
            Self::XPath(_) => "xpath",
            Self::Id(_) => "id",
            Self::Name(_) => "name",
        }
    }

    /// Returns the locator value.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Css(v) | Self::XPath(v) | Self::Id(v) | Self::Name(v) => v,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.strategy(), self.value())
    }
}

// ============================================================================
// From implementations for ergonomics
// ============================================================================

impl From<&str> for Locator {
    /// Converts a string to CSS locator (default).
    fn from(s: &str) -> Self {
        Self::Css(s.to_string())
    }
}

impl From<String> for Locator {
    /// Converts a string to CSS locator (default).
    fn from(s: String) -> Self {
        Self::Css(s)
    }
}

// ============================================================================
// Tests
// ============================================================================
