//! Locator resolution: a symbolic strategy plus a string.
//!
//! Locators are plain data. Turning one into an element is the driver's job
//! ([`crate::PageDriver::find`]); this module only knows how to spell the
//! locator for a CSS engine or a script.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Strategy for locating elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorStrategy {
    /// Element id attribute
    Id,
    /// CSS selector
    Css,
    /// XPath expression
    XPath,
    /// Element name attribute
    Name,
}

impl LocatorStrategy {
    /// Parse a strategy name; unknown names fall back to CSS
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Self::Id,
            "xpath" => Self::XPath,
            "name" => Self::Name,
            _ => Self::Css,
        }
    }

    /// Get the strategy name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Css => "css",
            Self::XPath => "xpath",
            Self::Name => "name",
        }
    }
}

impl Default for LocatorStrategy {
    fn default() -> Self {
        Self::Css
    }
}

impl<'de> Deserialize<'de> for LocatorStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A strategy/value pair identifying one element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    /// How `value` is interpreted
    #[serde(rename = "by", default)]
    pub strategy: LocatorStrategy,
    /// The selector text
    pub value: String,
}

impl Locator {
    /// Create a locator
    #[must_use]
    pub fn new(strategy: LocatorStrategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    /// Locate by id attribute
    #[must_use]
    pub fn id(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::Id, value)
    }

    /// Locate by CSS selector
    #[must_use]
    pub fn css(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::Css, value)
    }

    /// Locate by XPath expression
    #[must_use]
    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::XPath, value)
    }

    /// Locate by name attribute
    #[must_use]
    pub fn name(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::Name, value)
    }

    /// Parse a readiness shorthand: `#id`, `[attr]`, or a compound CSS
    /// selector pass through, a bare word is treated as an id.
    #[must_use]
    pub fn shorthand(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with('#') || raw.starts_with('[') || raw.starts_with('.') || raw.contains(' ')
        {
            Self::css(raw)
        } else {
            Self::id(raw)
        }
    }

    /// The id this locator names, if it is an id locator or a bare `#id`
    #[must_use]
    pub fn element_id(&self) -> Option<&str> {
        match self.strategy {
            LocatorStrategy::Id => Some(self.value.as_str()),
            LocatorStrategy::Css => self
                .value
                .strip_prefix('#')
                .filter(|rest| rest.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')),
            _ => None,
        }
    }

    /// Equivalent CSS selector, if one exists
    #[must_use]
    pub fn to_css(&self) -> Option<String> {
        match self.strategy {
            LocatorStrategy::Id => Some(format!("#{}", css_escape_ident(&self.value))),
            LocatorStrategy::Css => Some(self.value.clone()),
            LocatorStrategy::Name => Some(format!("[name='{}']", self.value.replace('\'', "\\'"))),
            LocatorStrategy::XPath => None,
        }
    }

    /// JavaScript expression resolving the first matching element (or null)
    #[must_use]
    pub fn to_query(&self) -> String {
        match self.strategy {
            LocatorStrategy::Id => format!("document.getElementById({:?})", self.value),
            LocatorStrategy::Css => format!("document.querySelector({:?})", self.value),
            LocatorStrategy::Name => format!("document.getElementsByName({:?})[0] || null", self.value),
            LocatorStrategy::XPath => format!(
                "document.evaluate({:?}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                self.value
            ),
        }
    }

    /// JavaScript expression resolving all matching elements as an array
    #[must_use]
    pub fn to_query_all(&self) -> String {
        match self.strategy {
            LocatorStrategy::Id => format!(
                "[document.getElementById({:?})].filter(Boolean)",
                self.value
            ),
            LocatorStrategy::Css => format!("Array.from(document.querySelectorAll({:?}))", self.value),
            LocatorStrategy::Name => format!("Array.from(document.getElementsByName({:?}))", self.value),
            LocatorStrategy::XPath => format!(
                "(function(){{var r=document.evaluate({:?}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);var a=[];for(var i=0;i<r.snapshotLength;i++)a.push(r.snapshotItem(i));return a;}})()",
                self.value
            ),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy, self.value)
    }
}

fn css_escape_ident(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    for c in ident.chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod strategy_tests {
        use super::*;

        #[test]
        fn test_parse_known() {
            assert_eq!(LocatorStrategy::parse("id"), LocatorStrategy::Id);
            assert_eq!(LocatorStrategy::parse("ID"), LocatorStrategy::Id);
            assert_eq!(LocatorStrategy::parse("CSS"), LocatorStrategy::Css);
            assert_eq!(LocatorStrategy::parse("XPATH"), LocatorStrategy::XPath);
            assert_eq!(LocatorStrategy::parse("name"), LocatorStrategy::Name);
        }

        #[test]
        fn test_parse_falls_back_to_css() {
            assert_eq!(LocatorStrategy::parse("unknown"), LocatorStrategy::Css);
            assert_eq!(LocatorStrategy::parse(""), LocatorStrategy::Css);
        }

        #[test]
        fn test_deserialize_is_lenient() {
            let loc: Locator = serde_yaml_ng::from_str("{ by: LinkText, value: a.b }").unwrap();
            assert_eq!(loc.strategy, LocatorStrategy::Css);
        }
    }

    mod css_tests {
        use super::*;

        #[test]
        fn test_id_to_css() {
            assert_eq!(Locator::id("idRiesgo").to_css().unwrap(), "#idRiesgo");
        }

        #[test]
        fn test_name_to_css() {
            assert_eq!(Locator::name("Patente").to_css().unwrap(), "[name='Patente']");
        }

        #[test]
        fn test_xpath_has_no_css() {
            assert!(Locator::xpath("//input").to_css().is_none());
        }

        #[test]
        fn test_element_id() {
            assert_eq!(Locator::id("Moneda").element_id(), Some("Moneda"));
            assert_eq!(Locator::css("#Moneda").element_id(), Some("Moneda"));
            assert_eq!(Locator::css("#a .b").element_id(), None);
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn test_id_query() {
            assert_eq!(
                Locator::id("x").to_query(),
                "document.getElementById(\"x\")"
            );
        }

        #[test]
        fn test_xpath_query() {
            assert!(Locator::xpath("//li").to_query().contains("document.evaluate"));
        }
    }

    #[test]
    fn test_shorthand() {
        assert_eq!(Locator::shorthand("#Moneda"), Locator::css("#Moneda"));
        assert_eq!(Locator::shorthand("TipoVigencia"), Locator::id("TipoVigencia"));
        assert_eq!(Locator::shorthand("[name='x']"), Locator::css("[name='x']"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Locator::id("idCliente").to_string(), "id=idCliente");
    }
}
