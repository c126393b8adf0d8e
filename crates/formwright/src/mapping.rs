//! Field mapping configuration.
//!
//! A mapping file tells the engine where each record field lives on the
//! destination form, which widget renders it, how to reach each tab, and how
//! to translate source values into option labels for native selects.
//!
//! ```yaml
//! fields:
//!   aseguradora: { by: id, value: idAseguradora, type: select }
//!   cliente:
//!     by: id
//!     value: idCliente
//!     type: select2
//!     profile: { result_timeout_ms: 6000 }
//! tabs:
//!   condiciones: { click: { by: css, value: "#tabCondiciones" } }
//! select_value_map:
//!   tipo_iva: { "CONSUMIDOR FINAL": "Consumidor Final" }
//! ```
//!
//! Widget behavior that differs per field (query truncation, typing mode,
//! timeouts, post-fill settling) lives in a [`FieldProfile`]. Built-in
//! profiles cover the known fields; a mapping may override single knobs.

use crate::locator::{Locator, LocatorStrategy};
use crate::record::FieldValue;
use crate::result::{FillError, FillResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Widget kinds the filler knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    /// Plain text input
    #[default]
    Input,
    /// Native `<select>`
    NativeSelect,
    /// Search-select composite (hidden holder plus search overlay)
    CompositeSelector,
    /// Type-ahead input with a suggestion list
    Autocomplete,
}

impl WidgetKind {
    /// Parse a mapping `type` string; unknown kinds are plain inputs
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "select" | "native_select" | "native-select" => Self::NativeSelect,
            "select2" | "composite-selector" | "composite_selector" | "search-select" => {
                Self::CompositeSelector
            }
            "autocomplete" | "typeahead" | "type-ahead" => Self::Autocomplete,
            _ => Self::Input,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::NativeSelect => "select",
            Self::CompositeSelector => "select2",
            Self::Autocomplete => "autocomplete",
        }
    }
}

impl<'de> Deserialize<'de> for WidgetKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a search query reaches a composite selector's search box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Type the whole query at once
    #[default]
    Batch,
    /// One character at a time with per-character keyup events
    CharByChar,
    /// Write the value directly and synthesize an input event
    DirectSet,
}

/// What to wait for after a field has been filled
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettleRule {
    /// Proceed immediately
    #[default]
    None,
    /// A dependent select repopulates: more than one option and the first
    /// one is not a loading label
    DependentOptions {
        /// The dependent select
        target: Locator,
    },
    /// Fixed pause with no readiness signal
    Pause {
        /// Pause length
        ms: u64,
    },
    /// Every listed select is enabled, non-empty and not showing a
    /// loading label
    DownstreamReady {
        /// Selects that must settle
        targets: Vec<Locator>,
    },
}

/// Per-field widget behavior
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldProfile {
    /// Search with the text before the first comma only
    pub query_truncation: bool,
    /// How the search query is delivered
    pub input_mode: InputMode,
    /// Result wait override
    pub result_timeout_ms: Option<u64>,
    /// Rendered-text verification override
    pub verify_timeout_ms: Option<u64>,
    /// Also require the hidden holder to carry a real value
    pub verify_hidden_value: bool,
    /// Commit with the confirm key before falling back to a click
    pub confirm_with_key: bool,
    /// Rewrite the holder directly when nothing else commits
    pub force_fallback: bool,
    /// Holder that must carry a value before this widget is opened
    pub requires: Option<Locator>,
    /// Write the date portion straight into the masked control
    pub date_mask: bool,
    /// Post-fill settling
    pub settle: SettleRule,
}

impl FieldProfile {
    /// Built-in profile for a field name
    #[must_use]
    pub fn builtin(field: &str) -> Self {
        match field {
            "productor" => Self {
                query_truncation: true,
                ..Self::default()
            },
            "aseguradora" => Self {
                settle: SettleRule::DependentOptions {
                    target: Locator::id("idRiesgo"),
                },
                ..Self::default()
            },
            "riesgo" => Self {
                input_mode: InputMode::CharByChar,
                verify_hidden_value: true,
                requires: Some(Locator::id("idAseguradora")),
                settle: SettleRule::Pause { ms: 250 },
                ..Self::default()
            },
            "cliente" => Self {
                input_mode: InputMode::DirectSet,
                result_timeout_ms: Some(5000),
                verify_hidden_value: true,
                confirm_with_key: true,
                force_fallback: true,
                settle: SettleRule::DownstreamReady {
                    targets: ["Moneda", "TipoRenovacion", "TipoVigencia", "NroCuota"]
                        .into_iter()
                        .map(Locator::id)
                        .collect(),
                },
                ..Self::default()
            },
            "inicio_vigencia" => Self {
                date_mask: true,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    /// Apply the knobs an override sets
    #[must_use]
    pub fn overridden(mut self, over: &ProfileOverride) -> Self {
        if let Some(v) = over.query_truncation {
            self.query_truncation = v;
        }
        if let Some(v) = over.input_mode {
            self.input_mode = v;
        }
        if over.result_timeout_ms.is_some() {
            self.result_timeout_ms = over.result_timeout_ms;
        }
        if over.verify_timeout_ms.is_some() {
            self.verify_timeout_ms = over.verify_timeout_ms;
        }
        if let Some(v) = over.verify_hidden_value {
            self.verify_hidden_value = v;
        }
        if let Some(v) = over.confirm_with_key {
            self.confirm_with_key = v;
        }
        if let Some(v) = over.force_fallback {
            self.force_fallback = v;
        }
        if over.requires.is_some() {
            self.requires.clone_from(&over.requires);
        }
        if let Some(v) = over.date_mask {
            self.date_mask = v;
        }
        if let Some(v) = &over.settle {
            self.settle = v.clone();
        }
        self
    }
}

/// Partial profile from a mapping file; unset knobs keep the built-in value
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileOverride {
    pub query_truncation: Option<bool>,
    pub input_mode: Option<InputMode>,
    pub result_timeout_ms: Option<u64>,
    pub verify_timeout_ms: Option<u64>,
    pub verify_hidden_value: Option<bool>,
    pub confirm_with_key: Option<bool>,
    pub force_fallback: Option<bool>,
    pub requires: Option<Locator>,
    pub date_mask: Option<bool>,
    pub settle: Option<SettleRule>,
}

/// Where a field lives and how to drive it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldLocator {
    pub locator: Locator,
    pub kind: WidgetKind,
    pub profile: FieldProfile,
}

impl FieldLocator {
    /// Locator with the built-in profile for `field`
    #[must_use]
    pub fn new(field: &str, locator: Locator, kind: WidgetKind) -> Self {
        Self {
            locator,
            kind,
            profile: FieldProfile::builtin(field),
        }
    }

    #[must_use]
    pub fn with_profile(mut self, profile: FieldProfile) -> Self {
        self.profile = profile;
        self
    }
}

/// How to activate a tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabLocator {
    pub click: Locator,
}

impl TabLocator {
    #[must_use]
    pub fn new(click: Locator) -> Self {
        Self { click }
    }
}

impl<'de> Deserialize<'de> for TabLocator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Click {
            Full(Locator),
            Css(String),
        }

        #[derive(Deserialize)]
        struct Raw {
            click: Click,
        }

        let raw = Raw::deserialize(deserializer)?;
        let click = match raw.click {
            Click::Full(locator) => locator,
            Click::Css(css) => Locator::css(css),
        };
        Ok(Self { click })
    }
}

/// Complete mapping configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldMapping {
    pub fields: BTreeMap<String, FieldLocator>,
    pub tabs: BTreeMap<String, TabLocator>,
    pub select_value_map: BTreeMap<String, BTreeMap<String, String>>,
}

impl FieldMapping {
    /// Load a mapping from a YAML file
    pub fn load(path: impl AsRef<Path>) -> FillResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FillError::mapping(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a mapping from YAML text
    pub fn from_yaml(yaml: &str) -> FillResult<Self> {
        let raw: RawMapping = serde_yaml_ng::from_str(yaml)?;
        let mut fields = BTreeMap::new();
        for (name, entry) in raw.fields {
            if entry.value.trim().is_empty() {
                return Err(FillError::mapping(format!(
                    "field '{name}' has an empty locator value"
                )));
            }
            let mut profile = FieldProfile::builtin(&name);
            if let Some(over) = &entry.profile {
                profile = profile.overridden(over);
            }
            let locator = Locator::new(entry.by, entry.value);
            fields.insert(
                name,
                FieldLocator {
                    locator,
                    kind: entry.kind,
                    profile,
                },
            );
        }
        let select_value_map = raw
            .select_value_map
            .into_iter()
            .map(|(field, table)| {
                let table = table.into_iter().map(|(k, v)| (k.0, v.0)).collect();
                (field, table)
            })
            .collect();
        Ok(Self {
            fields,
            tabs: raw.tabs,
            select_value_map,
        })
    }

    /// Add or replace a field entry
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, locator: FieldLocator) -> Self {
        self.fields.insert(name.into(), locator);
        self
    }

    /// Add or replace a tab entry
    #[must_use]
    pub fn with_tab(mut self, name: impl Into<String>, click: Locator) -> Self {
        self.tabs.insert(name.into(), TabLocator::new(click));
        self
    }

    /// Add a value translation for a native-select field
    #[must_use]
    pub fn with_translation(
        mut self,
        field: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.select_value_map
            .entry(field.into())
            .or_default()
            .insert(from.into(), to.into());
        self
    }

    #[must_use]
    pub fn locator_for(&self, field: &str) -> Option<&FieldLocator> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn tab_locator(&self, tab: &str) -> Option<&TabLocator> {
        self.tabs.get(tab)
    }

    #[must_use]
    pub fn translation_for(&self, field: &str) -> Option<&BTreeMap<String, String>> {
        self.select_value_map.get(field)
    }

    /// Display value for a native select: the translated label when the
    /// field's table has an entry for the value, else the value itself
    #[must_use]
    pub fn translate(&self, field: &str, value: &FieldValue) -> String {
        let raw = value.to_string();
        self.translation_for(field)
            .and_then(|table| table.get(&raw))
            .cloned()
            .unwrap_or(raw)
    }
}

#[derive(Deserialize)]
struct RawMapping {
    #[serde(default)]
    fields: BTreeMap<String, RawField>,
    #[serde(default)]
    tabs: BTreeMap<String, TabLocator>,
    #[serde(default)]
    select_value_map: BTreeMap<String, BTreeMap<Scalar, Scalar>>,
}

#[derive(Deserialize)]
struct RawField {
    #[serde(default)]
    by: LocatorStrategy,
    value: String,
    #[serde(rename = "type", default)]
    kind: WidgetKind,
    #[serde(default)]
    profile: Option<ProfileOverride>,
}

/// A YAML scalar read as text; translation tables key on numbers too
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Scalar(String);

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Any {
            Int(i64),
            Float(f64),
            Bool(bool),
            Text(String),
        }

        Ok(Self(match Any::deserialize(deserializer)? {
            Any::Int(n) => n.to_string(),
            Any::Float(f) => f.to_string(),
            Any::Bool(b) => b.to_string(),
            Any::Text(s) => s,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
fields:
  aseguradora: { by: id, value: idAseguradora, type: select }
  riesgo: { by: id, value: idRiesgo, type: select2 }
  productor: { by: ID, value: idProductor, type: select2 }
  cliente:
    by: id
    value: idCliente
    type: select2
    profile: { result_timeout_ms: 6000, force_fallback: false }
  cant_cuotas: { by: id, value: NroCuota, type: select }
  patente: { by: name, value: Patente }
  marca: { by: weird, value: "#Marca", type: autocomplete }
tabs:
  condiciones: { click: { by: css, value: "#tabCondiciones" } }
  vehiculo: { click: "#tabVehiculo" }
select_value_map:
  tipo_iva: { "CONSUMIDOR FINAL": "Consumidor Final" }
  cant_cuotas: { 3: "3 cuotas" }
"##;

    mod widget_kind_tests {
        use super::*;

        #[test]
        fn test_parse_aliases() {
            assert_eq!(WidgetKind::parse("select"), WidgetKind::NativeSelect);
            assert_eq!(WidgetKind::parse("SELECT2"), WidgetKind::CompositeSelector);
            assert_eq!(
                WidgetKind::parse("composite-selector"),
                WidgetKind::CompositeSelector
            );
            assert_eq!(WidgetKind::parse("autocomplete"), WidgetKind::Autocomplete);
            assert_eq!(WidgetKind::parse("text"), WidgetKind::Input);
        }
    }

    mod profile_tests {
        use super::*;

        #[test]
        fn test_builtin_cliente() {
            let p = FieldProfile::builtin("cliente");
            assert_eq!(p.input_mode, InputMode::DirectSet);
            assert_eq!(p.result_timeout_ms, Some(5000));
            assert!(p.verify_hidden_value && p.confirm_with_key && p.force_fallback);
            assert!(matches!(p.settle, SettleRule::DownstreamReady { ref targets } if targets.len() == 4));
        }

        #[test]
        fn test_builtin_riesgo() {
            let p = FieldProfile::builtin("riesgo");
            assert_eq!(p.input_mode, InputMode::CharByChar);
            assert_eq!(p.requires, Some(Locator::id("idAseguradora")));
            assert_eq!(p.settle, SettleRule::Pause { ms: 250 });
        }

        #[test]
        fn test_builtin_default() {
            assert_eq!(FieldProfile::builtin("moneda"), FieldProfile::default());
            assert!(FieldProfile::builtin("productor").query_truncation);
            assert!(FieldProfile::builtin("inicio_vigencia").date_mask);
        }

        #[test]
        fn test_override_keeps_unset_knobs() {
            let over = ProfileOverride {
                result_timeout_ms: Some(6000),
                ..ProfileOverride::default()
            };
            let p = FieldProfile::builtin("cliente").overridden(&over);
            assert_eq!(p.result_timeout_ms, Some(6000));
            assert_eq!(p.input_mode, InputMode::DirectSet);
        }
    }

    mod load_tests {
        use super::*;

        #[test]
        fn test_from_yaml_fields() {
            let m = FieldMapping::from_yaml(SAMPLE).unwrap();
            let riesgo = m.locator_for("riesgo").unwrap();
            assert_eq!(riesgo.locator, Locator::id("idRiesgo"));
            assert_eq!(riesgo.kind, WidgetKind::CompositeSelector);
            assert_eq!(riesgo.profile.input_mode, InputMode::CharByChar);

            let productor = m.locator_for("productor").unwrap();
            assert_eq!(productor.locator.strategy, LocatorStrategy::Id);

            let patente = m.locator_for("patente").unwrap();
            assert_eq!(patente.kind, WidgetKind::Input);
            assert_eq!(patente.locator, Locator::name("Patente"));

            let marca = m.locator_for("marca").unwrap();
            assert_eq!(marca.locator, Locator::css("#Marca"));
        }

        #[test]
        fn test_from_yaml_profile_override() {
            let m = FieldMapping::from_yaml(SAMPLE).unwrap();
            let cliente = &m.locator_for("cliente").unwrap().profile;
            assert_eq!(cliente.result_timeout_ms, Some(6000));
            assert!(!cliente.force_fallback);
            assert!(cliente.confirm_with_key);
        }

        #[test]
        fn test_tabs_accept_both_forms() {
            let m = FieldMapping::from_yaml(SAMPLE).unwrap();
            assert_eq!(
                m.tab_locator("condiciones").unwrap().click,
                Locator::css("#tabCondiciones")
            );
            assert_eq!(
                m.tab_locator("vehiculo").unwrap().click,
                Locator::css("#tabVehiculo")
            );
            assert!(m.tab_locator("montos").is_none());
        }

        #[test]
        fn test_translation() {
            let m = FieldMapping::from_yaml(SAMPLE).unwrap();
            assert_eq!(
                m.translate("tipo_iva", &FieldValue::from("CONSUMIDOR FINAL")),
                "Consumidor Final"
            );
            assert_eq!(m.translate("cant_cuotas", &FieldValue::Integer(3)), "3 cuotas");
            assert_eq!(m.translate("cant_cuotas", &FieldValue::Integer(6)), "6");
            assert_eq!(m.translate("moneda", &FieldValue::from("PESOS")), "PESOS");
        }

        #[test]
        fn test_empty_locator_rejected() {
            let err = FieldMapping::from_yaml("fields:\n  cliente: { by: id, value: '' }\n")
                .unwrap_err();
            assert!(matches!(err, FillError::Mapping { .. }));
        }

        #[test]
        fn test_unknown_profile_knob_rejected() {
            let yaml = "fields:\n  cliente: { by: id, value: x, profile: { speed: 3 } }\n";
            assert!(FieldMapping::from_yaml(yaml).is_err());
        }

        #[test]
        fn test_empty_document_sections() {
            let m = FieldMapping::from_yaml("fields: {}\n").unwrap();
            assert!(m.fields.is_empty() && m.tabs.is_empty());
        }

        #[test]
        fn test_load_missing_file() {
            let err = FieldMapping::load("/nonexistent/mapping.yaml").unwrap_err();
            assert!(err.to_string().contains("cannot read"));
        }
    }
}
