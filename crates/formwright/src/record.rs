//! The policy record handed to the engine.
//!
//! A [`PolicyRecord`] is produced upstream (PDF extraction) and consumed
//! read-only here. Every field is optional; absence is the common case.

use crate::result::{FillError, FillResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// One insurance policy as extracted from the source document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyRecord {
    // Conditions
    pub cliente: Option<String>,
    pub productor: Option<String>,
    pub aseguradora: Option<String>,
    pub riesgo: Option<String>,
    pub moneda: Option<String>,
    pub tipo_contacto_ssn: Option<String>,
    pub tipo_iva: Option<String>,
    pub tipo_renovacion: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub clausula_ajuste: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    pub cant_cuotas: Option<i64>,
    pub tipo_vigencia: Option<String>,
    pub refacturacion: Option<String>,
    pub inicio_vigencia: Option<String>,

    // Vehicle
    #[serde(deserialize_with = "lenient_int")]
    pub anio: Option<i64>,
    pub marca: Option<String>,
    pub modelo: Option<String>,
    pub combustible: Option<String>,
    pub vehiculo: Option<String>,
    pub patente: Option<String>,
    pub chasis: Option<String>,
    pub motor: Option<String>,

    // Amounts
    #[serde(deserialize_with = "lenient_decimal")]
    pub prima_total: Option<f64>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub premio_total: Option<f64>,
    pub numero_poliza: Option<String>,
    pub fecha_emision: Option<String>,
    pub vencimiento_primera_cuota: Option<String>,
}

impl PolicyRecord {
    /// Parse a record from JSON.
    ///
    /// Accepts a bare field object or the extractor's envelope
    /// `{ "data": { .. }, "missing": [ .. ] }`.
    pub fn from_json(json: &str) -> FillResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a record from an already-decoded JSON value
    pub fn from_value(value: serde_json::Value) -> FillResult<Self> {
        let body = match value {
            serde_json::Value::Object(mut map) => match map.remove("data") {
                Some(data @ serde_json::Value::Object(_)) => data,
                Some(other) => {
                    map.insert("data".to_string(), other);
                    serde_json::Value::Object(map)
                }
                None => serde_json::Value::Object(map),
            },
            other => {
                return Err(FillError::record(format!(
                    "expected a JSON object, found {}",
                    json_kind(&other)
                )))
            }
        };
        Ok(serde_json::from_value(body)?)
    }

    /// Read a record from a JSON file
    pub fn load(path: impl AsRef<Path>) -> FillResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Value of a field, `None` when absent
    #[must_use]
    pub fn get(&self, field: PolicyField) -> Option<FieldValue> {
        use PolicyField as F;
        let text = |v: &Option<String>| v.clone().map(FieldValue::Text);
        let int = |v: &Option<i64>| v.map(FieldValue::Integer);
        let dec = |v: &Option<f64>| v.map(FieldValue::Decimal);
        match field {
            F::Cliente => text(&self.cliente),
            F::Productor => text(&self.productor),
            F::Aseguradora => text(&self.aseguradora),
            F::Riesgo => text(&self.riesgo),
            F::Moneda => text(&self.moneda),
            F::TipoContactoSsn => text(&self.tipo_contacto_ssn),
            F::TipoIva => text(&self.tipo_iva),
            F::TipoRenovacion => text(&self.tipo_renovacion),
            F::ClausulaAjuste => int(&self.clausula_ajuste),
            F::CantCuotas => int(&self.cant_cuotas),
            F::TipoVigencia => text(&self.tipo_vigencia),
            F::Refacturacion => text(&self.refacturacion),
            F::InicioVigencia => text(&self.inicio_vigencia),
            F::Anio => int(&self.anio),
            F::Marca => text(&self.marca),
            F::Modelo => text(&self.modelo),
            F::Combustible => text(&self.combustible),
            F::Vehiculo => text(&self.vehiculo),
            F::Patente => text(&self.patente),
            F::Chasis => text(&self.chasis),
            F::Motor => text(&self.motor),
            F::PrimaTotal => dec(&self.prima_total),
            F::PremioTotal => dec(&self.premio_total),
            F::NumeroPoliza => text(&self.numero_poliza),
            F::FechaEmision => text(&self.fecha_emision),
            F::VencimientoPrimeraCuota => text(&self.vencimiento_primera_cuota),
        }
    }

    /// Value of a field if present and non-empty
    #[must_use]
    pub fn present(&self, field: PolicyField) -> Option<FieldValue> {
        self.get(field).filter(|v| !v.is_empty())
    }

    /// Fields that carry no usable value
    #[must_use]
    pub fn missing(&self) -> Vec<PolicyField> {
        PolicyField::ALL
            .iter()
            .copied()
            .filter(|f| self.present(*f).is_none())
            .collect()
    }
}

/// A single field's value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
}

impl FieldValue {
    /// Whether the value counts as absent (empty string)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Integer(_) | Self::Decimal(_) => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Decimal(d) => write!(f, "{d}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

macro_rules! policy_fields {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Names of the fields a [`PolicyRecord`] carries
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum PolicyField {
            $($variant),+
        }

        impl PolicyField {
            /// Every field, in record declaration order
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Field name as used in records and mapping files
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl FromStr for PolicyField {
            type Err = FillError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($name => Ok(Self::$variant),)+
                    other => Err(FillError::record(format!("unknown field '{other}'"))),
                }
            }
        }
    };
}

policy_fields! {
    Cliente => "cliente",
    Productor => "productor",
    Aseguradora => "aseguradora",
    Riesgo => "riesgo",
    Moneda => "moneda",
    TipoContactoSsn => "tipo_contacto_ssn",
    TipoIva => "tipo_iva",
    TipoRenovacion => "tipo_renovacion",
    ClausulaAjuste => "clausula_ajuste",
    CantCuotas => "cant_cuotas",
    TipoVigencia => "tipo_vigencia",
    Refacturacion => "refacturacion",
    InicioVigencia => "inicio_vigencia",
    Anio => "anio",
    Marca => "marca",
    Modelo => "modelo",
    Combustible => "combustible",
    Vehiculo => "vehiculo",
    Patente => "patente",
    Chasis => "chasis",
    Motor => "motor",
    PrimaTotal => "prima_total",
    PremioTotal => "premio_total",
    NumeroPoliza => "numero_poliza",
    FechaEmision => "fecha_emision",
    VencimientoPrimeraCuota => "vencimiento_primera_cuota",
}

impl Serialize for PolicyField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for PolicyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Int(n)) => Ok(Some(n)),
        Some(NumberOrText::Float(f)) if f.fract() == 0.0 => Ok(Some(f as i64)),
        Some(NumberOrText::Float(f)) => Err(serde::de::Error::custom(format!(
            "expected an integer, found {f}"
        ))),
        Some(NumberOrText::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected an integer, found '{s}'"))),
    }
}

fn lenient_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Int(n)) => Ok(Some(n as f64)),
        Some(NumberOrText::Float(f)) => Ok(Some(f)),
        Some(NumberOrText::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected a decimal, found '{s}'"))),
    }
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
