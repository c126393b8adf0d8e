//! Fill Plan Builder.
//!
//! Turns a [`PolicyRecord`] and a [`FieldMapping`] into the ordered list of
//! fills. The order is fixed, not taken from the record:
//!
//! ```text
//! condiciones: aseguradora → riesgo → productor → moneda → … → cliente
//! vehiculo:    marca → anio → patente → chasis → motor
//! montos:      prima_total → premio_total → … → vencimiento_primera_cuota
//! ```
//!
//! The insurer repopulates the risk list, so it comes first; the client
//! recalculates several conditions selects, so it comes last in its tab.

use crate::mapping::{FieldLocator, FieldMapping};
use crate::record::{FieldValue, PolicyField, PolicyRecord};
use crate::result::{FillError, FillResult};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Form tabs, in visiting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Condiciones,
    Vehiculo,
    Montos,
}

impl Tab {
    pub const ALL: [Self; 3] = [Self::Condiciones, Self::Vehiculo, Self::Montos];

    /// Key used in mapping files
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Condiciones => "condiciones",
            Self::Vehiculo => "vehiculo",
            Self::Montos => "montos",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = FillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "condiciones" => Ok(Self::Condiciones),
            "vehiculo" => Ok(Self::Vehiculo),
            "montos" => Ok(Self::Montos),
            other => Err(FillError::mapping(format!("unknown tab '{other}'"))),
        }
    }
}

/// Planned fields and their tabs, in fill order
pub const FILL_ORDER: &[(PolicyField, Tab)] = &[
    (PolicyField::Aseguradora, Tab::Condiciones),
    (PolicyField::Riesgo, Tab::Condiciones),
    (PolicyField::Productor, Tab::Condiciones),
    (PolicyField::Moneda, Tab::Condiciones),
    (PolicyField::TipoContactoSsn, Tab::Condiciones),
    (PolicyField::TipoIva, Tab::Condiciones),
    (PolicyField::TipoRenovacion, Tab::Condiciones),
    (PolicyField::ClausulaAjuste, Tab::Condiciones),
    (PolicyField::CantCuotas, Tab::Condiciones),
    (PolicyField::TipoVigencia, Tab::Condiciones),
    (PolicyField::InicioVigencia, Tab::Condiciones),
    (PolicyField::Refacturacion, Tab::Condiciones),
    (PolicyField::Cliente, Tab::Condiciones),
    (PolicyField::Marca, Tab::Vehiculo),
    (PolicyField::Anio, Tab::Vehiculo),
    (PolicyField::Patente, Tab::Vehiculo),
    (PolicyField::Chasis, Tab::Vehiculo),
    (PolicyField::Motor, Tab::Vehiculo),
    (PolicyField::PrimaTotal, Tab::Montos),
    (PolicyField::PremioTotal, Tab::Montos),
    (PolicyField::NumeroPoliza, Tab::Montos),
    (PolicyField::FechaEmision, Tab::Montos),
    (PolicyField::VencimientoPrimeraCuota, Tab::Montos),
];

/// One field to fill
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillStep {
    pub field: PolicyField,
    pub target: FieldLocator,
    pub tab: Tab,
    #[serde(serialize_with = "display_value")]
    pub value: FieldValue,
}

fn display_value<S: serde::Serializer>(value: &FieldValue, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

/// Why a planned field has no step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The record has no value for it
    NoValue,
    /// The mapping has no locator for it
    NoLocator,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoValue => "no value",
            Self::NoLocator => "no locator",
        })
    }
}

/// The ordered fills for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FillPlan {
    steps: Vec<FillStep>,
    skipped: Vec<(PolicyField, SkipReason)>,
}

impl FillPlan {
    /// Build the plan. Deterministic: the same inputs give the same plan.
    #[must_use]
    pub fn build(record: &PolicyRecord, mapping: &FieldMapping) -> Self {
        let mut plan = Self::default();
        for &(field, tab) in FILL_ORDER {
            let Some(value) = record.present(field) else {
                plan.skipped.push((field, SkipReason::NoValue));
                continue;
            };
            let Some(target) = mapping.locator_for(field.as_str()) else {
                plan.skipped.push((field, SkipReason::NoLocator));
                continue;
            };
            plan.steps.push(FillStep {
                field,
                target: target.clone(),
                tab,
                value,
            });
        }
        tracing::debug!(steps = plan.steps.len(), skipped = plan.skipped.len(), "plan built");
        plan
    }

    /// Plan from explicit steps, in the given order
    #[must_use]
    pub fn from_steps(steps: Vec<FillStep>) -> Self {
        Self {
            steps,
            skipped: Vec::new(),
        }
    }

    /// Keep only the steps of `tabs`
    #[must_use]
    pub fn restrict_to(mut self, tabs: &[Tab]) -> Self {
        self.steps.retain(|s| tabs.contains(&s.tab));
        self
    }

    #[must_use]
    pub fn steps(&self) -> &[FillStep] {
        &self.steps
    }

    /// Planned fields left out, with the reason
    #[must_use]
    pub fn skipped(&self) -> &[(PolicyField, SkipReason)] {
        &self.skipped
    }

    /// Index of the step for `field`
    #[must_use]
    pub fn position(&self, field: PolicyField) -> Option<usize> {
        self.steps.iter().position(|s| s.field == field)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FillStep> {
        self.steps.iter()
    }
}

impl<'a> IntoIterator for &'a FillPlan {
    type Item = &'a FillStep;
    type IntoIter = std::slice::Iter<'a, FillStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Parse a comma-separated tab list
pub fn parse_tabs(list: &str) -> FillResult<Vec<Tab>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}
