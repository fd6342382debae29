//! Canonical in-memory device model.
//!
//! A [`DeviceModel`] is built once per source document by
//! [`crate::loader::load`], which enforces every invariant up front. Table
//! types keep their fields private so an aligned table cannot be
//! misaligned afterwards; exporters only ever borrow the model.

pub mod axis;
pub mod conduction;
pub mod loss;
pub mod thermal;

use std::fmt;

use crate::error::{Facet, UnsupportedFacetError};

pub use axis::Axis;
pub use conduction::{ConductionBranch, ConductionCurveSet, ConductionLoss, CurveTable, Direction, Gate};
pub use loss::{ComputationMethod, EnergyTable, LossTable};
pub use thermal::{RcLayer, ThermalNetwork, ThermalTopology};

/// PLECS semiconductor class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Diode,
    Igbt,
    IgbtWithDiode,
    Mosfet,
    MosfetWithDiode,
    Thyristor,
    Gto,
    Igct,
}

impl DeviceType {
    pub const ALL: [DeviceType; 8] = [
        DeviceType::Diode,
        DeviceType::Igbt,
        DeviceType::IgbtWithDiode,
        DeviceType::Mosfet,
        DeviceType::MosfetWithDiode,
        DeviceType::Thyristor,
        DeviceType::Gto,
        DeviceType::Igct,
    ];

    /// Case-insensitive; `-` and `_` count as spaces.
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = text
            .replace(['-', '_'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().to_ascii_lowercase() == normalized)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Diode => "Diode",
            DeviceType::Igbt => "IGBT",
            DeviceType::IgbtWithDiode => "IGBT with Diode",
            DeviceType::Mosfet => "MOSFET",
            DeviceType::MosfetWithDiode => "MOSFET with Diode",
            DeviceType::Thyristor => "Thyristor",
            DeviceType::Gto => "GTO",
            DeviceType::Igct => "IGCT",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PLECS package identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub class: String,
    pub vendor: String,
    pub partnumber: String,
}

/// `SemiconductorLibrary` root attributes carried by the source document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LibraryInfo {
    pub xmlns: Option<String>,
    pub version: Option<String>,
}

/// Named gate-resistance parameter referenced by loss formulas.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub description: Option<String>,
    pub default_value: Option<f64>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

/// Loss and thermal facets of a device. Every facet is optional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SemiconductorData {
    /// `type` attribute of `SemiconductorData`; exporters fall back to the
    /// package class.
    pub kind: Option<String>,
    pub turn_on_loss: Option<LossTable>,
    pub turn_off_loss: Option<LossTable>,
    pub conduction_loss: Option<ConductionLoss>,
    pub thermal_model: Option<ThermalNetwork>,
}

impl SemiconductorData {
    pub fn has_switching_or_conduction(&self) -> bool {
        self.turn_on_loss.is_some() || self.turn_off_loss.is_some() || self.conduction_loss.is_some()
    }
}

/// One device's characterisation data.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceModel {
    pub name: String,
    pub manufacturer: Option<String>,
    pub device_type: DeviceType,
    pub material: Option<String>,
    pub package_type: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub source_file: Option<String>,
    pub source_path: Option<String>,
    pub library: LibraryInfo,
    pub package: Package,
    pub variables: Vec<Variable>,
    pub semiconductor_data: SemiconductorData,
    pub comment: Vec<String>,
}

/// Borrowed view of one facet.
#[derive(Debug, Clone, Copy)]
pub enum FacetRef<'a> {
    Loss(&'a LossTable),
    Conduction(&'a ConductionLoss),
    Thermal(&'a ThermalNetwork),
}

impl DeviceModel {
    /// Semiconductor data `type`, or the package class when unset.
    pub fn semiconductor_kind(&self) -> &str {
        self.semiconductor_data
            .kind
            .as_deref()
            .unwrap_or(&self.package.class)
    }

    /// Part number as a single file-name component: every character outside
    /// `[A-Za-z0-9_.]` becomes `_` and leading dots are dropped.
    pub fn safe_name(&self) -> String {
        let mapped: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '.' { c } else { '_' })
            .collect();
        let trimmed = mapped.trim_start_matches('.');
        if trimmed.is_empty() {
            "device".to_string()
        } else {
            trimmed.to_string()
        }
    }

    pub fn has(&self, facet: Facet) -> bool {
        self.facet(facet).is_some()
    }

    pub fn facet(&self, facet: Facet) -> Option<FacetRef<'_>> {
        let data = &self.semiconductor_data;
        match facet {
            Facet::TurnOnLoss => data.turn_on_loss.as_ref().map(FacetRef::Loss),
            Facet::TurnOffLoss => data.turn_off_loss.as_ref().map(FacetRef::Loss),
            Facet::ConductionLoss => data.conduction_loss.as_ref().map(FacetRef::Conduction),
            Facet::ThermalModel => data.thermal_model.as_ref().map(FacetRef::Thermal),
        }
    }

    /// Like [`DeviceModel::facet`], for callers that cannot proceed without it.
    pub fn require(&self, facet: Facet) -> Result<FacetRef<'_>, UnsupportedFacetError> {
        self.facet(facet).ok_or(UnsupportedFacetError { facet })
    }

    /// Facets present on this device, in output order.
    pub fn facets(&self) -> Vec<Facet> {
        Facet::ALL.into_iter().filter(|f| self.has(*f)).collect()
    }
}
