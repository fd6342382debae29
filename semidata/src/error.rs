//! Error types for loading, exporting and importing device models.
//!
//! Validation happens once, when a document is loaded. Exporters trust the
//! model's invariants and only report [`ExportError`] for defects they detect
//! while transforming.

use std::fmt;
use thiserror::Error;

/// One output facet of a device model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Facet {
    TurnOnLoss,
    TurnOffLoss,
    ConductionLoss,
    ThermalModel,
}

impl Facet {
    pub const ALL: [Facet; 4] = [
        Facet::TurnOnLoss,
        Facet::TurnOffLoss,
        Facet::ConductionLoss,
        Facet::ThermalModel,
    ];

    /// Element / struct-field name used by the PLECS and MAT outputs.
    pub fn element_name(self) -> &'static str {
        match self {
            Facet::TurnOnLoss => "TurnOnLoss",
            Facet::TurnOffLoss => "TurnOffLoss",
            Facet::ConductionLoss => "ConductionLoss",
            Facet::ThermalModel => "ThermalModel",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

/// A source document violated a structural invariant.
///
/// `path` points at the offending field, e.g.
/// `package.semiconductor_data.turn_on_loss.energy.data[1][0]`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid device document at `{path}`: {kind}")]
pub struct ValidationError {
    pub path: String,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationErrorKind {
    #[error("required field is missing")]
    MissingField,

    #[error("expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: String,
    },

    #[error("axis is empty")]
    EmptyAxis,

    #[error("axis is not strictly increasing at index {index}: {previous} is followed by {value}")]
    NotIncreasing {
        index: usize,
        previous: f64,
        value: f64,
    },

    #[error("value is not a finite number")]
    NotFinite,

    #[error("expected {expected} entries, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("no entry for {axis} {value}")]
    MissingAxisEntry { axis: &'static str, value: f64 },

    #[error("entry {key:?} does not match any declared {axis}")]
    UnknownAxisEntry { axis: &'static str, key: String },

    #[error("gate must be \"on\" or \"off\", found {0:?}")]
    InvalidGate(String),

    #[error("unknown {what} {value:?}")]
    UnknownVariant { what: &'static str, value: String },

    #[error("duplicate {0}")]
    Duplicate(String),

    #[error("{0}")]
    OutOfRange(String),
}

/// An internal invariant was violated while transforming a model.
///
/// These are defects, never "facet absent" situations: an absent facet is
/// simply left out of the output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportError {
    #[error("{facet}: {detail}")]
    Misaligned { facet: Facet, detail: String },

    #[error("XML writer failed: {0}")]
    Xml(String),

    #[error("{facet} data is present but has no plottable points")]
    NothingToPlot { facet: Facet },

    #[error("{facet} figure could not be rendered: {detail}")]
    Render { facet: Facet, detail: String },

    #[error("output is not valid UTF-8: {0}")]
    Utf8(String),
}

/// A caller demanded a facet the device model does not carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("device has no {facet} data")]
pub struct UnsupportedFacetError {
    pub facet: Facet,
}

/// Reading a PLECS XML document failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum XmlImportError {
    #[error("malformed XML: {0}")]
    Syntax(String),

    #[error("unexpected document structure: {0}")]
    Structure(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Producing one specific figure failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FigureError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedFacetError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
