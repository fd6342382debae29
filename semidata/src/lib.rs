//! Semidata - power-semiconductor characterisation models
//!
//! This library loads a device's switching-loss, conduction and thermal
//! data from its canonical JSON document into a validated [`DeviceModel`],
//! and turns that model into a PLECS semiconductor-library XML file, a
//! MATLAB MAT-file and a set of datasheet figures.
//!
//! # Quick Start
//!
//! ```no_run
//! use semidata::{ConvertOptions, SemidataCore};
//! use std::path::Path;
//!
//! let report = SemidataCore::convert_path(
//!     Path::new("database/"),
//!     Path::new("out/"),
//!     &ConvertOptions::default(),
//! ).unwrap();
//!
//! for failure in &report.failed {
//!     println!("{}: {}", failure.path.display(), failure.error);
//! }
//! ```
//!
//! # Features
//!
//! - **Eager validation**: strictly increasing axes, complete energy tables,
//!   gate states and RC ladders are checked once, at load time
//! - **PLECS XML**: export plus import back into a `DeviceModel`
//! - **MAT-file**: Level 5 writer, absent values become empty arrays
//! - **Figures**: deterministic PNGs for loss, conduction and thermal data

pub mod config;
pub mod core;
pub mod error;
pub mod figures;
pub mod loader;
pub mod mat;
pub mod model;
pub mod xml;

// Re-export main types
pub use crate::config::{ConfigError, ConvertOptions, OutputFormat};
pub use crate::core::{
    discover_device_files, BatchReport, ConversionResult, DeviceSummary, FailedFile,
    SemidataCore, SemidataError, SurveyReport,
};
pub use crate::error::{
    ExportError, Facet, FigureError, UnsupportedFacetError, ValidationError,
    ValidationErrorKind, XmlImportError,
};
pub use crate::figures::{Figure, FigureGenerator, FigureKind, FigurePlan, RenderContext};
pub use crate::loader::{load, to_document};
pub use crate::mat::{MatExporter, MatFile, MatValue};
pub use crate::model::{DeviceModel, DeviceType};
pub use crate::xml::{import_xml, XmlExporter, XmlOptions};

/// Parse and validate a JSON device document given as text (convenience
/// wrapper).
pub fn load_str(text: &str) -> Result<DeviceModel, SemidataError> {
    let document: serde_json::Value = serde_json::from_str(text)?;
    Ok(load(&document)?)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        ConvertOptions, DeviceModel, ExportError, Facet, FigureGenerator, FigureKind,
        MatExporter, RenderContext, SemidataCore, SemidataError, ValidationError, XmlExporter,
        XmlOptions,
    };
}
