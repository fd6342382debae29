//! File-oriented conversion layer shared by the CLI and library callers.
//! Everything below `core` is pure; this is where bytes hit the disk.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::config::{ConfigError, ConvertOptions, OutputFormat};
use crate::error::{ExportError, Facet, FigureError, UnsupportedFacetError, ValidationError, XmlImportError};
use crate::figures::{FigureGenerator, FigureKind};
use crate::loader;
use crate::mat::MatExporter;
use crate::model::DeviceModel;
use crate::xml::{self, XmlExporter};

#[derive(Debug, thiserror::Error)]
pub enum SemidataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
    #[error(transparent)]
    Unsupported(#[from] UnsupportedFacetError),
    #[error("XML import failed: {0}")]
    XmlImport(#[from] XmlImportError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Other(String),
}

impl From<FigureError> for SemidataError {
    fn from(e: FigureError) -> Self {
        match e {
            FigureError::Unsupported(e) => SemidataError::Unsupported(e),
            FigureError::Export(e) => SemidataError::Export(e),
        }
    }
}

/// Artifacts written for one source document.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub source: PathBuf,
    pub device: String,
    pub outputs: Vec<PathBuf>,
    pub figures: Vec<FigureKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of converting a file or a directory of files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub converted: Vec<ConversionResult>,
    pub failed: Vec<FailedFile>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.converted.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Short description of a loaded device, used by `check`.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub name: String,
    pub manufacturer: Option<String>,
    pub device_type: String,
    pub material: Option<String>,
    pub variables: usize,
    pub facets: Vec<String>,
    pub total_thermal_resistance: Option<f64>,
}

impl DeviceSummary {
    pub fn from_model(model: &DeviceModel) -> Self {
        let data = &model.semiconductor_data;
        Self {
            name: model.name.clone(),
            manufacturer: model.manufacturer.clone(),
            device_type: model.device_type.to_string(),
            material: model.material.clone(),
            variables: model.variables.len(),
            facets: model.facets().iter().map(|f| f.to_string()).collect(),
            total_thermal_resistance: data.thermal_model.as_ref().map(|t| t.total_resistance()),
        }
    }
}

/// Summary of a device database directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SurveyReport {
    pub directory: PathBuf,
    pub files: usize,
    pub devices: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_material: BTreeMap<String, usize>,
    pub by_manufacturer: BTreeMap<String, usize>,
    pub facet_coverage: BTreeMap<String, usize>,
    pub failed: Vec<FailedFile>,
}

/// List the `*.json` device documents directly inside `dir`, sorted by path.
pub fn discover_device_files(dir: &Path) -> Result<Vec<PathBuf>, SemidataError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(true, |n| n.starts_with('.'));
        if path.is_file() && !hidden && path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// First of `stem`, `stem_2`, `stem_3`, ... not yet in `used`, compared
/// case-insensitively. The chosen stem is recorded.
fn unique_stem(stem: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = stem.to_string();
    let mut n = 1;
    while !used.insert(candidate.to_ascii_lowercase()) {
        n += 1;
        candidate = format!("{stem}_{n}");
    }
    candidate
}

/// Core conversion API used by the CLI.
pub struct SemidataCore;

impl SemidataCore {
    /// Read and validate one JSON device document.
    pub fn load_file(path: &Path) -> Result<DeviceModel, SemidataError> {
        let text = std::fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&text)?;
        Ok(loader::load(&document)?)
    }

    pub fn check_file(path: &Path) -> Result<DeviceSummary, SemidataError> {
        let model = Self::load_file(path)?;
        Ok(DeviceSummary::from_model(&model))
    }

    /// Convert one document, writing the selected artifacts under `out_dir`.
    pub fn convert_file(
        path: &Path,
        out_dir: &Path,
        options: &ConvertOptions,
    ) -> Result<ConversionResult, SemidataError> {
        let model = Self::load_file(path)?;
        let stem = model.safe_name();
        Self::write_outputs(path, model, &stem, out_dir, options)
    }

    /// Convert a single file or every `*.json` file in a directory. Failing
    /// files are recorded and the batch continues. Devices whose names map to
    /// a file stem already used in this batch get a `_2`, `_3`, ... suffix.
    pub fn convert_path(
        path: &Path,
        out_dir: &Path,
        options: &ConvertOptions,
    ) -> Result<BatchReport, SemidataError> {
        let files = if path.is_dir() {
            discover_device_files(path)?
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(SemidataError::Other(format!(
                "{} is neither a file nor a directory",
                path.display()
            )));
        };

        let mut report = BatchReport::default();
        let mut stems = HashSet::new();
        for file in files {
            let outcome = Self::load_file(&file).and_then(|model| {
                let stem = unique_stem(&model.safe_name(), &mut stems);
                if stem != model.safe_name() {
                    tracing::warn!(
                        "{} ({}) collides with an earlier device, writing as {}",
                        file.display(),
                        model.name,
                        stem
                    );
                }
                Self::write_outputs(&file, model, &stem, out_dir, options)
            });
            match outcome {
                Ok(result) => report.converted.push(result),
                Err(e) => {
                    tracing::warn!("Failed to convert {}: {}", file.display(), e);
                    report.failed.push(FailedFile {
                        path: file,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    fn write_outputs(
        path: &Path,
        model: DeviceModel,
        stem: &str,
        out_dir: &Path,
        options: &ConvertOptions,
    ) -> Result<ConversionResult, SemidataError> {
        std::fs::create_dir_all(out_dir)?;

        let mut outputs = Vec::new();
        let mut figures = Vec::new();
        if options.wants(OutputFormat::Xml) {
            let text = XmlExporter::new(options.xml.clone()).export(&model)?;
            let target = out_dir.join(format!("{stem}.xml"));
            std::fs::write(&target, text)?;
            tracing::debug!(file = %target.display(), "wrote XML");
            outputs.push(target);
        }
        if options.wants(OutputFormat::Mat) {
            let mat = MatExporter::new().export(&model)?;
            let target = out_dir.join(format!("{stem}.mat"));
            std::fs::write(&target, mat.to_bytes())?;
            tracing::debug!(file = %target.display(), variable = %mat.name, "wrote MAT-file");
            outputs.push(target);
        }
        if options.wants(OutputFormat::Figures) {
            let rendered = FigureGenerator::new(options.render).generate(&model)?;
            if !rendered.is_empty() {
                let figure_dir = out_dir.join("figures").join(stem);
                std::fs::create_dir_all(&figure_dir)?;
                for (kind, figure) in &rendered {
                    let target = figure_dir.join(figure.file_name());
                    std::fs::write(&target, &figure.png)?;
                    outputs.push(target);
                    figures.push(*kind);
                }
            }
        }

        tracing::info!(
            "Converted {} ({}) -> {} artifact(s)",
            path.display(),
            model.name,
            outputs.len()
        );
        Ok(ConversionResult {
            source: path.to_path_buf(),
            device: model.name,
            outputs,
            figures,
        })
    }

    /// Read a PLECS XML file and return the equivalent canonical JSON
    /// document. The imported model passes the same validation as JSON input.
    pub fn import_xml_file(path: &Path) -> Result<Value, SemidataError> {
        let text = std::fs::read_to_string(path)?;
        let model = xml::import_xml(&text)?;
        tracing::info!("Imported {} ({})", path.display(), model.name);
        Ok(loader::to_document(&model))
    }

    /// Load every document in `dir` and tally what the database contains.
    pub fn survey(dir: &Path) -> Result<SurveyReport, SemidataError> {
        let files = discover_device_files(dir)?;
        let mut report = SurveyReport {
            directory: dir.to_path_buf(),
            files: files.len(),
            ..SurveyReport::default()
        };
        for facet in Facet::ALL {
            report.facet_coverage.insert(facet.to_string(), 0);
        }

        for file in files {
            let model = match Self::load_file(&file) {
                Ok(model) => model,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", file.display(), e);
                    report.failed.push(FailedFile {
                        path: file,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            report.devices += 1;
            *report.by_type.entry(model.device_type.to_string()).or_default() += 1;
            let material = model.material.clone().unwrap_or_else(|| "unknown".into());
            *report.by_material.entry(material).or_default() += 1;
            let manufacturer = model.manufacturer.clone().unwrap_or_else(|| "unknown".into());
            *report.by_manufacturer.entry(manufacturer).or_default() += 1;
            for facet in model.facets() {
                *report.facet_coverage.entry(facet.to_string()).or_default() += 1;
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_is_flat_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::write(dir.path().join(".hidden.json"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.json"), "{}").unwrap();

        let files = discover_device_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = SemidataCore::convert_path(
            &dir.path().join("absent"),
            dir.path(),
            &ConvertOptions::default(),
        );
        assert!(matches!(result, Err(SemidataError::Other(_))));
    }

    fn igbt_document(name: &str) -> String {
        let mut document: Value =
            serde_json::from_str(include_str!("../tests/fixtures/igbt_switching_only.json")).unwrap();
        document["metadata"]["part_number"] = Value::from(name);
        document.to_string()
    }

    fn xml_and_mat() -> ConvertOptions {
        ConvertOptions {
            formats: vec![OutputFormat::Xml, OutputFormat::Mat],
            ..ConvertOptions::default()
        }
    }

    #[test]
    fn device_name_cannot_escape_output_dir() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("evil.json");
        std::fs::write(&input, igbt_document("../../escape")).unwrap();
        let out = root.path().join("a").join("b");

        let result = SemidataCore::convert_file(&input, &out, &xml_and_mat()).unwrap();
        assert_eq!(result.outputs.len(), 2);
        for file in &result.outputs {
            assert_eq!(file.parent(), Some(out.as_path()), "{}", file.display());
            assert!(file.is_file());
        }
        assert!(!root.path().join("escape.xml").exists());
        assert!(!root.path().join("a").join("escape.xml").exists());
    }

    #[test]
    fn colliding_names_get_distinct_stems() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("a.json"), igbt_document("IKW-40N120")).unwrap();
        std::fs::write(input.path().join("b.json"), igbt_document("IKW 40N120")).unwrap();
        std::fs::write(input.path().join("c.json"), igbt_document("ikw_40n120")).unwrap();

        let report = SemidataCore::convert_path(input.path(), out.path(), &xml_and_mat()).unwrap();
        assert_eq!(report.converted.len(), 3);
        let names: Vec<String> = report
            .converted
            .iter()
            .map(|r| r.outputs[0].file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["IKW_40N120.xml", "IKW_40N120_2.xml", "ikw_40n120_3.xml"]);
        for name in &names {
            assert!(out.path().join(name).is_file());
        }
    }

    #[test]
    fn unique_stem_counts_up() {
        let mut used = HashSet::new();
        assert_eq!(unique_stem("X", &mut used), "X");
        assert_eq!(unique_stem("x", &mut used), "x_2");
        assert_eq!(unique_stem("X", &mut used), "X_3");
        assert_eq!(unique_stem("Y", &mut used), "Y");
    }

    #[test]
    fn figure_errors_flatten() {
        let e: SemidataError = FigureError::Unsupported(UnsupportedFacetError {
            facet: Facet::ThermalModel,
        })
        .into();
        assert!(matches!(e, SemidataError::Unsupported(_)));
    }
}
