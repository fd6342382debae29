//! Conversion options, optionally read from a JSON config file.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::figures::RenderContext;
use crate::xml::XmlOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown output format {0:?} (expected xml, mat or figures)")]
    UnknownFormat(String),
}

/// An artifact family written by a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Xml,
    Mat,
    Figures,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Xml, OutputFormat::Mat, OutputFormat::Figures];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Xml => "xml",
            OutputFormat::Mat => "mat",
            OutputFormat::Figures => "figures",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OutputFormat::Xml => "PLECS SemiconductorLibrary XML (<name>.xml)",
            OutputFormat::Mat => "MATLAB MAT-file, Level 5 (<name>.mat)",
            OutputFormat::Figures => "PNG figures at the configured DPI (figures/<name>/<kind>.png)",
        }
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "xml" | "plecs" => Ok(OutputFormat::Xml),
            "mat" | "matlab" => Ok(OutputFormat::Mat),
            "figures" | "figure" | "png" => Ok(OutputFormat::Figures),
            _ => Err(ConfigError::UnknownFormat(text.to_string())),
        }
    }

    /// Parse a comma-separated list such as `xml,mat`.
    pub fn parse_list(text: &str) -> Result<Vec<Self>, ConfigError> {
        let mut formats = Vec::new();
        for part in text.split(',').filter(|p| !p.trim().is_empty()) {
            let format = Self::parse(part)?;
            if !formats.contains(&format) {
                formats.push(format);
            }
        }
        Ok(formats)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a conversion run (CLI or library callers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    pub formats: Vec<OutputFormat>,
    pub xml: XmlOptions,
    pub render: RenderContext,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            formats: OutputFormat::ALL.to_vec(),
            xml: XmlOptions::default(),
            render: RenderContext::default(),
        }
    }
}

impl ConvertOptions {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn wants(&self, format: OutputFormat) -> bool {
        self.formats.contains(&format)
    }
}
