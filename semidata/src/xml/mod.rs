//! PLECS `SemiconductorLibrary` XML: export and import.

mod format;
mod reader;
mod writer;

pub use format::{format_number, format_summary, format_values};
pub use reader::{import_xml, xml_to_document};
pub use writer::{XmlExporter, XmlOptions, DEFAULT_NAMESPACE, DEFAULT_VERSION};
