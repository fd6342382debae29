use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};

use super::format::{format_number, format_summary, format_values};
use crate::error::{ExportError, Facet};
use crate::model::{ConductionCurveSet, DeviceModel, LossTable, ThermalNetwork, Variable};

pub const DEFAULT_NAMESPACE: &str = "http://www.plexim.com/xml/semiconductors/";
pub const DEFAULT_VERSION: &str = "1.4";

/// Options for PLECS XML output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlOptions {
    /// Used when the device document carries no `library.xmlns`.
    pub namespace: String,
    /// Used when the device document carries no `library.version`.
    pub version: String,
    pub indent: usize,
    /// Write a `total_resistance` attribute on the thermal branch.
    pub annotate_total_resistance: bool,
}

impl Default for XmlOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            version: DEFAULT_VERSION.to_string(),
            indent: 4,
            annotate_total_resistance: true,
        }
    }
}

/// Maps a [`DeviceModel`] onto the PLECS `SemiconductorLibrary` schema.
#[derive(Debug, Clone, Default)]
pub struct XmlExporter {
    options: XmlOptions,
}

impl XmlExporter {
    pub fn new(options: XmlOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &XmlOptions {
        &self.options
    }

    pub fn export(&self, model: &DeviceModel) -> Result<String, ExportError> {
        let mut out = XmlOut::new(self.options.indent);
        out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let namespace = model
            .library
            .xmlns
            .as_deref()
            .unwrap_or(&self.options.namespace);
        let version = model
            .library
            .version
            .as_deref()
            .unwrap_or(&self.options.version);
        out.start("SemiconductorLibrary", &[("xmlns", namespace), ("version", version)])?;
        out.start(
            "Package",
            &[
                ("class", model.package.class.as_str()),
                ("vendor", model.package.vendor.as_str()),
                ("partnumber", model.package.partnumber.as_str()),
            ],
        )?;

        if !model.variables.is_empty() {
            out.start("Variables", &[])?;
            for variable in &model.variables {
                write_variable(&mut out, variable)?;
            }
            out.end("Variables")?;
        }

        let data = &model.semiconductor_data;
        if data.has_switching_or_conduction() {
            out.start("SemiconductorData", &[("type", model.semiconductor_kind())])?;
            if let Some(table) = &data.turn_on_loss {
                write_loss_table(&mut out, Facet::TurnOnLoss, table)?;
            }
            if let Some(table) = &data.turn_off_loss {
                write_loss_table(&mut out, Facet::TurnOffLoss, table)?;
            }
            if let Some(conduction) = &data.conduction_loss {
                for set in conduction.iter() {
                    write_curve_set(&mut out, set)?;
                }
            }
            out.end("SemiconductorData")?;
        }

        if let Some(network) = &data.thermal_model {
            self.write_thermal(&mut out, network)?;
        }

        if !model.comment.is_empty() {
            out.start("Comment", &[])?;
            for line in &model.comment {
                out.text_element("Line", line)?;
            }
            out.end("Comment")?;
        }

        out.end("Package")?;
        out.end("SemiconductorLibrary")?;
        tracing::debug!(device = %model.name, "exported PLECS XML");
        out.finish()
    }

    fn write_thermal(&self, out: &mut XmlOut, network: &ThermalNetwork) -> Result<(), ExportError> {
        tracing::debug!(layers = network.layers().len(), "writing thermal model");
        out.start("ThermalModel", &[])?;
        let topology = network.topology().as_str();
        let total = format_summary(network.total_resistance());
        let mut attrs = vec![("type", topology)];
        if self.options.annotate_total_resistance {
            attrs.push(("total_resistance", total.as_str()));
        }
        out.start("Branch", &attrs)?;
        for layer in network.layers() {
            let r = format_number(layer.resistance);
            let c = format_number(layer.capacitance);
            out.empty("RCElement", &[("R", r.as_str()), ("C", c.as_str())])?;
        }
        out.end("Branch")?;
        out.end("ThermalModel")
    }
}

fn write_variable(out: &mut XmlOut, variable: &Variable) -> Result<(), ExportError> {
    out.start("Variable", &[])?;
    out.text_element("Name", &variable.name)?;
    if let Some(description) = &variable.description {
        out.text_element("Description", description)?;
    }
    for (name, value) in [
        ("DefaultValue", variable.default_value),
        ("MinValue", variable.min_value),
        ("MaxValue", variable.max_value),
    ] {
        if let Some(value) = value {
            out.text_element(name, &format_number(value))?;
        }
    }
    out.end("Variable")
}

fn write_loss_table(out: &mut XmlOut, facet: Facet, table: &LossTable) -> Result<(), ExportError> {
    let energy = table.energy();
    let [nt, nv, ni] = energy.shape();
    let axes = [
        table.temperature_axis().len(),
        table.voltage_axis().len(),
        table.current_axis().len(),
    ];
    if energy.shape() != axes || energy.values().len() != nt * nv * ni {
        return Err(ExportError::Misaligned {
            facet,
            detail: format!(
                "energy table shape {:?} ({} values) does not match axes {:?}",
                energy.shape(),
                energy.values().len(),
                axes
            ),
        });
    }
    tracing::debug!(%facet, shape = ?axes, "writing loss table");

    let name = facet.element_name();
    out.start(name, &[])?;
    out.text_element("ComputationMethod", table.computation_method().as_str())?;
    if let Some(formula) = table.formula() {
        out.text_element("Formula", formula)?;
    }
    out.text_element("CurrentAxis", &format_values(table.current_axis().values()))?;
    out.text_element("VoltageAxis", &format_values(table.voltage_axis().values()))?;
    out.text_element(
        "TemperatureAxis",
        &format_values(table.temperature_axis().values()),
    )?;
    let scale = format_number(energy.scale());
    out.start("Energy", &[("scale", scale.as_str())])?;
    for t in 0..nt {
        out.start("Temperature", &[])?;
        for v in 0..nv {
            out.text_element("Voltage", &format_values(energy.row(t, v)))?;
        }
        out.end("Temperature")?;
    }
    out.end("Energy")?;
    out.end(name)
}

fn write_curve_set(out: &mut XmlOut, set: &ConductionCurveSet) -> Result<(), ExportError> {
    let drop = set.voltage_drop();
    let [nt, ni] = drop.shape();
    let axes = [set.temperature_axis().len(), set.current_axis().len()];
    if drop.shape() != axes || drop.values().len() != nt * ni {
        return Err(ExportError::Misaligned {
            facet: Facet::ConductionLoss,
            detail: format!(
                "gate {} voltage-drop shape {:?} ({} values) does not match axes {:?}",
                set.gate(),
                drop.shape(),
                drop.values().len(),
                axes
            ),
        });
    }
    tracing::debug!(gate = %set.gate(), shape = ?axes, "writing conduction curves");

    out.start("ConductionLoss", &[("gate", set.gate().as_str())])?;
    out.text_element("ComputationMethod", set.computation_method().as_str())?;
    if let Some(formula) = set.formula() {
        out.text_element("Formula", formula)?;
    }
    out.text_element("CurrentAxis", &format_values(set.current_axis().values()))?;
    out.text_element(
        "TemperatureAxis",
        &format_values(set.temperature_axis().values()),
    )?;
    let scale = format_number(drop.scale());
    out.start("VoltageDrop", &[("scale", scale.as_str())])?;
    for t in 0..nt {
        out.text_element("Temperature", &format_values(drop.row(t)))?;
    }
    out.end("VoltageDrop")?;
    out.end("ConductionLoss")
}

/// Thin wrapper mapping writer failures to [`ExportError::Xml`].
struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new(indent: usize) -> Self {
        let writer = if indent == 0 {
            Writer::new(Vec::new())
        } else {
            Writer::new_with_indent(Vec::new(), b' ', indent)
        };
        Self { writer }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), ExportError> {
        self.writer
            .write_event(event)
            .map_err(|e| ExportError::Xml(e.to_string()))
    }

    fn element<'a>(name: &'a str, attrs: &[(&str, &str)]) -> BytesStart<'a> {
        let mut start = BytesStart::new(name);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        start
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ExportError> {
        self.event(Event::Start(Self::element(name, attrs)))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ExportError> {
        self.event(Event::Empty(Self::element(name, attrs)))
    }

    fn end(&mut self, name: &str) -> Result<(), ExportError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<(), ExportError> {
        self.start(name, &[])?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn finish(self) -> Result<String, ExportError> {
        let mut bytes = self.writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|e| ExportError::Utf8(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Axis, EnergyTable};
    use crate::loader::load;
    use serde_json::json;

    fn model_with_turn_on() -> DeviceModel {
        load(&json!({
            "metadata": {"part_number": "T1", "type": "IGBT"},
            "package": {"semiconductor_data": {"turn_on_loss": {
                "current_axis": [0, 10, 20],
                "voltage_axis": [400],
                "temperature_axis": [25, 125],
                "energy": {"scale": 1e-6, "data": [[[0, 1, 2]], [[0, 2, 4]]]}
            }}}
        }))
        .unwrap()
    }

    #[test]
    fn misaligned_table_is_reported_not_written() {
        let mut model = model_with_turn_on();
        // Only reachable from inside the crate: shrink an axis behind the
        // table's back.
        let table = model.semiconductor_data.turn_on_loss.as_mut().unwrap();
        table.current_axis = Axis::new(vec![0.0, 10.0]).unwrap();

        let err = XmlExporter::default().export(&model).unwrap_err();
        assert!(matches!(
            err,
            ExportError::Misaligned {
                facet: Facet::TurnOnLoss,
                ..
            }
        ));
    }

    #[test]
    fn misaligned_arena_is_reported() {
        let mut model = model_with_turn_on();
        let table = model.semiconductor_data.turn_on_loss.as_mut().unwrap();
        table.energy = EnergyTable {
            scale: 1.0,
            shape: [2, 1, 3],
            values: vec![0.0; 5],
        };
        assert!(XmlExporter::default().export(&model).is_err());
    }

    #[test]
    fn variables_and_comment_are_written() {
        let model = load(&json!({
            "metadata": {"part_number": "V1", "type": "Diode"},
            "package": {
                "variables": [{"name": "Rgon", "description": "gate <on>", "default_value": 2.2}],
                "comment": ["line one"]
            }
        }))
        .unwrap();
        let xml = XmlExporter::default().export(&model).unwrap();
        assert!(xml.contains("<Name>Rgon</Name>"));
        assert!(xml.contains("<Description>gate &lt;on&gt;</Description>"));
        assert!(xml.contains("<DefaultValue>2.2</DefaultValue>"));
        assert!(xml.contains("<Line>line one</Line>"));
        assert!(!xml.contains("SemiconductorData"));
    }
}
