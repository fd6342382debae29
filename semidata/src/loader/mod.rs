//! JSON document -> [`DeviceModel`].
//!
//! The loader walks a parsed `serde_json::Value`, tracking the field path
//! so the first violated invariant can be reported precisely. It never
//! touches the filesystem.

mod document;
mod node;

use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::{ValidationError, ValidationErrorKind};
use crate::model::{
    Axis, ComputationMethod, ConductionCurveSet, ConductionLoss, CurveTable, DeviceModel,
    DeviceType, EnergyTable, Gate, LibraryInfo, LossTable, Package, RcLayer, SemiconductorData,
    ThermalNetwork, ThermalTopology, Variable,
};

pub use document::to_document;
use node::{Node, Result};

/// Build a validated [`DeviceModel`] from a parsed device document.
pub fn load(document: &Value) -> std::result::Result<DeviceModel, ValidationError> {
    let root = Node::root(document);
    root.object()?;

    let identity = root.get(&["metadata", "Metadata"]).unwrap_or_else(|| root.clone());
    let name = identity.require(&["part_number", "name", "Name"])?.text()?;
    let type_node = identity.require(&["type", "Type"])?;
    let type_text = type_node.text()?;
    let device_type = DeviceType::parse(&type_text).ok_or_else(|| {
        type_node.error(ValidationErrorKind::UnknownVariant {
            what: "device type",
            value: type_text.clone(),
        })
    })?;
    let manufacturer = identity.opt_text(&["manufacturer", "Manufacturer"])?;

    let library = match root.get(&["library"]) {
        Some(lib) => LibraryInfo {
            xmlns: lib.opt_text(&["xmlns"])?,
            version: lib.opt_text(&["version"])?,
        },
        None => LibraryInfo::default(),
    };

    let package_node = root.get(&["package", "Package"]);
    let package = match &package_node {
        Some(p) => Package {
            class: p
                .opt_text(&["class"])?
                .unwrap_or_else(|| device_type.as_str().to_string()),
            vendor: p
                .opt_text(&["vendor"])?
                .or_else(|| manufacturer.clone())
                .unwrap_or_default(),
            partnumber: p.opt_text(&["partnumber"])?.unwrap_or_else(|| name.clone()),
        },
        None => Package {
            class: device_type.as_str().to_string(),
            vendor: manufacturer.clone().unwrap_or_default(),
            partnumber: name.clone(),
        },
    };

    // Sections below may live under `package` or, for flat documents, at the root.
    let body = package_node.unwrap_or_else(|| root.clone());
    let variables = match body.get(&["variables", "Variables"]) {
        Some(node) => load_variables(&node)?,
        None => Vec::new(),
    };
    let semiconductor_data = load_semiconductor_data(&body)?;
    let comment = match body.get(&["comment", "Comment"]) {
        Some(node) => load_comment(&node)?,
        None => Vec::new(),
    };

    let model = DeviceModel {
        name,
        manufacturer,
        device_type,
        material: identity.opt_text(&["material", "Material"])?,
        package_type: identity.opt_text(&["package_type", "PackageType"])?,
        author: identity.opt_text(&["author", "Author"])?,
        date: identity.opt_text(&["date", "Date"])?,
        source_file: identity.opt_text(&["source_file", "SourceFile"])?,
        source_path: identity.opt_text(&["source_path", "SourcePath"])?,
        library,
        package,
        variables,
        semiconductor_data,
        comment,
    };
    tracing::debug!(
        device = %model.name,
        facets = ?model.facets(),
        "loaded device document"
    );
    Ok(model)
}

fn load_variables(node: &Node) -> Result<Vec<Variable>> {
    let mut seen = BTreeSet::new();
    let mut variables = Vec::new();
    for item in node.array()? {
        let name_node = item.require(&["name", "Name"])?;
        let name = name_node.text()?;
        if name.trim().is_empty() {
            return Err(name_node.error(ValidationErrorKind::OutOfRange(
                "variable name is empty".into(),
            )));
        }
        if !seen.insert(name.clone()) {
            return Err(name_node.error(ValidationErrorKind::Duplicate(format!(
                "variable {name:?}"
            ))));
        }
        let variable = Variable {
            description: item.opt_text(&["description", "Description"])?,
            default_value: item.opt_number(&["default_value", "DefaultValue"])?,
            min_value: item.opt_number(&["min_value", "MinValue"])?,
            max_value: item.opt_number(&["max_value", "MaxValue"])?,
            name,
        };
        check_variable_range(&item, &variable)?;
        variables.push(variable);
    }
    Ok(variables)
}

fn check_variable_range(node: &Node, v: &Variable) -> Result<()> {
    let out_of_range = |key: &str, detail: String| {
        let at = node.get(&[key]).unwrap_or_else(|| node.clone());
        at.error(ValidationErrorKind::OutOfRange(detail))
    };
    if let (Some(min), Some(max)) = (v.min_value, v.max_value) {
        if min > max {
            return Err(out_of_range(
                "min_value",
                format!("min_value {min} exceeds max_value {max}"),
            ));
        }
    }
    if let Some(default) = v.default_value {
        if v.min_value.is_some_and(|min| default < min) {
            return Err(out_of_range(
                "default_value",
                format!("default_value {default} is below min_value"),
            ));
        }
        if v.max_value.is_some_and(|max| default > max) {
            return Err(out_of_range(
                "default_value",
                format!("default_value {default} is above max_value"),
            ));
        }
    }
    Ok(())
}

fn load_comment(node: &Node) -> Result<Vec<String>> {
    if node.is_array() {
        return node.array()?.iter().map(Node::text).collect();
    }
    Ok(node.text()?.lines().map(str::to_string).collect())
}

fn present<'a>(node: Option<Node<'a>>) -> Option<Node<'a>> {
    node.filter(|n| !n.is_empty_object() && n.value().as_array().map_or(true, |a| !a.is_empty()))
}

fn load_semiconductor_data(body: &Node) -> Result<SemiconductorData> {
    let sem = body.get(&["semiconductor_data", "SemiconductorData"]);
    let mut data = SemiconductorData::default();

    if let Some(sem) = &sem {
        data.kind = sem.opt_text(&["type"])?.filter(|k| !k.is_empty());
        if let Some(node) = present(sem.get(&["turn_on_loss", "TurnOnLoss"])) {
            data.turn_on_loss = Some(load_loss_table(&node)?);
        }
        if let Some(node) = present(sem.get(&["turn_off_loss", "TurnOffLoss"])) {
            data.turn_off_loss = Some(load_loss_table(&node)?);
        }
        if let Some(node) = present(sem.get(&["conduction_loss", "ConductionLoss"])) {
            data.conduction_loss = Some(load_conduction_loss(&node)?);
        }
    }

    let thermal = present(body.get(&["thermal_model", "ThermalModel"])).or_else(|| {
        sem.as_ref()
            .and_then(|s| present(s.get(&["thermal_model", "ThermalModel"])))
    });
    if let Some(node) = thermal {
        data.thermal_model = Some(load_thermal(&node)?);
    }
    Ok(data)
}

fn computation_method(node: &Node) -> Result<ComputationMethod> {
    let Some(method) = node.get(&["computation_method", "ComputationMethod"]) else {
        return Ok(ComputationMethod::default());
    };
    let text = method.text()?;
    ComputationMethod::parse(&text).ok_or_else(|| {
        method.error(ValidationErrorKind::UnknownVariant {
            what: "computation method",
            value: text,
        })
    })
}

fn axis(node: &Node) -> Result<Axis> {
    let values = node.numbers()?;
    Axis::new(values).map_err(|kind| match kind {
        ValidationErrorKind::NotIncreasing { index, .. } => {
            ValidationError::new(format!("{}[{}]", node.path(), index), kind)
        }
        other => node.error(other),
    })
}

fn scale(node: &Node) -> Result<f64> {
    match node.get(&["scale"]) {
        Some(s) => {
            let value = s.number()?;
            if value == 0.0 {
                return Err(s.error(ValidationErrorKind::OutOfRange(
                    "scale must be non-zero".into(),
                )));
            }
            Ok(value)
        }
        None => Ok(1.0),
    }
}

fn load_loss_table(node: &Node) -> Result<LossTable> {
    let computation_method = computation_method(node)?;
    let formula = node.opt_text(&["formula", "Formula"])?;
    let current_axis = axis(&node.require(&["current_axis", "CurrentAxis"])?)?;
    let voltage_axis = axis(&node.require(&["voltage_axis", "VoltageAxis"])?)?;
    let temperature_axis = axis(&node.require(&["temperature_axis", "TemperatureAxis"])?)?;

    let energy = node.require(&["energy", "Energy"])?;
    let scale = scale(&energy)?;
    let data = energy.require(&["data"])?;
    let mut values =
        Vec::with_capacity(temperature_axis.len() * voltage_axis.len() * current_axis.len());
    for per_temperature in rows_by_axis(&data, &temperature_axis, "temperature")? {
        for per_voltage in rows_by_axis(&per_temperature, &voltage_axis, "voltage")? {
            values.extend(aligned_row(&per_voltage, current_axis.len())?);
        }
    }
    let shape = [
        temperature_axis.len(),
        voltage_axis.len(),
        current_axis.len(),
    ];
    let energy_table = EnergyTable::new(scale, shape, values).map_err(|k| energy.error(k))?;
    LossTable::new(
        computation_method,
        formula,
        temperature_axis,
        voltage_axis,
        current_axis,
        energy_table,
    )
    .map_err(|k| node.error(k))
}

/// Children of `node` ordered by `axis`: positionally for arrays, by numeric
/// key for objects. Every axis entry must be present exactly once.
fn rows_by_axis<'a>(node: &Node<'a>, axis: &Axis, name: &'static str) -> Result<Vec<Node<'a>>> {
    if node.is_array() {
        let items = node.array()?;
        if items.len() < axis.len() {
            return Err(node.error(ValidationErrorKind::MissingAxisEntry {
                axis: name,
                value: axis.values()[items.len()],
            }));
        }
        if items.len() > axis.len() {
            return Err(node.error(ValidationErrorKind::LengthMismatch {
                expected: axis.len(),
                found: items.len(),
            }));
        }
        return Ok(items);
    }

    let mut slots: Vec<Option<Node<'a>>> = vec![None; axis.len()];
    for (key, child) in node.entries()? {
        let position = key
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|value| axis.position(value))
            .ok_or_else(|| {
                child.error(ValidationErrorKind::UnknownAxisEntry {
                    axis: name,
                    key: key.to_string(),
                })
            })?;
        if slots[position].is_some() {
            return Err(child.error(ValidationErrorKind::Duplicate(format!(
                "{name} entry {key:?}"
            ))));
        }
        slots[position] = Some(child);
    }
    slots
        .into_iter()
        .zip(axis.iter())
        .map(|(slot, value)| {
            slot.ok_or_else(|| {
                node.error(ValidationErrorKind::MissingAxisEntry { axis: name, value })
            })
        })
        .collect()
}

fn aligned_row(node: &Node, expected: usize) -> Result<Vec<f64>> {
    let values = node.numbers()?;
    if values.len() != expected {
        return Err(node.error(ValidationErrorKind::LengthMismatch {
            expected,
            found: values.len(),
        }));
    }
    Ok(values)
}

fn load_conduction_loss(node: &Node) -> Result<ConductionLoss> {
    let sets = if node.is_array() {
        node.array()?
    } else {
        vec![node.clone()]
    };
    let mut loss = ConductionLoss::default();
    for set_node in sets {
        let set = load_curve_set(&set_node)?;
        loss.insert(set).map_err(|kind| {
            set_node
                .get(&["gate"])
                .unwrap_or_else(|| set_node.clone())
                .error(kind)
        })?;
    }
    Ok(loss)
}

fn load_curve_set(node: &Node) -> Result<ConductionCurveSet> {
    let gate = match node.get(&["gate"]) {
        Some(g) => {
            let text = g.text()?;
            Gate::parse(&text.trim().to_ascii_lowercase())
                .ok_or_else(|| g.error(ValidationErrorKind::InvalidGate(text)))?
        }
        None => Gate::On,
    };
    let computation_method = computation_method(node)?;
    let formula = node.opt_text(&["formula", "Formula"])?;
    let current_axis = axis(&node.require(&["current_axis", "CurrentAxis"])?)?;
    let temperature_axis = axis(&node.require(&["temperature_axis", "TemperatureAxis"])?)?;

    let drop = node.require(&["voltage_drop", "VoltageDrop"])?;
    let scale = scale(&drop)?;
    let data = drop.require(&["data"])?;
    let mut values = Vec::with_capacity(temperature_axis.len() * current_axis.len());
    for per_temperature in rows_by_axis(&data, &temperature_axis, "temperature")? {
        values.extend(aligned_row(&per_temperature, current_axis.len())?);
    }
    let table = CurveTable::new(scale, [temperature_axis.len(), current_axis.len()], values)
        .map_err(|k| drop.error(k))?;
    ConductionCurveSet::new(
        gate,
        computation_method,
        formula,
        temperature_axis,
        current_axis,
        table,
    )
    .map_err(|k| node.error(k))
}

fn load_thermal(node: &Node) -> Result<ThermalNetwork> {
    let topology = match node.get(&["type", "Type"]) {
        Some(t) => {
            let text = t.text()?;
            ThermalTopology::parse(&text).ok_or_else(|| {
                t.error(ValidationErrorKind::UnknownVariant {
                    what: "thermal model type",
                    value: text,
                })
            })?
        }
        None => ThermalTopology::Cauer,
    };
    let elements = node.require(&["rc_elements", "layers"])?;
    let items = elements.array()?;
    if items.is_empty() {
        return Err(elements.error(ValidationErrorKind::OutOfRange(
            "thermal model needs at least one RC element".into(),
        )));
    }
    let mut layers = Vec::with_capacity(items.len());
    for item in &items {
        let r = item.require(&["R", "resistance"])?;
        let resistance = r.number()?;
        if resistance <= 0.0 {
            return Err(r.error(ValidationErrorKind::OutOfRange(format!(
                "thermal resistance must be positive, found {resistance}"
            ))));
        }
        let c = item.require(&["C", "capacitance"])?;
        let capacitance = c.number()?;
        if capacitance < 0.0 {
            return Err(c.error(ValidationErrorKind::OutOfRange(format!(
                "thermal capacitance must not be negative, found {capacitance}"
            ))));
        }
        layers.push(RcLayer {
            resistance,
            capacitance,
        });
    }
    ThermalNetwork::new(topology, layers).map_err(|k| elements.error(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "metadata": {"part_number": "DEV-1", "type": "MOSFET"},
            "package": {}
        })
    }

    #[test]
    fn loads_minimal_document() {
        let model = load(&minimal()).unwrap();
        assert_eq!(model.name, "DEV-1");
        assert_eq!(model.device_type, DeviceType::Mosfet);
        assert_eq!(model.package.partnumber, "DEV-1");
        assert_eq!(model.package.class, "MOSFET");
        assert!(model.facets().is_empty());
    }

    #[test]
    fn name_is_required() {
        let err = load(&json!({"metadata": {"type": "IGBT"}})).unwrap_err();
        assert_eq!(err.path, "metadata.part_number");
        assert_eq!(err.kind, ValidationErrorKind::MissingField);
    }

    #[test]
    fn keyed_rows_follow_axis_order() {
        let doc = json!({"b": {"125": [3, 4], "25": [1, 2]}});
        let data = Node::root(&doc).require(&["b"]).unwrap();
        let axis = Axis::new(vec![25.0, 125.0]).unwrap();
        let rows = rows_by_axis(&data, &axis, "temperature").unwrap();
        assert_eq!(rows[0].path(), "b[\"25\"]");
        assert_eq!(rows[1].value(), &json!([3, 4]));
    }

    #[test]
    fn keyed_rows_report_missing_and_unknown_entries() {
        let axis = Axis::new(vec![25.0, 125.0]).unwrap();

        let doc = json!({"b": {"25": [1]}});
        let data = Node::root(&doc).require(&["b"]).unwrap();
        let err = rows_by_axis(&data, &axis, "temperature").unwrap_err();
        assert_eq!(
            err.kind,
            ValidationErrorKind::MissingAxisEntry {
                axis: "temperature",
                value: 125.0
            }
        );

        let doc = json!({"b": {"25": [1], "125": [2], "150": [3]}});
        let data = Node::root(&doc).require(&["b"]).unwrap();
        let err = rows_by_axis(&data, &axis, "temperature").unwrap_err();
        assert!(matches!(
            err.kind,
            ValidationErrorKind::UnknownAxisEntry { key, .. } if key == "150"
        ));
    }

    #[test]
    fn empty_thermal_object_is_absent() {
        let mut doc = minimal();
        doc["package"]["thermal_model"] = json!({});
        let model = load(&doc).unwrap();
        assert!(model.semiconductor_data.thermal_model.is_none());
    }
}
