use serde_json::{json, Map, Value};

use crate::model::{ConductionCurveSet, DeviceModel, LossTable, ThermalNetwork, Variable};

/// Canonical JSON document for a model, in the layout [`super::load`]
/// accepts. Tables are written positionally; absent values are left out.
pub fn to_document(model: &DeviceModel) -> Value {
    let mut metadata = Map::new();
    metadata.insert("part_number".into(), json!(model.name));
    insert_opt(&mut metadata, "manufacturer", &model.manufacturer);
    metadata.insert("type".into(), json!(model.device_type.as_str()));
    insert_opt(&mut metadata, "material", &model.material);
    insert_opt(&mut metadata, "package_type", &model.package_type);
    insert_opt(&mut metadata, "author", &model.author);
    insert_opt(&mut metadata, "date", &model.date);
    insert_opt(&mut metadata, "source_file", &model.source_file);
    insert_opt(&mut metadata, "source_path", &model.source_path);

    let mut package = Map::new();
    package.insert("class".into(), json!(model.package.class));
    package.insert("vendor".into(), json!(model.package.vendor));
    package.insert("partnumber".into(), json!(model.package.partnumber));
    if !model.variables.is_empty() {
        package.insert(
            "variables".into(),
            Value::Array(model.variables.iter().map(variable).collect()),
        );
    }

    let data = &model.semiconductor_data;
    let mut sem = Map::new();
    if let Some(kind) = &data.kind {
        sem.insert("type".into(), json!(kind));
    }
    if let Some(table) = &data.turn_on_loss {
        sem.insert("turn_on_loss".into(), loss_table(table));
    }
    if let Some(table) = &data.turn_off_loss {
        sem.insert("turn_off_loss".into(), loss_table(table));
    }
    if let Some(conduction) = &data.conduction_loss {
        sem.insert(
            "conduction_loss".into(),
            Value::Array(conduction.iter().map(curve_set).collect()),
        );
    }
    if !sem.is_empty() {
        package.insert("semiconductor_data".into(), Value::Object(sem));
    }
    if let Some(network) = &data.thermal_model {
        package.insert("thermal_model".into(), thermal(network));
    }
    if !model.comment.is_empty() {
        package.insert("comment".into(), json!(model.comment));
    }

    let mut root = Map::new();
    root.insert("metadata".into(), Value::Object(metadata));
    let mut library = Map::new();
    insert_opt(&mut library, "xmlns", &model.library.xmlns);
    insert_opt(&mut library, "version", &model.library.version);
    if !library.is_empty() {
        root.insert("library".into(), Value::Object(library));
    }
    root.insert("package".into(), Value::Object(package));
    Value::Object(root)
}

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        map.insert(key.to_string(), json!(v));
    }
}

fn variable(v: &Variable) -> Value {
    let mut map = Map::new();
    map.insert("name".into(), json!(v.name));
    insert_opt(&mut map, "description", &v.description);
    for (key, value) in [
        ("default_value", v.default_value),
        ("min_value", v.min_value),
        ("max_value", v.max_value),
    ] {
        if let Some(x) = value {
            map.insert(key.into(), json!(x));
        }
    }
    Value::Object(map)
}

fn loss_table(table: &LossTable) -> Value {
    let energy = table.energy();
    let [nt, nv, _] = energy.shape();
    let data: Vec<Vec<&[f64]>> = (0..nt)
        .map(|t| (0..nv).map(|v| energy.row(t, v)).collect())
        .collect();
    let mut map = Map::new();
    map.insert(
        "computation_method".into(),
        json!(table.computation_method().as_str()),
    );
    if let Some(formula) = table.formula() {
        map.insert("formula".into(), json!(formula));
    }
    map.insert("current_axis".into(), json!(table.current_axis().values()));
    map.insert("voltage_axis".into(), json!(table.voltage_axis().values()));
    map.insert(
        "temperature_axis".into(),
        json!(table.temperature_axis().values()),
    );
    map.insert(
        "energy".into(),
        json!({ "scale": energy.scale(), "data": data }),
    );
    Value::Object(map)
}

fn curve_set(set: &ConductionCurveSet) -> Value {
    let drop = set.voltage_drop();
    let data: Vec<&[f64]> = (0..drop.shape()[0]).map(|t| drop.row(t)).collect();
    let mut map = Map::new();
    map.insert("gate".into(), json!(set.gate().as_str()));
    map.insert(
        "computation_method".into(),
        json!(set.computation_method().as_str()),
    );
    if let Some(formula) = set.formula() {
        map.insert("formula".into(), json!(formula));
    }
    map.insert("current_axis".into(), json!(set.current_axis().values()));
    map.insert(
        "temperature_axis".into(),
        json!(set.temperature_axis().values()),
    );
    map.insert(
        "voltage_drop".into(),
        json!({ "scale": drop.scale(), "data": data }),
    );
    Value::Object(map)
}

fn thermal(network: &ThermalNetwork) -> Value {
    let elements: Vec<Value> = network
        .layers()
        .iter()
        .map(|l| json!({ "R": l.resistance, "C": l.capacitance }))
        .collect();
    json!({ "type": network.topology().as_str(), "rc_elements": elements })
}
