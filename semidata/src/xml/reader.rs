use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{json, Map, Value};

use crate::error::XmlImportError;
use crate::loader;
use crate::model::DeviceModel;

/// Parse a PLECS `SemiconductorLibrary` document into a [`DeviceModel`].
///
/// The document is first mapped onto the canonical JSON layout, then run
/// through [`loader::load`], so imported models satisfy the same invariants
/// as loaded ones.
pub fn import_xml(xml: &str) -> Result<DeviceModel, XmlImportError> {
    let document = xml_to_document(xml)?;
    Ok(loader::load(&document)?)
}

/// PLECS XML -> canonical JSON document, without validation.
pub fn xml_to_document(xml: &str) -> Result<Value, XmlImportError> {
    let root = parse_tree(xml)?;
    if root.name != "SemiconductorLibrary" {
        return Err(XmlImportError::Structure(format!(
            "root element is <{}>, expected <SemiconductorLibrary>",
            root.name
        )));
    }
    let packages: Vec<&Element> = root.children_named("Package").collect();
    let package = match packages.as_slice() {
        [one] => *one,
        [] => return Err(XmlImportError::Structure("no <Package> element".into())),
        many => {
            return Err(XmlImportError::Structure(format!(
                "expected one <Package>, found {}",
                many.len()
            )))
        }
    };

    let mut metadata = Map::new();
    put_attr(&mut metadata, "part_number", package, "partnumber");
    put_attr(&mut metadata, "manufacturer", package, "vendor");
    put_attr(&mut metadata, "type", package, "class");

    let mut library = Map::new();
    put_attr(&mut library, "xmlns", &root, "xmlns");
    put_attr(&mut library, "version", &root, "version");

    let mut pkg = Map::new();
    put_attr(&mut pkg, "class", package, "class");
    put_attr(&mut pkg, "vendor", package, "vendor");
    put_attr(&mut pkg, "partnumber", package, "partnumber");

    if let Some(variables) = package.child("Variables") {
        let items: Vec<Value> = variables.children_named("Variable").map(variable).collect();
        pkg.insert("variables".into(), Value::Array(items));
    }

    let sem_element = package.child("SemiconductorData");
    if let Some(sem_element) = sem_element {
        let mut sem = Map::new();
        put_attr(&mut sem, "type", sem_element, "type");
        if let Some(e) = sem_element.child("TurnOnLoss") {
            sem.insert("turn_on_loss".into(), loss_table(e));
        }
        if let Some(e) = sem_element.child("TurnOffLoss") {
            sem.insert("turn_off_loss".into(), loss_table(e));
        }
        let conduction: Vec<Value> = sem_element
            .children_named("ConductionLoss")
            .map(curve_set)
            .collect();
        if !conduction.is_empty() {
            sem.insert("conduction_loss".into(), Value::Array(conduction));
        }
        pkg.insert("semiconductor_data".into(), Value::Object(sem));
    }

    let thermal = package
        .child("ThermalModel")
        .or_else(|| sem_element.and_then(|s| s.child("ThermalModel")));
    if let Some(thermal) = thermal {
        pkg.insert("thermal_model".into(), thermal_model(thermal)?);
    }

    if let Some(comment) = package.child("Comment") {
        let lines: Vec<Value> = comment
            .children_named("Line")
            .map(|l| json!(l.text))
            .collect();
        pkg.insert("comment".into(), Value::Array(lines));
    }

    let mut document = Map::new();
    document.insert("metadata".into(), Value::Object(metadata));
    if !library.is_empty() {
        document.insert("library".into(), Value::Object(library));
    }
    document.insert("package".into(), Value::Object(pkg));
    Ok(Value::Object(document))
}

fn variable(element: &Element) -> Value {
    let mut map = Map::new();
    for (key, child) in [
        ("name", "Name"),
        ("description", "Description"),
        ("default_value", "DefaultValue"),
        ("min_value", "MinValue"),
        ("max_value", "MaxValue"),
    ] {
        if let Some(e) = element.child(child) {
            if key == "name" || !e.text.is_empty() {
                map.insert(key.into(), json!(e.text));
            }
        }
    }
    Value::Object(map)
}

fn put_text(map: &mut Map<String, Value>, key: &str, element: &Element, child: &str) {
    if let Some(e) = element.child(child) {
        map.insert(key.into(), json!(e.text));
    }
}

fn put_attr(map: &mut Map<String, Value>, key: &str, element: &Element, attr: &str) {
    if let Some(value) = element.attr(attr) {
        map.insert(key.into(), json!(value));
    }
}

fn loss_table(element: &Element) -> Value {
    let mut map = Map::new();
    put_text(&mut map, "computation_method", element, "ComputationMethod");
    put_text(&mut map, "formula", element, "Formula");
    put_text(&mut map, "current_axis", element, "CurrentAxis");
    put_text(&mut map, "voltage_axis", element, "VoltageAxis");
    put_text(&mut map, "temperature_axis", element, "TemperatureAxis");
    if let Some(energy) = element.child("Energy") {
        let data: Vec<Value> = energy
            .children_named("Temperature")
            .map(|t| {
                Value::Array(
                    t.children_named("Voltage")
                        .map(|v| json!(v.text))
                        .collect(),
                )
            })
            .collect();
        let mut e = Map::new();
        put_attr(&mut e, "scale", energy, "scale");
        e.insert("data".into(), Value::Array(data));
        map.insert("energy".into(), Value::Object(e));
    }
    Value::Object(map)
}

fn curve_set(element: &Element) -> Value {
    let mut map = Map::new();
    put_attr(&mut map, "gate", element, "gate");
    put_text(&mut map, "computation_method", element, "ComputationMethod");
    put_text(&mut map, "formula", element, "Formula");
    put_text(&mut map, "current_axis", element, "CurrentAxis");
    put_text(&mut map, "temperature_axis", element, "TemperatureAxis");
    if let Some(drop) = element.child("VoltageDrop") {
        let data: Vec<Value> = drop
            .children_named("Temperature")
            .map(|t| json!(t.text))
            .collect();
        let mut d = Map::new();
        put_attr(&mut d, "scale", drop, "scale");
        d.insert("data".into(), Value::Array(data));
        map.insert("voltage_drop".into(), Value::Object(d));
    }
    Value::Object(map)
}

fn thermal_model(element: &Element) -> Result<Value, XmlImportError> {
    let branches: Vec<&Element> = element.children_named("Branch").collect();
    let branch = match branches.as_slice() {
        [one] => *one,
        [] => return Ok(json!({})),
        many => {
            return Err(XmlImportError::Structure(format!(
                "expected one thermal <Branch>, found {}",
                many.len()
            )))
        }
    };
    let elements: Vec<Value> = branch
        .children_named("RCElement")
        .map(|rc| {
            let mut m = Map::new();
            put_attr(&mut m, "R", rc, "R");
            put_attr(&mut m, "C", rc, "C");
            Value::Object(m)
        })
        .collect();
    let mut map = Map::new();
    put_attr(&mut map, "type", branch, "type");
    map.insert("rc_elements".into(), Value::Array(elements));
    Ok(Value::Object(map))
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s Element> + 's {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn open_element(start: &BytesStart<'_>) -> Result<Element, XmlImportError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlImportError::Syntax(e.to_string()))?;
        let key = if attr.key.as_ref() == b"xmlns" {
            "xmlns".to_string()
        } else {
            String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned()
        };
        let value = attr
            .unescape_value()
            .map_err(|e| XmlImportError::Syntax(e.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(Element {
        name,
        attrs,
        ..Element::default()
    })
}

/// Element tree with namespace prefixes stripped and text trimmed.
fn parse_tree(xml: &str) -> Result<Element, XmlImportError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            XmlImportError::Syntax(format!("at byte {}: {e}", reader.buffer_position()))
        })?;
        match event {
            Event::Start(start) => stack.push(open_element(&start)?),
            Event::Empty(start) => {
                let element = open_element(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    XmlImportError::Syntax("unbalanced closing tag".into())
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| XmlImportError::Syntax(e.to_string()))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlImportError::Syntax("document ended inside an element".into()));
    }
    root.ok_or_else(|| XmlImportError::Structure("document has no root element".into()))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlImportError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(XmlImportError::Syntax(
                "more than one root element".into(),
            ))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_namespace_prefixes() {
        let xml = r#"<p:SemiconductorLibrary xmlns:p="urn:x" version="1.4">
            <p:Package class="Diode" vendor="Acme" partnumber="D1"/>
        </p:SemiconductorLibrary>"#;
        let doc = xml_to_document(xml).unwrap();
        assert_eq!(doc["metadata"]["part_number"], "D1");
        assert_eq!(doc["metadata"]["manufacturer"], "Acme");
        assert_eq!(doc["library"]["version"], "1.4");
    }

    #[test]
    fn rejects_foreign_root() {
        let err = xml_to_document("<Library/>").unwrap_err();
        assert!(matches!(err, XmlImportError::Structure(_)));
    }

    #[test]
    fn reports_malformed_xml() {
        let err = xml_to_document("<SemiconductorLibrary><Package></SemiconductorLibrary>")
            .unwrap_err();
        assert!(matches!(err, XmlImportError::Syntax(_)));
    }
}
