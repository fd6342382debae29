//! MATLAB-loadable export.
//!
//! [`MatExporter`] maps a [`DeviceModel`] onto a tree of [`MatValue`]s that
//! mirrors the model's containment hierarchy; [`write_mat`] encodes that
//! tree as a MAT-file (Level 5). `MatValue` has no null variant: anything
//! absent in the model becomes a 0x0 double array.

mod writer;

use crate::error::{ExportError, Facet};
use crate::model::{ConductionCurveSet, DeviceModel, Gate, LossTable, ThermalNetwork, Variable};

pub use writer::write_mat;

/// MATLAB's limit on variable and field name length.
pub const MAX_NAME_LEN: usize = 63;

/// Real double array. `data` is column-major, as MATLAB stores it.
#[derive(Debug, Clone, PartialEq)]
pub struct MatArray {
    dims: Vec<usize>,
    data: Vec<f64>,
}

impl MatArray {
    /// 0x0 double, MATLAB's `[]`.
    pub fn empty() -> Self {
        Self {
            dims: vec![0, 0],
            data: Vec::new(),
        }
    }

    pub fn scalar(value: f64) -> Self {
        Self {
            dims: vec![1, 1],
            data: vec![value],
        }
    }

    /// 1xN row vector.
    pub fn row(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::empty();
        }
        Self {
            dims: vec![1, values.len()],
            data: values.to_vec(),
        }
    }

    /// Build from values stored in row-major (last index fastest) order.
    pub fn from_row_major(dims: &[usize], values: &[f64]) -> Option<Self> {
        let count: usize = dims.iter().product();
        if values.len() != count {
            return None;
        }
        let mut data = vec![0.0; count];
        let mut index = vec![0usize; dims.len()];
        for value in values {
            data[column_major_offset(dims, &index)] = *value;
            // odometer, last index fastest
            for axis in (0..dims.len()).rev() {
                index[axis] += 1;
                if index[axis] < dims[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
        let mut dims = dims.to_vec();
        while dims.len() < 2 {
            dims.push(1);
        }
        Some(Self { dims, data })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element at a zero-based subscript, MATLAB `A(i+1, j+1, ...)`.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.dims.len() || index.iter().zip(&self.dims).any(|(i, d)| i >= d) {
            return None;
        }
        self.data.get(column_major_offset(&self.dims, index)).copied()
    }
}

fn column_major_offset(dims: &[usize], index: &[usize]) -> usize {
    let mut offset = 0;
    let mut stride = 1;
    for (i, d) in index.iter().zip(dims) {
        offset += i * stride;
        stride *= d;
    }
    offset
}

/// Value stored in a MAT struct field or cell.
#[derive(Debug, Clone, PartialEq)]
pub enum MatValue {
    Numeric(MatArray),
    Char(String),
    Struct(MatStruct),
    Cell(Vec<MatValue>),
}

impl MatValue {
    pub fn empty() -> Self {
        MatValue::Numeric(MatArray::empty())
    }

    pub fn text(value: &str) -> Self {
        MatValue::Char(value.to_string())
    }

    /// Present strings as char arrays, absent ones as `[]`.
    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or_else(Self::empty, Self::text)
    }

    pub fn opt_scalar(value: Option<f64>) -> Self {
        value.map_or_else(Self::empty, |v| MatValue::Numeric(MatArray::scalar(v)))
    }

    /// True for a numeric array with no elements.
    pub fn is_empty_array(&self) -> bool {
        matches!(self, MatValue::Numeric(a) if a.is_empty())
    }

    pub fn as_array(&self) -> Option<&MatArray> {
        match self {
            MatValue::Numeric(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&MatStruct> {
        match self {
            MatValue::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MatValue::Char(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_cell(&self) -> Option<&[MatValue]> {
        match self {
            MatValue::Cell(items) => Some(items),
            _ => None,
        }
    }
}

/// 1x1 struct with ordered fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatStruct {
    fields: Vec<(String, MatValue)>,
}

impl MatStruct {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: MatValue) -> Self {
        self.fields.push((name.to_string(), value));
        self
    }

    pub fn fields(&self) -> &[(String, MatValue)] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&MatValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Dotted-path lookup, e.g. `SemiconductorData.TurnOnLoss.Energy.Data`.
    pub fn get_path(&self, path: &str) -> Option<&MatValue> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next()?)?;
        for part in parts {
            current = current.as_struct()?.get(part)?;
        }
        Some(current)
    }
}

/// One MAT-file: a single top-level struct variable.
#[derive(Debug, Clone, PartialEq)]
pub struct MatFile {
    pub name: String,
    pub root: MatStruct,
}

impl MatFile {
    pub fn to_bytes(&self) -> Vec<u8> {
        write_mat(self)
    }
}

/// MATLAB identifier derived from a part number: `-` and anything else
/// outside `[A-Za-z0-9_]` becomes `_`, a leading non-letter gets an `x`
/// prefix, and the result is cut to [`MAX_NAME_LEN`].
pub fn mat_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if !ident.starts_with(|c: char| c.is_ascii_alphabetic()) {
        ident.insert(0, 'x');
    }
    ident.truncate(MAX_NAME_LEN);
    ident
}

/// Maps a [`DeviceModel`] onto a nested MAT struct named after the device.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatExporter;

impl MatExporter {
    pub fn new() -> Self {
        Self
    }

    pub fn export(&self, model: &DeviceModel) -> Result<MatFile, ExportError> {
        let data = &model.semiconductor_data;

        let package = MatStruct::new()
            .with("Class", MatValue::text(&model.package.class))
            .with("Vendor", MatValue::text(&model.package.vendor))
            .with("PartNumber", MatValue::text(&model.package.partnumber));

        let variables = if model.variables.is_empty() {
            MatValue::empty()
        } else {
            MatValue::Cell(model.variables.iter().map(variable).collect())
        };

        let turn_on = data
            .turn_on_loss
            .as_ref()
            .map(|t| loss_table(Facet::TurnOnLoss, t))
            .transpose()?;
        let turn_off = data
            .turn_off_loss
            .as_ref()
            .map(|t| loss_table(Facet::TurnOffLoss, t))
            .transpose()?;
        let conduction = match &data.conduction_loss {
            Some(loss) => {
                let mut gates = MatStruct::new();
                for (field, gate) in [("On", Gate::On), ("Off", Gate::Off)] {
                    let value = match loss.get(gate) {
                        Some(set) => curve_set(set)?,
                        None => MatValue::empty(),
                    };
                    gates = gates.with(field, value);
                }
                MatValue::Struct(gates)
            }
            None => MatValue::empty(),
        };
        let thermal = data
            .thermal_model
            .as_ref()
            .map_or_else(MatValue::empty, thermal_network);

        let semiconductor = MatStruct::new()
            .with("Type", MatValue::text(model.semiconductor_kind()))
            .with("TurnOnLoss", turn_on.unwrap_or_else(MatValue::empty))
            .with("TurnOffLoss", turn_off.unwrap_or_else(MatValue::empty))
            .with("ConductionLoss", conduction)
            .with("ThermalModel", thermal);

        let comment = if model.comment.is_empty() {
            MatValue::empty()
        } else {
            MatValue::Cell(model.comment.iter().map(|l| MatValue::text(l)).collect())
        };

        let root = MatStruct::new()
            .with("Name", MatValue::text(&model.name))
            .with("Manufacturer", MatValue::opt_text(model.manufacturer.as_deref()))
            .with("Type", MatValue::text(model.device_type.as_str()))
            .with("Material", MatValue::opt_text(model.material.as_deref()))
            .with("PackageType", MatValue::opt_text(model.package_type.as_deref()))
            .with("Author", MatValue::opt_text(model.author.as_deref()))
            .with("Date", MatValue::opt_text(model.date.as_deref()))
            .with("SourceFile", MatValue::opt_text(model.source_file.as_deref()))
            .with("SourcePath", MatValue::opt_text(model.source_path.as_deref()))
            .with("Package", MatValue::Struct(package))
            .with("Variables", variables)
            .with("SemiconductorData", MatValue::Struct(semiconductor))
            .with("Comment", comment);

        tracing::debug!(device = %model.name, "exported MAT structure");
        Ok(MatFile {
            name: mat_identifier(&model.safe_name()),
            root,
        })
    }
}

fn variable(v: &Variable) -> MatValue {
    MatValue::Struct(
        MatStruct::new()
            .with("Name", MatValue::text(&v.name))
            .with("Description", MatValue::opt_text(v.description.as_deref()))
            .with("DefaultValue", MatValue::opt_scalar(v.default_value))
            .with("MinValue", MatValue::opt_scalar(v.min_value))
            .with("MaxValue", MatValue::opt_scalar(v.max_value)),
    )
}

fn loss_table(facet: Facet, table: &LossTable) -> Result<MatValue, ExportError> {
    let energy = table.energy();
    let dims = [
        table.temperature_axis().len(),
        table.voltage_axis().len(),
        table.current_axis().len(),
    ];
    let data = MatArray::from_row_major(&dims, energy.values())
        .filter(|_| energy.shape() == dims)
        .ok_or_else(|| ExportError::Misaligned {
            facet,
            detail: format!(
                "energy table shape {:?} ({} values) does not match axes {:?}",
                energy.shape(),
                energy.values().len(),
                dims
            ),
        })?;
    Ok(MatValue::Struct(
        MatStruct::new()
            .with("ComputationMethod", MatValue::text(table.computation_method().as_str()))
            .with("Formula", MatValue::opt_text(table.formula()))
            .with("TemperatureAxis", MatValue::Numeric(MatArray::row(table.temperature_axis().values())))
            .with("VoltageAxis", MatValue::Numeric(MatArray::row(table.voltage_axis().values())))
            .with("CurrentAxis", MatValue::Numeric(MatArray::row(table.current_axis().values())))
            .with(
                "Energy",
                MatValue::Struct(
                    MatStruct::new()
                        .with("Scale", MatValue::Numeric(MatArray::scalar(energy.scale())))
                        .with("Data", MatValue::Numeric(data)),
                ),
            ),
    ))
}

fn curve_set(set: &ConductionCurveSet) -> Result<MatValue, ExportError> {
    let drop = set.voltage_drop();
    let dims = [set.temperature_axis().len(), set.current_axis().len()];
    let data = MatArray::from_row_major(&dims, drop.values())
        .filter(|_| drop.shape() == dims)
        .ok_or_else(|| ExportError::Misaligned {
            facet: Facet::ConductionLoss,
            detail: format!(
                "gate {} voltage-drop shape {:?} does not match axes {:?}",
                set.gate(),
                drop.shape(),
                dims
            ),
        })?;
    Ok(MatValue::Struct(
        MatStruct::new()
            .with("Gate", MatValue::text(set.gate().as_str()))
            .with("ComputationMethod", MatValue::text(set.computation_method().as_str()))
            .with("Formula", MatValue::opt_text(set.formula()))
            .with("TemperatureAxis", MatValue::Numeric(MatArray::row(set.temperature_axis().values())))
            .with("CurrentAxis", MatValue::Numeric(MatArray::row(set.current_axis().values())))
            .with(
                "VoltageDrop",
                MatValue::Struct(
                    MatStruct::new()
                        .with("Scale", MatValue::Numeric(MatArray::scalar(drop.scale())))
                        .with("Data", MatValue::Numeric(data)),
                ),
            ),
    ))
}

fn thermal_network(network: &ThermalNetwork) -> MatValue {
    let r: Vec<f64> = network.layers().iter().map(|l| l.resistance).collect();
    let c: Vec<f64> = network.layers().iter().map(|l| l.capacitance).collect();
    MatValue::Struct(
        MatStruct::new()
            .with("Type", MatValue::text(network.topology().as_str()))
            .with("R", MatValue::Numeric(MatArray::row(&r)))
            .with("C", MatValue::Numeric(MatArray::row(&c)))
            .with("TotalResistance", MatValue::Numeric(MatArray::scalar(network.total_resistance()))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_input_is_stored_column_major() {
        let values: Vec<f64> = (0..6).map(f64::from).collect();
        let a = MatArray::from_row_major(&[2, 3], &values).unwrap();
        assert_eq!(a.dims(), &[2, 3]);
        assert_eq!(a.data(), &[0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
        assert_eq!(a.get(&[1, 2]), Some(5.0));
        assert_eq!(a.get(&[2, 0]), None);
    }

    #[test]
    fn three_dimensional_indexing_matches_source() {
        let values: Vec<f64> = (0..24).map(f64::from).collect();
        let a = MatArray::from_row_major(&[2, 3, 4], &values).unwrap();
        for t in 0..2 {
            for v in 0..3 {
                for i in 0..4 {
                    assert_eq!(a.get(&[t, v, i]), Some(((t * 3 + v) * 4 + i) as f64));
                }
            }
        }
    }

    #[test]
    fn identifiers_are_matlab_safe() {
        assert_eq!(mat_identifier("IKW40N120H3"), "IKW40N120H3");
        assert_eq!(mat_identifier("C3M0016120K-D"), "C3M0016120K_D");
        assert_eq!(mat_identifier("2N 7002"), "x2N_7002");
        assert_eq!(mat_identifier(&"A".repeat(80)).len(), MAX_NAME_LEN);
    }

    #[test]
    fn dotted_paths_reach_nested_fields() {
        let s = MatStruct::new().with(
            "A",
            MatValue::Struct(MatStruct::new().with("B", MatValue::text("x"))),
        );
        assert_eq!(s.get_path("A.B").and_then(MatValue::as_str), Some("x"));
        assert!(s.get_path("A.C").is_none());
    }
}
