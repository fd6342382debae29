//! MAT-file Level 5 encoder (little-endian, uncompressed).

use super::{MatArray, MatFile, MatStruct, MatValue};

const HEADER_TEXT: &str = "MATLAB 5.0 MAT-file, written by semidata";
const HEADER_TEXT_LEN: usize = 116;
const VERSION: u16 = 0x0100;

const MI_INT8: u32 = 1;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;

const MX_CELL_CLASS: u32 = 1;
const MX_STRUCT_CLASS: u32 = 2;
const MX_CHAR_CLASS: u32 = 4;
const MX_DOUBLE_CLASS: u32 = 6;

/// Minimum field-name slot width, the value MATLAB itself writes.
const FIELD_NAME_SLOT: usize = 32;

/// Encode `file` as one top-level struct variable. The header carries no
/// timestamp, so identical input gives identical bytes.
pub fn write_mat(file: &MatFile) -> Vec<u8> {
    let mut out = Vec::with_capacity(4096);
    let mut text = HEADER_TEXT.as_bytes().to_vec();
    text.resize(HEADER_TEXT_LEN, b' ');
    out.extend_from_slice(&text);
    out.extend_from_slice(&[0u8; 8]); // subsystem data offset
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(b"IM");

    let body = struct_matrix(&file.name, &file.root);
    out.extend_from_slice(&element(MI_MATRIX, &body));
    out
}

/// Tagged data element, padded to an 8-byte boundary.
fn element(data_type: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len() + 7);
    out.extend_from_slice(&data_type.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    while out.len() % 8 != 0 {
        out.push(0);
    }
    out
}

fn header(class: u32, dims: &[usize], name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut flags = Vec::with_capacity(8);
    flags.extend_from_slice(&class.to_le_bytes());
    flags.extend_from_slice(&0u32.to_le_bytes());
    out.extend(element(MI_UINT32, &flags));

    let dims: Vec<u8> = dims
        .iter()
        .flat_map(|d| (*d as i32).to_le_bytes())
        .collect();
    out.extend(element(MI_INT32, &dims));
    out.extend(element(MI_INT8, name.as_bytes()));
    out
}

fn value_matrix(name: &str, value: &MatValue) -> Vec<u8> {
    match value {
        MatValue::Numeric(array) => double_matrix(name, array),
        MatValue::Char(text) => char_matrix(name, text),
        MatValue::Struct(s) => struct_matrix(name, s),
        MatValue::Cell(items) => cell_matrix(name, items),
    }
}

fn double_matrix(name: &str, array: &MatArray) -> Vec<u8> {
    let mut out = header(MX_DOUBLE_CLASS, array.dims(), name);
    let data: Vec<u8> = array.data().iter().flat_map(|v| v.to_le_bytes()).collect();
    out.extend(element(MI_DOUBLE, &data));
    out
}

fn char_matrix(name: &str, text: &str) -> Vec<u8> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let dims = if units.is_empty() {
        [0, 0]
    } else {
        [1, units.len()]
    };
    let mut out = header(MX_CHAR_CLASS, &dims, name);
    let data: Vec<u8> = units.iter().flat_map(|u| u.to_le_bytes()).collect();
    out.extend(element(MI_UINT16, &data));
    out
}

fn struct_matrix(name: &str, s: &MatStruct) -> Vec<u8> {
    let mut out = header(MX_STRUCT_CLASS, &[1, 1], name);
    let slot = s
        .fields()
        .iter()
        .map(|(n, _)| n.len() + 1)
        .max()
        .unwrap_or(0)
        .max(FIELD_NAME_SLOT);
    out.extend(element(MI_INT32, &(slot as i32).to_le_bytes()));

    let mut names = Vec::with_capacity(slot * s.fields().len());
    for (field, _) in s.fields() {
        let mut padded = field.as_bytes().to_vec();
        padded.resize(slot, 0);
        names.extend(padded);
    }
    out.extend(element(MI_INT8, &names));

    for (_, value) in s.fields() {
        out.extend(element(MI_MATRIX, &value_matrix("", value)));
    }
    out
}

fn cell_matrix(name: &str, items: &[MatValue]) -> Vec<u8> {
    let dims = if items.is_empty() {
        [0, 0]
    } else {
        [1, items.len()]
    };
    let mut out = header(MX_CELL_CLASS, &dims, name);
    for item in items {
        out.extend(element(MI_MATRIX, &value_matrix("", item)));
    }
    out
}
