//! MAT-file export.

use semidata::mat::{MatArray, MatStruct};
use semidata::prelude::*;
use semidata::{MatValue, OutputFormat};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn export_fixture(name: &str) -> (DeviceModel, semidata::MatFile) {
    let model = SemidataCore::load_file(&fixture_path(name)).unwrap();
    let file = MatExporter::new().export(&model).unwrap();
    (model, file)
}

fn array<'a>(root: &'a MatStruct, path: &str) -> &'a MatArray {
    root.get_path(path)
        .and_then(MatValue::as_array)
        .unwrap_or_else(|| panic!("{path} is not a numeric array"))
}

/// Every dotted path that ends in an empty numeric array.
fn empty_paths(prefix: &str, s: &MatStruct, out: &mut Vec<String>) {
    for (name, value) in s.fields() {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match value {
            MatValue::Struct(inner) => empty_paths(&path, inner, out),
            v if v.is_empty_array() => out.push(path),
            _ => {}
        }
    }
}

#[test]
fn test_root_struct_fields() {
    let (_, file) = export_fixture("sic_mosfet.json");
    assert_eq!(file.name, "SCT_3040KL");
    assert_eq!(
        file.root.field_names(),
        vec![
            "Name",
            "Manufacturer",
            "Type",
            "Material",
            "PackageType",
            "Author",
            "Date",
            "SourceFile",
            "SourcePath",
            "Package",
            "Variables",
            "SemiconductorData",
            "Comment"
        ]
    );
    assert_eq!(
        file.root.get_path("Package.PartNumber").and_then(MatValue::as_str),
        Some("SCT-3040KL")
    );
    assert_eq!(
        file.root.get_path("SemiconductorData.ThermalModel.Type").and_then(MatValue::as_str),
        Some("Cauer")
    );
    let variables = file.root.get("Variables").and_then(MatValue::as_cell).unwrap();
    assert_eq!(variables.len(), 2);
}

#[test]
fn test_energy_mapping_is_total_and_ordered() {
    let (model, file) = export_fixture("sic_mosfet.json");
    let table = model.semiconductor_data.turn_on_loss.as_ref().unwrap();
    let data = array(&file.root, "SemiconductorData.TurnOnLoss.Energy.Data");
    assert_eq!(data.dims(), &[2, 2, 3]);
    let energy = table.energy();
    for t in 0..2 {
        for v in 0..2 {
            for i in 0..3 {
                assert_eq!(data.get(&[t, v, i]), energy.get(t, v, i));
            }
        }
    }
    assert_eq!(
        array(&file.root, "SemiconductorData.TurnOnLoss.VoltageAxis").data(),
        &[400.0, 600.0]
    );
    assert_eq!(
        array(&file.root, "SemiconductorData.TurnOnLoss.Energy.Scale").data(),
        &[1e-6]
    );
}

#[test]
fn test_conduction_gates_and_thermal_arrays() {
    let (_, file) = export_fixture("sic_mosfet.json");
    let on = array(&file.root, "SemiconductorData.ConductionLoss.On.VoltageDrop.Data");
    assert_eq!(on.dims(), &[2, 5]);
    assert_eq!(on.get(&[1, 4]), Some(2.4));
    let off = array(&file.root, "SemiconductorData.ConductionLoss.Off.CurrentAxis");
    assert_eq!(off.data(), &[-40.0, -20.0, 0.0]);

    assert_eq!(
        array(&file.root, "SemiconductorData.ThermalModel.R").data(),
        &[0.1, 0.2]
    );
    let total = array(&file.root, "SemiconductorData.ThermalModel.TotalResistance").data()[0];
    assert!((total - 0.3).abs() < 1e-12);
}

#[test]
fn test_absent_values_are_empty_arrays() {
    let (_, file) = export_fixture("igbt_switching_only.json");
    let mut empty = Vec::new();
    empty_paths("", &file.root, &mut empty);
    for path in [
        "Manufacturer",
        "PackageType",
        "Author",
        "Date",
        "SourceFile",
        "SourcePath",
        "Variables",
        "Comment",
        "SemiconductorData.TurnOffLoss",
        "SemiconductorData.ConductionLoss",
        "SemiconductorData.ThermalModel",
        "SemiconductorData.TurnOnLoss.Formula",
    ] {
        assert!(empty.iter().any(|p| p == path), "{path} should be []");
    }
    let conduction = file.root.get_path("SemiconductorData.ConductionLoss").unwrap();
    assert_eq!(conduction.as_array().map(|a| a.dims().to_vec()), Some(vec![0, 0]));
}

#[test]
fn test_export_is_idempotent() {
    let (model, first) = export_fixture("sic_mosfet.json");
    let second = MatExporter::new().export(&model).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_bytes(), second.to_bytes());
}

#[test]
fn test_mat_file_written_by_core() {
    let out = tempfile::tempdir().unwrap();
    let options = ConvertOptions {
        formats: vec![OutputFormat::Mat],
        ..ConvertOptions::default()
    };
    let result =
        SemidataCore::convert_file(&fixture_path("igbt_switching_only.json"), out.path(), &options)
            .unwrap();
    let target = out.path().join("IKW_40N120.mat");
    assert_eq!(result.outputs, vec![target.clone()]);

    let bytes = std::fs::read(&target).unwrap();
    assert!(bytes.starts_with(b"MATLAB 5.0 MAT-file"));
    assert_eq!(&bytes[126..128], b"IM");
    assert_eq!(bytes.len() % 8, 0);
    assert!(bytes.windows(10).any(|w| w == b"IKW_40N120"));
}
