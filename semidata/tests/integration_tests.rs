//! End-to-end conversion through `SemidataCore`.

use semidata::prelude::*;
use semidata::{OutputFormat, RenderContext};
use std::path::{Path, PathBuf};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fast_options() -> ConvertOptions {
    ConvertOptions {
        render: RenderContext::new(3.0, 2.0, 40),
        ..ConvertOptions::default()
    }
}

fn copy_fixtures(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::copy(fixture_path(name), dir.join(name)).unwrap();
    }
}

#[test]
fn test_convert_single_file() {
    let out = tempfile::tempdir().unwrap();
    let result =
        SemidataCore::convert_file(&fixture_path("sic_mosfet.json"), out.path(), &fast_options())
            .unwrap();

    assert_eq!(result.device, "SCT-3040KL");
    assert_eq!(result.figures, FigureKind::ALL.to_vec());
    assert_eq!(result.outputs.len(), 6);
    assert!(out.path().join("SCT_3040KL.xml").is_file());
    assert!(out.path().join("SCT_3040KL.mat").is_file());
    for kind in FigureKind::ALL {
        let png = out
            .path()
            .join("figures")
            .join("SCT_3040KL")
            .join(format!("{}.png", kind.file_stem()));
        assert!(png.is_file(), "missing {}", png.display());
    }

    let xml = std::fs::read_to_string(out.path().join("SCT_3040KL.xml")).unwrap();
    let reimported = semidata::import_xml(&xml).unwrap();
    assert_eq!(reimported.name, "SCT-3040KL");
}

#[test]
fn test_convert_selected_formats() {
    let out = tempfile::tempdir().unwrap();
    let options = ConvertOptions {
        formats: vec![OutputFormat::Xml],
        ..fast_options()
    };
    let result = SemidataCore::convert_file(
        &fixture_path("igbt_switching_only.json"),
        out.path(),
        &options,
    )
    .unwrap();
    assert_eq!(result.outputs, vec![out.path().join("IKW_40N120.xml")]);
    assert!(result.figures.is_empty());
    assert!(!out.path().join("figures").exists());
}

#[test]
fn test_batch_continues_past_failures() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    copy_fixtures(
        input.path(),
        &["sic_mosfet.json", "igbt_switching_only.json", "unsorted_axis.json"],
    );
    std::fs::write(input.path().join("broken.json"), "{ not json").unwrap();

    let report = SemidataCore::convert_path(input.path(), out.path(), &fast_options()).unwrap();
    assert_eq!(report.total(), 4);
    assert_eq!(report.converted.len(), 2);
    assert!(!report.is_success());

    let failed: Vec<String> = report
        .failed
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(failed, vec!["broken.json", "unsorted_axis.json"]);
    assert!(report.failed[1].error.contains("current_axis[2]"));
}

#[test]
fn test_survey_database() {
    let input = tempfile::tempdir().unwrap();
    copy_fixtures(
        input.path(),
        &["sic_mosfet.json", "igbt_switching_only.json", "bad_gate.json"],
    );

    let report = SemidataCore::survey(input.path()).unwrap();
    assert_eq!(report.files, 3);
    assert_eq!(report.devices, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.by_type.get("IGBT"), Some(&1));
    assert_eq!(report.by_type.get("MOSFET with Diode"), Some(&1));
    assert_eq!(report.by_material.get("SiC"), Some(&1));
    assert_eq!(report.by_manufacturer.get("unknown"), Some(&1));
    assert_eq!(report.facet_coverage.get("TurnOnLoss"), Some(&2));
    assert_eq!(report.facet_coverage.get("ThermalModel"), Some(&1));
}

#[test]
fn test_import_xml_file_to_document() {
    let document = SemidataCore::import_xml_file(&fixture_path("plecs_diode.xml")).unwrap();
    assert_eq!(document["metadata"]["part_number"], "DSEI-60");
    let model = semidata::load(&document).unwrap();
    assert_eq!(model.facets().len(), 3);
}

#[test]
fn test_check_file_summary() {
    let summary = SemidataCore::check_file(&fixture_path("sic_mosfet.json")).unwrap();
    assert_eq!(summary.device_type, "MOSFET with Diode");
    assert_eq!(summary.variables, 2);
    assert_eq!(summary.facets.len(), 4);
    let total = summary.total_thermal_resistance.unwrap();
    assert!((total - 0.3).abs() < 1e-12);
}

#[test]
fn test_load_str_reports_json_errors() {
    assert!(matches!(
        semidata::load_str("[1, 2"),
        Err(SemidataError::Json(_))
    ));
    assert!(matches!(
        semidata::load_str(r#"{"metadata": {"part_number": "X"}}"#),
        Err(SemidataError::Validation(_))
    ));
}
