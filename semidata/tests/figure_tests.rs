//! Figure derivation and rendering.

use approx::assert_relative_eq;
use semidata::figures::{AxisScale, Marker};
use semidata::prelude::*;
use semidata::FigureError;
use std::io::Cursor;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_fixture(name: &str) -> DeviceModel {
    SemidataCore::load_file(&fixture_path(name)).unwrap()
}

fn small() -> FigureGenerator {
    FigureGenerator::new(RenderContext::new(4.0, 3.0, 50))
}

fn decode(png: &[u8]) -> png::Info<'static> {
    let decoder = png::Decoder::new(Cursor::new(png.to_vec()));
    let reader = decoder.read_info().unwrap();
    reader.info().clone()
}

fn itxt(info: &png::Info<'_>, keyword: &str) -> Option<String> {
    info.utf8_text
        .iter()
        .find(|c| c.keyword == keyword)
        .map(|c| c.get_text().unwrap())
}

#[test]
fn test_thermal_omitted_without_model() {
    let figures = small().generate(&load_fixture("igbt_switching_only.json")).unwrap();
    let kinds: Vec<FigureKind> = figures.keys().copied().collect();
    assert_eq!(kinds, vec![FigureKind::TurnOnLoss]);
}

#[test]
fn test_all_figures_for_full_device() {
    let figures = small().generate(&load_fixture("sic_mosfet.json")).unwrap();
    assert_eq!(figures.len(), 4);
    let thermal = &figures[&FigureKind::Thermal];
    assert!(!thermal.png.is_empty());
    assert_eq!(thermal.file_name(), "thermal.png");
    assert_eq!((thermal.width_px, thermal.height_px), (200, 150));
    assert!(thermal.png.starts_with(&[0x89, b'P', b'N', b'G']));
}

#[test]
fn test_png_metadata() {
    let generator = small();
    let figure = generator
        .generate_kind(&load_fixture("sic_mosfet.json"), FigureKind::Thermal)
        .unwrap();
    let info = decode(&figure.png);
    assert_eq!((info.width, info.height), (200, 150));
    let dims = info.pixel_dims.unwrap();
    assert_eq!(dims.xppu, generator.context().pixels_per_meter());
    assert_eq!(dims.unit, png::Unit::Meter);

    assert_eq!(
        itxt(&info, "Title").as_deref(),
        Some("Thermal Model - SCT-3040KL")
    );
    assert_eq!(itxt(&info, "XLabel").as_deref(), Some("Time (ms)"));
    let annotation = itxt(&info, "Annotation").unwrap();
    assert!(annotation.starts_with("Total R_th = 0.3000 K/W"), "{annotation}");
}

#[test]
fn test_total_resistance_annotation() {
    let figure = small()
        .generate_kind(&load_fixture("sic_mosfet.json"), FigureKind::Thermal)
        .unwrap();
    assert!(figure.annotations()[0].contains("0.3"));
    assert_eq!(figure.annotations().len(), 3);
    let ladder = figure.plan.ladder.as_ref().unwrap();
    assert_eq!(ladder.layers.len(), 2);
    assert_eq!(ladder.layers[0].resistance, 0.1);
}

#[test]
fn test_rendering_is_deterministic() {
    let model = load_fixture("sic_mosfet.json");
    let first = small().generate(&model).unwrap();
    let second = small().generate(&model).unwrap();
    for (kind, figure) in &first {
        assert_eq!(figure.png, second[kind].png, "{kind} differs between runs");
    }
}

#[test]
fn test_generate_kind_requires_facet() {
    let model = load_fixture("igbt_switching_only.json");
    match small().generate_kind(&model, FigureKind::Thermal) {
        Err(FigureError::Unsupported(e)) => assert_eq!(e.facet, Facet::ThermalModel),
        other => panic!("expected unsupported facet, got {other:?}"),
    }
}

#[test]
fn test_loss_plan_series() {
    let model = load_fixture("sic_mosfet.json");
    let generator = small();

    let on = generator.plan(FigureKind::TurnOnLoss, &model).unwrap();
    assert_eq!(on.panel.series.len(), 4);
    assert_eq!(on.panel.y.label, "Turn-On Energy (mJ)");
    let last = on.panel.series[3].points[2];
    assert_eq!(last.0, 20.0);
    assert_relative_eq!(last.1, 0.44, max_relative = 1e-9);
    assert_ne!(on.panel.series[0].style.marker, on.panel.series[1].style.marker);
    assert_eq!(on.panel.series[0].style.color, on.panel.series[1].style.color);
    assert!(on.annotations.iter().any(|a| a.contains("Rgon")));

    // the 0 V column is dropped when a positive voltage exists
    let off = generator.plan(FigureKind::TurnOffLoss, &model).unwrap();
    assert_eq!(off.legend(), vec!["T_j = 25 °C", "T_j = 125 °C"]);
}

#[test]
fn test_conduction_plan_styles() {
    let plan = small()
        .plan(FigureKind::Conduction, &load_fixture("sic_mosfet.json"))
        .unwrap();
    assert!(plan.panel.origin_lines);
    // on: forward + reverse per temperature, off: reverse only
    assert_eq!(plan.panel.series.len(), 6);

    for series in &plan.panel.series {
        let reverse = series.label.contains("reverse");
        let marker = series.style.marker.unwrap();
        assert_eq!(marker == Marker::Triangle, reverse, "{}", series.label);
        if series.label.starts_with("gate on") {
            assert!(series.style.filled);
            assert!(series.style.line_width > 2.0);
        } else {
            assert!(!series.style.filled);
            assert!(series.style.line_width < 2.0);
        }
        if reverse {
            assert!(series.points.iter().all(|p| p.0 <= 0.0));
        }
    }
}

#[test]
fn test_thermal_plan_curve() {
    let plan = small()
        .plan(FigureKind::Thermal, &load_fixture("sic_mosfet.json"))
        .unwrap();
    assert_eq!(plan.panel.x.scale, AxisScale::Log);
    assert_eq!(plan.panel.y.scale, AxisScale::Log);
    let points = &plan.panel.series[0].points;
    assert!(points.len() > 100);
    assert!(points.windows(2).all(|w| w[1].0 > w[0].0 && w[1].1 >= w[0].1 - 1e-12));
    let (_, z_end) = points[points.len() - 1];
    assert!(z_end > 0.25 && z_end <= 0.3 + 1e-9, "{z_end}");
}

fn single_point_conduction() -> DeviceModel {
    let text = std::fs::read_to_string(fixture_path("sic_mosfet.json")).unwrap();
    let mut document: serde_json::Value = serde_json::from_str(&text).unwrap();
    let sets = &mut document["package"]["semiconductor_data"]["conduction_loss"];
    sets[0]["current_axis"] = serde_json::json!([20]);
    sets[0]["voltage_drop"]["data"] = serde_json::json!({ "25": [0.8], "150": [1.2] });
    sets[1]["current_axis"] = serde_json::json!([-40]);
    sets[1]["voltage_drop"]["data"] = serde_json::json!([[-4.8], [-4.4]]);
    semidata::load(&document).unwrap()
}

#[test]
fn test_single_point_conduction_is_still_drawn() {
    let model = single_point_conduction();
    let generator = small();

    let figures = generator.generate(&model).unwrap();
    assert!(figures.contains_key(&FigureKind::Conduction));
    assert_eq!(figures.len(), 4);

    let plan = generator.plan(FigureKind::Conduction, &model).unwrap();
    assert_eq!(plan.panel.series.len(), 4);
    assert!(plan.panel.series.iter().all(|s| s.points.len() == 1));
    assert_eq!(plan.panel.series[0].points[0], (20.0, 0.8));

    let figure = generator
        .generate_kind(&model, FigureKind::Conduction)
        .unwrap();
    assert!(!figure.png.is_empty());
}

fn pixels(png: &[u8]) -> Vec<u8> {
    let decoder = png::Decoder::new(Cursor::new(png.to_vec()));
    let mut reader = decoder.read_info().unwrap();
    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf).unwrap();
    buf.truncate(frame.buffer_size());
    buf
}

fn roomy() -> FigureGenerator {
    FigureGenerator::new(RenderContext::new(8.0, 5.0, 100))
}

#[test]
fn test_annotation_text_is_drawn() {
    let model = load_fixture("sic_mosfet.json");
    let generator = roomy();
    let plan = generator.plan(FigureKind::Thermal, &model).unwrap();
    let original = generator.render_plan(plan.clone()).unwrap();

    let mut edited = plan.clone();
    edited.annotations[0] = "Total R_th = 9.8765 K/W".to_string();
    let changed = generator.render_plan(edited).unwrap();
    assert_ne!(pixels(&original.png), pixels(&changed.png));

    let mut bare = plan;
    bare.annotations.clear();
    let bare = generator.render_plan(bare).unwrap();
    assert_ne!(pixels(&original.png), pixels(&bare.png));
}

#[test]
fn test_title_and_legend_are_drawn() {
    let model = load_fixture("sic_mosfet.json");
    let generator = roomy();
    let plan = generator.plan(FigureKind::TurnOnLoss, &model).unwrap();
    let original = pixels(&generator.render_plan(plan.clone()).unwrap().png);

    let mut retitled = plan.clone();
    retitled.title.push_str(" (rev B)");
    assert_ne!(original, pixels(&generator.render_plan(retitled).unwrap().png));

    let mut relabelled = plan;
    relabelled.panel.series[0].label = "Tj = 999 °C".to_string();
    assert_ne!(original, pixels(&generator.render_plan(relabelled).unwrap().png));
}

#[test]
fn test_same_text_gives_same_pixels() {
    let model = load_fixture("sic_mosfet.json");
    let generator = roomy();
    let plan = generator.plan(FigureKind::Conduction, &model).unwrap();
    let a = generator.render_plan(plan.clone()).unwrap();
    let b = generator.render_plan(plan).unwrap();
    assert_eq!(pixels(&a.png), pixels(&b.png));
}
