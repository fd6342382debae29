//! Convert one device document and print what was produced.

use semidata::prelude::*;
use std::path::Path;

fn main() -> Result<(), SemidataError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/sic_mosfet.json".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example convert_device [path/to/device.json]");
        std::process::exit(1);
    }

    let model = SemidataCore::load_file(path)?;
    println!("Device: {} ({})", model.name, model.device_type);
    for facet in model.facets() {
        println!("  - {}", facet);
    }
    if let Some(thermal) = &model.semiconductor_data.thermal_model {
        println!("Total R_th: {:.4} K/W", thermal.total_resistance());
    }

    let out_dir = std::env::temp_dir().join("semidata-example");
    let result = SemidataCore::convert_file(path, &out_dir, &ConvertOptions::default())?;
    println!();
    println!("Wrote {} file(s):", result.outputs.len());
    for output in &result.outputs {
        println!("  {}", output.display());
    }
    Ok(())
}
