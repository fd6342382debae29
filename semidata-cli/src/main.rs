//! Semidata CLI - convert power-semiconductor device documents from the
//! command line.

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use semidata::{
    BatchReport, ConvertOptions, DeviceSummary, FigureKind, OutputFormat, SemidataCore,
    SurveyReport,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(name = "semidata")]
#[command(about = "Power-semiconductor model converter (PLECS XML, MAT-file, figures)", long_about = None)]
#[command(version)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a device document, or every *.json file in a directory
    Convert {
        /// Path to a .json device document or a directory of them
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = "out")]
        output: PathBuf,

        /// Comma-separated outputs: xml, mat, figures
        #[arg(long, value_name = "LIST")]
        formats: Option<String>,

        /// JSON config file with conversion options
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Figure resolution
        #[arg(long, value_name = "N")]
        dpi: Option<u32>,

        /// Report format
        #[arg(short, long, value_enum, default_value = "human")]
        format: ReportFormat,
    },

    /// Validate a device document without writing anything
    Check {
        /// Path to a .json device document
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: ReportFormat,
    },

    /// Convert a PLECS XML library file into a JSON device document
    Import {
        /// Path to a PLECS SemiconductorLibrary .xml file
        #[arg(value_name = "XML")]
        file: PathBuf,

        /// Write the document here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Summarise a directory of device documents
    Survey {
        /// Database directory
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: ReportFormat,
    },

    /// List output formats and figure kinds
    Formats,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    /// Human-readable output
    Human,
    /// JSON output for scripts
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Convert {
            path,
            output,
            formats,
            config,
            dpi,
            format,
        } => handle_convert(&path, &output, formats, config, dpi, format),
        Commands::Check { file, format } => handle_check(&file, format),
        Commands::Import { file, output } => handle_import(&file, output.as_deref()),
        Commands::Survey { dir, format } => handle_survey(&dir, format),
        Commands::Formats => {
            handle_formats();
            Ok(0)
        }
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    process::exit(exit_code);
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn handle_convert(
    path: &Path,
    output: &Path,
    formats: Option<String>,
    config: Option<PathBuf>,
    dpi: Option<u32>,
    format: ReportFormat,
) -> anyhow::Result<i32> {
    let mut options = match &config {
        Some(file) => ConvertOptions::from_file(file)?,
        None => ConvertOptions::default(),
    };
    if let Some(list) = formats {
        options.formats = OutputFormat::parse_list(&list)?;
    }
    if let Some(dpi) = dpi {
        anyhow::ensure!(dpi > 0, "--dpi must be positive");
        options.render.dpi = dpi;
    }

    let report = SemidataCore::convert_path(path, output, &options)
        .with_context(|| format!("cannot convert {}", path.display()))?;
    match format {
        ReportFormat::Human => output_batch_human(&report, output),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(if report.is_success() { 0 } else { 1 })
}

fn output_batch_human(report: &BatchReport, output: &Path) {
    for result in &report.converted {
        println!("{} -> {}", result.source.display(), result.device);
        for file in &result.outputs {
            println!("    {}", file.display());
        }
    }
    for failure in &report.failed {
        println!("FAILED {}", failure.path.display());
        println!("    {}", failure.error);
    }
    println!("{}", "─".repeat(60));
    println!(
        "Converted {} of {} file(s) into {}",
        report.converted.len(),
        report.total(),
        output.display()
    );
}

fn handle_check(file: &Path, format: ReportFormat) -> anyhow::Result<i32> {
    let summary = match SemidataCore::check_file(file) {
        Ok(summary) => summary,
        Err(e) => {
            match format {
                ReportFormat::Human => println!("INVALID {}: {}", file.display(), e),
                ReportFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "file": file.display().to_string(),
                        "valid": false,
                        "error": e.to_string(),
                    }))?
                ),
            }
            return Ok(1);
        }
    };

    match format {
        ReportFormat::Human => output_summary_human(file, &summary),
        ReportFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "file": file.display().to_string(),
                "valid": true,
                "device": summary,
            }))?
        ),
    }
    Ok(0)
}

fn output_summary_human(file: &Path, summary: &DeviceSummary) {
    println!("\nFile: {}", file.display());
    println!("{}", "─".repeat(60));
    println!("  Device:       {}", summary.name);
    println!("  Type:         {}", summary.device_type);
    if let Some(manufacturer) = &summary.manufacturer {
        println!("  Manufacturer: {}", manufacturer);
    }
    if let Some(material) = &summary.material {
        println!("  Material:     {}", material);
    }
    println!("  Variables:    {}", summary.variables);
    if summary.facets.is_empty() {
        println!("  Facets:       none");
    } else {
        println!("  Facets:       {}", summary.facets.join(", "));
    }
    if let Some(total) = summary.total_thermal_resistance {
        println!("  Total R_th:   {:.4} K/W", total);
    }
    println!("\n  Valid");
}

fn handle_import(file: &Path, output: Option<&Path>) -> anyhow::Result<i32> {
    let document = SemidataCore::import_xml_file(file)
        .with_context(|| format!("cannot import {}", file.display()))?;
    let text = serde_json::to_string_pretty(&document)?;
    match output {
        Some(target) => {
            std::fs::write(target, format!("{text}\n"))
                .with_context(|| format!("cannot write {}", target.display()))?;
            eprintln!("Wrote {}", target.display());
        }
        None => println!("{}", text),
    }
    Ok(0)
}

fn handle_survey(dir: &Path, format: ReportFormat) -> anyhow::Result<i32> {
    let report = SemidataCore::survey(dir)
        .with_context(|| format!("cannot survey {}", dir.display()))?;
    match format {
        ReportFormat::Human => output_survey_human(&report),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(0)
}

fn output_survey_human(report: &SurveyReport) {
    println!("\nDirectory: {}", report.directory.display());
    println!("{}", "─".repeat(60));
    println!("  Files:   {}", report.files);
    println!("  Devices: {}", report.devices);

    for (title, counts) in [
        ("By type", &report.by_type),
        ("By material", &report.by_material),
        ("By manufacturer", &report.by_manufacturer),
        ("Facet coverage", &report.facet_coverage),
    ] {
        println!("\n  {}:", title);
        for (key, count) in counts {
            println!("    {:<24} {}", key, count);
        }
    }

    if !report.failed.is_empty() {
        println!("\n  Failed:");
        for failure in &report.failed {
            println!("    - {}: {}", failure.path.display(), failure.error);
        }
    }
}

fn handle_formats() {
    println!("Output formats:\n");
    for format in OutputFormat::ALL {
        println!("  {:<10} {}", format.as_str(), format.description());
    }
    println!("\nFigure kinds:\n");
    for kind in FigureKind::ALL {
        println!("  {:<14} {}.png (needs {})", kind.file_stem(), kind.file_stem(), kind.facet());
    }
}
