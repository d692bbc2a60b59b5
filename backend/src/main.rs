//! Schedule Parser CLI - Extract product records from schedule spreadsheets
//!
//! # Commands
//!
//! ```bash
//! schedule-parser serve                  # Start HTTP server (port 8000)
//! schedule-parser parse schedule.xlsx    # Full pipeline, JSON to stdout
//! schedule-parser headers schedule.xlsx  # Header row and mapping per sheet
//! schedule-parser validate products.json # Check records against the schema
//! ```

use clap::{Parser, Subcommand};
use schedule_parser::{
    extract_from_path, inspect_headers, load_path, validate_product, write_products_csv,
    AiServices, HeaderAliasTable, ParserOptions,
};
use schedule_parser::config::DEFAULT_HEADER_THRESHOLD;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "schedule-parser")]
#[command(about = "Extract product records from architectural schedule spreadsheets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: workbook → product schedules (JSON)
    Parse {
        /// Input workbook (.xlsx, .xls, .xlsb, .ods) or CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also export every product as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Heuristics only: no enrichment, no AI header mapping
        #[arg(long)]
        no_ai: bool,

        /// Header row density threshold (0-1]
        #[arg(short, long, default_value = "0.7")]
        threshold: f64,

        /// Header alias table (JSON) replacing the built-in one
        #[arg(short, long)]
        aliases: Option<PathBuf>,
    },

    /// Show the detected header row and heuristic mapping of each sheet
    Headers {
        /// Input workbook or CSV file
        input: PathBuf,

        /// Header row density threshold (0-1]
        #[arg(short, long, default_value = "0.7")]
        threshold: f64,

        /// Header alias table (JSON) replacing the built-in one
        #[arg(short, long)]
        aliases: Option<PathBuf>,
    },

    /// Validate JSON product records against the product schema
    Validate {
        /// Input JSON file (array of records)
        input: PathBuf,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Heuristics only: no enrichment, no AI header mapping
        #[arg(long)]
        no_ai: bool,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse {
            input,
            output,
            csv,
            no_ai,
            threshold,
            aliases,
        } => {
            cmd_parse(
                &input,
                output.as_deref(),
                csv.as_deref(),
                no_ai,
                threshold,
                aliases.as_deref(),
            )
            .await
        }

        Commands::Headers {
            input,
            threshold,
            aliases,
        } => cmd_headers(&input, threshold, aliases.as_deref()),

        Commands::Validate { input } => cmd_validate(&input),

        Commands::Serve { port, no_ai } => cmd_serve(port, no_ai).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn build_options(
    threshold: f64,
    aliases: Option<&Path>,
    no_ai: bool,
) -> Result<ParserOptions, Box<dyn std::error::Error>> {
    let aliases = match aliases {
        Some(path) => {
            eprintln!("📋 Using alias table: {}", path.display());
            HeaderAliasTable::from_json_file(path)?
        }
        None => HeaderAliasTable::default(),
    };

    let options = ParserOptions {
        header_threshold: threshold,
        enrich_products: !no_ai,
        ai_header_mapping: !no_ai,
        aliases,
        ..ParserOptions::default()
    };
    options.validate()?;
    Ok(options)
}

fn build_services(no_ai: bool) -> AiServices {
    if no_ai {
        AiServices::none()
    } else {
        AiServices::from_env_or_none()
    }
}

async fn cmd_parse(
    input: &Path,
    output: Option<&Path>,
    csv_output: Option<&Path>,
    no_ai: bool,
    threshold: f64,
    aliases: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let options = build_options(threshold, aliases, no_ai)?;
    let services = build_services(no_ai);

    let schedules = extract_from_path(input, &services, &options).await?;

    eprintln!();
    for schedule in &schedules {
        eprintln!(
            "   {}: {} products, {} warnings",
            schedule.schedule_name,
            schedule.products.len(),
            schedule.warnings.len()
        );
        for warning in schedule.warnings.iter().take(5) {
            eprintln!("     - {}", warning);
        }
    }

    if let Some(csv_path) = csv_output {
        let file = fs::File::create(csv_path)?;
        write_products_csv(&schedules, file)?;
        eprintln!("💾 CSV written to: {}", csv_path.display());
    }

    let json = serde_json::to_string_pretty(&schedules)?;
    write_output(&json, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_headers(
    input: &Path,
    threshold: f64,
    aliases: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = build_options(threshold, aliases, true)?;
    let sheets = load_path(input)?;

    for sheet in inspect_headers(&sheets, &options) {
        println!("📄 {}", sheet.sheet_name);
        match sheet.header_row {
            Some(row) => {
                println!("   Header row: {} ({:.0}% filled)", row, sheet.density * 100.0);
                for (i, header) in sheet.headers.iter().enumerate() {
                    let field = sheet
                        .mapping
                        .field_for_header(header)
                        .map(|f| f.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!("   [{:2}] {} → {}", i + 1, header, field);
                }
            }
            None => println!("   No header row found above threshold {}", threshold),
        }
        println!();
    }

    Ok(())
}

fn cmd_validate(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let content = fs::read_to_string(input)?;
    let records: Vec<Value> = serde_json::from_str(&content)?;

    let mut valid = 0;
    let mut invalid = 0;

    for (i, record) in records.iter().enumerate() {
        match validate_product(record) {
            Ok(()) => valid += 1,
            Err(errors) => {
                invalid += 1;
                if invalid <= 5 {
                    eprintln!("\n❌ Record {} invalid:", i);
                    for err in errors.iter().take(3) {
                        eprintln!("   - {}", err);
                    }
                }
            }
        }
    }

    eprintln!("\n📊 Results: {} valid, {} invalid", valid, invalid);

    if invalid > 0 {
        std::process::exit(1);
    }

    Ok(())
}

async fn cmd_serve(port: u16, no_ai: bool) -> Result<(), Box<dyn std::error::Error>> {
    let state = schedule_parser::server::AppState {
        services: build_services(no_ai),
        options: build_options(DEFAULT_HEADER_THRESHOLD, None, no_ai)?,
    };
    schedule_parser::server::start_server(port, state).await
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
