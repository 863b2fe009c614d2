//! Conversor CLI - Convert COLUMNA invoice workbooks to IMPORT format
//!
//! # Main Commands
//!
//! ```bash
//! conversor serve                     # Start HTTP server (port 3000)
//! conversor convert facturas.xlsx     # Write facturas_formato_import.xlsx
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! conversor inspect facturas.xlsx     # Show sheets, header row and columns
//! conversor item-types                # Show item types and tax codes
//! ```

use clap::{Parser, Subcommand};
use conversor::{
    convert_file, default_output_path, find_header_row, AppConfig, CellValue, HeaderIndex,
    ItemType, Workbook, INPUT_SHEET, REQUIRED_COLUMNS,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "conversor")]
#[command(about = "Convert COLUMNA purchase invoice workbooks to the IMPORT format", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a COLUMNA workbook into an IMPORT workbook
    Convert {
        /// Input workbook (.xlsx)
        input: PathBuf,

        /// Output workbook (default: <input>_formato_import.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of preview rows to print, header included
        #[arg(long)]
        preview: Option<usize>,

        /// Report invoices whose date could not be normalized
        #[arg(long)]
        strict_dates: bool,
    },

    /// Show how a workbook will be read, without converting it
    Inspect {
        /// Input workbook
        input: PathBuf,
    },

    /// Show item types and their tax codes
    ItemTypes,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let result = match cli.command {
        Commands::Convert {
            input,
            output,
            preview,
            strict_dates,
        } => cmd_convert(&config, &input, output.as_deref(), preview, strict_dates),

        Commands::Inspect { input } => cmd_inspect(&input),

        Commands::ItemTypes => cmd_item_types(),

        Commands::Serve { port } => cmd_serve(port, config).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_convert(
    config: &AppConfig,
    input: &Path,
    output: Option<&Path>,
    preview: Option<usize>,
    strict_dates: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(input));

    let mut options = config.convert_options();
    if let Some(rows) = preview {
        options.preview_rows = rows;
    }
    options.strict_dates |= strict_dates;

    let outcome = convert_file(input, &output, &options)?;

    eprintln!("\n📊 Invoices:       {}", outcome.stats.invoice_count);
    eprintln!("   Rows generated: {}", outcome.stats.rows_generated);
    eprintln!("   Time:           {:.2}s", outcome.stats.processing_time);

    if options.strict_dates && !outcome.date_warnings.is_empty() {
        eprintln!("\n⚠️  {} dates kept as is:", outcome.date_warnings.len());
        for w in &outcome.date_warnings {
            eprintln!("   row {}: {}", w.row, w.value);
        }
    }

    if !outcome.preview.is_empty() {
        eprintln!("\n🔎 Preview:");
        for row in &outcome.preview {
            println!("{}", format_row(row));
        }
    }

    eprintln!("\n💾 Output written to: {}", outcome.output_path.display());
    Ok(())
}

fn cmd_inspect(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Inspecting: {}", input.display());

    let mut workbook = Workbook::open(input)?;
    let sheets = workbook.sheet_names();
    println!("Sheets: {}", sheets.join(", "));

    let grid = workbook.read_sheet(INPUT_SHEET)?;
    println!("\"{}\": {} rows x {} columns", INPUT_SHEET, grid.height(), grid.width());

    let header_row = find_header_row(&grid)?;
    println!("Header row: {}", grid.sheet_row_number(header_row));

    let headers = HeaderIndex::from_row(grid.row(header_row));
    println!("\nColumns ({}):", headers.len());
    for label in headers.labels() {
        let col = headers.position(label).unwrap_or_default();
        println!("  [{:2}] {}", col + 1, label);
    }

    let items: Vec<&str> = headers
        .labels()
        .filter_map(ItemType::from_label)
        .map(|t| t.label())
        .collect();
    println!("\nItem columns: {}", if items.is_empty() { "none".to_string() } else { items.join(", ") });

    let unknown: Vec<&str> = headers
        .labels()
        .filter(|l| l.starts_with("ITEM") && ItemType::from_label(l).is_none())
        .collect();
    if !unknown.is_empty() {
        println!("⚠️  Ignored item-like columns: {}", unknown.join(", "));
    }

    let missing = headers.missing(&REQUIRED_COLUMNS);
    if missing.is_empty() {
        println!("✅ All required columns present");
    } else {
        println!("❌ Missing required columns: {}", missing.join(", "));
    }

    Ok(())
}

fn cmd_item_types() -> Result<(), Box<dyn std::error::Error>> {
    println!("{:<10}  Tax codes", "Item");
    for item in ItemType::ALL {
        println!("{:<10}  {}", item.label(), item.tax_codes());
    }
    Ok(())
}

async fn cmd_serve(port: u16, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    conversor::server::start_server(port, config).await
}

fn format_row(row: &[CellValue]) -> String {
    row.iter()
        .map(|c| c.display_text())
        .collect::<Vec<_>>()
        .join(" | ")
}
