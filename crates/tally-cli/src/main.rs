//! Sheet Tally CLI - sum a folder or archive of spreadsheets cell by cell

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use std::io;
use std::path::PathBuf;
use tally::{
    aggregate, parse_targets, resolve_input, sample_details, CsvWriteOptions, DetailOptions,
    DetailTarget, XlsxOpener,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tally")]
#[command(
    author,
    version,
    about = "Sum structurally similar spreadsheets cell by cell, keeping header text"
)]
struct Cli {
    /// Directory (scanned recursively) or zip archive of spreadsheets
    #[arg(short, long)]
    input: PathBuf,

    /// Aggregated workbook to write
    #[arg(short, long)]
    output: PathBuf,

    /// Cell to sample from every file, as SHEET:CELL (repeatable)
    #[arg(long = "detail-cell", value_name = "SHEET:CELL")]
    detail_cell: Vec<String>,

    /// Comma separated list of cells to sample, e.g. "S:A1,T:N18"
    #[arg(long = "detail-cells", value_name = "LIST", value_delimiter = ',')]
    detail_cells: Vec<String>,

    /// Detail table destination; .csv writes text, anything else a workbook
    /// (default: CSV on stdout)
    #[arg(long = "detail-out")]
    detail_out: Option<PathBuf>,

    /// Header of the file name column in the detail table
    #[arg(long, default_value = "文件名")]
    file_column: String,

    /// Label of the detail table's totals row
    #[arg(long, default_value = "合计")]
    totals_label: String,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// All requested detail targets, repeated flags first
    fn targets(&self) -> Result<Vec<DetailTarget>> {
        let specs = self
            .detail_cell
            .iter()
            .chain(&self.detail_cells)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty());
        Ok(parse_targets(specs)?)
    }

    fn detail_options(&self) -> DetailOptions {
        DetailOptions {
            file_column: self.file_column.clone(),
            totals_label: self.totals_label.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(&cli)
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    // Configuration mistakes fail before any file is touched
    let targets = cli.targets().context("Invalid detail cell")?;
    if targets.is_empty() && cli.detail_out.is_some() {
        tracing::warn!("--detail-out given without any detail cell; no detail table written");
    }

    let input = resolve_input(&cli.input)
        .with_context(|| format!("Failed to resolve input '{}'", cli.input.display()))?;

    let result = aggregate(input.files(), &XlsxOpener);
    if result.is_empty() {
        bail!(
            "No readable spreadsheets found in '{}' ({} candidate files)",
            cli.input.display(),
            input.len()
        );
    }

    result
        .write(&cli.output)
        .context("Failed to write aggregated workbook")?;

    let stats = result.stats;
    eprintln!(
        "Aggregated {} sheets from {} files into '{}'",
        stats.sheets,
        stats.files,
        cli.output.display()
    );
    if stats.unreadable_files > 0 || stats.skipped_sheets > 0 {
        eprintln!(
            "Skipped {} unreadable files and {} unreadable sheets",
            stats.unreadable_files, stats.skipped_sheets
        );
    }

    if !targets.is_empty() {
        let table = sample_details(input.files(), &targets, &XlsxOpener, &cli.detail_options());
        let csv = CsvWriteOptions::default();
        match &cli.detail_out {
            Some(path) => {
                table
                    .write(path, &csv)
                    .context("Failed to write detail table")?;
                eprintln!("Wrote detail table to '{}'", path.display());
            }
            None => {
                let csv = CsvWriteOptions {
                    byte_order_mark: false,
                    ..csv
                };
                table
                    .write_csv(io::stdout().lock(), &csv)
                    .context("Failed to write detail table")?;
            }
        }
    }

    input
        .cleanup()
        .context("Failed to remove temporary extraction directory")?;
    Ok(())
}
