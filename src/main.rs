//! officefill CLI - fill client/equipment document templates from a data table

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use officefill::{
    FormKind, GenerationInput, GeneratorBuilder, RowStatus, TableSource, DEFAULT_ARCHIVE_NAME,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "officefill")]
#[command(
    author,
    version,
    about = "Generate per-client document packages from a data table and templates"
)]
struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill every template for each table row and write the aggregate archive
    Generate {
        /// Data table (xlsx, xls, ods or csv)
        #[arg(short, long)]
        data: PathBuf,

        /// FR-EI-02 Word template (.docx)
        #[arg(long)]
        word: PathBuf,

        /// FR-EI-04 life record template (.xlsx)
        #[arg(long)]
        life_record: PathBuf,

        /// FR-EI-03 maintenance protocol template (.xlsx)
        #[arg(long)]
        protocol: PathBuf,

        /// FR-EI-05 maintenance schedule template (.xlsx)
        #[arg(long)]
        schedule: PathBuf,

        /// Directory to write the aggregate archive to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Base name of the aggregate archive
        #[arg(short, long, default_value = DEFAULT_ARCHIVE_NAME)]
        name: String,

        /// Directory for scratch files (default: system temp dir)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Write the per-row report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show the table header and the first normalized records
    Preview {
        /// Data table (xlsx, xls, ods or csv)
        #[arg(short, long)]
        data: PathBuf,

        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        rows: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Generate {
            data,
            word,
            life_record,
            protocol,
            schedule,
            output,
            name,
            work_dir,
            report,
        } => {
            let templates = [
                (FormKind::Narrative, word),
                (FormKind::LifeRecord, life_record),
                (FormKind::MaintenanceProtocol, protocol),
                (FormKind::Schedule, schedule),
            ];
            generate(
                &data,
                &templates,
                &output,
                &name,
                work_dir,
                report.as_deref(),
            )
        }
        Commands::Preview { data, rows } => preview(&data, rows),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("officefill={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn generate(
    data: &Path,
    templates: &[(FormKind, PathBuf)],
    output: &Path,
    name: &str,
    work_dir: Option<PathBuf>,
    report_path: Option<&Path>,
) -> Result<()> {
    let mut builder = GeneratorBuilder::new().with_archive_name(name);
    if let Some(dir) = work_dir {
        builder = builder.with_work_dir(dir);
    }
    let generator = builder.build().context("Invalid configuration")?;

    let table = TableSource::from_path(data)
        .with_context(|| format!("Failed to read data table '{}'", data.display()))?;
    let mut input = GenerationInput::new().with_table(table);
    for (kind, path) in templates {
        let bytes = fs::read(path).with_context(|| {
            format!("Failed to read {} template '{}'", kind.form_id(), path.display())
        })?;
        input = input.with_template(*kind, bytes);
    }

    let report = generator.generate(&input).context("Generation failed")?;

    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create '{}'", output.display()))?;
    let archive_path = output.join(&report.archive_name);
    fs::write(&archive_path, &report.archive)
        .with_context(|| format!("Failed to write '{}'", archive_path.display()))?;

    for (row, message) in report.messages() {
        eprintln!("Warning: row {}: {}", row, message);
    }

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report '{}'", path.display()))?;
    }

    println!(
        "{}: {} archives ({} ok, {} with warnings, {} failed)",
        archive_path.display(),
        report.entries.len(),
        report.count(RowStatus::Success),
        report.count(RowStatus::Partial),
        report.count(RowStatus::Failed)
    );
    Ok(())
}

fn preview(data: &Path, rows: usize) -> Result<()> {
    let generator = GeneratorBuilder::new().build()?;
    let table = TableSource::from_path(data)
        .with_context(|| format!("Failed to read data table '{}'", data.display()))?;
    let preview = generator
        .preview(&table, rows)
        .with_context(|| format!("Failed to parse '{}'", data.display()))?;

    println!("Columns: {}", preview.headers.join(" | "));
    println!("Rows: {}", preview.total_rows);
    if !preview.missing_fields.is_empty() {
        println!("Missing columns for: {:?}", preview.missing_fields);
    }
    println!();

    for record in &preview.records {
        println!(
            "[{}] {}  CLIENTE={:?} EQUIPO={:?} SERIE={:?}",
            record.index(),
            record.identity(),
            record.client(),
            record.equipment(),
            record.get(officefill::Field::Serial)
        );
    }
    Ok(())
}
