//! labcode-export - Export laboratory run data and metadata.
//!
//! Reads the service database and the configured storage backends to browse
//! run content, estimate batch downloads against the 500 MiB advisory cap,
//! assemble multi-run ZIP archives with manifests, and produce portable
//! SQLite metadata snapshots.

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::io::Write;
use std::path::Path;

use clap::Parser;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    build_batch_archive, build_batch_dump, estimate_batch, snapshot_to_file, BatchArchive,
    StorageService,
};
use cli::{Cli, Commands, OutputFormat};
use domain::{ContentKind, RunEstimateDetail};
use infrastructure::{load_config, load_config_from_file, HybridAccessLayer, MetadataStore};

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: Cli) -> domain::Result<()> {
    let format = cli
        .output_format()
        .map_err(|e| domain::ExportError::Config { message: e })?;

    let config = match cli.config.as_deref() {
        Some(path) => load_config_from_file(Path::new(path))?,
        None => {
            infrastructure::ensure_config_exists()?;
            load_config()?
        }
    };

    let store = MetadataStore::open(&config.database_path())?;
    let hal = HybridAccessLayer::new(&store, &config);

    match cli.command {
        Commands::List { run_id, prefix } => {
            cmd_list(&hal, run_id, &prefix, format)?;
        }
        Commands::Preview { run_id, path } => {
            cmd_preview(&hal, run_id, &path, format)?;
        }
        Commands::Url { run_id, path } => {
            cmd_url(&hal, run_id, &path, format)?;
        }
        Commands::Info { run_id } => {
            cmd_info(&hal, run_id, format)?;
        }
        Commands::Dump { run_id, output } => {
            cmd_dump(&store, run_id, output.as_deref())?;
        }
        Commands::Estimate { runs } => {
            cmd_estimate(&store, &hal, &runs, format)?;
        }
        Commands::BatchDownload { runs, output } => {
            let archive = build_batch_archive(&store, &hal, &runs)?;
            write_archive(&archive, output.as_deref())?;
        }
        Commands::BatchDump { runs, output } => {
            let archive = build_batch_dump(&store, &runs)?;
            write_archive(&archive, output.as_deref())?;
        }
    }

    Ok(())
}

/// List run content command.
fn cmd_list(
    hal: &HybridAccessLayer,
    run_id: i64,
    prefix: &str,
    format: OutputFormat,
) -> domain::Result<()> {
    let service = StorageService::new(hal);
    let items = service.list(run_id, prefix)?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&items).map_err(domain::ExportError::json)?
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Path", "Type", "Size", "Source"]);

            for item in &items {
                let kind = match item.kind {
                    ContentKind::File => "file",
                    ContentKind::Directory => "dir",
                };
                let size = item
                    .size
                    .map_or_else(|| "-".to_string(), |s| s.to_string());
                table.add_row(vec![
                    item.path.clone(),
                    kind.to_string(),
                    size,
                    item.source.as_str().to_string(),
                ]);
            }

            println!("{table}");
            println!("Total: {} entries", items.len());
        }
    }

    Ok(())
}

/// Preview content command.
fn cmd_preview(
    hal: &HybridAccessLayer,
    run_id: i64,
    path: &str,
    format: OutputFormat,
) -> domain::Result<()> {
    let service = StorageService::new(hal);
    let preview = service.preview(run_id, path)?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&preview).map_err(domain::ExportError::json)?
            );
        }
        OutputFormat::Table => match preview.encoding {
            domain::PreviewEncoding::Utf8 => println!("{}", preview.content),
            domain::PreviewEncoding::Base64 => {
                println!("{}", "[binary content, base64 encoded]".yellow());
                println!("{}", preview.content);
            }
        },
    }

    Ok(())
}

/// Resolve download URL command.
fn cmd_url(
    hal: &HybridAccessLayer,
    run_id: i64,
    path: &str,
    format: OutputFormat,
) -> domain::Result<()> {
    let service = StorageService::new(hal);
    let link = service.download_url(run_id, path)?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&link).map_err(domain::ExportError::json)?
            );
        }
        OutputFormat::Table => println!("{}", link.url),
    }

    Ok(())
}

/// Storage info command.
fn cmd_info(hal: &HybridAccessLayer, run_id: i64, format: OutputFormat) -> domain::Result<()> {
    let service = StorageService::new(hal);
    let info = service.info(run_id)?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).map_err(domain::ExportError::json)?
            );
        }
        OutputFormat::Table => {
            println!("Run {}", info.run_id);
            println!("  storage mode:    {}", info.storage_mode);
            println!(
                "  storage address: {}",
                info.storage_address.as_deref().unwrap_or("-")
            );
            println!("  top-level items: {}", info.entry_count);
        }
    }

    Ok(())
}

/// Single-run metadata snapshot command.
fn cmd_dump(store: &MetadataStore, run_id: i64, output: Option<&str>) -> domain::Result<()> {
    let temp_path = snapshot_to_file(store, run_id)?;
    let dest = output.map_or_else(|| format!("run_{run_id}_dump.db"), String::from);

    // Rename can cross filesystems between temp dir and destination
    if std::fs::rename(&temp_path, &dest).is_err() {
        std::fs::copy(&temp_path, &dest)
            .map_err(|e| domain::ExportError::io(format!("Failed to write {dest}"), e))?;
        std::fs::remove_file(&temp_path)
            .map_err(|e| domain::ExportError::io("Failed to remove snapshot temp file", e))?;
    }

    println!("{} Exported run {} metadata to {}", "✓".green().bold(), run_id, dest);

    Ok(())
}

/// Batch estimate command.
fn cmd_estimate(
    store: &MetadataStore,
    hal: &HybridAccessLayer,
    runs: &[i64],
    format: OutputFormat,
) -> domain::Result<()> {
    let estimate = estimate_batch(store, hal, runs)?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&estimate).map_err(domain::ExportError::json)?
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Run", "Mode", "Files", "Size"]);

            for detail in &estimate.runs_detail {
                match detail {
                    RunEstimateDetail::Stats {
                        run_id,
                        storage_mode,
                        file_count,
                        estimated_size,
                    } => {
                        table.add_row(vec![
                            run_id.to_string(),
                            storage_mode.to_string(),
                            file_count.to_string(),
                            estimated_size.to_string(),
                        ]);
                    }
                    RunEstimateDetail::Error { run_id, error } => {
                        table.add_row(vec![
                            run_id.to_string(),
                            "-".to_string(),
                            "-".to_string(),
                            format!("error: {error}"),
                        ]);
                    }
                }
            }

            println!("{table}");
            println!(
                "Total: {} files, {:.2} MB across {} runs",
                estimate.total_files, estimate.estimated_size_mb, estimate.run_count
            );

            if estimate.can_download {
                println!("{}", "✓ Within the 500MB download limit".green());
            } else if let Some(message) = &estimate.message {
                println!("{} {}", "✗".red().bold(), message.yellow());
            }
        }
    }

    Ok(())
}

/// Write an assembled archive to disk.
fn write_archive(archive: &BatchArchive, output: Option<&str>) -> domain::Result<()> {
    let dest = output.unwrap_or(&archive.filename);

    let mut file = std::fs::File::create(dest)
        .map_err(|e| domain::ExportError::io(format!("Failed to create {dest}"), e))?;
    file.write_all(&archive.bytes)
        .map_err(|e| domain::ExportError::io("Failed to write archive", e))?;

    println!(
        "{} Wrote {} ({} bytes)",
        "✓".green().bold(),
        dest,
        archive.bytes.len()
    );

    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
