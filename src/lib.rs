pub mod audit;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod frame;
pub mod ingest;
pub mod io_utils;
pub mod loader;
pub mod mart;
pub mod pipeline;
pub mod table;
pub mod transform;
pub mod union;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    audit::AuditRecord,
    cli::{Cli, Commands},
    config::{PipelineConfig, SnapshotSpec},
    ingest::IngestionAuditor,
    pipeline::{Pipeline, RunContext},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_mart", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => handle_run(&args),
        Commands::Ingest(args) => handle_ingest(&args),
        Commands::Audit(args) => handle_audit(&args),
        Commands::Config(args) => handle_config(&args),
    }
}

fn load_config(source: &cli::SourceArgs) -> Result<PipelineConfig> {
    let mut config = match &source.config {
        Some(path) => {
            PipelineConfig::load(path).with_context(|| format!("Loading config from {path:?}"))?
        }
        None => PipelineConfig::default(),
    };
    if let Some(root) = &source.archive_root {
        config.archive_root = root.clone();
    }
    if let Some(delimiter) = source.delimiter {
        config.delimiter = delimiter;
    }
    if let Some(encoding) = &source.input_encoding {
        config.encoding = Some(encoding.clone());
    }
    Ok(config)
}

fn handle_run(args: &cli::RunArgs) -> Result<()> {
    let mut config = load_config(&args.source)?;
    if !args.snapshots.is_empty() {
        config.snapshots = args.snapshots.clone();
    }
    if let Some(format) = &args.date_format {
        config.date_format = format.clone();
    }
    if let Some(policy) = args.date_policy {
        config.date_policy = policy;
    }
    if let Some(output) = &args.output {
        config.mart_output = Some(output.clone());
    }
    if let Some(dir) = &args.export_dir {
        config.export.enabled = true;
        config.export.path = dir.clone();
    }
    if let Some(format) = args.export_format {
        config.export.format = format;
    }
    info!(
        "Running pipeline over {} snapshot(s) (delimiter '{}', archive root {:?})",
        config.snapshots.len(),
        io_utils::printable_delimiter(config.delimiter),
        config.archive_root
    );
    debug!("Effective config: {config:?}");

    let output = Pipeline::new(config).run().context("Pipeline run failed")?;
    if let Some(limit) = args.preview {
        print!("{}", table::render_frame(&output.mart, limit));
    }
    if args.report {
        let json = serde_json::to_string_pretty(&output.report)
            .context("Serializing run report")?;
        println!("{json}");
    }
    info!("Pipeline finished: {} mart row(s)", output.mart.row_count());
    Ok(())
}

fn handle_ingest(args: &cli::IngestArgs) -> Result<()> {
    let config = load_config(&args.source)?;
    let snapshot = SnapshotSpec {
        day: args.day.clone(),
        source: args.input.clone(),
    };
    let auditor = IngestionAuditor::from_config(&config)
        .with_context(|| "Preparing ingestion".to_string())?;
    let mut context = RunContext::new();
    let record = auditor
        .ingest(&snapshot, &mut context)
        .with_context(|| format!("Ingesting snapshot '{}' from {:?}", args.day, args.input))?;
    info!(
        "Audit for '{}': {} row(s), status {}",
        args.day, record.numberrow_treatment, record.status
    );
    Ok(())
}

fn handle_audit(args: &cli::AuditArgs) -> Result<()> {
    let found = audit::discover_audit_files(&args.archive_root)
        .with_context(|| format!("Scanning {:?} for audit files", args.archive_root))?;
    if found.is_empty() {
        info!("No audit records found under {:?}", args.archive_root);
        return Ok(());
    }
    let mut rows = Vec::with_capacity(found.len());
    for (day, path) in &found {
        let record =
            AuditRecord::load(path).with_context(|| format!("Reading audit file {path:?}"))?;
        rows.push(vec![
            day.clone(),
            record.start_time.format(audit::AUDIT_TIMESTAMP_FORMAT).to_string(),
            record.end_time.format(audit::AUDIT_TIMESTAMP_FORMAT).to_string(),
            record.numberrow_treatment.to_string(),
            record.status.to_string(),
        ]);
    }
    let headers = ["day", "start_time", "end_time", "numberrow_treatment", "status"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    print!("{}", table::render_table(&headers, &rows));
    Ok(())
}

fn handle_config(args: &cli::ConfigArgs) -> Result<()> {
    let config = PipelineConfig::default();
    match &args.output {
        Some(path) => {
            config
                .save(path)
                .with_context(|| format!("Writing config to {path:?}"))?;
            info!("Default configuration written to {path:?}");
        }
        None => {
            let yaml = serde_yaml::to_string(&config).context("Serializing default config")?;
            print!("{yaml}");
        }
    }
    Ok(())
}
