// Entry point and high-level CLI flow.
//
// Each subcommand reads the indicator store picked at startup, runs one
// report and either prints a markdown preview (saving the full report under
// the output directory) or prints the report as JSON.
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tabled::Tabled;
use tracing::{error, info, warn};

use rdqa_report::artifact::ArtifactRegistry;
use rdqa_report::config::{Cli, Command, OutputFormat, ReportConfig};
use rdqa_report::ingest::{ingest_file, IngestRequest};
use rdqa_report::store::{open_store, CsvStore, IndicatorStore, StoreBackend};
use rdqa_report::{output, reports, util, Error, Result};

/// Print a report and, in table mode, save it as CSV.
fn emit_rows<T>(config: &ReportConfig, title: &str, file: &str, rows: &[T]) -> Result<()>
where
    T: Serialize + Tabled + Clone,
{
    match config.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
        OutputFormat::Table => {
            std::fs::create_dir_all(&config.out_dir)?;
            let path = config.out_dir.join(file);
            output::write_csv(&path, rows)?;
            println!("{}\n", title);
            output::preview_table_rows(rows, config.preview_rows);
            println!("(Full table exported to {})\n", path.display());
        }
    }
    Ok(())
}

fn run_coverage(config: &ReportConfig, store: &dyn IndicatorStore, period: Option<&str>) -> Result<()> {
    let result = reports::coverage(store, period);
    let report = if config.strict {
        result.strict()?
    } else {
        if result.is_degraded() {
            warn!("store unreadable, coverage reported as empty");
        }
        result.into_value()
    };

    match config.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => {
            std::fs::create_dir_all(&config.out_dir)?;
            let path = config.out_dir.join("coverage.json");
            output::write_json(&path, &report)?;
            println!("Indicator Coverage\n");
            println!(
                "{}% covered ({} of {} reference values generated)\n",
                util::format_number(report.percent, 2),
                util::format_int(report.generated),
                util::format_int(report.total)
            );
            output::preview_table_rows(&report.missing, config.preview_rows);
            println!("(Full report exported to {})\n", path.display());
        }
    }
    Ok(())
}

fn run_ingest(config: &ReportConfig, file: &std::path::Path, request: &IngestRequest<'_>) -> Result<()> {
    if config.backend != StoreBackend::Csv {
        return Err(Error::Config("ingest requires the csv backend".to_string()));
    }
    let csv_store = CsvStore::new(&config.data_dir);
    let mut store = csv_store.to_memory()?;
    let registry_path = config.artifacts_path();
    let mut registry = ArtifactRegistry::load(&registry_path)?;

    let summary = ingest_file(file, &mut store, &mut registry, request)?;
    csv_store.persist(&store)?;
    if request.register_artifact {
        registry.save(&registry_path)?;
    }

    println!(
        "Ingested {} reference and {} calculated items ({} skipped).",
        util::format_int(summary.reference_items),
        util::format_int(summary.calculated_items),
        util::format_int(summary.skipped)
    );
    println!("exec_id: {}", summary.exec_id);
    println!("hash:    {}", summary.hash);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = ReportConfig::from_cli(&cli)?;
    let store = open_store(config.backend, &config.data_dir);
    info!(data_dir = %config.data_dir.display(), backend = ?config.backend, "store opened");

    match cli.command {
        Command::Consistency { period } => {
            let rows = reports::list_indicators(&*store, period.as_deref(), &config.policy)?;
            emit_rows(&config, "Indicator Consistency (MAPE)", "consistency.csv", &rows)
        }
        Command::DrillDown { indicator, period } => {
            let rows = reports::drill_down(&*store, &indicator, period.as_deref(), &config.policy)?;
            let title = format!("Drill-down: {}", indicator);
            let file = format!("drilldown_{}.csv", util::file_safe_name(&indicator));
            emit_rows(&config, &title, &file, &rows)
        }
        Command::Coverage { period } => run_coverage(&config, &*store, period.as_deref()),
        Command::Diff {
            current,
            previous,
            indicators,
        } => {
            let rows = reports::compare(&*store, &indicators, &current, &previous)?;
            let title = format!("Period Diff ({} vs {})", current, previous);
            emit_rows(&config, &title, "diff.csv", &rows)
        }
        Command::Ingest {
            file,
            source,
            period_ref,
            no_artifact,
        } => {
            let request = IngestRequest {
                source: &source,
                period_ref: &period_ref,
                register_artifact: !no_artifact,
            };
            run_ingest(&config, &file, &request)
        }
        Command::Verify { exec_id, hash } => {
            let registry = ArtifactRegistry::load(&config.artifacts_path())?;
            let verification = registry.verify(exec_id.as_deref(), hash.as_deref());
            println!("{}", serde_json::to_string_pretty(&verification)?);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
