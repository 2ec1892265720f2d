//! Command-line and environment configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::error::{Error, Result};
use crate::reports::ErrorPolicy;
use crate::store::StoreBackend;

pub const ARTIFACTS_FILE: &str = "artifacts.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Markdown preview on stdout plus CSV/JSON files in the output directory
    Table,
    /// Pretty JSON on stdout only
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "rdqa-report", version, about = "Consistency reports between reference and calculated indicators")]
pub struct Cli {
    /// Directory holding reference.csv, calculated.csv and artifacts.json
    #[arg(long, env = "RDQA_DATA_DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Directory report files are written to
    #[arg(long, env = "RDQA_OUT_DIR", default_value = "out", global = true)]
    pub out_dir: PathBuf,

    #[arg(long, value_enum, env = "RDQA_BACKEND", default_value = "csv", global = true)]
    pub backend: StoreBackend,

    #[arg(long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Rows shown in console previews
    #[arg(long, default_value_t = 10, global = true)]
    pub preview_rows: usize,

    /// Fail instead of reporting empty coverage when the store is unreadable
    #[arg(long, global = true)]
    pub strict: bool,

    /// Values within this distance of zero count as zero in error metrics
    #[arg(long, default_value_t = 0.0, global = true)]
    pub zero_tolerance: f64,

    /// Also exclude pairs whose calculated value is zero
    #[arg(long, global = true)]
    pub skip_zero_calculated: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// MAPE per indicator
    Consistency {
        #[arg(long)]
        period: Option<String>,
    },
    /// Per-key errors of one indicator, worst first
    DrillDown {
        indicator: String,
        #[arg(long)]
        period: Option<String>,
    },
    /// Share of reference values with a calculated counterpart
    Coverage {
        #[arg(long)]
        period: Option<String>,
    },
    /// Period-over-period change of calculated values
    Diff {
        #[arg(long)]
        current: String,
        #[arg(long)]
        previous: String,
        #[arg(required = true, value_delimiter = ',')]
        indicators: Vec<String>,
    },
    /// Load an RDQA JSON payload into the data directory
    Ingest {
        file: PathBuf,
        #[arg(long)]
        source: String,
        #[arg(long)]
        period_ref: String,
        #[arg(long)]
        no_artifact: bool,
    },
    /// Check an execution id against a hash
    Verify {
        #[arg(long)]
        exec_id: Option<String>,
        #[arg(long)]
        hash: Option<String>,
    },
}

/// Validated settings shared by every command.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub data_dir: PathBuf,
    pub out_dir: PathBuf,
    pub backend: StoreBackend,
    pub format: OutputFormat,
    pub preview_rows: usize,
    pub strict: bool,
    pub policy: ErrorPolicy,
}

impl ReportConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if !cli.zero_tolerance.is_finite() || cli.zero_tolerance < 0.0 {
            return Err(Error::Config(format!(
                "zero tolerance must be a non-negative number, got {}",
                cli.zero_tolerance
            )));
        }
        if cli.preview_rows == 0 {
            return Err(Error::Config("preview rows must be at least 1".to_string()));
        }
        Ok(Self {
            data_dir: cli.data_dir.clone(),
            out_dir: cli.out_dir.clone(),
            backend: cli.backend,
            format: cli.format,
            preview_rows: cli.preview_rows,
            strict: cli.strict,
            policy: ErrorPolicy {
                zero_tolerance: cli.zero_tolerance,
                skip_zero_calculated: cli.skip_zero_calculated,
            },
        })
    }

    pub fn artifacts_path(&self) -> PathBuf {
        self.data_dir.join(ARTIFACTS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_diff_with_comma_separated_indicators() {
        let cli = Cli::try_parse_from([
            "rdqa-report",
            "diff",
            "--current",
            "2025-02",
            "--previous",
            "2025-01",
            "cov_aps,vac",
            "extra",
        ])
        .unwrap();
        match cli.command {
            Command::Diff { indicators, current, .. } => {
                assert_eq!(indicators, vec!["cov_aps", "vac", "extra"]);
                assert_eq!(current, "2025-02");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn builds_policy_from_flags() {
        let cli = Cli::try_parse_from([
            "rdqa-report",
            "--zero-tolerance",
            "0.5",
            "--skip-zero-calculated",
            "consistency",
            "--period",
            "2025-01",
        ])
        .unwrap();
        let config = ReportConfig::from_cli(&cli).unwrap();
        assert_eq!(config.policy.zero_tolerance, 0.5);
        assert!(config.policy.skip_zero_calculated);
        assert_eq!(config.artifacts_path(), config.data_dir.join("artifacts.json"));
    }

    #[test]
    fn rejects_negative_tolerance() {
        let cli = Cli::try_parse_from(["rdqa-report", "--zero-tolerance=-1", "coverage"]).unwrap();
        assert!(matches!(ReportConfig::from_cli(&cli), Err(Error::Config(_))));
    }
}
