//! Command line arguments

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "datagrid", version, about = "Browse, filter and export tabular data in the terminal")]
pub struct Cli {
    /// JSON (`{"data": [...]}` or a bare array) or CSV file to show
    pub data: PathBuf,

    /// Grid configuration (YAML or JSON); fields are inferred when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Grid id used for persisted state; defaults to the data file's stem
    #[arg(long)]
    pub grid_id: Option<String>,

    /// Directory holding persisted view state
    #[arg(long, env = "DATAGRID_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Do not read or write persisted view state
    #[arg(long)]
    pub no_state: bool,

    /// Directory exported CSV files are written to
    #[arg(long, default_value = ".")]
    pub export_dir: PathBuf,

    /// Give up on loading the data file after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Write logs to this file instead of the state directory
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Milliseconds between UI ticks when no input arrives
    #[arg(long, default_value_t = 100)]
    pub tick_rate: u64,
}

impl Cli {
    pub fn load_timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate.max(10))
    }

    pub fn resolved_grid_id(&self) -> String {
        self.grid_id.clone().unwrap_or_else(|| {
            self.data
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_else(|| "grid".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_grid_id_from_file_stem() {
        let cli = Cli::parse_from(["datagrid", "data/people.json"]);
        assert_eq!(cli.resolved_grid_id(), "people");
        assert_eq!(cli.export_dir, PathBuf::from("."));
        assert!(cli.load_timeout().is_none());
        assert_eq!(cli.tick_rate(), Duration::from_millis(100));
    }

    #[test]
    fn test_explicit_options() {
        let cli = Cli::parse_from([
            "datagrid",
            "rows.csv",
            "--config",
            "grid.yaml",
            "--grid-id",
            "staff",
            "--timeout",
            "5",
            "--no-state",
        ]);
        assert_eq!(cli.resolved_grid_id(), "staff");
        assert_eq!(cli.config, Some(PathBuf::from("grid.yaml")));
        assert_eq!(cli.load_timeout(), Some(Duration::from_secs(5)));
        assert!(cli.no_state);
    }
}
