use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "farewatch",
    author,
    version,
    about = "Track availability and all-in price changes of Wingo flights"
)]
pub struct Args {
    /// Configuration file (TOML). Defaults to the platform config directory.
    #[arg(short, long, global = true, env = "FAREWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch, price and archive flights, then report changes
    Run {
        /// Number of months to scan
        #[arg(long, env = "WINGO_MONTHS", default_value_t = 6)]
        months: u32,

        /// Months from today before the scan starts
        #[arg(long, env = "WINGO_START_MONTHS", default_value_t = 0)]
        start_months: u32,

        /// Directory holding the archived snapshot and the route cache
        #[arg(long, env = "FAREWATCH_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Directory of the route listing cache (defaults to the data directory)
        #[arg(long, env = "ROUTES_DIR")]
        routes_dir: Option<PathBuf>,

        /// Only scan routes from these origins
        #[arg(long = "origin", value_name = "CODE")]
        origins: Vec<String>,

        /// Only scan routes to these destinations
        #[arg(long = "destination", value_name = "CODE")]
        destinations: Vec<String>,

        /// Print change events as JSON lines on stdout
        #[arg(long)]
        events_json: bool,
    },

    /// Print the carrier's route listing
    Routes {
        /// Directory of the route listing cache
        #[arg(long, env = "ROUTES_DIR")]
        routes_dir: Option<PathBuf>,
    },

    /// Print scheduled flights of one route
    Schedule {
        #[arg(long)]
        origin: String,

        #[arg(long)]
        destination: String,

        /// Number of months to look ahead
        #[arg(long, default_value_t = 1)]
        months: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_arguments_parse() {
        let args = Args::parse_from([
            "farewatch",
            "--verbose",
            "run",
            "--months",
            "3",
            "--origin",
            "BOG",
            "--origin",
            "MDE",
            "--events-json",
        ]);
        assert!(args.verbose);
        let Commands::Run {
            months,
            origins,
            events_json,
            ..
        } = args.command
        else {
            panic!("expected run command");
        };
        assert_eq!(months, 3);
        assert_eq!(origins, vec!["BOG", "MDE"]);
        assert!(events_json);
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Args::try_parse_from(["farewatch", "-v", "-q", "routes"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
