mod agent_mode;
mod demo;
mod engine;

use std::path::PathBuf;

use clap::Parser;

use simulation::CrisisParams;

#[derive(Parser, Debug, Default, PartialEq)]
#[command(name = "sentinelgov")]
#[command(version)]
#[command(about = "Headless flood-crisis simulation and decision engine", long_about = None)]
struct Cli {
    /// Read JSON commands on stdin and answer on stdout instead of the demo run
    #[arg(long)]
    agent: bool,

    /// Partial `CrisisParams` JSON overriding the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Export the finished run's report here (`.json` or binary)
    #[arg(long)]
    report: Option<PathBuf>,

    /// Tick limit for the demo run
    #[arg(long)]
    max_ticks: Option<u64>,
}

fn load_params(path: Option<&PathBuf>) -> Result<CrisisParams, String> {
    let Some(path) = path else {
        return Ok(CrisisParams::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    CrisisParams::from_json(&text).map_err(|e| format!("{}: {e}", path.display()))
}

fn main() {
    let cli = Cli::parse();

    let result = load_params(cli.config.as_ref()).and_then(|params| {
        if cli.agent {
            agent_mode::run_agent_mode(params);
            Ok(())
        } else {
            demo::run_demo(params, cli.report.as_deref(), cli.max_ticks)
        }
    });

    if let Err(message) = result {
        eprintln!("sentinelgov: {message}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::error::ErrorKind;

    #[test]
    fn test_no_arguments_is_demo_mode() {
        let cli = Cli::try_parse_from(["sentinelgov"]).unwrap();
        assert_eq!(cli, Cli::default());
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "sentinelgov",
            "--agent",
            "--config",
            "params.json",
            "--report",
            "out/run.sgrp",
            "--max-ticks",
            "500",
        ])
        .unwrap();
        assert!(cli.agent);
        assert_eq!(cli.config, Some(PathBuf::from("params.json")));
        assert_eq!(cli.report, Some(PathBuf::from("out/run.sgrp")));
        assert_eq!(cli.max_ticks, Some(500));
    }

    #[test]
    fn test_missing_value_and_unknown_flag() {
        let missing = Cli::try_parse_from(["sentinelgov", "--config"]).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::InvalidValue);

        let bad_ticks = Cli::try_parse_from(["sentinelgov", "--max-ticks", "soon"]).unwrap_err();
        assert_eq!(bad_ticks.kind(), ErrorKind::ValueValidation);

        let unknown = Cli::try_parse_from(["sentinelgov", "--verbose"]).unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_partial_config_file_overrides_named_fields() {
        let path = std::env::temp_dir().join("sentinelgov_cli_params.json");
        std::fs::write(&path, r#"{ "governance": { "human_in_the_loop": true } }"#).unwrap();
        let params = load_params(Some(&path)).unwrap();
        assert!(params.governance.human_in_the_loop);
        assert_eq!(
            params.negotiation.max_rounds,
            CrisisParams::default().negotiation.max_rounds
        );
        let _ = std::fs::remove_file(&path);

        assert!(load_params(Some(&PathBuf::from("/nonexistent/params.json"))).is_err());
    }
}
