//! Command line interface

use clap::{Parser, Subcommand};
use landing_judge_config::constants::paths;

#[derive(Parser, Debug)]
#[command(name = "landing-judge")]
#[command(about = "Landing rating overlay for flight sim streams")]
#[command(version)]
pub struct Cli {
    /// Settings file shared with the control API
    #[arg(long, global = true, env = "LANDING_JUDGE_SETTINGS", default_value = paths::SETTINGS_FILE)]
    pub settings: String,

    /// Verbose logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the overlay server (default)
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
        /// Override the configured bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Rate a landing on a running server
    Vote {
        /// 1 to 10; out-of-range values are clamped by the server
        #[arg(allow_negative_numbers = true)]
        score: i64,
        #[arg(long)]
        url: Option<String>,
    },

    /// Show or hide the preview banner
    Preview {
        #[arg(long)]
        off: bool,
        #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
        score: i64,
        #[arg(long)]
        url: Option<String>,
    },

    /// Set the overlay hue rotation
    Theme {
        /// Degrees, 0 to 360
        deg: i64,
        #[arg(long)]
        url: Option<String>,
    },

    /// Delete every cached audio clip
    ClearCache {
        #[arg(long)]
        url: Option<String>,
    },

    /// Print overlay events as they arrive
    Watch {
        #[arg(long)]
        url: Option<String>,
    },
}

impl Command {
    /// Explicit server URL given to a client command
    pub fn url(&self) -> Option<&str> {
        match self {
            Command::Serve { .. } => None,
            Command::Vote { url, .. }
            | Command::Preview { url, .. }
            | Command::Theme { url, .. }
            | Command::ClearCache { url }
            | Command::Watch { url } => url.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_no_command() {
        let cli = Cli::try_parse_from(["landing-judge"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.debug);
    }

    #[test]
    fn test_vote_accepts_negative_scores() {
        let cli = Cli::try_parse_from(["landing-judge", "vote", "-4"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Vote {
                score: -4,
                url: None
            })
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "landing-judge",
            "preview",
            "--off",
            "--url",
            "http://localhost:9000",
            "--settings",
            "custom.env",
        ])
        .unwrap();
        assert_eq!(cli.settings, "custom.env");
        let command = cli.command.unwrap();
        assert_eq!(command.url(), Some("http://localhost:9000"));
        assert!(matches!(command, Command::Preview { off: true, score: 10, .. }));
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from(["landing-judge", "serve", "--port", "6000"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Serve {
                port: Some(6000),
                host: None
            })
        );
    }
}
