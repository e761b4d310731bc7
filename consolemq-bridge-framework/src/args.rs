//! CLI argument parsing for bridges.

use std::path::PathBuf;

use clap::Args;

/// Common CLI arguments for all bridges.
///
/// Flatten into a bridge's own argument struct with `#[command(flatten)]`.
#[derive(Args, Debug, Clone, Default)]
pub struct BridgeArgs {
    /// Path to an optional configuration file (JSON5 format).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(flatten)]
        bridge: BridgeArgs,
    }

    #[test]
    fn test_args_flatten() {
        let cli = Cli::parse_from(["bridge", "-c", "test.json5", "--log-level", "debug"]);
        assert_eq!(cli.bridge.config, Some(PathBuf::from("test.json5")));
        assert_eq!(cli.bridge.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_args_optional() {
        let cli = Cli::parse_from(["bridge"]);
        assert!(cli.bridge.config.is_none());
        assert!(cli.bridge.log_level.is_none());
    }
}
