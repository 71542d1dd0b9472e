//! `-v` / `-q` flags controlling how much `apiary` logs.
//!
//! Without flags only warnings and errors are shown.
//! - `-q` shows errors only, `-qq` silences logging
//! - `-v` shows info
//! - `-vv` shows debug
//! - `-vvv` shows trace

use log::LevelFilter;
use serde::Deserialize;

/// Index of the default level in [`LEVELS`]
const DEFAULT_LEVEL: i8 = 2;

const LEVELS: [LevelFilter; 6] = [
    LevelFilter::Off,
    LevelFilter::Error,
    LevelFilter::Warn,
    LevelFilter::Info,
    LevelFilter::Debug,
    LevelFilter::Trace,
];

#[derive(clap::Args, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Verbosity {
    /// More log output per occurrence
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "quiet"
    )]
    verbose: u8,

    /// Less log output per occurrence
    #[arg(
        long,
        short = 'q',
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "verbose"
    )]
    quiet: u8,
}

impl Verbosity {
    /// The most verbose level to log
    pub(crate) fn log_level_filter(self) -> LevelFilter {
        #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        let index = (DEFAULT_LEVEL + self.verbose as i8 - self.quiet as i8)
            .clamp(0, LEVELS.len() as i8 - 1) as usize;
        LEVELS[index]
    }
}

// Deserialized from a level name such as "info" or "Warning", so that the
// configuration file can set the verbosity
impl<'de> Deserialize<'de> for Verbosity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let target = match s.to_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            level => {
                return Err(serde::de::Error::custom(format!(
                    "invalid log level `{level}`"
                )));
            }
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let offset = target as i8 - DEFAULT_LEVEL;
        #[allow(clippy::cast_sign_loss)]
        Ok(if offset >= 0 {
            Self {
                verbose: offset as u8,
                quiet: 0,
            }
        } else {
            Self {
                verbose: 0,
                quiet: offset.unsigned_abs(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::{CommandFactory, Parser};

    #[derive(Debug, Parser)]
    struct Cli {
        #[clap(flatten)]
        verbose: Verbosity,
    }

    #[test]
    fn verify_app() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_level() {
        assert_eq!(Verbosity::default().log_level_filter(), LevelFilter::Warn);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from(["apiary", "-vv"]);
        assert_eq!(cli.verbose.log_level_filter(), LevelFilter::Debug);

        let cli = Cli::parse_from(["apiary", "-qqqq"]);
        assert_eq!(cli.verbose.log_level_filter(), LevelFilter::Off);

        let cli = Cli::parse_from(["apiary", "-vvvvvv"]);
        assert_eq!(cli.verbose.log_level_filter(), LevelFilter::Trace);
    }

    #[test]
    fn test_deserialize_level_name() {
        #[derive(Deserialize)]
        struct Config {
            verbose: Verbosity,
        }

        let config: Config = toml::from_str(r#"verbose = "Info""#).unwrap();
        assert_eq!(config.verbose.log_level_filter(), LevelFilter::Info);

        let config: Config = toml::from_str(r#"verbose = "error""#).unwrap();
        assert_eq!(config.verbose.log_level_filter(), LevelFilter::Error);

        assert!(toml::from_str::<Config>(r#"verbose = "loud""#).is_err());
    }
}
