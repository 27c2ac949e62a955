//! Tracing subscriber setup.
//!
//! The binary logs to stderr by default so stdout stays reserved for JSON
//! results. `RUST_LOG` takes precedence over the level chosen by flags.

use anyhow::{Result, anyhow};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Off,
    Stdout,
    Stderr,
    /// Append to a file.
    File(PathBuf),
}

impl FromStr for LogTarget {
    type Err = std::convert::Infallible;

    /// `0`/`off`, `1`/`stdout`, `2`/`stderr`, anything else is a file name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "0" | "off" => LogTarget::Off,
            "1" | "stdout" => LogTarget::Stdout,
            "2" | "stderr" => LogTarget::Stderr,
            filename => LogTarget::File(PathBuf::from(filename)),
        })
    }
}

fn filter_for(verbose: bool) -> EnvFilter {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber for the given target.
pub fn init(target: &LogTarget, verbose: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(filter_for(verbose));

    match target {
        LogTarget::Off => Ok(()),
        LogTarget::Stdout => builder
            .with_writer(std::io::stdout)
            .try_init()
            .map_err(|e| anyhow!(e)),
        LogTarget::Stderr => builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow!(e)),
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .try_init()
                .map_err(|e| anyhow!(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_and_named_targets() {
        assert_eq!("0".parse::<LogTarget>().unwrap(), LogTarget::Off);
        assert_eq!("off".parse::<LogTarget>().unwrap(), LogTarget::Off);
        assert_eq!("1".parse::<LogTarget>().unwrap(), LogTarget::Stdout);
        assert_eq!("stdout".parse::<LogTarget>().unwrap(), LogTarget::Stdout);
        assert_eq!("2".parse::<LogTarget>().unwrap(), LogTarget::Stderr);
        assert_eq!("stderr".parse::<LogTarget>().unwrap(), LogTarget::Stderr);
    }

    #[test]
    fn other_values_are_files() {
        assert_eq!(
            "logs/tasks.log".parse::<LogTarget>().unwrap(),
            LogTarget::File(PathBuf::from("logs/tasks.log"))
        );
    }

    #[test]
    fn off_installs_nothing() {
        assert!(init(&LogTarget::Off, true).is_ok());
    }
}
