//! HTTP surface arguments: CORS origins and rate limiting.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_CORS_ORIGINS: &str = "cors-origins";
pub const ARG_RATE_LIMIT_WINDOW_MS: &str = "rate-limit-window-ms";
pub const ARG_RATE_LIMIT_MAX: &str = "rate-limit-max";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CORS_ORIGINS)
                .long(ARG_CORS_ORIGINS)
                .help("Comma-separated list of allowed CORS origins")
                .env("PORTCULLIS_CORS_ORIGINS")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_WINDOW_MS)
                .long(ARG_RATE_LIMIT_WINDOW_MS)
                .help("Rate limit window in milliseconds")
                .env("PORTCULLIS_RATE_LIMIT_WINDOW_MS")
                .default_value("900000")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_MAX)
                .long(ARG_RATE_LIMIT_MAX)
                .help("Max requests per source address per window")
                .env("PORTCULLIS_RATE_LIMIT_MAX")
                .default_value("100")
                .value_parser(clap::value_parser!(u32)),
        )
}

#[derive(Debug, Clone)]
pub struct Options {
    pub cors_origins: Vec<String>,
    pub rate_limit_window_ms: u64,
    pub rate_limit_max: u32,
}

impl Options {
    /// Extract HTTP options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let origins = matches
            .get_one::<String>(ARG_CORS_ORIGINS)
            .cloned()
            .context("missing required argument: --cors-origins")?;

        let cors_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(ToString::to_string)
            .collect();

        Ok(Self {
            cors_origins,
            rate_limit_window_ms: matches
                .get_one::<u64>(ARG_RATE_LIMIT_WINDOW_MS)
                .copied()
                .unwrap_or(900_000),
            rate_limit_max: matches
                .get_one::<u32>(ARG_RATE_LIMIT_MAX)
                .copied()
                .unwrap_or(100),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches_for(args: &[&str]) -> ArgMatches {
        let command = with_args(clap::Command::new("test"));
        command.get_matches_from([&["test"], args].concat())
    }

    #[test]
    fn origins_are_split_and_trimmed() -> Result<()> {
        let matches = matches_for(&[
            "--cors-origins",
            "http://localhost:3000, https://app.example.com ,",
        ]);
        let options = Options::parse(&matches)?;
        assert_eq!(
            options.cors_origins,
            vec![
                "http://localhost:3000".to_string(),
                "https://app.example.com".to_string()
            ]
        );
        Ok(())
    }

    #[test]
    fn rate_limit_defaults() -> Result<()> {
        let matches = matches_for(&[]);
        let options = Options::parse(&matches)?;
        assert_eq!(options.rate_limit_window_ms, 900_000);
        assert_eq!(options.rate_limit_max, 100);
        Ok(())
    }
}
