//! SMTP transport arguments.
//!
//! All SMTP arguments are optional: when no host is configured the server
//! falls back to the logging mail sender, which is the local-dev default.

use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SMTP_HOST: &str = "smtp-host";
pub const ARG_SMTP_PORT: &str = "smtp-port";
pub const ARG_SMTP_SECURE: &str = "smtp-secure";
pub const ARG_SMTP_USER: &str = "smtp-user";
pub const ARG_SMTP_PASS: &str = "smtp-pass";
pub const ARG_SMTP_FROM: &str = "smtp-from";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long(ARG_SMTP_HOST)
                .help("SMTP relay host (omit to log emails instead of sending)")
                .env("PORTCULLIS_SMTP_HOST"),
        )
        .arg(
            Arg::new(ARG_SMTP_PORT)
                .long(ARG_SMTP_PORT)
                .help("SMTP relay port")
                .env("PORTCULLIS_SMTP_PORT")
                .default_value("587")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SMTP_SECURE)
                .long(ARG_SMTP_SECURE)
                .help("Use implicit TLS instead of STARTTLS")
                .env("PORTCULLIS_SMTP_SECURE")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SMTP_USER)
                .long(ARG_SMTP_USER)
                .help("SMTP username")
                .env("PORTCULLIS_SMTP_USER")
                .requires(ARG_SMTP_HOST),
        )
        .arg(
            Arg::new(ARG_SMTP_PASS)
                .long(ARG_SMTP_PASS)
                .help("SMTP password")
                .env("PORTCULLIS_SMTP_PASS")
                .requires(ARG_SMTP_USER),
        )
        .arg(
            Arg::new(ARG_SMTP_FROM)
                .long(ARG_SMTP_FROM)
                .help("Sender address for transactional email (defaults to --smtp-user)")
                .env("PORTCULLIS_SMTP_FROM"),
        )
}

#[derive(Debug, Clone)]
pub struct Options {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub user: Option<String>,
    pub pass: Option<SecretString>,
    pub from: Option<String>,
}

impl Options {
    /// Extract SMTP options, or `None` when no host is configured.
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Option<Self> {
        let host = matches.get_one::<String>(ARG_SMTP_HOST).cloned()?;
        Some(Self {
            host,
            port: matches
                .get_one::<u16>(ARG_SMTP_PORT)
                .copied()
                .unwrap_or(587),
            secure: matches.get_flag(ARG_SMTP_SECURE),
            user: matches.get_one::<String>(ARG_SMTP_USER).cloned(),
            pass: matches
                .get_one::<String>(ARG_SMTP_PASS)
                .cloned()
                .map(SecretString::from),
            from: matches.get_one::<String>(ARG_SMTP_FROM).cloned(),
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
    fn absent_host_means_no_options() {
        temp_env::with_vars([("PORTCULLIS_SMTP_HOST", None::<&str>)], || {
            let matches = matches_for(&[]);
            assert!(Options::parse(&matches).is_none());
        });
    }

    #[test]
    fn host_with_defaults() {
        let matches = matches_for(&["--smtp-host", "smtp.example.com"]);
        let options = Options::parse(&matches).expect("options");
        assert_eq!(options.host, "smtp.example.com");
        assert_eq!(options.port, 587);
        assert!(!options.secure);
        assert!(options.from.is_none());
    }
}
