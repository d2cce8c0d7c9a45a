use crate::cli::{actions::Action, commands, dispatch};
use anyhow::Result;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// Map verbosity count to tracing level
const fn get_verbosity_level(verbosity: u8) -> tracing::Level {
    match verbosity {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

/// Main entry point for the CLI - builds and returns the Action
///
/// # Errors
///
/// Returns an error if argument parsing, logging initialization, or action
/// dispatch fails
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity_level = get_verbosity_level(
        matches
            .get_one::<u8>(commands::logging::ARG_VERBOSITY)
            .copied()
            .unwrap_or(0),
    );

    let fmt_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_target(false);

    // RUST_LOG= overrides the -v mapping when set
    let env_filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.into())
        .from_env_lossy();

    let subscriber = Registry::default().with(fmt_layer).with(env_filter);

    tracing::subscriber::set_global_default(subscriber)?;

    let action = dispatch::handler(&matches)?;

    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_mapping() {
        assert_eq!(get_verbosity_level(0), tracing::Level::ERROR);
        assert_eq!(get_verbosity_level(1), tracing::Level::WARN);
        assert_eq!(get_verbosity_level(2), tracing::Level::INFO);
        assert_eq!(get_verbosity_level(3), tracing::Level::DEBUG);
        assert_eq!(get_verbosity_level(4), tracing::Level::TRACE);
        assert_eq!(get_verbosity_level(255), tracing::Level::TRACE);
    }
}
