//! Tracing subscriber bootstrap.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// The filter is taken from `RUST_LOG` when set; otherwise `default_level`
/// is applied to the given binary/crate name and `warn` to everything else.
///
/// # Arguments
///
/// * `name` - Binary or crate name used as the default filter target
/// * `default_level` - Level applied to `name` when `RUST_LOG` is unset
pub fn setup_logger(name: &str, default_level: &str) {
    let fallback = format!("warn,{}={}", name.replace('-', "_"), default_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
