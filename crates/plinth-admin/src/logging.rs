//! Tracing subscriber setup

use crate::settings::AdminSettings;
use tracing_subscriber::{EnvFilter, fmt};

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to `settings.log_level`
///
/// Returns `true` if this call installed the subscriber and `false` if one was already set.
pub fn init_logging(settings: &AdminSettings) -> bool {
	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(&settings.log_level))
		.unwrap_or_else(|_| EnvFilter::new("info"));
	fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}
