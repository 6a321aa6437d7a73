//! Process-wide tracing setup shared by the engine binaries.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the process.
///
/// Filtering follows `RUST_LOG`, defaulting to `info` globally with debug
/// detail for the engine's own crates (turn decisions, refocus triggers,
/// visibility warnings). Output is plain single-line text; set
/// `LOG_FORMAT=json` when the logs feed a collector.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,tableforge_engine=debug,tableforge_infra=debug")
    });

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
