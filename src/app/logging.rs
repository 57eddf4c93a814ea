// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const QUIET_DEPENDENCIES: &str =
    "h2=warn,hyper=warn,hyper_util=warn,reqwest=warn,alloy_transport_http=warn,alloy_rpc_client=warn";

/// Expands a bare level (e.g. "debug") with quiet defaults for HTTP/RPC crates.
/// Custom directive strings (with ',' or '=') are respected as-is.
pub fn filter_spec(log_level: &str) -> String {
    let normalized = log_level.trim();
    if normalized.is_empty() {
        return format!("info,{QUIET_DEPENDENCIES}");
    }
    if normalized.contains(',') || normalized.contains('=') {
        normalized.to_string()
    } else {
        format!("{normalized},{QUIET_DEPENDENCIES}")
    }
}

pub fn setup_logging(log_level: &str, json_format: bool) {
    // RUST_LOG wins over the configured level when present.
    let spec = std::env::var("RUST_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| filter_spec(log_level));
    let filter = EnvFilter::from_str(&spec).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = if json_format {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false);
        subscriber.with(json_layer).try_init()
    } else {
        let fmt_layer = fmt::layer().with_target(true).compact();
        subscriber.with(fmt_layer).try_init()
    };

    if installed.is_err() {
        // A global subscriber already exists (tests, embedding binaries).
        return;
    }

    tracing::debug!(
        target: "logging",
        filter = %spec,
        format = if json_format { "json" } else { "compact" },
        "Logging initialized"
    );
}

#[cfg(test)]
mod tests {
    use super::filter_spec;

    #[test]
    fn bare_level_gets_quiet_dependency_defaults() {
        let spec = filter_spec("debug");
        assert!(spec.starts_with("debug,"));
        assert!(spec.contains("hyper=warn"));
    }

    #[test]
    fn directive_strings_pass_through() {
        assert_eq!(
            filter_spec("info,oxidity_batcher=trace"),
            "info,oxidity_batcher=trace"
        );
        assert!(filter_spec("  ").starts_with("info,"));
    }
}
