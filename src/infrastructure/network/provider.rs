// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::chain::Chain;
use crate::domain::error::AppError;
use alloy::network::Ethereum;
use alloy::providers::RootProvider;
use std::collections::HashSet;
use url::Url;

pub type HttpProvider = RootProvider<Ethereum>;

pub struct ConnectionFactory;

impl ConnectionFactory {
    pub fn http(rpc_url: &Url) -> HttpProvider {
        RootProvider::new_http(rpc_url.clone())
    }

    pub fn parse_http(rpc_url: &str) -> Result<Url, AppError> {
        let url = Url::parse(rpc_url.trim())
            .map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(AppError::Config(format!(
                "Unsupported RPC scheme '{other}' for {} (http/https only)",
                redact_url(&url)
            ))),
        }
    }
}

/// `scheme://host[:port]`, dropping paths, queries and credentials.
pub fn redact_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or("unknown");
    match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    }
}

/// Configured URLs followed by the chain's keyed provider URL for each extra API
/// key, de-duplicated in order.
pub fn build_rpc_urls(
    chain: Chain,
    configured: &[String],
    extra_api_keys: &[String],
) -> Result<Vec<Url>, AppError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for raw in configured.iter().filter(|s| !s.trim().is_empty()) {
        let url = ConnectionFactory::parse_http(raw)?;
        if seen.insert(url.as_str().to_string()) {
            out.push(url);
        }
    }
    for key in extra_api_keys.iter().filter(|s| !s.trim().is_empty()) {
        let url = chain.keyed_provider_url(key)?;
        if seen.insert(url.as_str().to_string()) {
            out.push(url);
        }
    }

    if out.is_empty() {
        return Err(AppError::Config(format!(
            "No RPC endpoints configured for {chain} (set RPC_ENDPOINTS or EXTRA_API_KEYS)"
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_dedupes_in_order() {
        let urls = build_rpc_urls(
            Chain::Base,
            &[
                "https://rpc.one".to_string(),
                "https://rpc.one".to_string(),
                " ".to_string(),
            ],
            &["k1".to_string(), "k1".to_string(), "k2".to_string()],
        )
        .unwrap();
        let rendered: Vec<&str> = urls.iter().map(Url::as_str).collect();
        assert_eq!(
            rendered,
            vec![
                "https://rpc.one/",
                "https://base-mainnet.g.alchemy.com/v2/k1",
                "https://base-mainnet.g.alchemy.com/v2/k2",
            ]
        );
    }

    #[test]
    fn empty_endpoint_list_is_configuration_error() {
        assert!(matches!(
            build_rpc_urls(Chain::Ether, &[], &[]),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(ConnectionFactory::parse_http("wss://rpc.example").is_err());
        assert!(ConnectionFactory::parse_http("not a url").is_err());
    }

    #[test]
    fn redaction_keeps_scheme_host_port() {
        let url = Url::parse("http://user:pw@localhost:8545/v2/key?x=1").unwrap();
        assert_eq!(redact_url(&url), "http://localhost:8545");
    }
}
