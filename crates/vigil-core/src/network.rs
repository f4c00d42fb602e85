//! SSRF destination check. Fail-closed: anything that cannot be shown to be a
//! public http(s) destination is unsafe.

use async_trait::async_trait;
use ipnet::IpNet;
use lazy_static::lazy_static;
use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;
use url::{Host, Url};

pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(5);

lazy_static! {
    static ref BLOCKED_NETS: Vec<IpNet> = [
        "0.0.0.0/8",          // "this" network
        "10.0.0.0/8",
        "100.64.0.0/10",      // CGNAT
        "127.0.0.0/8",
        "169.254.0.0/16",     // link-local, cloud metadata
        "172.16.0.0/12",
        "192.0.0.0/24",
        "192.168.0.0/16",
        "198.18.0.0/15",
        "224.0.0.0/4",        // multicast
        "240.0.0.0/4",        // reserved, includes broadcast
        "::/128",
        "::1/128",
        "fc00::/7",           // unique local
        "fe80::/10",
        "ff00::/8",
    ]
    .iter()
    .map(|n| n.parse().unwrap())
    .collect();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlCheck {
    pub safe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl UrlCheck {
    fn safe() -> Self {
        Self {
            safe: true,
            reason: None,
        }
    }

    fn unsafe_because(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::warn!(event = "ssrf_block", reason = %reason, "destination rejected");
        Self {
            safe: false,
            reason: Some(reason),
        }
    }
}

#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolves through the operating system via `tokio::net::lookup_host`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|a| a.ip()).collect())
    }
}

pub fn is_blocked_ip(ip: &IpAddr) -> bool {
    let ip = match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => *ip,
        },
        IpAddr::V4(_) => *ip,
    };
    BLOCKED_NETS.iter().any(|net| net.contains(&ip))
}

/// Cheap pre-filter used by the wrapper to pick arguments worth checking.
pub fn looks_like_http_url(s: &str) -> bool {
    let s = s.trim_start();
    s.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("http://"))
        || s.get(..8).is_some_and(|p| p.eq_ignore_ascii_case("https://"))
}

fn check_ip(ip: IpAddr) -> UrlCheck {
    if is_blocked_ip(&ip) {
        return UrlCheck::unsafe_because(format!("address {ip} is in a private or reserved range"));
    }
    UrlCheck::safe()
}

pub async fn check_url(raw: &str, resolver: &dyn Resolver, timeout: Duration) -> UrlCheck {
    let url = match Url::parse(raw.trim()) {
        Ok(u) => u,
        Err(e) => return UrlCheck::unsafe_because(format!("invalid URL: {e}")),
    };

    if !matches!(url.scheme(), "http" | "https") {
        return UrlCheck::unsafe_because(format!("scheme '{}' is not allowed", url.scheme()));
    }

    let host = match url.host() {
        Some(h) => h,
        None => return UrlCheck::unsafe_because("URL has no host"),
    };

    let domain = match host {
        Host::Ipv4(v4) => return check_ip(IpAddr::V4(v4)),
        Host::Ipv6(v6) => return check_ip(IpAddr::V6(v6)),
        Host::Domain(d) => d.trim_end_matches('.').to_ascii_lowercase(),
    };
    if domain == "localhost" || domain.ends_with(".localhost") {
        return UrlCheck::unsafe_because(format!("host '{domain}' is local"));
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let lookup = resolver.resolve(&domain, port);
    let addrs = match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(addrs)) => addrs,
        Ok(Err(e)) => {
            return UrlCheck::unsafe_because(format!(
                "DNS resolution failed for '{domain}': {e}"
            ))
        }
        Err(_) => {
            return UrlCheck::unsafe_because(format!(
                "DNS resolution for '{domain}' timed out after {timeout:?}"
            ))
        }
    };

    if addrs.is_empty() {
        return UrlCheck::unsafe_because(format!("'{domain}' resolved to no addresses"));
    }
    if let Some(bad) = addrs.iter().find(|ip| is_blocked_ip(ip)) {
        return UrlCheck::unsafe_because(format!(
            "'{domain}' resolves to {bad}, a private or reserved address"
        ));
    }

    tracing::debug!(event = "ssrf_pass", host = %domain, "destination allowed");
    UrlCheck::safe()
}
