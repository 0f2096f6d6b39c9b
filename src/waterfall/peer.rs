//! Resolution of uninstrumented peers.
//!
//! A client span calling something that emits no telemetry of its own (a
//! database, a cache, an external API) only names its peer through
//! attributes. A resolver turns those attributes into a display name.

use crate::core::otel_compliance::attributes::{
    NET_PEER_NAME, NET_PEER_PORT, PEER_SERVICE, SERVER_ADDRESS, SERVER_PORT,
};
use crate::core::types::{find_attribute_string, Span};
use std::collections::HashMap;

pub trait PeerResolver: Send + Sync {
    /// Display name of the peer a span talks to, if known
    fn resolve_peer_name(&self, span: &Span) -> Option<String>;
}

/// Resolver that never resolves anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPeerResolver;

impl PeerResolver for NoPeerResolver {
    fn resolve_peer_name(&self, _span: &Span) -> Option<String> {
        None
    }
}

/// Resolver backed by a fixed address → name map.
///
/// Addresses are matched case-insensitively, with the port first and then
/// without it.
#[derive(Debug, Default, Clone)]
pub struct StaticPeerResolver {
    peers: HashMap<String, String>,
}

impl StaticPeerResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps an address such as `db:5432` or `cache` to a display name
    pub fn with_peer<A: AsRef<str>, N: Into<String>>(mut self, address: A, name: N) -> Self {
        self.peers
            .insert(address.as_ref().to_lowercase(), name.into());
        self
    }

    fn lookup(&self, address: &str) -> Option<String> {
        self.peers.get(&address.to_lowercase()).cloned()
    }
}

impl PeerResolver for StaticPeerResolver {
    fn resolve_peer_name(&self, span: &Span) -> Option<String> {
        let attr = |key: &str| find_attribute_string(&span.attributes, key);

        if let Some(name) = attr(PEER_SERVICE).and_then(|peer| self.lookup(&peer)) {
            return Some(name);
        }

        let pairs = [(SERVER_ADDRESS, SERVER_PORT), (NET_PEER_NAME, NET_PEER_PORT)];
        for (host_key, port_key) in pairs {
            let Some(host) = attr(host_key) else {
                continue;
            };
            if let Some(port) = attr(port_key) {
                if let Some(name) = self.lookup(&format!("{}:{}", host, port)) {
                    return Some(name);
                }
            }
            if let Some(name) = self.lookup(&host) {
                return Some(name);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AttributeValue, KeyValue};
    use crate::waterfall::test_support::{resource, span};

    fn span_with(attributes: Vec<KeyValue>) -> Span {
        let mut span = Span::clone(&span(&resource("app"), 1, None, 0));
        span.attributes = attributes;
        span
    }

    #[test]
    fn test_resolves_address_with_port() {
        let resolver = StaticPeerResolver::new()
            .with_peer("db:5432", "postgres")
            .with_peer("db", "db-any-port");
        let span = span_with(vec![
            KeyValue::string(SERVER_ADDRESS, "DB"),
            KeyValue::new(SERVER_PORT, AttributeValue::Int(5432)),
        ]);
        assert_eq!(resolver.resolve_peer_name(&span).as_deref(), Some("postgres"));
    }

    #[test]
    fn test_falls_back_to_bare_host() {
        let resolver = StaticPeerResolver::new().with_peer("cache", "redis");
        let span = span_with(vec![
            KeyValue::string(NET_PEER_NAME, "cache"),
            KeyValue::new(NET_PEER_PORT, AttributeValue::Int(6379)),
        ]);
        assert_eq!(resolver.resolve_peer_name(&span).as_deref(), Some("redis"));
    }

    #[test]
    fn test_unknown_peer() {
        let resolver = StaticPeerResolver::new().with_peer("cache", "redis");
        let span = span_with(vec![KeyValue::string(PEER_SERVICE, "billing")]);
        assert_eq!(resolver.resolve_peer_name(&span), None);
        assert_eq!(NoPeerResolver.resolve_peer_name(&span), None);
    }
}
