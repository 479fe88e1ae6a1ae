//! Per-domain request headers
//!
//! Headers registered for a domain are applied to every retrieval against
//! that domain. Lookups are point-in-time snapshots.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};
use url::Url;

/// Reduce a domain, host or full address to its lower-case host name
///
/// Scheme, credentials, port, path, query and fragment are dropped.
pub fn normalize_domain(input: &str) -> String {
    let trimmed = input.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    if let Some(host) = Url::parse(&candidate)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
    {
        return host.trim_end_matches('.').to_string();
    }

    // Unparseable input: strip by hand so lookups still line up.
    let rest = trimmed.split_once("://").map_or(trimmed, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = host.split(':').next().unwrap_or_default();
    host.trim_end_matches('.').to_lowercase()
}

/// Process-lifetime store of headers keyed by normalized domain
#[derive(Debug, Default)]
pub struct HeaderStore {
    entries: RwLock<BTreeMap<String, HashMap<String, String>>>,
}

impl HeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the headers stored for `domain`, returning the normalized key
    pub fn set(&self, domain: &str, headers: HashMap<String, String>) -> String {
        let key = normalize_domain(domain);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), headers);
        key
    }

    /// Headers for `domain`; empty when none are stored
    pub fn get(&self, domain: &str) -> HashMap<String, String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_domain(domain))
            .cloned()
            .unwrap_or_default()
    }

    pub fn remove(&self, domain: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&normalize_domain(domain))
            .is_some()
    }

    /// Normalized domains with stored headers, in lexical order
    pub fn domains(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Stored headers for the domain of `url` overlaid with `request`
    ///
    /// Request headers win on a name clash (case-insensitive).
    pub fn merged(&self, url: &str, request: &HashMap<String, String>) -> HashMap<String, String> {
        let mut merged: HashMap<String, String> = self
            .get(url)
            .into_iter()
            .filter(|(name, _)| {
                !request
                    .keys()
                    .any(|override_name| override_name.eq_ignore_ascii_case(name))
            })
            .collect();
        merged.extend(request.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}
