//! Network-symbol registry (spec §4.3): imported-symbol name → category.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::outcome::Category;

/// Read-only lookup from an imported dynamic-symbol name to its
/// network category. Overridable with a caller-supplied map (spec §6)
/// by constructing a [`NetworkSymbolRegistry`] directly rather than
/// going through [`default_registry`].
pub trait SymbolRegistry: Send + Sync {
    fn is_network_symbol(&self, name: &str) -> Option<Category>;
    /// Independent copy (spec §8 property 7).
    fn copy(&self) -> HashMap<String, Category>;
}

static DEFAULT_SYMBOLS: Lazy<HashMap<&'static str, Category>> = Lazy::new(|| {
    use Category::*;
    HashMap::from([
        ("socket", Socket),
        ("connect", Socket),
        ("accept", Socket),
        ("accept4", Socket),
        ("bind", Socket),
        ("listen", Socket),
        ("send", Socket),
        ("recv", Socket),
        ("sendto", Socket),
        ("recvfrom", Socket),
        ("sendmsg", Socket),
        ("recvmsg", Socket),
        ("getaddrinfo", Dns),
        ("gethostbyname", Dns),
        ("res_query", Dns),
        ("SSL_connect", Tls),
        ("SSL_read", Tls),
        ("SSL_write", Tls),
        ("SSL_CTX_new", Tls),
        ("gnutls_handshake", Tls),
        ("curl_easy_init", Http),
        ("curl_easy_perform", Http),
        ("curl_easy_setopt", Http),
    ])
});

/// A map-backed registry. Construct with [`NetworkSymbolRegistry::default`]
/// for the built-in table, or [`NetworkSymbolRegistry::from_map`] with a
/// caller-supplied map (e.g. for tests).
#[derive(Debug, Clone)]
pub struct NetworkSymbolRegistry {
    symbols: HashMap<String, Category>,
}

impl NetworkSymbolRegistry {
    pub fn from_map(symbols: HashMap<String, Category>) -> Self {
        Self { symbols }
    }
}

impl Default for NetworkSymbolRegistry {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }
}

impl SymbolRegistry for NetworkSymbolRegistry {
    fn is_network_symbol(&self, name: &str) -> Option<Category> {
        self.symbols.get(name).copied()
    }

    fn copy(&self) -> HashMap<String, Category> {
        self.symbols.clone()
    }
}
