//! Inbound query parameters, kept in arrival order.

use url::form_urlencoded;

/// Parameters that never influence the payload and are left out of cache keys.
const CACHE_NEUTRAL: &[&str] = &["api_key", "format"];

/// Ordered query parameters, preserved as the client sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse a raw query string (without the leading `?`).
    pub fn parse(raw: Option<&str>) -> Self {
        let pairs = raw
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self { pairs }
    }

    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self { pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == name)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Append `name=value` only when the client did not send `name`.
    pub fn with_default(mut self, name: &str, value: &str) -> Self {
        if !self.contains(name) {
            self.pairs.push((name.to_string(), value.to_string()));
        }
        self
    }

    /// Names from `field_list`, if the client restricted the result fields.
    pub fn field_list(&self) -> Option<Vec<&str>> {
        self.get("field_list").map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .collect()
        })
    }

    /// Deterministic encoding of the payload-relevant parameters.
    ///
    /// Drops `api_key` and `format`, sorts by name then value, and re-encodes.
    pub fn cache_fingerprint(&self) -> String {
        let mut relevant: Vec<&(String, String)> = self
            .pairs
            .iter()
            .filter(|(k, _)| !CACHE_NEUTRAL.contains(&k.as_str()))
            .collect();
        relevant.sort();

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in relevant {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }

    /// Re-encode all parameters in arrival order.
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}
