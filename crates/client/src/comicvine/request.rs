//! Outbound request construction.

use cvproxy_core::{Error, QueryParams};

/// Build the outbound query: the caller's parameters unchanged, plus the
/// configured key and `format=json` only where the caller left them out.
pub fn outbound_query(query: &QueryParams, api_key: Option<&str>) -> QueryParams {
    let query = match api_key {
        Some(key) => query.clone().with_default("api_key", key),
        None => query.clone(),
    };
    query.with_default("format", "json")
}

/// Join the configured base URL with an API path and encoded query.
pub fn endpoint(base_url: &str, path: &str, query: &QueryParams) -> Result<url::Url, Error> {
    let mut url = url::Url::parse(&format!("{}{}", base_url.trim_end_matches('/'), path))
        .map_err(|e| Error::InvalidInput(format!("invalid upstream URL: {e}")))?;
    if !query.is_empty() {
        url.set_query(Some(&query.to_query_string()));
    }
    Ok(url)
}

/// Strip the API key from a URL before it is logged.
pub fn redacted(url: &url::Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| if k == "api_key" { (k.into_owned(), "***".to_string()) } else { (k.into_owned(), v.into_owned()) })
        .collect();
    if !pairs.is_empty() {
        shown.query_pairs_mut().clear().extend_pairs(pairs);
    }
    shown.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_query_adds_missing_defaults() {
        let q = outbound_query(&QueryParams::parse(Some("filter=name:x")), Some("server-key"));
        assert_eq!(q.to_query_string(), "filter=name%3Ax&api_key=server-key&format=json");
    }

    #[test]
    fn test_outbound_query_keeps_client_values() {
        let q = outbound_query(&QueryParams::parse(Some("api_key=client&format=xml")), Some("server-key"));
        assert_eq!(q.get("api_key"), Some("client"));
        assert_eq!(q.get("format"), Some("xml"));
        assert_eq!(q.pairs().len(), 2);
    }

    #[test]
    fn test_outbound_query_without_configured_key() {
        let q = outbound_query(&QueryParams::default(), None);
        assert!(!q.contains("api_key"));
        assert_eq!(q.get("format"), Some("json"));
    }

    #[test]
    fn test_endpoint_joins_base_and_path() {
        let q = QueryParams::parse(Some("format=json"));
        let url = endpoint("https://comicvine.gamespot.com/", "/api/issue/4000-1/", &q).unwrap();
        assert_eq!(url.as_str(), "https://comicvine.gamespot.com/api/issue/4000-1/?format=json");

        let url = endpoint("http://127.0.0.1:9000/mirror", "/api/issues/", &QueryParams::default()).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/mirror/api/issues/");
    }

    #[test]
    fn test_endpoint_invalid_base() {
        assert!(matches!(endpoint("not a url", "/api/x/", &QueryParams::default()), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_redacted_hides_key() {
        let url = url::Url::parse("https://comicvine.gamespot.com/api/issues/?api_key=secret&limit=5").unwrap();
        let shown = redacted(&url);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("limit=5"));
    }
}
