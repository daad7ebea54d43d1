//! Inbound path → resource identifier.

use super::{QueryParams, ResourceType};
use crate::Error;

/// Identifies one cacheable entity across all tiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub resource_type: ResourceType,
    pub resource_id: String,
}

impl ResourceKey {
    pub fn detail(resource_type: ResourceType, id: u64) -> Self {
        Self { resource_type, resource_id: id.to_string() }
    }

    /// Key under which a list response is cached.
    pub fn list(resource_type: ResourceType, query: &QueryParams) -> Self {
        let fingerprint = query.cache_fingerprint();
        let resource_id = if fingerprint.is_empty() { "list".to_string() } else { format!("list?{fingerprint}") };
        Self { resource_type, resource_id }
    }

    /// Numeric id for detail keys; `None` for list keys.
    pub fn numeric_id(&self) -> Option<i64> {
        self.resource_id.parse().ok()
    }
}

/// A parsed inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRequest {
    Detail { key: ResourceKey, query: QueryParams },
    List { resource_type: ResourceType, query: QueryParams },
}

impl ResourceRequest {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceRequest::Detail { key, .. } => key.resource_type,
            ResourceRequest::List { resource_type, .. } => *resource_type,
        }
    }

    pub fn query(&self) -> &QueryParams {
        match self {
            ResourceRequest::Detail { query, .. } | ResourceRequest::List { query, .. } => query,
        }
    }

    /// Cache key for this request.
    pub fn cache_key(&self) -> ResourceKey {
        match self {
            ResourceRequest::Detail { key, .. } => key.clone(),
            ResourceRequest::List { resource_type, query } => ResourceKey::list(*resource_type, query),
        }
    }

    /// Canonical upstream path, rebuilt with the type's own prefix.
    pub fn upstream_path(&self) -> String {
        match self {
            ResourceRequest::Detail { key, .. } => {
                let spec = key.resource_type.spec();
                match spec.prefix {
                    Some(prefix) => format!("/api/{}/{}-{}/", spec.singular, prefix, key.resource_id),
                    None => format!("/api/{}/{}/", spec.singular, key.resource_id),
                }
            }
            ResourceRequest::List { resource_type, .. } => format!("/api/{}/", resource_type.spec().plural),
        }
    }
}

/// Parse `/api/{type}/{prefix}-{id}` or `/api/{plural}` plus its query.
///
/// The id prefix is only a hint: an unexpected or missing prefix is accepted
/// as long as the numeric id parses.
pub fn parse_request(path: &str, raw_query: Option<&str>) -> Result<ResourceRequest, Error> {
    let unrecognized = || Error::UnrecognizedResource(path.to_string());

    let rest = path.strip_prefix("/api/").ok_or_else(unrecognized)?;
    let segments: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
    let query = QueryParams::parse(raw_query);

    match segments.as_slice() {
        [plural] => {
            let resource_type = ResourceType::from_plural(plural).ok_or_else(unrecognized)?;
            Ok(ResourceRequest::List { resource_type, query })
        }
        [singular, identifier] => {
            let resource_type = ResourceType::from_singular(singular).ok_or_else(unrecognized)?;
            let (prefix, id) = match identifier.rsplit_once('-') {
                Some((prefix, id)) => (Some(prefix), id),
                None => (None, *identifier),
            };
            if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
                return Err(unrecognized());
            }
            let id: u64 = id.parse().map_err(|_| unrecognized())?;

            let expected = resource_type.spec().prefix;
            if prefix != expected {
                tracing::debug!(
                    resource_type = %resource_type,
                    prefix = prefix.unwrap_or(""),
                    expected = expected.unwrap_or(""),
                    "id prefix does not match resource type"
                );
            }

            Ok(ResourceRequest::Detail { key: ResourceKey::detail(resource_type, id), query })
        }
        _ => Err(unrecognized()),
    }
}
