//! Upstream-shaped response envelopes and `field_list` projection.

use serde_json::{Map, Value, json};

/// Upper bound the upstream API applies to `limit`.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Wrap a single result the way the upstream detail endpoints do.
pub fn detail_envelope(result: Value) -> Value {
    json!({
        "error": "OK",
        "limit": 1,
        "offset": 0,
        "number_of_page_results": 1,
        "number_of_total_results": 1,
        "status_code": 1,
        "results": result,
        "version": "1.0",
    })
}

/// Wrap one page of results the way the upstream list endpoints do.
pub fn list_envelope(results: Vec<Value>, total: u64, limit: u32, offset: u32) -> Value {
    json!({
        "error": "OK",
        "limit": limit,
        "offset": offset,
        "number_of_page_results": results.len(),
        "number_of_total_results": total,
        "status_code": 1,
        "results": results,
        "version": "1.0",
    })
}

/// Restrict every object under `results` to the named top-level fields.
///
/// Non-envelope payloads and non-object results are left untouched.
pub fn project_fields(payload: &mut Value, fields: &[&str]) {
    if fields.is_empty() {
        return;
    }
    match payload.get_mut("results") {
        Some(Value::Object(result)) => retain_fields(result, fields),
        Some(Value::Array(results)) => {
            for result in results.iter_mut() {
                if let Value::Object(obj) = result {
                    retain_fields(obj, fields);
                }
            }
        }
        _ => {}
    }
}

fn retain_fields(obj: &mut Map<String, Value>, fields: &[&str]) {
    obj.retain(|key, _| fields.contains(&key.as_str()));
}
