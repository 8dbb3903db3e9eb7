//! Default deduplication-key derivation.
//!
//! When a request carries no explicit key, the engine derives one as the
//! SHA-256 hex digest of `METHOD|url(+sorted query)|sorted body`. The key is
//! a pure function of those three components: identical requests always hash
//! identically, and any difference in method, URL, or body changes the key.

use crate::http::{Body, HttpParams, QueryParams};
use sha2::{Digest, Sha256};

/// Compute the default deduplication key for a request's HTTP parameters.
#[must_use]
pub fn default_key(params: &HttpParams) -> String {
    let mut hasher = Sha256::new();
    hasher.update(params.method.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(url_component(params).as_bytes());
    hasher.update(b"|");
    body_component(params.body.as_ref(), &mut hasher);
    format!("{:x}", hasher.finalize())
}

/// URL plus query parameters serialized in sorted order.
fn url_component(params: &HttpParams) -> String {
    match &params.query {
        None => params.url.clone(),
        Some(query) => {
            let sorted = query
                .sorted_pairs()
                .into_iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&");
            format!("{}?{sorted}", params.url)
        }
    }
}

/// Feed a request body into a hasher in its canonical sorted form. Shared
/// with the WARC replay cache, whose keys use the same body serialization.
pub(crate) fn body_component(body: Option<&Body>, hasher: &mut Sha256) {
    match body {
        None => {}
        Some(Body::Bytes(bytes)) => hasher.update(bytes),
        Some(Body::Form(form)) => {
            let mut pairs: Vec<_> = form.iter().collect();
            pairs.sort();
            for (k, v) in pairs {
                hasher.update(k.as_bytes());
                hasher.update(b"=");
                hasher.update(v.as_bytes());
                hasher.update(b"&");
            }
        }
        Some(Body::Json(value)) => hasher.update(sorted_json(value).as_bytes()),
    }
}

/// Serialize a JSON value with object keys sorted at every level.
fn sorted_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let inner = keys
                .into_iter()
                .map(|k| format!("{}:{}", serde_json::Value::from(k.clone()), sorted_json(&map[k])))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{inner}}}")
        }
        serde_json::Value::Array(items) => {
            let inner = items
                .iter()
                .map(sorted_json)
                .collect::<Vec<_>>()
                .join(",");
            format!("[{inner}]")
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn identical_requests_hash_identically() {
        let a = HttpParams::get("https://example.com/cases");
        let b = HttpParams::get("https://example.com/cases");
        assert_eq!(default_key(&a), default_key(&b));
    }

    #[test]
    fn method_url_and_body_all_contribute() {
        let base = HttpParams::get("https://example.com/cases");
        let other_method = HttpParams::post("https://example.com/cases");
        let other_url = HttpParams::get("https://example.com/dockets");
        let with_body = HttpParams::post("https://example.com/cases")
            .with_body(Body::Bytes(b"page=2".to_vec()));

        let keys = [
            default_key(&base),
            default_key(&other_method),
            default_key(&other_url),
            default_key(&with_body),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn query_order_is_normalized() {
        let mut forward = IndexMap::new();
        forward.insert("a".to_string(), "1".to_string());
        forward.insert("b".to_string(), "2".to_string());
        let mut reverse = IndexMap::new();
        reverse.insert("b".to_string(), "2".to_string());
        reverse.insert("a".to_string(), "1".to_string());

        let a = HttpParams::get("https://example.com/search").with_query_map(forward);
        let b = HttpParams::get("https://example.com/search").with_query_map(reverse);
        assert_eq!(default_key(&a), default_key(&b));

        let pairs = HttpParams::get("https://example.com/search").with_query_pairs(vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ]);
        assert_eq!(default_key(&a), default_key(&pairs));
    }

    #[test]
    fn json_body_keys_are_sorted_recursively() {
        let a = HttpParams::post("https://example.com/api")
            .with_json(serde_json::json!({"b": {"y": 2, "x": 1}, "a": 0}));
        let b = HttpParams::post("https://example.com/api")
            .with_json(serde_json::json!({"a": 0, "b": {"x": 1, "y": 2}}));
        assert_eq!(default_key(&a), default_key(&b));
    }

    #[test]
    fn form_body_sorted_by_key() {
        let mut forward = IndexMap::new();
        forward.insert("z".to_string(), "9".to_string());
        forward.insert("a".to_string(), "1".to_string());
        let mut reverse = IndexMap::new();
        reverse.insert("a".to_string(), "1".to_string());
        reverse.insert("z".to_string(), "9".to_string());

        let a = HttpParams::post("https://example.com/form").with_form(forward);
        let b = HttpParams::post("https://example.com/form").with_form(reverse);
        assert_eq!(default_key(&a), default_key(&b));
    }
}
