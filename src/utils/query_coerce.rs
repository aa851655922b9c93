use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Parses a raw query string into a JSON object, coercing any bracketed
/// literal (`"[...]"`, `"{...}"`), including its percent-encoded form, into
/// its parsed JSON value before the caller's `Deserialize` impl ever sees it.
///
/// Some callers send JSON-in-query-string for multi-value fields
/// (`scope=["openid","email"]` instead of `scope=openid+email`); this is a
/// deliberate external contract, not an `eval`. Array literals are rejoined
/// as a space-delimited string, matching every multi-value field on this
/// wire (`scope`, `redirect_uris`, ...); object literals are re-serialized
/// to a compact JSON string so a `String` field still deserializes cleanly.
pub fn coerce_bracketed_query(raw: &str) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let mut parts = pair.splitn(2, '=');
        let key = parts.next().unwrap_or_default();
        let value = parts.next().unwrap_or_default();
        let key = urlencoding::decode(key)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| key.to_string());
        let value = urlencoding::decode(value)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| value.to_string());
        map.insert(key, coerce_value(&value));
    }
    serde_json::Value::Object(map)
}

fn coerce_value(value: &str) -> serde_json::Value {
    let trimmed = value.trim();
    let looks_bracketed = (trimmed.starts_with('[') && trimmed.ends_with(']'))
        || (trimmed.starts_with('{') && trimmed.ends_with('}'));
    if !looks_bracketed {
        return serde_json::Value::String(value.to_string());
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(items)) => {
            let joined = items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" ");
            serde_json::Value::String(joined)
        }
        Ok(parsed @ serde_json::Value::Object(_)) => serde_json::Value::String(parsed.to_string()),
        Ok(_) | Err(_) => serde_json::Value::String(value.to_string()),
    }
}

/// Query extractor that runs [`coerce_bracketed_query`] ahead of `T`'s
/// `Deserialize` impl. Drop-in replacement for `axum::extract::Query<T>` on
/// GET endpoints that may receive bracketed/JSON-ish query args.
pub struct TolerantQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for TolerantQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 S,
    ) -> core::pin::Pin<
        Box<dyn core::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let raw = parts.uri.query().unwrap_or_default();
            let value = coerce_bracketed_query(raw);
            let parsed = serde_json::from_value(value)
                .map_err(|e| AppError::ParamError(format!("invalid query parameters: {e}")))?;
            Ok(TolerantQuery(parsed))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_pass_through_untouched() {
        let value = coerce_bracketed_query("response_type=code&client_id=abc123");
        assert_eq!(value["response_type"], "code");
        assert_eq!(value["client_id"], "abc123");
    }

    #[test]
    fn bracketed_array_literal_joins_with_spaces() {
        let value = coerce_bracketed_query(r#"scope=["openid","email"]"#);
        assert_eq!(value["scope"], "openid email");
    }

    #[test]
    fn percent_encoded_bracketed_array_is_decoded_then_joined() {
        let value = coerce_bracketed_query("scope=%5B%22openid%22%2C%22email%22%5D");
        assert_eq!(value["scope"], "openid email");
    }

    #[test]
    fn malformed_bracketed_literal_falls_back_to_raw_string() {
        let value = coerce_bracketed_query("scope=%5Bnot%20json");
        assert_eq!(value["scope"], "[not json");
    }

    #[test]
    fn object_literal_is_reserialized_as_a_string() {
        let value = coerce_bracketed_query(r#"meta=%7B%22a%22%3A1%7D"#);
        assert_eq!(value["meta"], r#"{"a":1}"#);
    }
}
