//! Redaction of credential-shaped parameters before they are recorded

use serde_json::{Map, Value};

/// Mask a secret, keeping the first and last 4 characters
///
/// Secrets of 8 characters or fewer are fully masked.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let len = chars.len();

    if len <= 8 {
        return "*".repeat(len);
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[len - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(len - 8), tail)
}

/// Normalized key suffixes that mark a credential
const CREDENTIAL_SUFFIXES: &[&str] = &["apikey", "secret", "privatekey"];

fn is_credential(key: &str) -> bool {
    let normalized: String = key
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .collect::<String>()
        .to_ascii_lowercase();
    CREDENTIAL_SUFFIXES.iter().any(|suffix| normalized.ends_with(suffix))
}

/// Copy of `params` with every credential-shaped string value masked, at any depth
///
/// Covers `api_key`, `api_secret`, `secret` and `private_key` in any casing
/// or separator style.
pub fn sanitize_params(params: &Value) -> Value {
    match params {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let value = match value {
                    Value::String(secret) if is_credential(key) => Value::String(mask_secret(secret)),
                    other => sanitize_params(other),
                };
                out.insert(key.clone(), value);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_params).collect()),
        other => other.clone(),
    }
}
