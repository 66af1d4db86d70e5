//! Cache key derivation.
//!
//! A request is rendered as canonical JSON (object keys sorted at every
//! depth, no whitespace) and hashed with SHA-256. Field order in the caller's
//! request never affects the result.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use shared::Result;

/// Fingerprint an arbitrary structured request.
pub fn fingerprint(request: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(request, &mut canonical);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Fingerprint any serializable request type.
pub fn fingerprint_of<T: Serialize + ?Sized>(request: &T) -> Result<String> {
    let value = serde_json::to_value(request)?;
    Ok(fingerprint(&value))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (name, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Value's Display escapes the string as JSON
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                write_canonical(field, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_order_does_not_matter() {
        let a = json!({
            "start_time": "2023-12-30T22:30:00",
            "end_time": "2023-12-30T22:45:00",
            "bbox": [-150, -40, 14, 65],
            "options": {"plot_type": "map", "variable": "product/vertical_column"}
        });
        let b = json!({
            "options": {"variable": "product/vertical_column", "plot_type": "map"},
            "bbox": [-150, -40, 14, 65],
            "end_time": "2023-12-30T22:45:00",
            "start_time": "2023-12-30T22:30:00"
        });

        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_any_field_change_changes_fingerprint() {
        let base = json!({"start_time": "2023-12-30T22:30:00", "plot_type": "map"});
        let changed = json!({"start_time": "2023-12-30T22:31:00", "plot_type": "map"});
        let nested = json!({"start_time": "2023-12-30T22:30:00", "plot_type": ["map"]});

        assert_ne!(fingerprint(&base), fingerprint(&changed));
        assert_ne!(fingerprint(&base), fingerprint(&nested));
    }

    #[test]
    fn test_array_order_is_significant() {
        assert_ne!(
            fingerprint(&json!({"bbox": [1, 2, 3, 4]})),
            fingerprint(&json!({"bbox": [4, 3, 2, 1]}))
        );
    }

    #[test]
    fn test_fingerprint_shape() {
        let key = fingerprint(&json!({}));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_of_struct_matches_value() {
        #[derive(Serialize)]
        struct Request {
            variable: &'static str,
            start_time: &'static str,
        }

        let from_struct = fingerprint_of(&Request {
            variable: "no2",
            start_time: "2024-01-01T00:00:00",
        })
        .unwrap();
        let from_value = fingerprint(&json!({"start_time": "2024-01-01T00:00:00", "variable": "no2"}));

        assert_eq!(from_struct, from_value);
    }
}
