//! Record-level parsing with per-record skip.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Parse raw provider records into typed records, skipping (and logging)
/// individual records that do not match the expected shape. A provider
/// returning junk for one resource must not block ingestion of the rest.
pub fn parse_records<T: DeserializeOwned>(raw: Vec<Value>, resource: &str) -> Vec<T> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<T>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(resource, "Skipping malformed record: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Widget {
        id: String,
    }

    #[test]
    fn malformed_records_are_skipped_not_fatal() {
        let raw = vec![
            json!({"id": "w1"}),
            json!({"id": 7}),
            json!("not even an object"),
            json!({"id": "w2"}),
        ];
        let widgets: Vec<Widget> = parse_records(raw, "widgets");
        assert_eq!(widgets.len(), 2);
        assert_eq!(widgets[0].id, "w1");
        assert_eq!(widgets[1].id, "w2");
    }
}
