//! The shared job-parameter map threaded through every module call.

use serde_json::{Map, Value};

use crate::tag::UpdateTag;

/// Key under which the update tag is always present.
pub const UPDATE_TAG: &str = "UPDATE_TAG";
/// Key injected by iterative statements to bound delete batches.
pub const LIMIT_SIZE: &str = "LIMIT_SIZE";

/// String-keyed scalar/array parameters passed to every cleanup and
/// analysis statement of a run.
///
/// Always contains `UPDATE_TAG`; scope identifiers (`AWS_ID`,
/// `AZURE_SUBSCRIPTION_ID`, `GCP_PROJECT_ID`, ...) are set while the
/// corresponding scope is being synced and removed afterwards. Optional
/// `pageNo`/`pageSize` entries carry continuation state for providers that
/// chunk large result sets; that state lives only within one process run.
#[derive(Debug, Clone)]
pub struct JobParameters {
    values: Map<String, Value>,
}

impl JobParameters {
    /// Create the parameter map for a run, seeding the update tag.
    pub fn new(update_tag: UpdateTag) -> Self {
        let mut values = Map::new();
        values.insert(UPDATE_TAG.to_string(), Value::from(update_tag.as_i64()));
        Self { values }
    }

    /// The run's update tag.
    pub fn update_tag(&self) -> UpdateTag {
        // Set in the constructor and never removed.
        self.values
            .get(UPDATE_TAG)
            .and_then(Value::as_i64)
            .map(UpdateTag::from)
            .unwrap_or(UpdateTag(0))
    }

    /// Set a scope identifier or other parameter for the current module.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Remove a parameter once its scope has finished syncing.
    pub fn unset(&mut self, key: &str) {
        self.values.remove(key);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Iterate over all entries, e.g. to bind them onto a statement.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Copy of the underlying map for merging into statement parameters.
    pub fn as_map(&self) -> Map<String, Value> {
        self.values.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_tag_is_seeded() {
        let params = JobParameters::new(UpdateTag(1700000000));
        assert_eq!(params.update_tag(), UpdateTag(1700000000));
        assert_eq!(params.get(UPDATE_TAG), Some(&Value::from(1700000000i64)));
    }

    #[test]
    fn scope_ids_can_be_set_and_unset() {
        let mut params = JobParameters::new(UpdateTag(1));
        params.set("AWS_ID", "111111111111");
        assert_eq!(params.get("AWS_ID"), Some(&Value::from("111111111111")));

        params.unset("AWS_ID");
        assert_eq!(params.get("AWS_ID"), None);
        // The tag survives scope changes.
        assert_eq!(params.update_tag(), UpdateTag(1));
    }
}
