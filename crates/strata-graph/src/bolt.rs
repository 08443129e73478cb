//! Conversion from JSON parameter values to bolt protocol values.
//!
//! Job definitions and provider records carry dynamic `serde_json` values;
//! neo4rs only binds typed `BoltType` parameters, so everything crossing the
//! statement boundary goes through here.

use neo4rs::{BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType};
use serde_json::{Map, Value};

/// Convert a JSON value to its bolt equivalent.
///
/// Numbers that fit i64 become integers, everything else a float. Arrays and
/// objects convert recursively.
pub fn json_to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(v) => BoltType::Boolean(BoltBoolean::new(*v)),
        Value::Number(v) => {
            if let Some(i) = v.as_i64() {
                BoltType::Integer(BoltInteger::new(i))
            } else {
                BoltType::Float(BoltFloat::new(v.as_f64().unwrap_or(f64::NAN)))
            }
        }
        Value::String(v) => BoltType::String(BoltString::new(v)),
        Value::Array(items) => BoltType::List(BoltList {
            value: items.iter().map(json_to_bolt).collect(),
        }),
        Value::Object(map) => json_map_to_bolt(map),
    }
}

/// Convert a JSON object to a bolt map.
pub fn json_map_to_bolt(map: &Map<String, Value>) -> BoltType {
    BoltType::Map(BoltMap {
        value: map
            .iter()
            .map(|(k, v)| (BoltString::new(k), json_to_bolt(v)))
            .collect(),
    })
}

/// Convert a batch of record objects to a bolt list of maps, suitable for
/// binding to an `UNWIND $Records` statement.
pub fn records_to_bolt(records: &[Map<String, Value>]) -> BoltType {
    BoltType::List(BoltList {
        value: records.iter().map(json_map_to_bolt).collect(),
    })
}
