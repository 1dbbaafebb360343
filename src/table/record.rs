//! Engine-managed record keys and binary payload coding

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::errors::{TableError, TableResult};
use crate::schema::Schema;

/// A stored record
pub type Record = Map<String, Value>;

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Suffix of the metadata field kept beside each binary field
pub const METADATA_SUFFIX: &str = "_metadata";

/// Name of the metadata field for binary field `field`
pub fn metadata_field(field: &str) -> String {
    format!("{}{}", field, METADATA_SUFFIX)
}

/// Keys only the engine writes: `_id`, the timestamps and the metadata
/// field of each declared binary field
pub(crate) fn is_managed_key(key: &str, schema: &Schema) -> bool {
    if key == crate::index::ID_FIELD || key == CREATED_AT || key == UPDATED_AT {
        return true;
    }
    key.strip_suffix(METADATA_SUFFIX)
        .map(|field| schema.is_binary(field))
        .unwrap_or(false)
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time, RFC 3339 UTC
pub(crate) fn timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Decode a binary payload: base64 string or array of bytes
pub(crate) fn decode_binary(field: &str, value: &Value) -> TableResult<Vec<u8>> {
    let invalid = || TableError::InvalidDocument(format!("{} is not a valid binary payload", field));

    match value {
        Value::String(s) => STANDARD.decode(s).map_err(|_| invalid()),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

/// Encode bytes the way `find_by_id` returns them
pub fn encode_binary(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
