//! QR payloads for registrants.
//!
//! The payload is what gets encoded into the QR code shown at the event
//! entrance: the registrant's columns plus the table name, as base64 JSON.
//! Rendering the image is left to the client.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::Value;

use crate::db::Record;
use crate::error::AppResult;

/// Columns never encoded into a QR payload.
pub const QR_BLACKLIST: &[&str] = &["paid"];

/// Build the QR payload for a record.
pub fn payload<R: Record>(record: &R) -> AppResult<String> {
    let mut data = match serde_json::to_value(record)? {
        Value::Object(map) => map,
        other => {
            return Err(crate::error::AppError::Internal(format!(
                "record of {} serialized to {}",
                R::TABLE,
                other
            )))
        }
    };
    for column in QR_BLACKLIST {
        data.remove(*column);
    }
    data.insert("table".to_string(), Value::String(R::TABLE.to_string()));

    let json = serde_json::to_vec(&Value::Object(data))?;
    Ok(BASE64.encode(json))
}

/// Decode a payload back into its JSON object.
#[cfg(test)]
pub fn decode(payload: &str) -> Option<serde_json::Map<String, Value>> {
    let bytes = BASE64.decode(payload).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::CodexDecember2019;
    use crate::db::RowState;

    #[test]
    fn test_payload_drops_blacklist_and_adds_table() {
        let record = CodexDecember2019 {
            id: 12,
            name: "Ravi".to_string(),
            email: "ravi@example.com".to_string(),
            phone: "9876543210".to_string(),
            department: "IT".to_string(),
            year: Some("2".to_string()),
            paid: true,
            state: RowState::Transient,
        };

        let decoded = decode(&payload(&record).unwrap()).unwrap();
        assert_eq!(decoded["table"], "codex_december_2019");
        assert_eq!(decoded["id"], 12);
        assert_eq!(decoded["name"], "Ravi");
        assert!(!decoded.contains_key("paid"));
        assert!(!decoded.contains_key("state"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("%%%").is_none());
        assert!(decode(&BASE64.encode("[1,2]")).is_none());
    }
}
