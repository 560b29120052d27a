//! Opaque feed cursor: URL-safe base64 of camelCase JSON taken from the last
//! row of a page. Decode failures are treated as "no cursor" by callers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub importance_score: i64,
    pub last_signal_at: DateTime<Utc>,
    pub id: Uuid,
}

impl Cursor {
    pub fn encode(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(raw.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cursor() -> Cursor {
        Cursor {
            importance_score: 12429,
            last_signal_at: Utc.with_ymd_and_hms(2026, 3, 14, 12, 30, 0).unwrap(),
            id: Uuid::parse_str("00000000-0000-0000-0000-00000000beef").unwrap(),
        }
    }

    #[test]
    fn round_trips() {
        let c = cursor();
        assert_eq!(Cursor::decode(&c.encode()), Some(c));
    }

    #[test]
    fn encoding_is_url_safe() {
        let encoded = cursor().encode();
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('='));
    }

    #[test]
    fn json_fields_are_camel_case() {
        let c = cursor();
        let decoded = URL_SAFE_NO_PAD.decode(c.encode()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(json["importanceScore"], 12429);
        assert!(json["lastSignalAt"].is_string());
        assert_eq!(json["id"], "00000000-0000-0000-0000-00000000beef");
    }

    #[test]
    fn garbage_decodes_to_none() {
        assert_eq!(Cursor::decode("not base64 at all!!"), None);
        assert_eq!(Cursor::decode(&URL_SAFE_NO_PAD.encode("{\"nope\":1}")), None);
    }
}
