use serde::{Deserialize, Serialize};

use crate::Cursor;

/// Result envelope handed back to the job distributor.
///
/// Exactly one of `data` / `error` is meaningful. A non-empty `next_cursor`
/// means more pages may exist; empty means end of data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    #[serde(default, with = "bytes_serde")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub next_cursor: Cursor,
    #[serde(default)]
    pub error: String,
}

impl JobResult {
    pub fn ok(data: Vec<u8>, next_cursor: Cursor) -> Self {
        Self {
            data,
            next_cursor,
            error: String::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            next_cursor: Cursor::start(),
            error: error.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Opaque payload travels as base64 on the wire.
mod bytes_serde {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        STANDARD.decode(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_carries_only_error() {
        let r = JobResult::failed("boom");
        assert!(r.is_error());
        assert!(r.data.is_empty());
        assert!(r.next_cursor.is_empty());
    }

    #[test]
    fn envelope_json_shape() {
        let r = JobResult::ok(b"[1]".to_vec(), Cursor::from("next"));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["data"], "WzFd");
        assert_eq!(json["nextCursor"], "next");
        assert_eq!(json["error"], "");

        let back: JobResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}
