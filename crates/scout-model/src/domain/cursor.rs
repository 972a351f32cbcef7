use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct OffsetToken {
    offset: u64,
}

/// Encode a result-set offset as `base64({"offset": n})`.
pub fn encode_cursor(offset: u64) -> String {
    // Serializing a plain struct with one integer field cannot fail.
    let json = serde_json::to_vec(&OffsetToken { offset }).unwrap_or_default();
    STANDARD.encode(json)
}

/// Decode a cursor produced by [`encode_cursor`].
///
/// Empty, corrupt or foreign cursors decode to `0`: a bad cursor restarts
/// from the beginning instead of failing the request.
pub fn decode_cursor(cursor: &str) -> u64 {
    if cursor.is_empty() {
        return 0;
    }
    STANDARD
        .decode(cursor.trim())
        .ok()
        .and_then(|bytes| serde_json::from_slice::<OffsetToken>(&bytes).ok())
        .map(|token| token.offset)
        .unwrap_or(0)
}

/// Opaque pagination token.
///
/// The empty cursor means "start" on input and "no more data" on output.
/// Offset-based sources build cursors with [`Cursor::from_offset`]; other
/// sources may carry their own opaque tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn start() -> Self {
        Self(String::new())
    }

    pub fn from_offset(offset: u64) -> Self {
        Self(encode_cursor(offset))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Offset carried by this cursor (`0` for empty or unparsable tokens).
    pub fn offset(&self) -> u64 {
        decode_cursor(&self.0)
    }
}

impl From<String> for Cursor {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Cursor {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<Option<String>> for Cursor {
    fn from(value: Option<String>) -> Self {
        Self(value.unwrap_or_default())
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
