//! Opaque continuation tokens.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// An opaque continuation token issued by the store.
///
/// The token wraps the store's "last evaluated key" for a page. Callers treat it
/// as an opaque string and hand it back unchanged to fetch the following page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Encode a store key into a cursor.
    pub fn encode(key: &Map<String, Value>) -> Result<Self, Error> {
        let bytes = serde_json::to_vec(key).map_err(|e| Error::InvalidCursor(e.to_string()))?;
        Ok(Self(hex::encode(bytes)))
    }

    /// Decode the store key carried by this cursor.
    pub fn decode(&self) -> Result<Map<String, Value>, Error> {
        let bytes = hex::decode(&self.0).map_err(|e| Error::InvalidCursor(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::InvalidCursor(e.to_string()))
    }

    /// Wrap a raw token string received from a caller.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cursor_decodes_key() {
        let key = json!({"id": "d2"}).as_object().cloned().unwrap();
        let cursor = Cursor::encode(&key).unwrap();

        assert!(cursor.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(cursor.decode().unwrap(), key);
    }

    #[test]
    fn test_garbage_token() {
        assert!(Cursor::from_token("not-hex").decode().is_err());
        assert!(Cursor::from_token("00ff").decode().is_err());
    }
}
