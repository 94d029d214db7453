//! Content fingerprints
//!
//! [`Fingerprint`] is a Blake3 digest of a value's JSON encoding. Feature
//! sets are fingerprinted so identical inputs can be matched up in logs.

use crate::error::ModelError;

/// A 32-byte content fingerprint (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint a serializable value through its JSON encoding
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn of<T>(value: &T) -> Result<Self, ModelError>
    where
        T: serde::Serialize,
    {
        let json = serde_json::to_vec(value).map_err(|e| ModelError::Fingerprint(e.to_string()))?;
        Ok(Self(*blake3::hash(&json).as_bytes()))
    }

    /// First 16 hex chars, for log lines
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_values_equal_fingerprints() {
        let a = Fingerprint::of(&serde_json::json!({"cpu": 8})).unwrap();
        let b = Fingerprint::of(&serde_json::json!({"cpu": 8})).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, Fingerprint::of(&serde_json::json!({"cpu": 9})).unwrap());
        assert_eq!(a.short().len(), 16);
    }
}
