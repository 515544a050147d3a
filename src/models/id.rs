//! Object identifiers.
//!
//! Every persisted object is addressed by an immutable URN:
//!
//! ```text
//! urn:{namespace}:{Type}:{uuid}:{site}
//! ```
//!
//! Only the `urn:` scheme and at least three non-empty segments are
//! required when parsing; ids minted by [`ObjectId::generate`] always carry
//! all five.

use crate::models::ObjectType;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// URN namespace used for ids minted by this crate.
pub const ID_NAMESPACE: &str = "reclaim";

/// Globally unique, immutable identifier of a persisted object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Parses and validates an object id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the string is not a `urn:` with at
    /// least three non-empty segments.
    ///
    /// # Examples
    ///
    /// ```
    /// use reclaim::models::ObjectId;
    ///
    /// let id = ObjectId::parse("urn:reclaim:Volume:6f1c:site1")?;
    /// assert_eq!(id.type_segment(), Some("Volume"));
    /// assert!(ObjectId::parse("volume-1").is_err());
    /// # Ok::<(), reclaim::Error>(())
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("urn:")
            .ok_or_else(|| Error::InvalidInput(format!("object id must start with 'urn:': {s}")))?;

        let segments: Vec<&str> = rest.split(':').collect();
        if segments.len() < 3 || segments.iter().any(|segment| segment.is_empty()) {
            return Err(Error::InvalidInput(format!(
                "object id must have at least three non-empty segments: {s}"
            )));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(Error::InvalidInput(format!(
                "object id must not contain whitespace: {s}"
            )));
        }

        Ok(Self(s.to_string()))
    }

    /// Mints a new id for an object of `object_type` created on `site`.
    #[must_use]
    pub fn generate(object_type: ObjectType, site: &str) -> Self {
        Self(format!(
            "urn:{ID_NAMESPACE}:{}:{}:{site}",
            object_type.as_str(),
            uuid::Uuid::new_v4()
        ))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the type segment (`urn:ns:{Type}:...`), if present.
    #[must_use]
    pub fn type_segment(&self) -> Option<&str> {
        self.0.split(':').nth(2)
    }

    /// Returns the trailing site segment for five-segment ids.
    #[must_use]
    pub fn site(&self) -> Option<&str> {
        let segments: Vec<&str> = self.0.split(':').collect();
        (segments.len() >= 5).then(|| segments[segments.len() - 1])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("urn:reclaim:Volume:abc:site1" ; "full")]
    #[test_case("urn:storageos:Project:1" ; "three segments")]
    fn test_parse_accepts(input: &str) {
        let id = ObjectId::parse(input).expect("should parse");
        assert_eq!(id.as_str(), input);
    }

    #[test_case("" ; "empty")]
    #[test_case("Volume:abc" ; "missing scheme")]
    #[test_case("urn:reclaim:Volume" ; "too few segments")]
    #[test_case("urn:reclaim::abc:site1" ; "empty segment")]
    #[test_case("urn:reclaim:Volume:a b:site1" ; "whitespace")]
    fn test_parse_rejects(input: &str) {
        assert!(matches!(
            ObjectId::parse(input),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_generate_is_parseable() {
        let id = ObjectId::generate(ObjectType::Volume, "site1");
        let parsed = ObjectId::parse(id.as_str()).expect("generated id should parse");
        assert_eq!(parsed, id);
        assert_eq!(id.type_segment(), Some("Volume"));
        assert_eq!(id.site(), Some("site1"));
    }

    #[test]
    fn test_generate_is_unique() {
        let a = ObjectId::generate(ObjectType::Project, "site1");
        let b = ObjectId::generate(ObjectType::Project, "site1");
        assert_ne!(a, b);
    }

    #[test]
    fn test_serde_validates() {
        let id: ObjectId =
            serde_json::from_str("\"urn:reclaim:Volume:x:site1\"").expect("valid id");
        assert_eq!(id.as_str(), "urn:reclaim:Volume:x:site1");
        assert!(serde_json::from_str::<ObjectId>("\"nope\"").is_err());
    }
}
