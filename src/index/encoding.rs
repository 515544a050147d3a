//! Byte-comparable composite column names.
//!
//! A column name is the tuple `(discriminator, secondary, time-token, target)`
//! encoded so that byte-wise comparison of two encoded names equals tuple
//! comparison of the decoded values:
//!
//! ```text
//! escape(discriminator) 00 00 escape(secondary) 00 00 token[16] escape(target) 00 00
//! ```
//!
//! `escape` replaces every `00` byte with `00 FF`. The `00 00` terminator
//! therefore sorts below any continuation, so a string sorts before every
//! string it is a proper prefix of. UTF-8 never contains `FF`, which keeps
//! [`prefix_successor`] a strict upper bound for prefix scans.

use crate::models::{ObjectId, TimeToken};
use crate::{Error, Result};
use std::fmt;
use std::ops::Bound;

const ESCAPE: u8 = 0x00;
const ESCAPED_NUL: u8 = 0xFF;
const TERMINATOR: [u8; 2] = [0x00, 0x00];

/// Decoded composite index column name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexColumnName {
    /// Type of the object named by `target`.
    pub discriminator: String,
    /// Secondary value: relation field name, folded label, or empty.
    pub secondary: String,
    /// When the entry was written (or the object decommissioned).
    pub time_token: TimeToken,
    /// Object the entry points at.
    pub target: ObjectId,
}

impl IndexColumnName {
    /// Creates a column name.
    #[must_use]
    pub fn new(
        discriminator: impl Into<String>,
        secondary: impl Into<String>,
        time_token: TimeToken,
        target: ObjectId,
    ) -> Self {
        Self {
            discriminator: discriminator.into(),
            secondary: secondary.into(),
            time_token,
            target,
        }
    }

    /// Encodes the name into its byte-comparable form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        build_column_name(
            &self.discriminator,
            &self.secondary,
            self.time_token,
            &self.target,
        )
    }

    /// Decodes an encoded name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataIntegrity`] if the bytes are truncated, carry a
    /// bad escape, are not UTF-8, or the target is not a valid object id.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut pos = 0;
        let discriminator = read_component(bytes, &mut pos)?;
        let secondary = read_component(bytes, &mut pos)?;

        let token_end = pos + TimeToken::LEN;
        let token_bytes = bytes
            .get(pos..token_end)
            .ok_or_else(|| Error::DataIntegrity("column name truncated in time-token".into()))?;
        let time_token = TimeToken::from_slice(token_bytes)?;
        pos = token_end;

        let target = read_component(bytes, &mut pos)?;
        if pos != bytes.len() {
            return Err(Error::DataIntegrity(format!(
                "column name has {} trailing bytes",
                bytes.len() - pos
            )));
        }
        let target = ObjectId::parse(&target)
            .map_err(|e| Error::DataIntegrity(format!("column target is not an object id: {e}")))?;

        Ok(Self {
            discriminator,
            secondary,
            time_token,
            target,
        })
    }
}

impl fmt::Display for IndexColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.discriminator, self.secondary, self.time_token, self.target
        )
    }
}

/// Builds an encoded column name from its components.
#[must_use]
pub fn build_column_name(
    discriminator: &str,
    secondary: &str,
    time_token: TimeToken,
    target: &ObjectId,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        discriminator.len() + secondary.len() + target.as_str().len() + TimeToken::LEN + 6,
    );
    push_component(&mut out, discriminator);
    push_component(&mut out, secondary);
    out.extend_from_slice(time_token.as_bytes());
    push_component(&mut out, target.as_str());
    out
}

/// Encoded prefix matching every column of one discriminator.
#[must_use]
pub fn discriminator_prefix(discriminator: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(discriminator.len() + 2);
    push_component(&mut out, discriminator);
    out
}

/// Encoded prefix matching columns whose secondary value equals `secondary`.
#[must_use]
pub fn secondary_exact_prefix(discriminator: &str, secondary: &str) -> Vec<u8> {
    let mut out = discriminator_prefix(discriminator);
    push_component(&mut out, secondary);
    out
}

/// Encoded prefix matching columns whose secondary value starts with `prefix`.
#[must_use]
pub fn secondary_starts_with(discriminator: &str, prefix: &str) -> Vec<u8> {
    let mut out = discriminator_prefix(discriminator);
    push_escaped(&mut out, prefix);
    out
}

/// Smallest byte string greater than every string starting with `prefix`.
///
/// Returns `None` when no such bound exists (empty or all-`FF` prefix).
#[must_use]
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.pop() {
        if last < u8::MAX {
            bound.push(last + 1);
            return Some(bound);
        }
    }
    None
}

/// Half-open column range `[prefix, successor(prefix))`.
#[must_use]
pub fn prefix_bounds(prefix: Vec<u8>) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    let end = prefix_successor(&prefix).map_or(Bound::Unbounded, Bound::Excluded);
    (Bound::Included(prefix), end)
}

/// Case-folds a label for case-insensitive matching.
#[must_use]
pub fn normalize_label(label: &str) -> String {
    label.to_lowercase()
}

fn push_escaped(out: &mut Vec<u8>, s: &str) {
    for &byte in s.as_bytes() {
        if byte == ESCAPE {
            out.extend_from_slice(&[ESCAPE, ESCAPED_NUL]);
        } else {
            out.push(byte);
        }
    }
}

fn push_component(out: &mut Vec<u8>, s: &str) {
    push_escaped(out, s);
    out.extend_from_slice(&TERMINATOR);
}

fn read_component(bytes: &[u8], pos: &mut usize) -> Result<String> {
    let mut buf = Vec::new();
    loop {
        match bytes.get(*pos) {
            None => {
                return Err(Error::DataIntegrity(
                    "column name truncated in string component".into(),
                ));
            },
            Some(&ESCAPE) => match bytes.get(*pos + 1) {
                Some(&ESCAPE) => {
                    *pos += 2;
                    break;
                },
                Some(&ESCAPED_NUL) => {
                    buf.push(ESCAPE);
                    *pos += 2;
                },
                _ => {
                    return Err(Error::DataIntegrity(format!(
                        "invalid escape sequence at byte {}",
                        *pos
                    )));
                },
            },
            Some(&byte) => {
                buf.push(byte);
                *pos += 1;
            },
        }
    }
    String::from_utf8(buf)
        .map_err(|e| Error::DataIntegrity(format!("column component is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObjectType;

    fn id(n: u32) -> ObjectId {
        ObjectId::parse(&format!("urn:reclaim:Volume:{n:04}:site1")).expect("valid id")
    }

    #[test]
    fn test_encode_decode_inverse() {
        let name = IndexColumnName::new("Volume", "project", TimeToken::now(), id(1));
        let decoded = IndexColumnName::decode(&name.encode()).expect("decodes");
        assert_eq!(decoded, name);
    }

    #[test]
    fn test_embedded_nul_survives() {
        let name = IndexColumnName::new("Vol\0ume", "a\0b", TimeToken::now(), id(2));
        let decoded = IndexColumnName::decode(&name.encode()).expect("decodes");
        assert_eq!(decoded.discriminator, "Vol\0ume");
        assert_eq!(decoded.secondary, "a\0b");
    }

    #[test]
    fn test_shorter_secondary_sorts_first() {
        let token = TimeToken::now();
        let short = IndexColumnName::new("Volume", "ab", token, id(9)).encode();
        let long = IndexColumnName::new("Volume", "abc", token, id(1)).encode();
        let with_nul = IndexColumnName::new("Volume", "ab\0", token, id(1)).encode();
        assert!(short < long);
        assert!(short < with_nul);
    }

    #[test]
    fn test_secondary_before_time_token() {
        let older = TimeToken::now();
        let newer = TimeToken::now();
        let a = IndexColumnName::new("Volume", "b", older, id(1)).encode();
        let b = IndexColumnName::new("Volume", "a", newer, id(1)).encode();
        assert!(b < a);
    }

    #[test]
    fn test_time_token_before_target() {
        let older = TimeToken::now();
        let newer = TimeToken::now();
        let a = IndexColumnName::new("Volume", "x", older, id(9)).encode();
        let b = IndexColumnName::new("Volume", "x", newer, id(1)).encode();
        assert!(a < b);
    }

    #[test]
    fn test_decode_rejects_invalid_target() {
        let mut bytes = Vec::new();
        push_component(&mut bytes, "Volume");
        push_component(&mut bytes, "");
        bytes.extend_from_slice(TimeToken::now().as_bytes());
        push_component(&mut bytes, "not-an-id");
        assert!(matches!(
            IndexColumnName::decode(&bytes),
            Err(Error::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(IndexColumnName::decode(&[]).is_err());
        assert!(IndexColumnName::decode(b"Volume").is_err());
        assert!(IndexColumnName::decode(&[b'a', 0x00, 0x07]).is_err());

        let mut trailing = IndexColumnName::new("V", "s", TimeToken::now(), id(3)).encode();
        trailing.push(b'x');
        assert!(IndexColumnName::decode(&trailing).is_err());
    }

    #[test]
    fn test_prefix_successor() {
        assert_eq!(prefix_successor(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_successor(&[0x61, 0xFF]), Some(vec![0x62]));
        assert_eq!(prefix_successor(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_successor(&[]), None);
    }

    #[test]
    fn test_starts_with_range_covers_matches_only() {
        let token = TimeToken::now();
        let (start, end) = prefix_bounds(secondary_starts_with("Volume", "lab"));
        let Bound::Included(start) = start else {
            unreachable!("prefix bounds start inclusively")
        };
        let Bound::Excluded(end) = end else {
            unreachable!("prefix has a successor")
        };

        let inside = ["lab", "lab\0", "label", "labz"];
        let outside = ["la", "lac", "LAB", "m"];
        for s in inside {
            let col = IndexColumnName::new("Volume", s, token, id(1)).encode();
            assert!(col >= start && col < end, "{s:?} should match");
        }
        for s in outside {
            let col = IndexColumnName::new("Volume", s, token, id(1)).encode();
            assert!(col < start || col >= end, "{s:?} should not match");
        }
        let other_type = IndexColumnName::new(ObjectType::Project.as_str(), "label", token, id(1));
        let other = other_type.encode();
        assert!(other < start || other >= end);
    }

    #[test]
    fn test_exact_range_excludes_longer_secondary() {
        let token = TimeToken::now();
        let (Bound::Included(start), Bound::Excluded(end)) =
            prefix_bounds(secondary_exact_prefix("Volume", "project"))
        else {
            unreachable!("exact prefix has both bounds")
        };
        let exact = IndexColumnName::new("Volume", "project", token, id(1)).encode();
        let longer = IndexColumnName::new("Volume", "projects", token, id(1)).encode();
        assert!(exact >= start && exact < end);
        assert!(longer >= end);
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Gold-VOL"), "gold-vol");
    }
}
