//! Identifier and value types shared by every actor.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::PlaneIdError;

/// Position or velocity: (x, y, z) in simulation units.
pub type Vector = nalgebra::Vector3<f64>;

/// Maximum plane id length in bytes.
pub const PLANE_ID_CAPACITY: usize = 15;

/// Short fixed-capacity aircraft identifier.
///
/// Stored inline so it is `Copy` and can travel inside fixed-layout messages.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneId {
    bytes: [u8; PLANE_ID_CAPACITY],
    len: u8,
}

impl PlaneId {
    /// Creates a plane id. Input is taken verbatim: empty, over-long or
    /// whitespace-bearing ids are rejected, never trimmed.
    pub fn new(id: &str) -> Result<Self, PlaneIdError> {
        if id.is_empty() {
            return Err(PlaneIdError::Empty);
        }
        if id.chars().any(char::is_whitespace) {
            return Err(PlaneIdError::Whitespace(id.to_string()));
        }
        if id.len() > PLANE_ID_CAPACITY {
            return Err(PlaneIdError::TooLong(id.to_string()));
        }

        let mut bytes = [0u8; PLANE_ID_CAPACITY];
        bytes[..id.len()].copy_from_slice(id.as_bytes());
        Ok(Self {
            bytes,
            len: id.len() as u8,
        })
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        // Built from a &str, so the prefix is always valid UTF-8.
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or_default()
    }
}

impl FromStr for PlaneId {
    type Err = PlaneIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for PlaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Debug for PlaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlaneId({})", self.as_str())
    }
}

impl Serialize for PlaneId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PlaneId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PlaneId::new(&raw).map_err(de::Error::custom)
    }
}

/// Serializable view of one aircraft, without its correction link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneReport {
    pub id: PlaneId,
    pub position: Vector,
    pub velocity: Vector,
}

impl PlaneReport {
    pub fn new(id: PlaneId, position: Vector, velocity: Vector) -> Self {
        Self {
            id,
            position,
            velocity,
        }
    }
}
