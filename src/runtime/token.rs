//! Tokens, payloads, and the producer/consumer type contract
//!
//! A token carries exactly one payload plus provenance. Tokens are not
//! `Clone`: handing one to `input()` moves it, so the producer cannot keep or
//! mutate it afterwards. The payload sits behind an `Arc` so side channels
//! (publish/subscribe, rendering) can share a reference to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Runtime type of a payload, as declared by `accepts()`/`generates()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    /// Not yet determined; satisfies every check and defers the real one
    Unknown,
    /// UTF-8 text
    String,
    /// Signed 64-bit integer
    Integer,
    /// 64-bit float
    Double,
    /// Boolean flag
    Boolean,
    /// Raw bytes
    Bytes,
    /// Structured JSON document
    Json,
}

impl DataType {
    /// All concrete (non-`Unknown`) types
    pub const CONCRETE: [DataType; 6] = [
        DataType::String,
        DataType::Integer,
        DataType::Double,
        DataType::Boolean,
        DataType::Bytes,
        DataType::Json,
    ];
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Unknown => "Unknown",
            DataType::String => "String",
            DataType::Integer => "Integer",
            DataType::Double => "Double",
            DataType::Boolean => "Boolean",
            DataType::Bytes => "Bytes",
            DataType::Json => "Json",
        };
        f.write_str(name)
    }
}

/// Set of data types an actor accepts or generates
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeSet(BTreeSet<DataType>);

impl TypeSet {
    /// The empty set
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// `{Unknown}`, reported by late-bound actors before resolution
    pub fn unknown() -> Self {
        Self::of(&[DataType::Unknown])
    }

    /// Every concrete type
    pub fn any_concrete() -> Self {
        Self::of(&DataType::CONCRETE)
    }

    /// Build a set from a slice
    pub fn of(types: &[DataType]) -> Self {
        Self(types.iter().copied().collect())
    }

    /// Whether the set contains the given type
    pub fn contains(&self, data_type: DataType) -> bool {
        self.0.contains(&data_type)
    }

    /// Whether the set contains the `Unknown` wildcard
    pub fn is_unknown(&self) -> bool {
        self.contains(DataType::Unknown)
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the types in order
    pub fn iter(&self) -> impl Iterator<Item = DataType> + '_ {
        self.0.iter().copied()
    }

    /// Whether a payload of the given type may be fed to a consumer with this set
    pub fn admits(&self, data_type: DataType) -> bool {
        self.is_unknown() || self.contains(data_type)
    }
}

impl FromIterator<DataType> for TypeSet {
    fn from_iter<I: IntoIterator<Item = DataType>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(|t| t.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// Outcome of checking a producer -> consumer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// The sets share at least one concrete type
    Compatible,
    /// One side is `Unknown`; the real check happens after resolution
    Deferred,
    /// No common type
    Incompatible,
}

impl Compatibility {
    /// Whether assembly may proceed
    pub fn is_ok(self) -> bool {
        !matches!(self, Compatibility::Incompatible)
    }
}

/// Check the type contract between a producer and a consumer
pub fn check_compatibility(generates: &TypeSet, accepts: &TypeSet) -> Compatibility {
    if generates.is_unknown() || accepts.is_unknown() {
        return Compatibility::Deferred;
    }

    if generates.0.intersection(&accepts.0).next().is_some() {
        Compatibility::Compatible
    } else {
        Compatibility::Incompatible
    }
}

/// Payload value carried by a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum Payload {
    /// UTF-8 text
    String(String),
    /// Signed 64-bit integer
    Integer(i64),
    /// 64-bit float
    Double(f64),
    /// Boolean flag
    Boolean(bool),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Structured JSON document
    Json(serde_json::Value),
}

impl Payload {
    /// Runtime type of this payload
    pub fn data_type(&self) -> DataType {
        match self {
            Payload::String(_) => DataType::String,
            Payload::Integer(_) => DataType::Integer,
            Payload::Double(_) => DataType::Double,
            Payload::Boolean(_) => DataType::Boolean,
            Payload::Bytes(_) => DataType::Bytes,
            Payload::Json(_) => DataType::Json,
        }
    }

    /// Borrow as text, if this is a string payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::String(s) => f.write_str(s),
            Payload::Integer(i) => write!(f, "{}", i),
            Payload::Double(d) => write!(f, "{}", d),
            Payload::Boolean(b) => write!(f, "{}", b),
            Payload::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Payload::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::String(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::String(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Integer(value)
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Double(value)
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Boolean(value)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

/// Provenance of a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// Full name of the actor that generated the token
    pub origin: String,
    /// When the token was created
    pub created_at: DateTime<Utc>,
}

/// Immutable, singly-owned data unit passed between actors
#[derive(Debug)]
pub struct Token {
    id: Uuid,
    payload: Arc<Payload>,
    provenance: Option<Provenance>,
}

impl Token {
    /// Create a token without provenance
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: Arc::new(payload.into()),
            provenance: None,
        }
    }

    /// Create a token stamped with its originating actor
    pub fn from_actor(origin: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: Arc::new(payload.into()),
            provenance: Some(Provenance {
                origin: origin.into(),
                created_at: Utc::now(),
            }),
        }
    }

    /// Identity of this token
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Borrow the payload
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Shared reference to the payload, for fan-out side channels
    pub fn shared_payload(&self) -> Arc<Payload> {
        Arc::clone(&self.payload)
    }

    /// Runtime type of the payload
    pub fn data_type(&self) -> DataType {
        self.payload.data_type()
    }

    /// Provenance, if the producer stamped one
    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    /// Name of the originating actor, if known
    pub fn origin(&self) -> Option<&str> {
        self.provenance.as_ref().map(|p| p.origin.as_str())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.payload)
    }
}
