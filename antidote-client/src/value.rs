//! Values read from the database.

use crate::error::ClientError;
use antidote_protocol::proto::{ApbMapEntry, ApbReadObjectResp};
use antidote_protocol::{CrdtType, ProtocolError};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// Converts register values and set elements to and from their stored bytes.
///
/// A codec never sees empty input: empty bytes mean "no value" and are
/// handled before the codec is asked.
pub trait ValueCodec: Debug + Send + Sync {
    fn encode(&self, value: &Value) -> Result<Bytes, ClientError>;

    fn decode(&self, bytes: &[u8]) -> Result<Value, ClientError>;
}

/// Shared handle to a codec.
pub type SharedCodec = Arc<dyn ValueCodec>;

/// MessagePack codec, the default.
///
/// Objects are written as maps so that other clients can read them.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePack;

impl ValueCodec for MessagePack {
    fn encode(&self, value: &Value) -> Result<Bytes, ClientError> {
        Ok(Bytes::from(rmp_serde::to_vec_named(value)?))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, ClientError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// The default codec.
pub fn default_codec() -> SharedCodec {
    Arc::new(MessagePack)
}

/// Encodes a typed value through `codec`.
pub fn encode_value<T: Serialize + ?Sized>(
    codec: &dyn ValueCodec,
    value: &T,
) -> Result<Bytes, ClientError> {
    codec.encode(&serde_json::to_value(value)?)
}

/// Decodes stored bytes into a typed value. Empty input means "no value".
pub fn decode_value<T: DeserializeOwned>(
    codec: &dyn ValueCodec,
    bytes: &[u8],
) -> Result<Option<T>, ClientError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(codec.decode(bytes)?)?))
}

/// Empty elements read as `null` so that every stored element is kept.
fn decode_elements(codec: &dyn ValueCodec, elements: &[Bytes]) -> Result<Vec<Value>, ClientError> {
    elements
        .iter()
        .map(|bytes| Ok(decode_value(codec, bytes)?.unwrap_or(Value::Null)))
        .collect()
}

/// The value of one CRDT.
#[derive(Debug, Clone, PartialEq)]
pub enum CrdtValue {
    Counter(i32),
    Integer(i64),
    /// Last-writer-wins register; `None` if never assigned.
    Register(Option<Value>),
    /// All concurrently written values of a multi-value register.
    MvRegister(Vec<Value>),
    Set(Vec<Value>),
    Map(MapValue),
}

impl CrdtValue {
    /// Interprets a read response for an object of the given kind.
    pub fn decode(
        kind: CrdtType,
        resp: &ApbReadObjectResp,
        codec: &dyn ValueCodec,
    ) -> Result<Self, ClientError> {
        let missing = || ClientError::TypeMismatch {
            expected: kind.as_str(),
            actual: present_field(resp),
        };

        let value = match kind {
            CrdtType::Counter | CrdtType::Fatcounter => {
                CrdtValue::Counter(resp.counter.as_ref().ok_or_else(missing)?.value)
            }
            CrdtType::Integer => CrdtValue::Integer(resp.int.as_ref().ok_or_else(missing)?.value),
            CrdtType::Lwwreg => {
                CrdtValue::Register(decode_value(codec, &resp.reg.as_ref().ok_or_else(missing)?.value)?)
            }
            CrdtType::Mvreg => {
                CrdtValue::MvRegister(decode_elements(codec, &resp.mvreg.as_ref().ok_or_else(missing)?.values)?)
            }
            CrdtType::Orset | CrdtType::Rwset => {
                CrdtValue::Set(decode_elements(codec, &resp.set.as_ref().ok_or_else(missing)?.value)?)
            }
            CrdtType::Gmap | CrdtType::Awmap | CrdtType::Rrmap => {
                CrdtValue::Map(MapValue::decode(&resp.map.as_ref().ok_or_else(missing)?.entries, codec)?)
            }
        };
        Ok(value)
    }

    /// The value of an object of `kind` that has never been written.
    pub fn empty(kind: CrdtType) -> Self {
        match kind {
            CrdtType::Counter | CrdtType::Fatcounter => CrdtValue::Counter(0),
            CrdtType::Integer => CrdtValue::Integer(0),
            CrdtType::Lwwreg => CrdtValue::Register(None),
            CrdtType::Mvreg => CrdtValue::MvRegister(Vec::new()),
            CrdtType::Orset | CrdtType::Rwset => CrdtValue::Set(Vec::new()),
            CrdtType::Gmap | CrdtType::Awmap | CrdtType::Rrmap => CrdtValue::Map(MapValue::default()),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            CrdtValue::Counter(_) => "counter",
            CrdtValue::Integer(_) => "integer",
            CrdtValue::Register(_) => "register",
            CrdtValue::MvRegister(_) => "mv-register",
            CrdtValue::Set(_) => "set",
            CrdtValue::Map(_) => "map",
        }
    }

    /// Converts to plain JSON. Maps become objects keyed by entry key.
    pub fn to_json(&self) -> Value {
        match self {
            CrdtValue::Counter(v) => Value::from(*v),
            CrdtValue::Integer(v) => Value::from(*v),
            CrdtValue::Register(v) => v.clone().unwrap_or(Value::Null),
            CrdtValue::MvRegister(v) | CrdtValue::Set(v) => Value::Array(v.clone()),
            CrdtValue::Map(map) => map.to_json(),
        }
    }

    pub fn as_counter(&self) -> Option<i32> {
        match self {
            CrdtValue::Counter(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CrdtValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            CrdtValue::Map(map) => Some(map),
            _ => None,
        }
    }
}

fn present_field(resp: &ApbReadObjectResp) -> &'static str {
    if resp.counter.is_some() {
        "counter"
    } else if resp.set.is_some() {
        "set"
    } else if resp.reg.is_some() {
        "register"
    } else if resp.mvreg.is_some() {
        "mv-register"
    } else if resp.int.is_some() {
        "integer"
    } else if resp.map.is_some() {
        "map"
    } else {
        "nothing"
    }
}

/// One entry of a map value.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: String,
    pub kind: CrdtType,
    pub value: CrdtValue,
}

/// The value of a map CRDT.
///
/// Entries are identified by key *and* type: a map may hold a counter and a
/// set under the same key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapValue {
    entries: Vec<MapEntry>,
}

impl MapValue {
    fn decode(entries: &[ApbMapEntry], codec: &dyn ValueCodec) -> Result<Self, ClientError> {
        let entries = entries
            .iter()
            .map(|entry| {
                let kind = CrdtType::try_from(entry.key.r#type).map_err(|_| {
                    ClientError::UnexpectedResponse {
                        expected: "CRDT type in map key",
                        actual: entry.key.r#type.to_string(),
                    }
                })?;
                let key = String::from_utf8(entry.key.key.to_vec())
                    .map_err(|_| ClientError::Protocol(ProtocolError::InvalidUtf8))?;
                Ok(MapEntry {
                    key,
                    kind,
                    value: CrdtValue::decode(kind, &entry.value, codec)?,
                })
            })
            .collect::<Result<Vec<_>, ClientError>>()?;
        Ok(Self { entries })
    }

    /// Returns the value stored under `key` with type `kind`.
    pub fn get(&self, key: &str, kind: CrdtType) -> Option<&CrdtValue> {
        self.entries
            .iter()
            .find(|e| e.kind == kind && e.key == key)
            .map(|e| &e.value)
    }

    /// Removes and returns the value stored under `key` with type `kind`.
    pub fn take(&mut self, key: &str, kind: CrdtType) -> Option<CrdtValue> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.kind == kind && e.key == key)?;
        Some(self.entries.swap_remove(idx).value)
    }

    pub fn counter(&self, key: &str) -> Option<i32> {
        self.get(key, CrdtType::Counter).and_then(CrdtValue::as_counter)
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.get(key, CrdtType::Integer).and_then(CrdtValue::as_integer)
    }

    pub fn register(&self, key: &str) -> Option<&Value> {
        match self.get(key, CrdtType::Lwwreg)? {
            CrdtValue::Register(v) => v.as_ref(),
            _ => None,
        }
    }

    pub fn mv_register(&self, key: &str) -> Option<&[Value]> {
        match self.get(key, CrdtType::Mvreg)? {
            CrdtValue::MvRegister(v) => Some(v),
            _ => None,
        }
    }

    pub fn set(&self, key: &str) -> Option<&[Value]> {
        match self.get(key, CrdtType::Orset)? {
            CrdtValue::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn rw_set(&self, key: &str) -> Option<&[Value]> {
        match self.get(key, CrdtType::Rwset)? {
            CrdtValue::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn gmap(&self, key: &str) -> Option<&MapValue> {
        self.get(key, CrdtType::Gmap).and_then(CrdtValue::as_map)
    }

    pub fn awmap(&self, key: &str) -> Option<&MapValue> {
        self.get(key, CrdtType::Awmap).and_then(CrdtValue::as_map)
    }

    pub fn rrmap(&self, key: &str) -> Option<&MapValue> {
        self.get(key, CrdtType::Rrmap).and_then(CrdtValue::as_map)
    }

    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts to a JSON object keyed by entry key, nested maps included.
    ///
    /// Entries that share a key collapse to the last one.
    pub fn to_json(&self) -> Value {
        let object = self
            .entries
            .iter()
            .map(|e| (e.key.clone(), e.value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(object)
    }
}
