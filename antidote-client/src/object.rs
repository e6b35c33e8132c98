//! Object references, typed CRDT handles and the factory trait.
//!
//! Handles only build update operations and name what to read; they never
//! talk to the server themselves. Pass the operations to
//! [`Client::update`](crate::Client::update) or a transaction, and read
//! through a [`Session`](crate::Session).

use crate::error::ClientError;
use crate::value::{default_codec, encode_value, CrdtValue, MapValue, SharedCodec};
use antidote_protocol::proto::{
    apb_set_update::SetOpType, ApbBoundObject, ApbCounterUpdate, ApbCrdtReset, ApbIntegerUpdate,
    ApbMapKey, ApbMapNestedUpdate, ApbMapUpdate, ApbRegUpdate, ApbSetUpdate, ApbUpdateOp,
    ApbUpdateOperation,
};
use antidote_protocol::CrdtType;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Where an object lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Top-level object in a bucket.
    Bucket(String),
    /// Entry of an enclosing map.
    Map(Box<ObjectRef>),
}

/// Identifies one CRDT in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    key: String,
    kind: CrdtType,
    location: Location,
}

impl ObjectRef {
    /// A top-level object.
    pub fn new(key: impl Into<String>, kind: CrdtType, bucket: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind,
            location: Location::Bucket(bucket.into()),
        }
    }

    /// An entry of the map `parent`.
    pub fn in_map(key: impl Into<String>, kind: CrdtType, parent: &ObjectRef) -> Self {
        Self {
            key: key.into(),
            kind,
            location: Location::Map(Box::new(parent.clone())),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> CrdtType {
        self.kind
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The enclosing map, for map entries.
    pub fn parent(&self) -> Option<&ObjectRef> {
        match &self.location {
            Location::Bucket(_) => None,
            Location::Map(parent) => Some(parent),
        }
    }

    /// The top-level object this one is stored in (itself if top-level).
    pub fn root(&self) -> &ObjectRef {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Bucket of the top-level object.
    pub fn bucket(&self) -> &str {
        match &self.root().location {
            Location::Bucket(bucket) => bucket,
            Location::Map(_) => "",
        }
    }

    /// The bound object that has to be read to obtain this object's value.
    pub fn bound_object(&self) -> ApbBoundObject {
        let root = self.root();
        ApbBoundObject {
            key: Bytes::from(root.key.clone()),
            r#type: root.kind as i32,
            bucket: Bytes::from(root.bucket().to_string()),
        }
    }

    /// Key of this object inside its enclosing map.
    pub fn map_key(&self) -> ApbMapKey {
        ApbMapKey {
            key: Bytes::from(self.key.clone()),
            r#type: self.kind as i32,
        }
    }

    /// Wraps `operation` so that it applies to this object.
    ///
    /// For map entries the operation is nested in one map update per
    /// enclosing map, up to the top-level object.
    pub fn update(&self, operation: ApbUpdateOperation) -> ApbUpdateOp {
        match &self.location {
            Location::Bucket(bucket) => ApbUpdateOp {
                boundobject: ApbBoundObject {
                    key: Bytes::from(self.key.clone()),
                    r#type: self.kind as i32,
                    bucket: Bytes::from(bucket.clone()),
                },
                operation,
            },
            Location::Map(parent) => parent.update(ApbUpdateOperation {
                mapop: Some(ApbMapUpdate {
                    updates: vec![ApbMapNestedUpdate {
                        key: self.map_key(),
                        update: operation,
                    }],
                    removed_keys: Vec::new(),
                }),
                ..Default::default()
            }),
        }
    }

    /// Resets the object to its initial state.
    pub fn reset(&self) -> ApbUpdateOp {
        self.update(ApbUpdateOperation {
            resetop: Some(ApbCrdtReset {}),
            ..Default::default()
        })
    }

    /// Picks this object's value out of the value of its top-level object.
    ///
    /// Map entries that do not exist yet read as the empty value.
    pub(crate) fn extract(&self, root_value: CrdtValue) -> Result<CrdtValue, ClientError> {
        let mut path = Vec::new();
        let mut current = self;
        while let Some(parent) = current.parent() {
            path.push(current);
            current = parent;
        }

        let mut value = root_value;
        for object in path.into_iter().rev() {
            value = match value {
                CrdtValue::Map(mut map) => map
                    .take(&object.key, object.kind)
                    .unwrap_or_else(|| CrdtValue::empty(object.kind)),
                other => {
                    return Err(ClientError::TypeMismatch {
                        expected: "map",
                        actual: other.kind_name(),
                    })
                }
            };
        }
        Ok(value)
    }
}

/// A typed handle to a CRDT.
pub trait CrdtObject {
    /// What a read of this object yields.
    type Value;

    fn object_ref(&self) -> &ObjectRef;

    /// Converts a generic value into this handle's value type.
    fn from_value(value: CrdtValue) -> Result<Self::Value, ClientError>;
}

fn mismatch(expected: &'static str, actual: &CrdtValue) -> ClientError {
    ClientError::TypeMismatch {
        expected,
        actual: actual.kind_name(),
    }
}

fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ClientError> {
    Ok(serde_json::from_value(value)?)
}

fn set_update(optype: SetOpType, elements: Vec<Bytes>) -> ApbUpdateOperation {
    let (adds, rems) = match optype {
        SetOpType::Add => (elements, Vec::new()),
        SetOpType::Remove => (Vec::new(), elements),
    };
    ApbUpdateOperation {
        setop: Some(ApbSetUpdate {
            optype: optype as i32,
            adds,
            rems,
        }),
        ..Default::default()
    }
}

/// Counter (plain or fat).
#[derive(Debug, Clone)]
pub struct Counter {
    object: ObjectRef,
}

impl Counter {
    pub fn new(object: ObjectRef) -> Self {
        Self { object }
    }

    /// Adds `amount` (negative to decrement).
    pub fn increment(&self, amount: i64) -> ApbUpdateOp {
        self.object.update(ApbUpdateOperation {
            counterop: Some(ApbCounterUpdate { inc: Some(amount) }),
            ..Default::default()
        })
    }
}

impl CrdtObject for Counter {
    type Value = i32;

    fn object_ref(&self) -> &ObjectRef {
        &self.object
    }

    fn from_value(value: CrdtValue) -> Result<i32, ClientError> {
        match value {
            CrdtValue::Counter(v) => Ok(v),
            other => Err(mismatch("counter", &other)),
        }
    }
}

/// Integer that supports both increments and assignments.
#[derive(Debug, Clone)]
pub struct Integer {
    object: ObjectRef,
}

impl Integer {
    pub fn new(object: ObjectRef) -> Self {
        Self { object }
    }

    pub fn increment(&self, amount: i64) -> ApbUpdateOp {
        self.object.update(ApbUpdateOperation {
            integerop: Some(ApbIntegerUpdate {
                inc: Some(amount),
                set: None,
            }),
            ..Default::default()
        })
    }

    pub fn set(&self, value: i64) -> ApbUpdateOp {
        self.object.update(ApbUpdateOperation {
            integerop: Some(ApbIntegerUpdate {
                inc: None,
                set: Some(value),
            }),
            ..Default::default()
        })
    }
}

impl CrdtObject for Integer {
    type Value = i64;

    fn object_ref(&self) -> &ObjectRef {
        &self.object
    }

    fn from_value(value: CrdtValue) -> Result<i64, ClientError> {
        match value {
            CrdtValue::Integer(v) => Ok(v),
            other => Err(mismatch("integer", &other)),
        }
    }
}

/// Last-writer-wins register.
#[derive(Debug, Clone)]
pub struct Register<T> {
    object: ObjectRef,
    codec: SharedCodec,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> Register<T> {
    pub fn new(object: ObjectRef, codec: SharedCodec) -> Self {
        Self {
            object,
            codec,
            _marker: PhantomData,
        }
    }

    pub fn set(&self, value: &T) -> Result<ApbUpdateOp, ClientError> {
        Ok(self.object.update(ApbUpdateOperation {
            regop: Some(ApbRegUpdate {
                value: encode_value(self.codec.as_ref(), value)?,
            }),
            ..Default::default()
        }))
    }
}

impl<T: Serialize + DeserializeOwned> CrdtObject for Register<T> {
    type Value = Option<T>;

    fn object_ref(&self) -> &ObjectRef {
        &self.object
    }

    fn from_value(value: CrdtValue) -> Result<Option<T>, ClientError> {
        match value {
            CrdtValue::Register(None) => Ok(None),
            CrdtValue::Register(Some(v)) => from_json(v).map(Some),
            other => Err(mismatch("register", &other)),
        }
    }
}

/// Multi-value register: reads return every concurrent assignment.
#[derive(Debug, Clone)]
pub struct MvRegister<T> {
    object: ObjectRef,
    codec: SharedCodec,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> MvRegister<T> {
    pub fn new(object: ObjectRef, codec: SharedCodec) -> Self {
        Self {
            object,
            codec,
            _marker: PhantomData,
        }
    }

    pub fn set(&self, value: &T) -> Result<ApbUpdateOp, ClientError> {
        Ok(self.object.update(ApbUpdateOperation {
            regop: Some(ApbRegUpdate {
                value: encode_value(self.codec.as_ref(), value)?,
            }),
            ..Default::default()
        }))
    }
}

impl<T: Serialize + DeserializeOwned> CrdtObject for MvRegister<T> {
    type Value = Vec<T>;

    fn object_ref(&self) -> &ObjectRef {
        &self.object
    }

    fn from_value(value: CrdtValue) -> Result<Vec<T>, ClientError> {
        match value {
            CrdtValue::MvRegister(values) => values.into_iter().map(from_json).collect(),
            other => Err(mismatch("mv-register", &other)),
        }
    }
}

/// Add-wins or remove-wins set.
#[derive(Debug, Clone)]
pub struct Set<T> {
    object: ObjectRef,
    codec: SharedCodec,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> Set<T> {
    pub fn new(object: ObjectRef, codec: SharedCodec) -> Self {
        Self {
            object,
            codec,
            _marker: PhantomData,
        }
    }

    pub fn add(&self, element: &T) -> Result<ApbUpdateOp, ClientError> {
        self.add_all(std::slice::from_ref(element))
    }

    pub fn add_all(&self, elements: &[T]) -> Result<ApbUpdateOp, ClientError> {
        let encoded = elements
            .iter()
            .map(|e| encode_value(self.codec.as_ref(), e))
            .collect::<Result<_, _>>()?;
        Ok(self.object.update(set_update(SetOpType::Add, encoded)))
    }

    pub fn remove(&self, element: &T) -> Result<ApbUpdateOp, ClientError> {
        self.remove_all(std::slice::from_ref(element))
    }

    pub fn remove_all(&self, elements: &[T]) -> Result<ApbUpdateOp, ClientError> {
        let encoded = elements
            .iter()
            .map(|e| encode_value(self.codec.as_ref(), e))
            .collect::<Result<_, _>>()?;
        Ok(self.object.update(set_update(SetOpType::Remove, encoded)))
    }
}

impl<T: Serialize + DeserializeOwned> CrdtObject for Set<T> {
    type Value = Vec<T>;

    fn object_ref(&self) -> &ObjectRef {
        &self.object
    }

    fn from_value(value: CrdtValue) -> Result<Vec<T>, ClientError> {
        match value {
            CrdtValue::Set(values) => values.into_iter().map(from_json).collect(),
            other => Err(mismatch("set", &other)),
        }
    }
}

/// Map holding embedded CRDTs. Also a factory for its entries.
///
/// Entries created through the map share its value codec.
#[derive(Debug, Clone)]
pub struct Map {
    object: ObjectRef,
    codec: SharedCodec,
}

impl Map {
    pub fn new(object: ObjectRef, codec: SharedCodec) -> Self {
        Self { object, codec }
    }

    /// Removes one entry.
    pub fn remove(&self, entry: &ObjectRef) -> ApbUpdateOp {
        self.remove_all(&[entry])
    }

    /// Removes several entries in one operation.
    pub fn remove_all(&self, entries: &[&ObjectRef]) -> ApbUpdateOp {
        self.object.update(ApbUpdateOperation {
            mapop: Some(ApbMapUpdate {
                updates: Vec::new(),
                removed_keys: entries.iter().map(|e| e.map_key()).collect(),
            }),
            ..Default::default()
        })
    }

    pub fn reset(&self) -> ApbUpdateOp {
        self.object.reset()
    }

    /// Reads entries of this map through `session`.
    ///
    /// The map is read once and the entries are picked from its value;
    /// missing entries read as empty values.
    pub async fn read_batch<S>(
        &self,
        session: &S,
        entries: &[&ObjectRef],
    ) -> Result<Vec<CrdtValue>, ClientError>
    where
        S: crate::Session + ?Sized,
    {
        let map = session.read(self).await?;
        Ok(entries
            .iter()
            .map(|e| {
                map.get(e.key(), e.kind())
                    .cloned()
                    .unwrap_or_else(|| CrdtValue::empty(e.kind()))
            })
            .collect())
    }
}

impl CrdtObject for Map {
    type Value = MapValue;

    fn object_ref(&self) -> &ObjectRef {
        &self.object
    }

    fn from_value(value: CrdtValue) -> Result<MapValue, ClientError> {
        match value {
            CrdtValue::Map(map) => Ok(map),
            other => Err(mismatch("map", &other)),
        }
    }
}

/// Creates handles to CRDTs.
///
/// Implementors decide where new objects live: a client or transaction puts
/// them in its bucket, a map makes them its entries.
pub trait CrdtFactory {
    fn object(&self, key: &str, kind: CrdtType) -> ObjectRef;

    /// Codec for register values and set elements of new handles.
    fn codec(&self) -> SharedCodec {
        default_codec()
    }

    fn counter(&self, key: &str) -> Counter {
        Counter::new(self.object(key, CrdtType::Counter))
    }

    fn fat_counter(&self, key: &str) -> Counter {
        Counter::new(self.object(key, CrdtType::Fatcounter))
    }

    fn integer(&self, key: &str) -> Integer {
        Integer::new(self.object(key, CrdtType::Integer))
    }

    fn register<T: Serialize + DeserializeOwned>(&self, key: &str) -> Register<T> {
        Register::new(self.object(key, CrdtType::Lwwreg), self.codec())
    }

    fn mv_register<T: Serialize + DeserializeOwned>(&self, key: &str) -> MvRegister<T> {
        MvRegister::new(self.object(key, CrdtType::Mvreg), self.codec())
    }

    /// Add-wins set.
    fn set<T: Serialize + DeserializeOwned>(&self, key: &str) -> Set<T> {
        Set::new(self.object(key, CrdtType::Orset), self.codec())
    }

    /// Remove-wins set.
    fn rw_set<T: Serialize + DeserializeOwned>(&self, key: &str) -> Set<T> {
        Set::new(self.object(key, CrdtType::Rwset), self.codec())
    }

    /// Add-wins map.
    fn map(&self, key: &str) -> Map {
        Map::new(self.object(key, CrdtType::Awmap), self.codec())
    }

    /// Remove-resets map.
    fn rr_map(&self, key: &str) -> Map {
        Map::new(self.object(key, CrdtType::Rrmap), self.codec())
    }

    /// Grow-only map.
    fn gmap(&self, key: &str) -> Map {
        Map::new(self.object(key, CrdtType::Gmap), self.codec())
    }
}

impl CrdtFactory for Map {
    fn object(&self, key: &str, kind: CrdtType) -> ObjectRef {
        ObjectRef::in_map(key, kind, &self.object)
    }

    fn codec(&self) -> SharedCodec {
        self.codec.clone()
    }
}
