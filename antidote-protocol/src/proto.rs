//! AntidotePB message schema.
//!
//! Hand-maintained `prost` definitions mirroring `antidote.proto` (proto2).
//! Field tags must stay in sync with the server.

use prost::bytes::Bytes;

/// CRDT kinds understood by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CrdtType {
    Counter = 3,
    Orset = 4,
    Lwwreg = 5,
    Mvreg = 6,
    Integer = 7,
    Gmap = 8,
    Awmap = 9,
    Rwset = 10,
    Rrmap = 11,
    Fatcounter = 12,
}

impl CrdtType {
    /// Returns whether values of this kind are maps with embedded CRDTs.
    pub fn is_map(&self) -> bool {
        matches!(self, CrdtType::Gmap | CrdtType::Awmap | CrdtType::Rrmap)
    }

    /// Name used by the server for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            CrdtType::Counter => "COUNTER",
            CrdtType::Orset => "ORSET",
            CrdtType::Lwwreg => "LWWREG",
            CrdtType::Mvreg => "MVREG",
            CrdtType::Integer => "INTEGER",
            CrdtType::Gmap => "GMAP",
            CrdtType::Awmap => "AWMAP",
            CrdtType::Rwset => "RWSET",
            CrdtType::Rrmap => "RRMAP",
            CrdtType::Fatcounter => "FATCOUNTER",
        }
    }
}

impl std::fmt::Display for CrdtType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbErrorResp {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub errmsg: Bytes,
    #[prost(uint32, required, tag = "2")]
    pub errcode: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbCounterUpdate {
    #[prost(sint64, optional, tag = "1")]
    pub inc: Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbGetCounterResp {
    #[prost(sint32, required, tag = "1")]
    pub value: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbSetUpdate {
    #[prost(enumeration = "apb_set_update::SetOpType", required, tag = "1")]
    pub optype: i32,
    #[prost(bytes = "bytes", repeated, tag = "2")]
    pub adds: Vec<Bytes>,
    #[prost(bytes = "bytes", repeated, tag = "3")]
    pub rems: Vec<Bytes>,
}

pub mod apb_set_update {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum SetOpType {
        Add = 1,
        Remove = 2,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbGetSetResp {
    #[prost(bytes = "bytes", repeated, tag = "1")]
    pub value: Vec<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbRegUpdate {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub value: Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbGetRegResp {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub value: Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbGetMvRegResp {
    #[prost(bytes = "bytes", repeated, tag = "1")]
    pub values: Vec<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbIntegerUpdate {
    #[prost(sint64, optional, tag = "1")]
    pub inc: Option<i64>,
    #[prost(sint64, optional, tag = "2")]
    pub set: Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbGetIntegerResp {
    #[prost(sint64, required, tag = "1")]
    pub value: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbMapKey {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub key: Bytes,
    #[prost(enumeration = "CrdtType", required, tag = "2")]
    pub r#type: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbMapUpdate {
    #[prost(message, repeated, tag = "1")]
    pub updates: Vec<ApbMapNestedUpdate>,
    #[prost(message, repeated, tag = "2")]
    pub removed_keys: Vec<ApbMapKey>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbMapNestedUpdate {
    #[prost(message, required, tag = "1")]
    pub key: ApbMapKey,
    #[prost(message, required, tag = "2")]
    pub update: ApbUpdateOperation,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbGetMapResp {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<ApbMapEntry>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbMapEntry {
    #[prost(message, required, tag = "1")]
    pub key: ApbMapKey,
    #[prost(message, required, tag = "2")]
    pub value: ApbReadObjectResp,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbCrdtReset {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbOperationResp {
    #[prost(bool, required, tag = "1")]
    pub success: bool,
    #[prost(uint32, optional, tag = "2")]
    pub errorcode: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbTxnProperties {
    #[prost(uint32, optional, tag = "1")]
    pub read_write: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub red_blue: Option<u32>,
}

#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct ApbBoundObject {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub key: Bytes,
    #[prost(enumeration = "CrdtType", required, tag = "2")]
    pub r#type: i32,
    #[prost(bytes = "bytes", required, tag = "3")]
    pub bucket: Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbReadObjects {
    #[prost(message, repeated, tag = "1")]
    pub boundobjects: Vec<ApbBoundObject>,
    #[prost(bytes = "bytes", required, tag = "2")]
    pub transaction_descriptor: Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbUpdateOp {
    #[prost(message, required, tag = "1")]
    pub boundobject: ApbBoundObject,
    #[prost(message, required, tag = "2")]
    pub operation: ApbUpdateOperation,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbUpdateOperation {
    #[prost(message, optional, tag = "1")]
    pub counterop: Option<ApbCounterUpdate>,
    #[prost(message, optional, tag = "2")]
    pub setop: Option<ApbSetUpdate>,
    #[prost(message, optional, tag = "3")]
    pub regop: Option<ApbRegUpdate>,
    #[prost(message, optional, tag = "4")]
    pub integerop: Option<ApbIntegerUpdate>,
    #[prost(message, optional, tag = "5")]
    pub mapop: Option<ApbMapUpdate>,
    #[prost(message, optional, tag = "6")]
    pub resetop: Option<ApbCrdtReset>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbUpdateObjects {
    #[prost(message, repeated, tag = "1")]
    pub updates: Vec<ApbUpdateOp>,
    #[prost(bytes = "bytes", required, tag = "2")]
    pub transaction_descriptor: Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbStartTransaction {
    #[prost(bytes = "bytes", optional, tag = "1")]
    pub timestamp: Option<Bytes>,
    #[prost(message, optional, tag = "2")]
    pub properties: Option<ApbTxnProperties>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbAbortTransaction {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub transaction_descriptor: Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbCommitTransaction {
    #[prost(bytes = "bytes", required, tag = "1")]
    pub transaction_descriptor: Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbStaticUpdateObjects {
    #[prost(message, required, tag = "1")]
    pub transaction: ApbStartTransaction,
    #[prost(message, repeated, tag = "2")]
    pub updates: Vec<ApbUpdateOp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbStaticReadObjects {
    #[prost(message, required, tag = "1")]
    pub transaction: ApbStartTransaction,
    #[prost(message, repeated, tag = "2")]
    pub objects: Vec<ApbBoundObject>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbStartTransactionResp {
    #[prost(bool, required, tag = "1")]
    pub success: bool,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub transaction_descriptor: Option<Bytes>,
    #[prost(uint32, optional, tag = "3")]
    pub errorcode: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbReadObjectResp {
    #[prost(message, optional, tag = "1")]
    pub counter: Option<ApbGetCounterResp>,
    #[prost(message, optional, tag = "2")]
    pub set: Option<ApbGetSetResp>,
    #[prost(message, optional, tag = "3")]
    pub reg: Option<ApbGetRegResp>,
    #[prost(message, optional, tag = "4")]
    pub mvreg: Option<ApbGetMvRegResp>,
    #[prost(message, optional, tag = "5")]
    pub int: Option<ApbGetIntegerResp>,
    #[prost(message, optional, tag = "6")]
    pub map: Option<ApbGetMapResp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbReadObjectsResp {
    #[prost(bool, required, tag = "1")]
    pub success: bool,
    #[prost(message, repeated, tag = "2")]
    pub objects: Vec<ApbReadObjectResp>,
    #[prost(uint32, optional, tag = "3")]
    pub errorcode: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbCommitResp {
    #[prost(bool, required, tag = "1")]
    pub success: bool,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub commit_time: Option<Bytes>,
    #[prost(uint32, optional, tag = "3")]
    pub errorcode: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApbStaticReadObjectsResp {
    #[prost(message, required, tag = "1")]
    pub objects: ApbReadObjectsResp,
    #[prost(message, required, tag = "2")]
    pub committime: ApbCommitResp,
}
