//! Message codes and the request/response sum types.
//!
//! Every frame carries a one-byte message code that selects the protobuf
//! schema of its payload. Decoding is an explicit match on [`MessageCode`].

use crate::error::ProtocolError;
use crate::proto::*;
use bytes::Bytes;
use prost::Message;
use std::fmt;

/// Message codes of the Antidote protocol-buffer interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageCode {
    RegUpdate = 107,
    GetRegResp = 108,
    CounterUpdate = 109,
    GetCounterResp = 110,
    OperationResp = 111,
    SetUpdate = 112,
    GetSetResp = 113,
    TxnProperties = 114,
    BoundObject = 115,
    ReadObjects = 116,
    UpdateOp = 117,
    UpdateObjects = 118,
    StartTransaction = 119,
    AbortTransaction = 120,
    CommitTransaction = 121,
    StaticUpdateObjects = 122,
    StaticReadObjects = 123,
    StartTransactionResp = 124,
    ReadObjectResp = 125,
    ReadObjectsResp = 126,
    CommitResp = 127,
    StaticReadObjectsResp = 128,
}

impl MessageCode {
    /// Returns the wire value of this code.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageCode {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        let code = match code {
            107 => MessageCode::RegUpdate,
            108 => MessageCode::GetRegResp,
            109 => MessageCode::CounterUpdate,
            110 => MessageCode::GetCounterResp,
            111 => MessageCode::OperationResp,
            112 => MessageCode::SetUpdate,
            113 => MessageCode::GetSetResp,
            114 => MessageCode::TxnProperties,
            115 => MessageCode::BoundObject,
            116 => MessageCode::ReadObjects,
            117 => MessageCode::UpdateOp,
            118 => MessageCode::UpdateObjects,
            119 => MessageCode::StartTransaction,
            120 => MessageCode::AbortTransaction,
            121 => MessageCode::CommitTransaction,
            122 => MessageCode::StaticUpdateObjects,
            123 => MessageCode::StaticReadObjects,
            124 => MessageCode::StartTransactionResp,
            125 => MessageCode::ReadObjectResp,
            126 => MessageCode::ReadObjectsResp,
            127 => MessageCode::CommitResp,
            128 => MessageCode::StaticReadObjectsResp,
            other => return Err(ProtocolError::UnknownMessageCode(other)),
        };
        Ok(code)
    }
}

impl From<MessageCode> for u8 {
    fn from(code: MessageCode) -> u8 {
        code as u8
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_u8())
    }
}

/// Messages sent from the client to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    StartTransaction(ApbStartTransaction),
    ReadObjects(ApbReadObjects),
    UpdateObjects(ApbUpdateObjects),
    AbortTransaction(ApbAbortTransaction),
    CommitTransaction(ApbCommitTransaction),
    StaticUpdateObjects(ApbStaticUpdateObjects),
    StaticReadObjects(ApbStaticReadObjects),
}

impl Request {
    /// Returns the message code for this request.
    pub fn code(&self) -> MessageCode {
        match self {
            Request::StartTransaction(_) => MessageCode::StartTransaction,
            Request::ReadObjects(_) => MessageCode::ReadObjects,
            Request::UpdateObjects(_) => MessageCode::UpdateObjects,
            Request::AbortTransaction(_) => MessageCode::AbortTransaction,
            Request::CommitTransaction(_) => MessageCode::CommitTransaction,
            Request::StaticUpdateObjects(_) => MessageCode::StaticUpdateObjects,
            Request::StaticReadObjects(_) => MessageCode::StaticReadObjects,
        }
    }

    /// Encodes the protobuf payload (without framing).
    pub fn encode_payload(&self) -> Bytes {
        let payload = match self {
            Request::StartTransaction(m) => m.encode_to_vec(),
            Request::ReadObjects(m) => m.encode_to_vec(),
            Request::UpdateObjects(m) => m.encode_to_vec(),
            Request::AbortTransaction(m) => m.encode_to_vec(),
            Request::CommitTransaction(m) => m.encode_to_vec(),
            Request::StaticUpdateObjects(m) => m.encode_to_vec(),
            Request::StaticReadObjects(m) => m.encode_to_vec(),
        };
        Bytes::from(payload)
    }

    /// Decodes a request payload for the given message code.
    pub fn decode(code: u8, payload: &[u8]) -> Result<Self, ProtocolError> {
        let request = match MessageCode::try_from(code)? {
            MessageCode::StartTransaction => {
                Request::StartTransaction(ApbStartTransaction::decode(payload)?)
            }
            MessageCode::ReadObjects => Request::ReadObjects(ApbReadObjects::decode(payload)?),
            MessageCode::UpdateObjects => {
                Request::UpdateObjects(ApbUpdateObjects::decode(payload)?)
            }
            MessageCode::AbortTransaction => {
                Request::AbortTransaction(ApbAbortTransaction::decode(payload)?)
            }
            MessageCode::CommitTransaction => {
                Request::CommitTransaction(ApbCommitTransaction::decode(payload)?)
            }
            MessageCode::StaticUpdateObjects => {
                Request::StaticUpdateObjects(ApbStaticUpdateObjects::decode(payload)?)
            }
            MessageCode::StaticReadObjects => {
                Request::StaticReadObjects(ApbStaticReadObjects::decode(payload)?)
            }
            _ => {
                return Err(ProtocolError::UnexpectedMessageCode {
                    code,
                    direction: "request",
                })
            }
        };
        Ok(request)
    }
}

/// Messages sent from the server to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    GetReg(ApbGetRegResp),
    GetCounter(ApbGetCounterResp),
    Operation(ApbOperationResp),
    GetSet(ApbGetSetResp),
    StartTransaction(ApbStartTransactionResp),
    ReadObject(ApbReadObjectResp),
    ReadObjects(ApbReadObjectsResp),
    Commit(ApbCommitResp),
    StaticReadObjects(ApbStaticReadObjectsResp),
}

impl Response {
    /// Returns the message code for this response.
    pub fn code(&self) -> MessageCode {
        match self {
            Response::GetReg(_) => MessageCode::GetRegResp,
            Response::GetCounter(_) => MessageCode::GetCounterResp,
            Response::Operation(_) => MessageCode::OperationResp,
            Response::GetSet(_) => MessageCode::GetSetResp,
            Response::StartTransaction(_) => MessageCode::StartTransactionResp,
            Response::ReadObject(_) => MessageCode::ReadObjectResp,
            Response::ReadObjects(_) => MessageCode::ReadObjectsResp,
            Response::Commit(_) => MessageCode::CommitResp,
            Response::StaticReadObjects(_) => MessageCode::StaticReadObjectsResp,
        }
    }

    /// Encodes the protobuf payload (without framing).
    pub fn encode_payload(&self) -> Bytes {
        let payload = match self {
            Response::GetReg(m) => m.encode_to_vec(),
            Response::GetCounter(m) => m.encode_to_vec(),
            Response::Operation(m) => m.encode_to_vec(),
            Response::GetSet(m) => m.encode_to_vec(),
            Response::StartTransaction(m) => m.encode_to_vec(),
            Response::ReadObject(m) => m.encode_to_vec(),
            Response::ReadObjects(m) => m.encode_to_vec(),
            Response::Commit(m) => m.encode_to_vec(),
            Response::StaticReadObjects(m) => m.encode_to_vec(),
        };
        Bytes::from(payload)
    }

    /// Decodes a response payload for the given message code.
    pub fn decode(code: u8, payload: &[u8]) -> Result<Self, ProtocolError> {
        let response = match MessageCode::try_from(code)? {
            MessageCode::GetRegResp => Response::GetReg(ApbGetRegResp::decode(payload)?),
            MessageCode::GetCounterResp => {
                Response::GetCounter(ApbGetCounterResp::decode(payload)?)
            }
            MessageCode::OperationResp => Response::Operation(ApbOperationResp::decode(payload)?),
            MessageCode::GetSetResp => Response::GetSet(ApbGetSetResp::decode(payload)?),
            MessageCode::StartTransactionResp => {
                Response::StartTransaction(ApbStartTransactionResp::decode(payload)?)
            }
            MessageCode::ReadObjectResp => {
                Response::ReadObject(ApbReadObjectResp::decode(payload)?)
            }
            MessageCode::ReadObjectsResp => {
                Response::ReadObjects(ApbReadObjectsResp::decode(payload)?)
            }
            MessageCode::CommitResp => Response::Commit(ApbCommitResp::decode(payload)?),
            MessageCode::StaticReadObjectsResp => {
                Response::StaticReadObjects(ApbStaticReadObjectsResp::decode(payload)?)
            }
            _ => {
                return Err(ProtocolError::UnexpectedMessageCode {
                    code,
                    direction: "response",
                })
            }
        };
        Ok(response)
    }

    /// Short name of the variant, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Response::GetReg(_) => "GetRegResp",
            Response::GetCounter(_) => "GetCounterResp",
            Response::Operation(_) => "OperationResp",
            Response::GetSet(_) => "GetSetResp",
            Response::StartTransaction(_) => "StartTransactionResp",
            Response::ReadObject(_) => "ReadObjectResp",
            Response::ReadObjects(_) => "ReadObjectsResp",
            Response::Commit(_) => "CommitResp",
            Response::StaticReadObjects(_) => "StaticReadObjectsResp",
        }
    }
}
