//! # antidote-client
//!
//! Client library for AntidoteDB.
//!
//! This crate provides:
//! - A pipelined TCP connection with lazy reconnection
//! - Static (single-shot) reads and updates, and interactive transactions
//! - Typed handles for counters, integers, registers, sets and maps

pub mod client;
pub mod connection;
pub mod error;
pub mod object;
pub mod pending;
pub mod value;

#[cfg(test)]
mod testing;

pub use client::{Client, ClientOptions, CommitResponse, Session, Transaction, DEFAULT_BUCKET};
pub use connection::{Connection, ConnectionConfig, ConnectionState};
pub use error::ClientError;
pub use object::{
    Counter, CrdtFactory, CrdtObject, Integer, Location, Map, MvRegister, ObjectRef, Register, Set,
};
pub use value::{CrdtValue, MapEntry, MapValue, MessagePack, SharedCodec, ValueCodec};

pub use antidote_protocol::CrdtType;

/// Creates a client for `host:port` with default settings.
///
/// No socket is opened until the first request.
pub fn connect(host: impl Into<String>, port: u16) -> Client {
    Client::new(ConnectionConfig::new(host, port))
}
