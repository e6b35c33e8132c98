//! Test support: scripted-peer helpers and an in-memory Antidote server.

use antidote_protocol::proto::*;
use antidote_protocol::{CrdtType, Decoder, Encoder, ErrorResponse, Frame, Request, Response};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Installs a log subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Reads the next request from `stream`. Returns `None` on EOF.
pub async fn read_request(stream: &mut TcpStream, decoder: &mut Decoder) -> Option<Request> {
    let mut buf = [0u8; 4096];
    loop {
        if let Some(request) = decoder.decode_request().expect("malformed request") {
            return Some(request);
        }
        let n = stream.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        decoder.extend(&buf[..n]);
    }
}

pub async fn write_response(stream: &mut TcpStream, response: &Response) {
    let encoded = Encoder::encode_response(response).unwrap();
    stream.write_all(&encoded).await.unwrap();
}

pub async fn write_frame(stream: &mut TcpStream, code: u8, payload: &[u8]) {
    let encoded = Frame::new(code, payload.to_vec()).encode().unwrap();
    stream.write_all(&encoded).await.unwrap();
}

/// Stored state of one object.
#[derive(Debug, Clone)]
enum Stored {
    Counter(i64),
    Integer(i64),
    Register(Bytes),
    MvRegister(Vec<Bytes>),
    Set(Vec<Bytes>),
    Map(BTreeMap<(Bytes, i32), Stored>),
}

impl Stored {
    fn empty(kind: i32) -> Self {
        match CrdtType::try_from(kind).unwrap_or(CrdtType::Counter) {
            CrdtType::Counter | CrdtType::Fatcounter => Stored::Counter(0),
            CrdtType::Integer => Stored::Integer(0),
            CrdtType::Lwwreg => Stored::Register(Bytes::new()),
            CrdtType::Mvreg => Stored::MvRegister(Vec::new()),
            CrdtType::Orset | CrdtType::Rwset => Stored::Set(Vec::new()),
            CrdtType::Gmap | CrdtType::Awmap | CrdtType::Rrmap => Stored::Map(BTreeMap::new()),
        }
    }

    fn reset(&mut self) {
        *self = match self {
            Stored::Counter(_) => Stored::Counter(0),
            Stored::Integer(_) => Stored::Integer(0),
            Stored::Register(_) => Stored::Register(Bytes::new()),
            Stored::MvRegister(_) => Stored::MvRegister(Vec::new()),
            Stored::Set(_) => Stored::Set(Vec::new()),
            Stored::Map(_) => Stored::Map(BTreeMap::new()),
        };
    }

    fn apply(&mut self, op: &ApbUpdateOperation) {
        if op.resetop.is_some() {
            self.reset();
            return;
        }

        match self {
            Stored::Counter(value) => {
                if let Some(counter) = &op.counterop {
                    *value += counter.inc.unwrap_or(1);
                }
            }
            Stored::Integer(value) => {
                if let Some(integer) = &op.integerop {
                    if let Some(set) = integer.set {
                        *value = set;
                    }
                    if let Some(inc) = integer.inc {
                        *value += inc;
                    }
                }
            }
            Stored::Register(value) => {
                if let Some(reg) = &op.regop {
                    *value = reg.value.clone();
                }
            }
            Stored::MvRegister(values) => {
                if let Some(reg) = &op.regop {
                    *values = vec![reg.value.clone()];
                }
            }
            Stored::Set(elements) => {
                if let Some(set) = &op.setop {
                    for add in &set.adds {
                        if !elements.contains(add) {
                            elements.push(add.clone());
                        }
                    }
                    elements.retain(|e| !set.rems.contains(e));
                }
            }
            Stored::Map(entries) => {
                if let Some(map) = &op.mapop {
                    for nested in &map.updates {
                        let key = (nested.key.key.clone(), nested.key.r#type);
                        entries
                            .entry(key)
                            .or_insert_with(|| Stored::empty(nested.key.r#type))
                            .apply(&nested.update);
                    }
                    for removed in &map.removed_keys {
                        entries.remove(&(removed.key.clone(), removed.r#type));
                    }
                }
            }
        }
    }

    fn to_resp(&self) -> ApbReadObjectResp {
        let mut resp = ApbReadObjectResp::default();
        match self {
            Stored::Counter(value) => {
                resp.counter = Some(ApbGetCounterResp {
                    value: *value as i32,
                })
            }
            Stored::Integer(value) => resp.int = Some(ApbGetIntegerResp { value: *value }),
            Stored::Register(value) => {
                resp.reg = Some(ApbGetRegResp {
                    value: value.clone(),
                })
            }
            Stored::MvRegister(values) => {
                resp.mvreg = Some(ApbGetMvRegResp {
                    values: values.clone(),
                })
            }
            Stored::Set(elements) => {
                resp.set = Some(ApbGetSetResp {
                    value: elements.clone(),
                })
            }
            Stored::Map(entries) => {
                resp.map = Some(ApbGetMapResp {
                    entries: entries
                        .iter()
                        .map(|((key, kind), value)| ApbMapEntry {
                            key: ApbMapKey {
                                key: key.clone(),
                                r#type: *kind,
                            },
                            value: value.to_resp(),
                        })
                        .collect(),
                })
            }
        }
        resp
    }
}

type ObjectKey = (Bytes, Bytes, i32);

fn object_key(bound: &ApbBoundObject) -> ObjectKey {
    (bound.bucket.clone(), bound.key.clone(), bound.r#type)
}

#[derive(Default)]
struct Store {
    objects: HashMap<ObjectKey, Stored>,
    transactions: HashMap<Bytes, Vec<ApbUpdateOp>>,
    next_transaction: u64,
    clock: u64,
    last_snapshot: Option<Bytes>,
}

impl Store {
    fn read(&self, bound: &ApbBoundObject) -> ApbReadObjectResp {
        self.objects
            .get(&object_key(bound))
            .cloned()
            .unwrap_or_else(|| Stored::empty(bound.r#type))
            .to_resp()
    }

    fn commit(&mut self, updates: &[ApbUpdateOp]) -> ApbCommitResp {
        for update in updates {
            self.objects
                .entry(object_key(&update.boundobject))
                .or_insert_with(|| Stored::empty(update.boundobject.r#type))
                .apply(&update.operation);
        }
        self.clock += 1;
        ApbCommitResp {
            success: true,
            commit_time: Some(self.timestamp()),
            errorcode: None,
        }
    }

    fn timestamp(&self) -> Bytes {
        Bytes::from(format!("ts-{}", self.clock))
    }

    fn unknown_transaction(descriptor: &Bytes) -> ErrorResponse {
        ErrorResponse::new(
            1,
            format!("unknown transaction {}", String::from_utf8_lossy(descriptor)),
        )
    }

    fn handle(&mut self, request: Request) -> Result<Response, ErrorResponse> {
        let response = match request {
            Request::StartTransaction(m) => {
                self.last_snapshot = m.timestamp;
                self.next_transaction += 1;
                let descriptor = Bytes::from(format!("tx-{}", self.next_transaction));
                self.transactions.insert(descriptor.clone(), Vec::new());
                Response::StartTransaction(ApbStartTransactionResp {
                    success: true,
                    transaction_descriptor: Some(descriptor),
                    errorcode: None,
                })
            }
            Request::ReadObjects(m) => {
                if !self.transactions.contains_key(&m.transaction_descriptor) {
                    return Err(Self::unknown_transaction(&m.transaction_descriptor));
                }
                Response::ReadObjects(ApbReadObjectsResp {
                    success: true,
                    objects: m.boundobjects.iter().map(|b| self.read(b)).collect(),
                    errorcode: None,
                })
            }
            Request::UpdateObjects(m) => {
                let buffered = self
                    .transactions
                    .get_mut(&m.transaction_descriptor)
                    .ok_or_else(|| Self::unknown_transaction(&m.transaction_descriptor))?;
                buffered.extend(m.updates);
                Response::Operation(ApbOperationResp {
                    success: true,
                    errorcode: None,
                })
            }
            Request::AbortTransaction(m) => {
                self.transactions
                    .remove(&m.transaction_descriptor)
                    .ok_or_else(|| Self::unknown_transaction(&m.transaction_descriptor))?;
                Response::Operation(ApbOperationResp {
                    success: true,
                    errorcode: None,
                })
            }
            Request::CommitTransaction(m) => {
                let updates = self
                    .transactions
                    .remove(&m.transaction_descriptor)
                    .ok_or_else(|| Self::unknown_transaction(&m.transaction_descriptor))?;
                Response::Commit(self.commit(&updates))
            }
            Request::StaticUpdateObjects(m) => {
                self.last_snapshot = m.transaction.timestamp;
                Response::Commit(self.commit(&m.updates))
            }
            Request::StaticReadObjects(m) => {
                self.last_snapshot = m.transaction.timestamp;
                Response::StaticReadObjects(ApbStaticReadObjectsResp {
                    objects: ApbReadObjectsResp {
                        success: true,
                        objects: m.objects.iter().map(|b| self.read(b)).collect(),
                        errorcode: None,
                    },
                    committime: ApbCommitResp {
                        success: true,
                        commit_time: Some(self.timestamp()),
                        errorcode: None,
                    },
                })
            }
        };
        Ok(response)
    }
}

/// In-memory Antidote server on a loopback port.
///
/// Interactive transactions buffer their updates until commit; reads inside
/// a transaction see committed state only.
pub struct MockAntidote {
    port: u16,
    store: Arc<Mutex<Store>>,
    task: JoinHandle<()>,
}

impl MockAntidote {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let store = Arc::new(Mutex::new(Store::default()));
        let task = tokio::spawn(serve(listener, store.clone()));
        Self { port, store, task }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Snapshot timestamp carried by the most recent transaction start.
    pub fn last_snapshot_request(&self) -> Option<Bytes> {
        self.store.lock().last_snapshot.clone()
    }
}

impl Drop for MockAntidote {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(listener: TcpListener, store: Arc<Mutex<Store>>) {
    while let Ok((stream, _)) = listener.accept().await {
        tokio::spawn(handle_connection(stream, store.clone()));
    }
}

async fn handle_connection(mut stream: TcpStream, store: Arc<Mutex<Store>>) {
    let mut decoder = Decoder::new();
    while let Some(request) = read_request(&mut stream, &mut decoder).await {
        let result = store.lock().handle(request);
        let encoded = match result {
            Ok(response) => Encoder::encode_response(&response),
            Err(err) => Encoder::encode_error(&err),
        }
        .unwrap();
        if stream.write_all(&encoded).await.is_err() {
            return;
        }
    }
}
