//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use crate::object::{CrdtFactory, CrdtObject, ObjectRef};
use crate::value::{default_codec, CrdtValue, SharedCodec, ValueCodec};
use antidote_protocol::proto::*;
use antidote_protocol::{Inbound, Request, Response};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Bucket used for objects created by a client unless configured otherwise.
pub const DEFAULT_BUCKET: &str = "default-bucket";

/// Client options.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Bucket for newly created object handles.
    pub bucket: String,
    /// Use every commit timestamp as the minimum snapshot time of later
    /// transactions.
    pub monotonic_snapshots: bool,
    /// Encoding of register values and set elements. MessagePack by default.
    pub codec: SharedCodec,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            monotonic_snapshots: false,
            codec: default_codec(),
        }
    }
}

impl ClientOptions {
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_monotonic_snapshots(mut self, enabled: bool) -> Self {
        self.monotonic_snapshots = enabled;
        self
    }

    pub fn with_codec(mut self, codec: impl ValueCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }
}

/// Result of a committed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResponse {
    /// Opaque server timestamp of the commit.
    pub commit_time: Bytes,
}

#[derive(Debug, Default)]
struct SessionState {
    last_commit_time: Option<Bytes>,
    min_snapshot_time: Option<Bytes>,
    monotonic_snapshots: bool,
}

impl SessionState {
    fn record_commit(&mut self, commit_time: Bytes) {
        if self.monotonic_snapshots {
            self.min_snapshot_time = Some(commit_time.clone());
        }
        self.last_commit_time = Some(commit_time);
    }

    fn start_transaction(&self) -> ApbStartTransaction {
        ApbStartTransaction {
            timestamp: self.min_snapshot_time.clone(),
            properties: Some(ApbTxnProperties::default()),
        }
    }
}

/// Reads and updates objects.
#[async_trait]
pub trait Session: Send + Sync {
    /// Reads several objects at once, in order.
    async fn read_batch(&self, objects: &[&ObjectRef]) -> Result<Vec<CrdtValue>, ClientError>;

    /// Applies update operations.
    async fn update_objects(&self, updates: Vec<ApbUpdateOp>) -> Result<(), ClientError>;

    /// Reads one typed object.
    async fn read<O>(&self, object: &O) -> Result<O::Value, ClientError>
    where
        O: CrdtObject + Sync,
    {
        let value = self
            .read_batch(&[object.object_ref()])
            .await?
            .pop()
            .ok_or_else(|| ClientError::UnexpectedResponse {
                expected: "one object",
                actual: "no objects".to_string(),
            })?;
        O::from_value(value)
    }
}

fn unexpected(expected: &'static str, inbound: Inbound) -> ClientError {
    ClientError::UnexpectedResponse {
        expected,
        actual: inbound.describe(),
    }
}

/// Turns per-root read responses into the values of the requested objects.
fn interpret_reads(
    objects: &[&ObjectRef],
    responses: Vec<ApbReadObjectResp>,
    codec: &dyn ValueCodec,
) -> Result<Vec<CrdtValue>, ClientError> {
    if responses.len() != objects.len() {
        return Err(ClientError::UnexpectedResponse {
            expected: "one value per object",
            actual: format!("{} values for {} objects", responses.len(), objects.len()),
        });
    }

    objects
        .iter()
        .zip(responses)
        .map(|(object, resp)| {
            let root = CrdtValue::decode(object.root().kind(), &resp, codec)?;
            object.extract(root)
        })
        .collect()
}

/// An Antidote client.
///
/// Reads and updates issued directly on the client each run as their own
/// transaction. Use [`Client::start_transaction`] to group them.
pub struct Client {
    connection: Arc<Connection>,
    bucket: String,
    codec: SharedCodec,
    state: Arc<Mutex<SessionState>>,
}

impl Client {
    /// Creates a client. The socket is opened by the first request.
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_options(config, ClientOptions::default())
    }

    pub fn with_options(config: ConnectionConfig, options: ClientOptions) -> Self {
        Self {
            connection: Arc::new(Connection::new(config)),
            bucket: options.bucket,
            codec: options.codec,
            state: Arc::new(Mutex::new(SessionState {
                monotonic_snapshots: options.monotonic_snapshots,
                ..Default::default()
            })),
        }
    }

    /// Creates a client and connects right away.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, ClientError> {
        let client = Self::new(config);
        client.connection.connect().await?;
        Ok(client)
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Codec used for register values and set elements.
    pub fn value_codec(&self) -> &SharedCodec {
        &self.codec
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn set_request_timeout(&self, timeout: Duration) {
        self.connection.set_request_timeout(timeout);
    }

    /// Timestamp of the last commit this client observed.
    pub fn last_commit_timestamp(&self) -> Option<Bytes> {
        self.state.lock().last_commit_time.clone()
    }

    /// Sets the snapshot every later transaction must at least observe.
    pub fn set_min_snapshot_time(&self, timestamp: Option<Bytes>) {
        self.state.lock().min_snapshot_time = timestamp;
    }

    pub fn min_snapshot_time(&self) -> Option<Bytes> {
        self.state.lock().min_snapshot_time.clone()
    }

    /// When enabled, every observed commit timestamp also becomes the
    /// minimum snapshot time.
    pub fn set_monotonic_snapshots(&self, enabled: bool) {
        self.state.lock().monotonic_snapshots = enabled;
    }

    /// Applies updates atomically in a single-shot transaction.
    pub async fn update(
        &self,
        updates: impl IntoIterator<Item = ApbUpdateOp>,
    ) -> Result<CommitResponse, ClientError> {
        let request = Request::StaticUpdateObjects(ApbStaticUpdateObjects {
            transaction: self.state.lock().start_transaction(),
            updates: updates.into_iter().collect(),
        });

        match self.connection.send(&request).await? {
            Inbound::Response(Response::Commit(resp)) => complete_commit(&self.state, resp),
            other => Err(unexpected("CommitResp", other)),
        }
    }

    /// Starts an interactive transaction.
    pub async fn start_transaction(&self) -> Result<Transaction, ClientError> {
        let request = Request::StartTransaction(self.state.lock().start_transaction());

        let resp = match self.connection.send(&request).await? {
            Inbound::Response(Response::StartTransaction(resp)) => resp,
            other => return Err(unexpected("StartTransactionResp", other)),
        };
        if !resp.success {
            return Err(ClientError::rejected(resp.errorcode));
        }
        let descriptor = resp
            .transaction_descriptor
            .ok_or_else(|| ClientError::UnexpectedResponse {
                expected: "transaction descriptor",
                actual: "none".to_string(),
            })?;

        tracing::debug!("Started transaction {:?}", descriptor);
        Ok(Transaction {
            connection: self.connection.clone(),
            bucket: self.bucket.clone(),
            codec: self.codec.clone(),
            state: self.state.clone(),
            descriptor,
        })
    }

    /// Closes the connection. Pending and later requests fail.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connection.close().await
    }
}

fn complete_commit(
    state: &Mutex<SessionState>,
    resp: ApbCommitResp,
) -> Result<CommitResponse, ClientError> {
    if let Some(commit_time) = &resp.commit_time {
        state.lock().record_commit(commit_time.clone());
    }
    if !resp.success {
        return Err(ClientError::rejected(resp.errorcode));
    }
    Ok(CommitResponse {
        commit_time: resp.commit_time.unwrap_or_default(),
    })
}

#[async_trait]
impl Session for Client {
    async fn read_batch(&self, objects: &[&ObjectRef]) -> Result<Vec<CrdtValue>, ClientError> {
        let request = Request::StaticReadObjects(ApbStaticReadObjects {
            transaction: self.state.lock().start_transaction(),
            objects: objects.iter().map(|o| o.bound_object()).collect(),
        });

        let resp = match self.connection.send(&request).await? {
            Inbound::Response(Response::StaticReadObjects(resp)) => resp,
            other => return Err(unexpected("StaticReadObjectsResp", other)),
        };

        complete_commit(&self.state, resp.committime)?;
        if !resp.objects.success {
            return Err(ClientError::rejected(resp.objects.errorcode));
        }
        interpret_reads(objects, resp.objects.objects, self.codec.as_ref())
    }

    async fn update_objects(&self, updates: Vec<ApbUpdateOp>) -> Result<(), ClientError> {
        self.update(updates).await.map(|_| ())
    }
}

impl CrdtFactory for Client {
    fn object(&self, key: &str, kind: antidote_protocol::CrdtType) -> ObjectRef {
        ObjectRef::new(key, kind, self.bucket.as_str())
    }

    fn codec(&self) -> SharedCodec {
        self.codec.clone()
    }
}

/// An interactive transaction.
///
/// Every request carries the transaction descriptor the server handed out.
/// The transaction ends with [`commit`](Self::commit) or
/// [`abort`](Self::abort).
pub struct Transaction {
    connection: Arc<Connection>,
    bucket: String,
    codec: SharedCodec,
    state: Arc<Mutex<SessionState>>,
    descriptor: Bytes,
}

impl Transaction {
    /// Opaque transaction descriptor.
    pub fn descriptor(&self) -> &Bytes {
        &self.descriptor
    }

    /// Applies updates within the transaction.
    pub async fn update(
        &self,
        updates: impl IntoIterator<Item = ApbUpdateOp>,
    ) -> Result<(), ClientError> {
        let request = Request::UpdateObjects(ApbUpdateObjects {
            updates: updates.into_iter().collect(),
            transaction_descriptor: self.descriptor.clone(),
        });
        self.expect_operation(request).await
    }

    /// Commits the transaction.
    pub async fn commit(self) -> Result<CommitResponse, ClientError> {
        let request = Request::CommitTransaction(ApbCommitTransaction {
            transaction_descriptor: self.descriptor.clone(),
        });

        match self.connection.send(&request).await? {
            Inbound::Response(Response::Commit(resp)) => complete_commit(&self.state, resp),
            other => Err(unexpected("CommitResp", other)),
        }
    }

    /// Aborts the transaction.
    pub async fn abort(self) -> Result<(), ClientError> {
        let request = Request::AbortTransaction(ApbAbortTransaction {
            transaction_descriptor: self.descriptor.clone(),
        });
        self.expect_operation(request).await
    }

    async fn expect_operation(&self, request: Request) -> Result<(), ClientError> {
        match self.connection.send(&request).await? {
            Inbound::Response(Response::Operation(resp)) if resp.success => Ok(()),
            Inbound::Response(Response::Operation(resp)) => {
                Err(ClientError::rejected(resp.errorcode))
            }
            // Some servers acknowledge with a bare message code
            Inbound::Empty(code) if code == antidote_protocol::MessageCode::OperationResp.as_u8() => {
                Ok(())
            }
            other => Err(unexpected("OperationResp", other)),
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("descriptor", &self.descriptor)
            .field("bucket", &self.bucket)
            .finish()
    }
}

#[async_trait]
impl Session for Transaction {
    async fn read_batch(&self, objects: &[&ObjectRef]) -> Result<Vec<CrdtValue>, ClientError> {
        let request = Request::ReadObjects(ApbReadObjects {
            boundobjects: objects.iter().map(|o| o.bound_object()).collect(),
            transaction_descriptor: self.descriptor.clone(),
        });

        let resp = match self.connection.send(&request).await? {
            Inbound::Response(Response::ReadObjects(resp)) => resp,
            other => return Err(unexpected("ReadObjectsResp", other)),
        };
        if !resp.success {
            return Err(ClientError::rejected(resp.errorcode));
        }
        interpret_reads(objects, resp.objects, self.codec.as_ref())
    }

    async fn update_objects(&self, updates: Vec<ApbUpdateOp>) -> Result<(), ClientError> {
        self.update(updates).await
    }
}

impl CrdtFactory for Transaction {
    fn object(&self, key: &str, kind: antidote_protocol::CrdtType) -> ObjectRef {
        ObjectRef::new(key, kind, self.bucket.as_str())
    }

    fn codec(&self) -> SharedCodec {
        self.codec.clone()
    }
}
