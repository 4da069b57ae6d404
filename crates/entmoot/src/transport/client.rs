//! Client side of the TCP harness

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::io::{BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::frame::{self, Envelope, Frame, RawEnvelope, DEFAULT_MAX_FRAME_LEN};
use crate::error::{ExecutorError, Result};
use crate::executor::RawValue;
use crate::payload::Payload;
use crate::service::{
    ComputeRequest, CreateCallRequest, CreateSelectionRequest, CreateTupleRequest,
    CreateValueRequest, DisposeRequest, Request, Response, TupleElement, WireError,
};
use crate::table::ValueRef;
use crate::types::{Selection, TypeSignature};

type PendingMap = DashMap<u64, oneshot::Sender<Response>>;

/// Connection to a remote executor service.
///
/// Cheap to clone; clones share the connection. Concurrent requests are
/// multiplexed and matched to their responses by id.
#[derive(Clone)]
pub struct ExecutorClient {
    inner: Arc<Connection>,
}

struct Connection {
    next_id: AtomicU64,
    pending: Arc<PendingMap>,
    closed: Arc<AtomicBool>,
    writer: Mutex<BufWriter<OwnedWriteHalf>>,
    reader_task: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

impl std::fmt::Debug for ExecutorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorClient")
            .field("in_flight", &self.inner.pending.len())
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl ExecutorClient {
    /// Connect to a service listening on `addr`.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with_max_frame_len(addr, DEFAULT_MAX_FRAME_LEN).await
    }

    /// Connect, treating any response frame longer than `max_frame_len`
    /// bytes as a broken connection.
    pub async fn connect_with_max_frame_len(
        addr: impl ToSocketAddrs,
        max_frame_len: usize,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ExecutorError::Transport(format!("failed to connect: {}", e)))?;
        let (reader, writer) = stream.into_split();
        let pending = Arc::new(PendingMap::new());
        let closed = Arc::new(AtomicBool::new(false));
        let reader_task = tokio::spawn(read_responses(
            reader,
            Arc::clone(&pending),
            Arc::clone(&closed),
            max_frame_len,
        ));
        Ok(Self {
            inner: Arc::new(Connection {
                next_id: AtomicU64::new(1),
                pending,
                closed,
                writer: Mutex::new(BufWriter::new(writer)),
                reader_task,
            }),
        })
    }

    /// Send one request and wait for its response.
    pub async fn request(&self, request: Request) -> Result<Response> {
        let conn = &self.inner;
        let id = conn.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        conn.pending.insert(id, tx);
        if conn.closed.load(Ordering::SeqCst) {
            conn.pending.remove(&id);
            return Err(ExecutorError::Transport("connection closed".into()));
        }

        let line = frame::encode(&Envelope { id, body: request })?;
        let written = {
            let mut writer = conn.writer.lock().await;
            frame::write_line(&mut *writer, &line).await
        };
        if let Err(e) = written {
            conn.pending.remove(&id);
            return Err(ExecutorError::Transport(format!("failed to send request: {}", e)));
        }

        rx.await
            .map_err(|_| ExecutorError::Transport("connection closed before response".into()))
    }

    /// Embed a value or computation remotely.
    pub async fn create_value(
        &self,
        value: RawValue,
        type_signature: Option<TypeSignature>,
    ) -> Result<ValueRef> {
        self.request(Request::CreateValue(CreateValueRequest {
            value,
            type_signature,
        }))
        .await?
        .into_value_ref()
    }

    /// Bind a remote function to an optional remote argument.
    pub async fn create_call(
        &self,
        function_ref: &ValueRef,
        argument_ref: Option<&ValueRef>,
    ) -> Result<ValueRef> {
        self.request(Request::CreateCall(CreateCallRequest {
            function_ref: function_ref.clone(),
            argument_ref: argument_ref.cloned(),
        }))
        .await?
        .into_value_ref()
    }

    /// Compose remote values into a tuple.
    pub async fn create_tuple(&self, elements: Vec<(Option<String>, ValueRef)>) -> Result<ValueRef> {
        let elements = elements
            .into_iter()
            .map(|(name, value_ref)| TupleElement { name, value_ref })
            .collect();
        self.request(Request::CreateTuple(CreateTupleRequest { elements }))
            .await?
            .into_value_ref()
    }

    /// Project an element out of a remote tuple.
    pub async fn create_selection(
        &self,
        source_ref: &ValueRef,
        selection: Selection,
    ) -> Result<ValueRef> {
        let source_ref = source_ref.clone();
        let request = match selection {
            Selection::Index(index) => CreateSelectionRequest::by_index(source_ref, index),
            Selection::Name(name) => CreateSelectionRequest::by_name(source_ref, name),
        };
        self.request(Request::CreateSelection(request))
            .await?
            .into_value_ref()
    }

    /// Materialize a remote value.
    pub async fn compute(&self, value_ref: &ValueRef) -> Result<Payload> {
        self.request(Request::Compute(ComputeRequest {
            value_ref: value_ref.clone(),
        }))
        .await?
        .into_payload()
    }

    /// Release a remote reference.
    pub async fn dispose(&self, value_ref: &ValueRef) -> Result<()> {
        self.request(Request::Dispose(DisposeRequest {
            value_ref: value_ref.clone(),
        }))
        .await?
        .into_disposed()
    }

    /// Whether the server side has closed the connection.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

async fn read_responses(
    reader: OwnedReadHalf,
    pending: Arc<PendingMap>,
    closed: Arc<AtomicBool>,
    max_frame_len: usize,
) {
    let mut reader = BufReader::new(reader);
    loop {
        match frame::read_frame(&mut reader, max_frame_len).await {
            Ok(Some(Frame::Line(line))) => dispatch(&line, &pending),
            Ok(Some(Frame::Oversized)) => {
                // The id is lost with the frame, so no waiter can be told apart
                warn!(max_frame_len, "response frame too large, closing connection");
                break;
            }
            Ok(None) => {
                debug!("server closed connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "failed to read from server");
                break;
            }
        }
    }
    closed.store(true, Ordering::SeqCst);
    // Dropping the senders fails every request still waiting
    pending.clear();
}

/// Route one response line to the request waiting on its id.
fn dispatch(line: &str, pending: &PendingMap) {
    if line.trim().is_empty() {
        return;
    }
    let raw: RawEnvelope = match frame::decode(line) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "dropping response frame without an id");
            return;
        }
    };
    let tx = match pending.remove(&raw.id) {
        Some((_, tx)) => tx,
        None => {
            warn!(id = raw.id, "response for unknown request");
            return;
        }
    };
    let response = serde_json::from_value(raw.body).unwrap_or_else(|e| {
        warn!(id = raw.id, error = %e, "malformed response body");
        Response::Error {
            error: WireError::from(&ExecutorError::Transport(format!(
                "malformed response: {}",
                e
            ))),
        }
    });
    // The caller may have given up waiting
    let _ = tx.send(response);
}
