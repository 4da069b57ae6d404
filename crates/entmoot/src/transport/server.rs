//! Accept loop and per-connection request handling

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::frame::{self, Envelope, Frame, RawEnvelope, DEFAULT_MAX_FRAME_LEN};
use crate::error::{ExecutorError, Result};
use crate::executor::Executor;
use crate::service::{ExecutorService, Request, Response, WireError};

/// Consecutive accept failures tolerated before the server gives up
const MAX_ACCEPT_ERRORS: usize = 10;

/// A bound listener paired with the service it exposes.
pub struct Server<E: Executor> {
    listener: TcpListener,
    service: Arc<ExecutorService<E>>,
    max_frame_len: usize,
}

impl<E: Executor + 'static> Server<E> {
    /// Bind to `addr`.
    pub async fn bind(addr: impl ToSocketAddrs, service: Arc<ExecutorService<E>>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ExecutorError::Transport(format!("failed to bind: {}", e)))?;
        Ok(Self {
            listener,
            service,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        })
    }

    /// Refuse request frames longer than `max_frame_len` bytes.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// The address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| ExecutorError::Transport(e.to_string()))
    }

    /// Serve until the accept loop fails.
    pub async fn run(self) -> Result<()> {
        accept_loop(self.listener, self.service, self.max_frame_len).await
    }

    /// Serve on a background task.
    pub fn spawn(self) -> Result<ServerHandle> {
        let local_addr = self.local_addr()?;
        let task = tokio::spawn(self.run());
        Ok(ServerHandle { local_addr, task })
    }
}

/// A server running on a background task.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    /// The address the server listens on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections.
    ///
    /// Connections already accepted keep being served on their own tasks.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Accept connections on `listener` and serve each on its own task.
pub async fn serve<E>(listener: TcpListener, service: Arc<ExecutorService<E>>) -> Result<()>
where
    E: Executor + 'static,
{
    accept_loop(listener, service, DEFAULT_MAX_FRAME_LEN).await
}

async fn accept_loop<E>(
    listener: TcpListener,
    service: Arc<ExecutorService<E>>,
    max_frame_len: usize,
) -> Result<()>
where
    E: Executor + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "executor service listening");
    }

    let mut error_count = 0;
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                error_count = 0;
                debug!(%peer, "client connected");
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, service, max_frame_len).await {
                        warn!(%peer, error = %e, "connection error");
                    }
                    debug!(%peer, "client disconnected");
                });
            }
            Err(e) => {
                error!(error = %e, "failed to accept connection");
                error_count += 1;
                if error_count > MAX_ACCEPT_ERRORS {
                    return Err(ExecutorError::Transport(format!(
                        "too many consecutive accept errors: {}",
                        e
                    )));
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn handle_connection<E>(
    stream: TcpStream,
    service: Arc<ExecutorService<E>>,
    max_frame_len: usize,
) -> Result<()>
where
    E: Executor + 'static,
{
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Responses are written by one task so frames never interleave
    let writer_task = tokio::spawn(async move {
        let mut writer = BufWriter::new(writer);
        while let Some(line) = rx.recv().await {
            frame::write_line(&mut writer, &line).await?;
        }
        Ok::<_, std::io::Error>(())
    });

    while let Some(frame) = frame::read_frame(&mut reader, max_frame_len)
        .await
        .map_err(|e| ExecutorError::Transport(e.to_string()))?
    {
        let line = match frame {
            Frame::Line(line) if line.trim().is_empty() => continue,
            Frame::Line(line) => line,
            Frame::Oversized => {
                warn!(max_frame_len, "rejecting oversized request frame");
                let err = ExecutorError::invalid_argument(format!(
                    "frame exceeds {} bytes",
                    max_frame_len
                ));
                send_response(&tx, 0, error_response(&err));
                continue;
            }
        };
        let tx = tx.clone();
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let (id, response) = match parse_request(&line) {
                Ok((id, request)) => (id, service.handle(request).await),
                Err((id, err)) => (id, error_response(&err)),
            };
            send_response(&tx, id, response);
        });
    }

    drop(tx);
    writer_task
        .await
        .map_err(|e| ExecutorError::Internal(e.to_string()))?
        .map_err(|e| ExecutorError::Transport(e.to_string()))
}

/// Decode a request frame, keeping the id whenever it can be recovered.
fn parse_request(line: &str) -> std::result::Result<(u64, Request), (u64, ExecutorError)> {
    let raw: RawEnvelope = frame::decode(line).map_err(|e| (0, e))?;
    let request = serde_json::from_value(raw.body).map_err(|e| {
        (
            raw.id,
            ExecutorError::invalid_argument(format!("malformed request: {}", e)),
        )
    })?;
    Ok((raw.id, request))
}

/// Queue a response for the writer task; every request id gets an answer.
fn send_response(tx: &mpsc::UnboundedSender<String>, id: u64, response: Response) {
    let encoded = frame::encode(&Envelope { id, body: response }).or_else(|e| {
        error!(id, error = %e, "failed to encode response");
        frame::encode(&Envelope {
            id,
            body: error_response(&e),
        })
    });
    match encoded {
        Ok(line) => {
            // A closed channel means the peer is gone
            let _ = tx.send(line);
        }
        Err(e) => error!(id, error = %e, "failed to encode error response"),
    }
}

fn error_response(err: &ExecutorError) -> Response {
    Response::Error {
        error: WireError::from(err),
    }
}
