//! Unix socket client for the ledgercal daemon.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ledgercal_core::{SyncStatusReport, SyncSummary};
use ledgercal_protocol::{
    Envelope, HEADER_LEN, Request, Response, StatusInfo, SyncParams, decode_payload,
    encode_message, frame_len,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

/// Sends one request per connection and waits for the answer.
#[derive(Debug, Clone)]
pub struct SocketClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl SocketClient {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sends `request` and returns the daemon's response payload.
    ///
    /// Error responses are returned as [`ClientError::Server`].
    pub async fn send(&self, request: Request) -> ClientResult<Response> {
        let request_id = Uuid::new_v4().to_string();
        debug!(
            socket = %self.socket_path.display(),
            request_id = %request_id,
            "Sending request"
        );

        let mut stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| {
                ClientError::Connection(format!(
                    "connecting to {} timed out after {}s",
                    self.socket_path.display(),
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                ClientError::Connection(format!(
                    "cannot reach daemon at {} ({e}); is `ledgercal server` running?",
                    self.socket_path.display()
                ))
            })?;

        let frame = encode_message(&Envelope::request(&request_id, request))?;
        tokio::time::timeout(self.timeout, async {
            stream.write_all(&frame).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| ClientError::Timeout("sending request".into()))??;

        let envelope: Envelope<Response> = tokio::time::timeout(self.timeout, async {
            let mut header = [0u8; HEADER_LEN];
            stream.read_exact(&mut header).await?;
            let mut payload = vec![0u8; frame_len(header)?];
            stream.read_exact(&mut payload).await?;
            Ok::<_, ClientError>(decode_payload(&payload)?)
        })
        .await
        .map_err(|_| ClientError::Timeout("waiting for response".into()))??;

        if envelope.request_id != request_id {
            warn!(
                expected = %request_id,
                received = %envelope.request_id,
                "Response request_id mismatch"
            );
        }

        match envelope.payload {
            Response::Error { error } => Err(ClientError::Server(error)),
            response => Ok(response),
        }
    }

    pub async fn sync(&self, params: SyncParams) -> ClientResult<SyncSummary> {
        match self.send(Request::sync(params)).await? {
            Response::SyncResult { summary } => Ok(summary),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn sync_status(&self, limit: Option<usize>) -> ClientResult<SyncStatusReport> {
        match self.send(Request::sync_status(limit)).await? {
            Response::SyncStatus { report } => Ok(report),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn status(&self) -> ClientResult<StatusInfo> {
        match self.send(Request::Status).await? {
            Response::Status { info } => Ok(info),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn shutdown(&self) -> ClientResult<()> {
        match self.send(Request::Shutdown).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// True if a daemon answers on the socket.
    pub async fn ping(&self) -> bool {
        matches!(self.send(Request::Ping).await, Ok(Response::Pong))
    }
}

fn unexpected(response: &Response) -> ClientError {
    ClientError::UnexpectedResponse(format!("{response:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgercal_core::SyncType;
    use ledgercal_protocol::ErrorCode;
    use tempfile::tempdir;
    use tokio::net::UnixListener;

    /// Answers a single request with `response`.
    async fn serve_once(listener: UnixListener, response: Response) -> Request {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut header = [0u8; HEADER_LEN];
        stream.read_exact(&mut header).await.unwrap();
        let mut payload = vec![0u8; frame_len(header).unwrap()];
        stream.read_exact(&mut payload).await.unwrap();
        let request: Envelope<Request> = decode_payload(&payload).unwrap();

        let reply = Envelope::response(&request.request_id, response);
        stream
            .write_all(&encode_message(&reply).unwrap())
            .await
            .unwrap();
        request.payload
    }

    #[tokio::test]
    async fn sync_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let mut summary = SyncSummary::new(SyncType::Generated);
        summary.pushed = 3;
        let server = tokio::spawn(serve_once(listener, Response::sync_result(summary.clone())));

        let client = SocketClient::new(&path, Duration::from_secs(5));
        let params = SyncParams::default().with_sync_type(SyncType::Generated);
        assert_eq!(client.sync(params.clone()).await.unwrap(), summary);
        assert_eq!(server.await.unwrap(), Request::sync(params));
    }

    #[tokio::test]
    async fn error_response_becomes_server_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.sock");
        let listener = UnixListener::bind(&path).unwrap();
        tokio::spawn(serve_once(
            listener,
            Response::error(ErrorCode::AuthenticationFailed, "token expired"),
        ));

        let client = SocketClient::new(&path, Duration::from_secs(5));
        let err = client.sync(SyncParams::default()).await.unwrap_err();
        let ClientError::Server(error) = err else {
            panic!("expected server error, got {err:?}");
        };
        assert_eq!(error.code, ErrorCode::AuthenticationFailed);
        assert_eq!(error.message, "token expired");
    }

    #[tokio::test]
    async fn wrong_response_kind_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.sock");
        let listener = UnixListener::bind(&path).unwrap();
        tokio::spawn(serve_once(listener, Response::Pong));

        let client = SocketClient::new(&path, Duration::from_secs(5));
        assert!(matches!(
            client.sync_status(None).await,
            Err(ClientError::UnexpectedResponse(_))
        ));
    }

    #[tokio::test]
    async fn missing_daemon_is_a_connection_error() {
        let dir = tempdir().unwrap();
        let client = SocketClient::new(dir.path().join("none.sock"), Duration::from_secs(1));
        assert!(matches!(
            client.status().await,
            Err(ClientError::Connection(_))
        ));
        assert!(!client.ping().await);
    }
}
