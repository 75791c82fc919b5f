//! Unix socket listener for IPC.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ledgercal_protocol::{
    Envelope, HEADER_LEN, PROTOCOL_VERSION, ProtocolError, Request, Response, decode_payload,
    encode_message, frame_len,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Unix socket server for handling client connections.
pub struct SocketServer {
    config: ServerConfig,
    listener: UnixListener,
    connection_semaphore: Arc<Semaphore>,
}

impl SocketServer {
    /// Binds the configured socket path.
    ///
    /// A leftover socket file nobody listens on is removed first when
    /// `cleanup_stale_socket` is set; a live one is reported as in use.
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        let socket_path = &config.socket_path;

        if let Some(parent) = socket_path.parent()
            && !parent.exists()
        {
            return Err(ServerError::socket_path_invalid(
                parent.to_string_lossy().to_string(),
            ));
        }

        if socket_path.exists() {
            let live = UnixStream::connect(socket_path).await.is_ok();
            if live || !config.cleanup_stale_socket {
                return Err(ServerError::socket_in_use(
                    socket_path.to_string_lossy().to_string(),
                ));
            }
            info!(path = %socket_path.display(), "Removing stale socket");
            std::fs::remove_file(socket_path)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        info!(path = %socket_path.display(), "Socket server listening");

        let connection_semaphore = Arc::new(Semaphore::new(config.max_connections.max(1)));
        Ok(Self {
            config,
            listener,
            connection_semaphore,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Waits for a free connection slot, then accepts one connection.
    pub async fn accept(&self) -> ServerResult<Connection> {
        let permit = self
            .connection_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ServerError::Shutdown)?;

        let (stream, _addr) = self.listener.accept().await?;
        debug!("Accepted new connection");

        Ok(Connection {
            stream,
            timeout: self.config.connection_timeout,
            _permit: permit,
        })
    }

    /// Accepts connections forever, spawning `handler` for each.
    pub async fn run<F, Fut>(&self, handler: F) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        loop {
            match self.accept().await {
                Ok(connection) => {
                    tokio::spawn(handler(connection));
                }
                Err(ServerError::Shutdown) => return Ok(()),
                Err(e) => error!(error = %e, "Failed to accept connection"),
            }
        }
    }

    /// Runs the accept loop until `shutdown` completes.
    pub async fn run_until_shutdown<F, Fut, S>(&self, handler: F, shutdown: S) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
        S: std::future::Future<Output = ()> + Send,
    {
        tokio::select! {
            result = self.run(handler) => result,
            _ = shutdown => {
                info!("Shutdown signal received");
                Ok(())
            }
        }
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        let path = &self.config.socket_path;
        if !path.exists() {
            return;
        }
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "Removed socket file"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove socket file"),
        }
    }
}

/// A client connection to the server.
pub struct Connection {
    stream: UnixStream,
    timeout: Duration,
    _permit: OwnedSemaphorePermit,
}

impl Connection {
    /// Reads one request envelope.
    ///
    /// Returns `Ok(None)` when the client closed the connection between
    /// messages.
    pub async fn read_request(&mut self) -> ServerResult<Option<Envelope<Request>>> {
        let mut header = [0u8; HEADER_LEN];
        match tokio::time::timeout(self.timeout, self.stream.read_exact(&mut header)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ProtocolError::timeout("read request length").into()),
        }

        let len = frame_len(header)?;
        let mut payload = vec![0u8; len];
        match tokio::time::timeout(self.timeout, self.stream.read_exact(&mut payload)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ProtocolError::timeout("read request payload").into()),
        }

        let envelope: Envelope<Request> = decode_payload(&payload)?;
        if !envelope.is_compatible() {
            warn!(
                version = %envelope.protocol_version,
                expected = PROTOCOL_VERSION,
                "Incompatible protocol version"
            );
        }
        Ok(Some(envelope))
    }

    pub async fn write_response(&mut self, envelope: &Envelope<Response>) -> ServerResult<()> {
        let bytes = encode_message(envelope)?;
        match tokio::time::timeout(self.timeout, self.stream.write_all(&bytes)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ProtocolError::timeout("write response").into()),
        }
    }

    /// Sends a response for the given request.
    pub async fn respond(
        &mut self,
        request_id: impl Into<String>,
        response: Response,
    ) -> ServerResult<()> {
        self.write_response(&Envelope::response(request_id, response))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgercal_protocol::{SyncParams, decode_message};
    use tempfile::tempdir;

    #[tokio::test]
    async fn socket_file_lifecycle() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let server = SocketServer::new(ServerConfig::new(&socket_path)).await.unwrap();
        assert!(socket_path.exists());
        drop(server);
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn live_socket_is_in_use() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let _server = SocketServer::new(ServerConfig::new(&socket_path)).await.unwrap();
        let result = SocketServer::new(ServerConfig::new(&socket_path)).await;
        assert!(matches!(result, Err(ServerError::SocketInUse { .. })));
    }

    #[tokio::test]
    async fn stale_socket_is_replaced() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        std::fs::write(&socket_path, b"stale").unwrap();

        let kept = ServerConfig::new(&socket_path).with_cleanup_stale_socket(false);
        assert!(matches!(
            SocketServer::new(kept).await,
            Err(ServerError::SocketInUse { .. })
        ));

        let server = SocketServer::new(ServerConfig::new(&socket_path)).await.unwrap();
        assert!(socket_path.exists());
        drop(server);
    }

    #[tokio::test]
    async fn missing_parent_is_invalid() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("nope").join("test.sock");
        let result = SocketServer::new(ServerConfig::new(&socket_path)).await;
        assert!(matches!(result, Err(ServerError::SocketPathInvalid { .. })));
    }

    #[tokio::test]
    async fn connection_roundtrip() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let config = ServerConfig::new(&socket_path).with_connection_timeout(Duration::from_secs(5));
        let server = SocketServer::new(config).await.unwrap();

        let client_path = socket_path.clone();
        let client = tokio::spawn(async move {
            let mut stream = UnixStream::connect(&client_path).await.unwrap();
            let request = Envelope::request("req-1", Request::sync(SyncParams::default()));
            stream
                .write_all(&encode_message(&request).unwrap())
                .await
                .unwrap();

            let mut header = [0u8; HEADER_LEN];
            stream.read_exact(&mut header).await.unwrap();
            let mut frame = header.to_vec();
            frame.resize(HEADER_LEN + frame_len(header).unwrap(), 0);
            stream.read_exact(&mut frame[HEADER_LEN..]).await.unwrap();

            let response: Envelope<Response> = decode_message(&frame).unwrap();
            assert_eq!(response.request_id, "req-1");
            assert_eq!(response.payload, Response::Pong);
        });

        let mut conn = server.accept().await.unwrap();
        let request = conn.read_request().await.unwrap().unwrap();
        assert_eq!(request.payload, Request::sync(SyncParams::default()));
        conn.respond(&request.request_id, Response::Pong).await.unwrap();

        client.await.unwrap();
    }

    #[tokio::test]
    async fn client_disconnect_is_clean() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let server = SocketServer::new(ServerConfig::new(&socket_path)).await.unwrap();

        let client_path = socket_path.clone();
        let client = tokio::spawn(async move {
            let _stream = UnixStream::connect(&client_path).await.unwrap();
        });

        let mut conn = server.accept().await.unwrap();
        client.await.unwrap();
        assert!(conn.read_request().await.unwrap().is_none());
    }
}
