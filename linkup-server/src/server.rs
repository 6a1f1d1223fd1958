use crate::router;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use linkup_core::ipc::{LinkupRequest, LinkupResponse};
use linkup_core::Network;
use std::path::Path;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

/// 4-byte little-endian length prefix + MessagePack payload.
fn le_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder().little_endian().new_codec()
}

pub async fn run_unix_server(
    socket_path: &str,
    network: Network,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)?;
    tracing::info!("IPC Server listening on {}", socket_path);

    loop {
        tokio::select! {
            res = listener.accept() => {
                let (stream, _) = res?;
                let network = network.clone();
                tokio::spawn(async move {
                    serve_connection(stream, network).await;
                });
            }
            _ = shutdown.recv() => {
                tracing::info!("Shutting down IPC server...");
                break;
            }
        }
    }

    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }

    Ok(())
}

async fn serve_connection(stream: UnixStream, network: Network) {
    let (read, write) = stream.into_split();
    let mut framed_read = FramedRead::new(read, le_codec());
    let mut framed_write = FramedWrite::new(write, le_codec());

    while let Some(frame) = framed_read.next().await {
        let bytes_mut = match frame {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("Frame error: {}", e);
                break;
            }
        };

        let response = match rmp_serde::from_slice::<LinkupRequest>(&bytes_mut) {
            Ok(request) => router::handle_request(request, &network).await,
            Err(e) => LinkupResponse::err(format!("Deserialization error: {}", e)),
        };

        match rmp_serde::to_vec_named(&response) {
            Ok(resp_bytes) => {
                if let Err(e) = framed_write.send(Bytes::from(resp_bytes)).await {
                    tracing::error!("Failed to send response: {}", e);
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize response: {}", e);
                break;
            }
        }
    }
}

/// Minimal client for the IPC socket; used by tests and tooling.
pub struct IpcClient {
    read: FramedRead<tokio::net::unix::OwnedReadHalf, LengthDelimitedCodec>,
    write: FramedWrite<tokio::net::unix::OwnedWriteHalf, LengthDelimitedCodec>,
}

impl IpcClient {
    pub async fn connect(socket_path: &str) -> anyhow::Result<Self> {
        let stream = UnixStream::connect(socket_path).await?;
        let (read, write) = stream.into_split();
        Ok(Self {
            read: FramedRead::new(read, le_codec()),
            write: FramedWrite::new(write, le_codec()),
        })
    }

    pub async fn call(&mut self, request: &LinkupRequest) -> anyhow::Result<LinkupResponse> {
        let bytes = linkup_core::ipc::encode(request)?;
        self.write.send(Bytes::from(bytes)).await?;
        let frame = self
            .read
            .next()
            .await
            .ok_or_else(|| anyhow::anyhow!("IPC connection closed"))??;
        Ok(linkup_core::ipc::decode(&frame)?)
    }
}
