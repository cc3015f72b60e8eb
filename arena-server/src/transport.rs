//! TCP transport
//!
//! Accepts connections, hands each one to the least loaded instance and runs
//! a reader and a writer task per connection. Frames that fail to decode are
//! counted and dropped; oversized frames and I/O errors close the connection.

use arena_core::snapshot::{ClientId, ClientPacket};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::instance::InstanceEvent;
use crate::metrics::ServerMetrics;
use crate::protocol::{self, ProtocolError};
use crate::supervisor::Supervisor;

pub struct Transport {
    listener: TcpListener,
    supervisor: Arc<Supervisor>,
    metrics: Arc<ServerMetrics>,
    next_client: AtomicU32,
}

impl Transport {
    pub async fn bind(
        addr: SocketAddr,
        supervisor: Arc<Supervisor>,
        metrics: Arc<ServerMetrics>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            supervisor,
            metrics,
            next_client: AtomicU32::new(1),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` flips
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) {
        match self.listener.local_addr() {
            Ok(addr) => info!("Game transport listening on {}", addr),
            Err(e) => warn!(error = %e, "Game transport listening on unknown address"),
        }

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let client = ClientId(self.next_client.fetch_add(1, Ordering::Relaxed));
                        let supervisor = self.supervisor.clone();
                        let metrics = self.metrics.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, peer, client, supervisor, metrics, shutdown).await;
                        });
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
                _ = shutdown.changed() => break,
            }
        }
        info!("Game transport stopped");
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    client: ClientId,
    supervisor: Arc<Supervisor>,
    metrics: Arc<ServerMetrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    let Some((instance, events)) = supervisor.assign() else {
        warn!(%peer, "No instance available, closing connection");
        return;
    };
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
    }

    let (mut reader, writer) = stream.into_split();
    let (outbound, frames) = mpsc::unbounded_channel();
    if events
        .send(InstanceEvent::Connected { client, outbound })
        .is_err()
    {
        warn!(%peer, instance, "Instance stopped before handoff");
        return;
    }
    metrics.connection_opened();
    info!(client = client.0, %peer, instance, "Client connected");

    let writer_task = tokio::spawn(write_loop(writer, frames));

    loop {
        let frame = tokio::select! {
            frame = protocol::read_frame(&mut reader) => frame,
            _ = shutdown.changed() => break,
        };
        let packet = match frame {
            Ok(Some(payload)) => protocol::decode::<ClientPacket>(&payload),
            Ok(None) => break,
            Err(e) => Err(e),
        };
        match packet {
            Ok(packet) => {
                metrics.record_packet_in();
                if events.send(InstanceEvent::Packet { client, packet }).is_err() {
                    break;
                }
            }
            Err(e) if e.is_recoverable() => {
                debug!(client = client.0, error = %e, "Dropping malformed frame");
                metrics.record_dropped(1);
            }
            Err(e @ ProtocolError::FrameTooLarge { .. }) => {
                debug!(client = client.0, error = %e, "Closing connection");
                metrics.record_dropped(1);
                break;
            }
            Err(e) => {
                debug!(client = client.0, error = %e, "Read failed");
                break;
            }
        }
    }

    let _ = events.send(InstanceEvent::Disconnected { client });
    writer_task.abort();
    metrics.connection_closed();
    info!(client = client.0, %peer, "Client disconnected");
}

async fn write_loop(mut writer: OwnedWriteHalf, mut frames: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = protocol::write_frame(&mut writer, &frame).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}
