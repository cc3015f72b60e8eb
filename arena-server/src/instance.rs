//! Instance runner: one isolated world and its tick loop
//!
//! Each instance lives on its own OS thread with a current-thread tokio
//! runtime and owns its `World` outright. Connection tasks talk to it only
//! through an unbounded event channel; events are drained and applied at the
//! start of each tick, never mid-tick.

use arena_core::snapshot::{ClientId, ClientPacket};
use arena_core::{TickOutput, World};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::metrics::ServerMetrics;
use crate::protocol;
use crate::supervisor::InstanceReport;

/// Input to an instance from the transport
#[derive(Debug)]
pub enum InstanceEvent {
    Connected {
        client: ClientId,
        /// Encoded frames for this connection's writer task
        outbound: mpsc::UnboundedSender<Vec<u8>>,
    },
    Packet {
        client: ClientId,
        packet: ClientPacket,
    },
    Disconnected {
        client: ClientId,
    },
}

pub struct Instance {
    id: usize,
    world: World,
    tick_interval: Duration,
    connections: BTreeMap<ClientId, mpsc::UnboundedSender<Vec<u8>>>,
    metrics: Arc<ServerMetrics>,
    reports: mpsc::UnboundedSender<InstanceReport>,
    last_reported: Option<(usize, usize)>,
    ticks_since_report: u64,
    accepted: u64,
}

impl Instance {
    pub fn new(
        id: usize,
        world: World,
        tick_interval: Duration,
        metrics: Arc<ServerMetrics>,
        reports: mpsc::UnboundedSender<InstanceReport>,
    ) -> Self {
        Self {
            id,
            world,
            tick_interval,
            connections: BTreeMap::new(),
            metrics,
            reports,
            last_reported: None,
            ticks_since_report: 0,
            accepted: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn handle_event(&mut self, event: InstanceEvent) {
        match event {
            InstanceEvent::Connected { client, outbound } => {
                self.world.connect(client);
                self.connections.insert(client, outbound);
                self.accepted += 1;
            }
            InstanceEvent::Packet { client, packet } => {
                self.world.queue_packet(client, packet);
            }
            InstanceEvent::Disconnected { client } => {
                self.connections.remove(&client);
                self.world.disconnect(client);
            }
        }
    }

    /// Run one world tick, flush its packets and report if needed
    pub fn step(&mut self, dt: f32) -> TickOutput {
        let started = std::time::Instant::now();
        let output = self.world.tick(dt);

        if output.dropped > 0 {
            self.metrics.record_dropped(output.dropped as u64);
        }
        for (client, packet) in &output.packets {
            let Some(outbound) = self.connections.get(client) else {
                continue;
            };
            match protocol::encode(packet) {
                Ok(frame) => {
                    let len = frame.len();
                    // A closed writer means the disconnect event is on its way
                    if outbound.send(frame).is_ok() {
                        self.metrics.record_sent(len);
                    }
                }
                Err(e) => warn!(instance = self.id, client = client.0, error = %e, "Failed to encode packet"),
            }
        }

        let took = started.elapsed();
        let slow = took > self.tick_interval;
        if slow {
            warn!(
                instance = self.id,
                tick = output.tick,
                took_ms = took.as_secs_f64() * 1000.0,
                budget_ms = self.tick_interval.as_secs_f64() * 1000.0,
                "Slow tick"
            );
        }
        self.metrics.record_tick(took.as_micros() as u64, slow);
        self.report();
        output
    }

    /// Report after any join or leave, and about once a second otherwise
    fn report(&mut self) {
        self.ticks_since_report += 1;
        let counts = (self.world.player_count(), self.connections.len());
        let per_second = (1.0 / self.tick_interval.as_secs_f64().max(1e-3)).ceil() as u64;
        if self.last_reported == Some(counts) && self.ticks_since_report < per_second {
            return;
        }
        let report = InstanceReport {
            instance: self.id,
            player_count: counts.0,
            connection_count: counts.1,
            entity_count: self.world.pool().len(),
            tick: self.world.tick_count(),
            accepted: self.accepted,
        };
        if self.reports.send(report).is_err() {
            tracing::debug!(instance = self.id, "Supervisor gone, report dropped");
        }
        self.last_reported = Some(counts);
        self.ticks_since_report = 0;
    }

    /// Tick loop; returns on shutdown or once every event sender is gone
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<InstanceEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = Instant::now();
        info!(instance = self.id, interval_ms = self.tick_interval.as_millis() as u64, "Instance running");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            loop {
                match events.try_recv() {
                    Ok(event) => self.handle_event(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!(instance = self.id, "Event channel closed");
                        return;
                    }
                }
            }

            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f32();
            last = now;
            self.step(dt);
        }
        info!(instance = self.id, ticks = self.world.tick_count(), "Instance stopped");
    }
}

/// A running instance thread
pub struct InstanceHandle {
    pub id: usize,
    pub sender: mpsc::UnboundedSender<InstanceEvent>,
    thread: std::thread::JoinHandle<()>,
}

impl InstanceHandle {
    /// Move `instance` onto its own thread and start ticking
    pub fn spawn(instance: Instance, shutdown: watch::Receiver<bool>) -> std::io::Result<Self> {
        let (sender, events) = mpsc::unbounded_channel();
        let id = instance.id;
        let thread = std::thread::Builder::new()
            .name(format!("instance-{id}"))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!(instance = id, error = %e, "Failed to build instance runtime");
                        return;
                    }
                };
                runtime.block_on(instance.run(events, shutdown));
            })?;
        Ok(Self { id, sender, thread })
    }

    pub fn join(self) {
        if self.thread.join().is_err() {
            error!(instance = self.id, "Instance thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::snapshot::ServerPacket;
    use arena_core::{Content, WorldConfig};

    fn instance() -> (Instance, mpsc::UnboundedReceiver<InstanceReport>) {
        let content = Arc::new(Content::builtin().unwrap());
        let world = World::new(content, WorldConfig::default()).unwrap();
        let (reports, rx) = mpsc::unbounded_channel();
        let instance = Instance::new(0, world, Duration::from_millis(40), ServerMetrics::new(), reports);
        (instance, rx)
    }

    fn decode_frame(frame: &[u8]) -> ServerPacket {
        protocol::decode(&frame[4..]).unwrap()
    }

    #[test]
    fn test_connect_sends_welcome_frame() {
        let (mut instance, _reports) = instance();
        let (tx, mut rx) = mpsc::unbounded_channel();
        instance.handle_event(InstanceEvent::Connected {
            client: ClientId(7),
            outbound: tx,
        });
        instance.step(0.04);
        let frame = rx.try_recv().unwrap();
        assert!(matches!(decode_frame(&frame), ServerPacket::Welcome { client: ClientId(7), .. }));
    }

    #[test]
    fn test_join_is_reported() {
        let (mut instance, mut reports) = instance();
        let (tx, _rx) = mpsc::unbounded_channel();
        instance.handle_event(InstanceEvent::Connected {
            client: ClientId(1),
            outbound: tx,
        });
        instance.step(0.04);
        let first = reports.try_recv().unwrap();
        assert_eq!((first.player_count, first.connection_count), (0, 1));
        assert_eq!(first.accepted, 1);

        instance.handle_event(InstanceEvent::Packet {
            client: ClientId(1),
            packet: ClientPacket::Join { name: "rose".into() },
        });
        instance.step(0.04);
        let second = reports.try_recv().unwrap();
        assert_eq!(second.player_count, 1);

        // Nothing changed: no report until the periodic one
        instance.step(0.04);
        assert!(reports.try_recv().is_err());
    }

    #[test]
    fn test_disconnect_removes_player() {
        let (mut instance, _reports) = instance();
        let (tx, _rx) = mpsc::unbounded_channel();
        instance.handle_event(InstanceEvent::Connected {
            client: ClientId(1),
            outbound: tx,
        });
        instance.handle_event(InstanceEvent::Packet {
            client: ClientId(1),
            packet: ClientPacket::Join { name: "rose".into() },
        });
        instance.step(0.04);
        assert_eq!(instance.world().player_count(), 1);

        instance.handle_event(InstanceEvent::Disconnected { client: ClientId(1) });
        instance.step(0.04);
        assert_eq!(instance.world().player_count(), 0);
        assert_eq!(instance.connection_count(), 0);
    }
}
