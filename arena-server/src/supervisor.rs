//! Supervisor: instance status table and connection handoff
//!
//! Instances report `{ instance, player_count, .. }` after joins and leaves
//! (and about once a second otherwise). The supervisor task folds those
//! reports into a shared [`StatusTable`]; the transport asks the supervisor
//! which instance a new connection should go to.
//!
//! ```text
//! Instance thread ── InstanceReport ──► supervisor task ──► StatusTable
//!                                                            │      │
//!                        transport: assign() ◄───────────────┘      └──► HTTP API (read-only)
//! ```

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::instance::InstanceEvent;

/// Progress report sent by an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceReport {
    pub instance: usize,
    pub player_count: usize,
    pub connection_count: usize,
    pub entity_count: usize,
    pub tick: u64,
    /// Connections this instance has taken over since it started
    pub accepted: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStatus {
    pub instance: usize,
    pub player_count: usize,
    pub connection_count: usize,
    pub entity_count: usize,
    pub tick: u64,
    /// Handoffs made to this instance since start
    pub assigned: u64,
    /// Handoffs the instance has confirmed in a report
    pub accepted: u64,
    /// Connections handed off but not yet reflected in a report
    pub pending: usize,
}

impl InstanceStatus {
    fn load(&self) -> usize {
        self.connection_count + self.pending
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTable {
    pub instances: Vec<InstanceStatus>,
}

impl StatusTable {
    pub fn new(count: usize) -> Self {
        Self {
            instances: (0..count)
                .map(|instance| InstanceStatus {
                    instance,
                    ..InstanceStatus::default()
                })
                .collect(),
        }
    }

    pub fn apply(&mut self, report: InstanceReport) {
        let Some(status) = self.instances.get_mut(report.instance) else {
            tracing::warn!(instance = report.instance, "Report from unknown instance");
            return;
        };
        status.player_count = report.player_count;
        status.connection_count = report.connection_count;
        status.entity_count = report.entity_count;
        status.tick = report.tick;
        // A report built before the latest handoffs were drained only
        // confirms the ones it counted
        status.accepted = status.accepted.max(report.accepted);
        status.pending = status.assigned.saturating_sub(status.accepted) as usize;
    }

    /// Instance with the fewest connections; ties go to the lowest index
    pub fn least_loaded(&self) -> Option<usize> {
        self.instances
            .iter()
            .min_by_key(|s| (s.load(), s.instance))
            .map(|s| s.instance)
    }

    pub fn total_players(&self) -> usize {
        self.instances.iter().map(|s| s.player_count).sum()
    }

    pub fn total_entities(&self) -> usize {
        self.instances.iter().map(|s| s.entity_count).sum()
    }
}

/// Shared handle to the status table
pub type SharedStatus = Arc<RwLock<StatusTable>>;

pub struct Supervisor {
    senders: Vec<mpsc::UnboundedSender<InstanceEvent>>,
    status: SharedStatus,
}

impl Supervisor {
    pub fn new(senders: Vec<mpsc::UnboundedSender<InstanceEvent>>) -> Self {
        let status = Arc::new(RwLock::new(StatusTable::new(senders.len())));
        Self { senders, status }
    }

    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    /// Pick the least loaded instance for a new connection and reserve a
    /// place on it until its next report
    pub fn assign(&self) -> Option<(usize, mpsc::UnboundedSender<InstanceEvent>)> {
        let mut table = self.status.write();
        let index = table.least_loaded()?;
        let sender = self.senders.get(index)?.clone();
        if sender.is_closed() {
            tracing::warn!(instance = index, "Instance is gone, refusing connection");
            return None;
        }
        let status = &mut table.instances[index];
        status.assigned += 1;
        status.pending = status.assigned.saturating_sub(status.accepted) as usize;
        Some((index, sender))
    }

    /// Fold reports into the status table until shutdown or every instance
    /// has dropped its report sender
    pub async fn run(
        status: SharedStatus,
        mut reports: mpsc::UnboundedReceiver<InstanceReport>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                report = reports.recv() => match report {
                    Some(report) => {
                        tracing::debug!(
                            instance = report.instance,
                            players = report.player_count,
                            entities = report.entity_count,
                            "Instance report"
                        );
                        status.write().apply(report);
                    }
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("Supervisor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(instance: usize, connection_count: usize) -> InstanceReport {
        InstanceReport {
            accepted: connection_count as u64,
            instance,
            player_count: connection_count,
            connection_count,
            entity_count: 10,
            tick: 1,
        }
    }

    #[test]
    fn test_least_loaded_prefers_fewest_connections() {
        let mut table = StatusTable::new(3);
        table.apply(report(0, 3));
        table.apply(report(1, 1));
        table.apply(report(2, 2));
        assert_eq!(table.least_loaded(), Some(1));
    }

    #[test]
    fn test_ties_go_to_lowest_index() {
        let table = StatusTable::new(4);
        assert_eq!(table.least_loaded(), Some(0));
    }

    #[test]
    fn test_empty_table_has_no_pick() {
        assert_eq!(StatusTable::new(0).least_loaded(), None);
    }

    #[test]
    fn test_unknown_instance_report_ignored() {
        let mut table = StatusTable::new(1);
        table.apply(report(5, 9));
        assert_eq!(table.total_players(), 0);
    }

    #[test]
    fn test_assign_spreads_a_burst() {
        let (a, _ra) = mpsc::unbounded_channel();
        let (b, _rb) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(vec![a, b]);
        let picks: Vec<usize> = (0..4).filter_map(|_| supervisor.assign()).map(|(i, _)| i).collect();
        assert_eq!(picks, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_report_clears_reservations() {
        let (a, _ra) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(vec![a]);
        supervisor.assign();
        supervisor.assign();
        assert_eq!(supervisor.status().read().instances[0].pending, 2);
        supervisor.status().write().apply(report(0, 2));
        assert_eq!(supervisor.status().read().instances[0].pending, 0);
        assert_eq!(supervisor.status().read().instances[0].connection_count, 2);
    }

    #[test]
    fn test_stale_report_keeps_later_handoffs() {
        let (a, _ra) = mpsc::unbounded_channel();
        let (b, _rb) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(vec![a, b]);
        let status = supervisor.status();

        // Two handoffs to instance 0; its report only counted the first
        assert_eq!(supervisor.assign().map(|(i, _)| i), Some(0));
        assert_eq!(supervisor.assign().map(|(i, _)| i), Some(1));
        assert_eq!(supervisor.assign().map(|(i, _)| i), Some(0));
        status.write().apply(report(0, 1));
        assert_eq!(status.read().instances[0].pending, 1);

        // Instance 0 still carries two, so the next one goes to instance 1
        assert_eq!(supervisor.assign().map(|(i, _)| i), Some(1));

        // An older report arriving late cannot undo a confirmation
        let mut stale = report(0, 0);
        stale.tick = 0;
        status.write().apply(stale);
        assert_eq!(status.read().instances[0].pending, 1);
    }

    #[test]
    fn test_disconnects_do_not_hide_handoffs() {
        let (a, _ra) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(vec![a]);
        supervisor.assign();
        supervisor.assign();
        // Both were taken over and one already left again
        let mut churned = report(0, 1);
        churned.accepted = 2;
        supervisor.status().write().apply(churned);
        assert_eq!(supervisor.status().read().instances[0].pending, 0);
        assert_eq!(supervisor.status().read().instances[0].connection_count, 1);
    }

    #[test]
    fn test_closed_instance_refused() {
        let (a, ra) = mpsc::unbounded_channel();
        drop(ra);
        let supervisor = Supervisor::new(vec![a]);
        assert!(supervisor.assign().is_none());
    }
}
