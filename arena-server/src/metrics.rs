//! Server metrics: lightweight tick and network counters with Prometheus and JSON export
//!
//! Uses lock-free atomics for all counters. Instance threads and connection
//! tasks write them; the HTTP API only reads.
//!
//! ## Endpoints
//! - `GET /metrics`: Prometheus text format
//! - `GET /metrics/json`: JSON format (for stress test client consumption)

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::api::ApiState;

/// Shared metrics state (all lock-free atomics)
#[derive(Debug)]
pub struct ServerMetrics {
    /// World ticks across all instances
    pub ticks: AtomicU64,
    /// Ticks that overran their interval
    pub slow_ticks: AtomicU64,
    /// Cumulative tick duration in microseconds
    pub tick_time_us: AtomicU64,
    /// Client packets decoded and queued
    pub packets_in: AtomicU64,
    /// Client frames that failed to decode plus packets the world refused
    pub packets_dropped: AtomicU64,
    pub packets_out: AtomicU64,
    pub bytes_out: AtomicU64,
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    /// HTTP requests served by the status API
    pub total_requests: AtomicU64,
    pub total_errors: AtomicU64,
    pub start_time: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            slow_ticks: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            packets_in: AtomicU64::new(0),
            packets_dropped: AtomicU64::new(0),
            packets_out: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl ServerMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_tick(&self, duration_us: u64, slow: bool) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.tick_time_us.fetch_add(duration_us, Ordering::Relaxed);
        if slow {
            self.slow_ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_packet_in(&self) {
        self.packets_in.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: u64) {
        self.packets_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_sent(&self, bytes: usize) {
        self.packets_out.fetch_add(1, Ordering::Relaxed);
        self.bytes_out.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        // Saturate so a stray double close can't wrap the gauge
        let _ = self
            .connections_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn record_request(&self, is_error: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn avg_tick_ms(&self) -> f64 {
        let ticks = self.ticks.load(Ordering::Relaxed);
        let us = self.tick_time_us.load(Ordering::Relaxed);
        if ticks > 0 {
            (us as f64 / ticks as f64) / 1000.0
        } else {
            0.0
        }
    }
}

// ============================================================================
// Axum Middleware: Automatic request tracking
// ============================================================================

/// Middleware that counts every HTTP request and its errors
pub async fn metrics_middleware(
    State(state): State<ApiState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let resp = next.run(req).await;
    let is_error = resp.status().is_client_error() || resp.status().is_server_error();
    state.metrics.record_request(is_error);
    resp
}

// ============================================================================
// GET /metrics: Prometheus text exposition format
// ============================================================================

pub async fn prometheus_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let m = &state.metrics;
    let ticks = m.ticks.load(Ordering::Relaxed);
    let slow_ticks = m.slow_ticks.load(Ordering::Relaxed);
    let packets_in = m.packets_in.load(Ordering::Relaxed);
    let packets_dropped = m.packets_dropped.load(Ordering::Relaxed);
    let packets_out = m.packets_out.load(Ordering::Relaxed);
    let bytes_out = m.bytes_out.load(Ordering::Relaxed);
    let connections_total = m.connections_total.load(Ordering::Relaxed);
    let connections_active = m.connections_active.load(Ordering::Relaxed);
    let total_requests = m.total_requests.load(Ordering::Relaxed);
    let avg_tick_s = m.avg_tick_ms() / 1000.0;
    let uptime = m.uptime_secs();

    let (players, per_instance) = {
        let table = state.status.read();
        let per_instance: String = table
            .instances
            .iter()
            .map(|s| {
                format!(
                    "arena_instance_players{{instance=\"{}\"}} {}\n",
                    s.instance, s.player_count
                )
            })
            .collect();
        (table.total_players(), per_instance)
    };

    let body = format!(
        "# HELP arena_ticks_total World ticks processed across all instances\n\
         # TYPE arena_ticks_total counter\n\
         arena_ticks_total {ticks}\n\
         \n\
         # HELP arena_slow_ticks_total Ticks that overran their interval\n\
         # TYPE arena_slow_ticks_total counter\n\
         arena_slow_ticks_total {slow_ticks}\n\
         \n\
         # HELP arena_tick_duration_seconds Average tick duration\n\
         # TYPE arena_tick_duration_seconds gauge\n\
         arena_tick_duration_seconds {avg_tick_s:.6}\n\
         \n\
         # HELP arena_packets_in_total Client packets accepted\n\
         # TYPE arena_packets_in_total counter\n\
         arena_packets_in_total {packets_in}\n\
         \n\
         # HELP arena_packets_dropped_total Client packets dropped\n\
         # TYPE arena_packets_dropped_total counter\n\
         arena_packets_dropped_total {packets_dropped}\n\
         \n\
         # HELP arena_packets_out_total Server packets written\n\
         # TYPE arena_packets_out_total counter\n\
         arena_packets_out_total {packets_out}\n\
         \n\
         # HELP arena_bytes_out_total Bytes queued to clients\n\
         # TYPE arena_bytes_out_total counter\n\
         arena_bytes_out_total {bytes_out}\n\
         \n\
         # HELP arena_connections_total Connections accepted\n\
         # TYPE arena_connections_total counter\n\
         arena_connections_total {connections_total}\n\
         \n\
         # HELP arena_connections_active Open connections\n\
         # TYPE arena_connections_active gauge\n\
         arena_connections_active {connections_active}\n\
         \n\
         # HELP arena_player_count Joined players across all instances\n\
         # TYPE arena_player_count gauge\n\
         arena_player_count {players}\n\
         \n\
         # HELP arena_instance_players Joined players per instance\n\
         # TYPE arena_instance_players gauge\n\
         {per_instance}\
         \n\
         # HELP arena_requests_total Status API requests served\n\
         # TYPE arena_requests_total counter\n\
         arena_requests_total {total_requests}\n\
         \n\
         # HELP arena_uptime_seconds Server uptime\n\
         # TYPE arena_uptime_seconds gauge\n\
         arena_uptime_seconds {uptime:.2}\n",
    );

    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

// ============================================================================
// GET /metrics/json: JSON format for stress test clients
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonMetrics {
    pub uptime_secs: f64,
    pub player_count: usize,
    pub entity_count: usize,
    pub ticks: u64,
    pub slow_ticks: u64,
    pub avg_tick_time_ms: f64,
    pub packets_in: u64,
    pub packets_dropped: u64,
    pub packets_out: u64,
    pub bytes_out: u64,
    pub connections_active: u64,
    pub total_requests: u64,
}

pub async fn json_metrics_handler(State(state): State<ApiState>) -> Json<JsonMetrics> {
    let m = &state.metrics;
    let (player_count, entity_count) = {
        let table = state.status.read();
        (table.total_players(), table.total_entities())
    };

    Json(JsonMetrics {
        uptime_secs: m.uptime_secs(),
        player_count,
        entity_count,
        ticks: m.ticks.load(Ordering::Relaxed),
        slow_ticks: m.slow_ticks.load(Ordering::Relaxed),
        avg_tick_time_ms: m.avg_tick_ms(),
        packets_in: m.packets_in.load(Ordering::Relaxed),
        packets_dropped: m.packets_dropped.load(Ordering::Relaxed),
        packets_out: m.packets_out.load(Ordering::Relaxed),
        bytes_out: m.bytes_out.load(Ordering::Relaxed),
        connections_active: m.connections_active.load(Ordering::Relaxed),
        total_requests: m.total_requests.load(Ordering::Relaxed),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_metrics_defaults() {
        let m = ServerMetrics::default();
        assert_eq!(m.ticks.load(Ordering::Relaxed), 0);
        assert_eq!(m.packets_dropped.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_tick() {
        let m = ServerMetrics::default();
        m.record_tick(3000, false);
        m.record_tick(5000, true);
        assert_eq!(m.ticks.load(Ordering::Relaxed), 2);
        assert_eq!(m.slow_ticks.load(Ordering::Relaxed), 1);
        assert!((m.avg_tick_ms() - 4.0).abs() < 0.01);
    }

    #[test]
    fn test_connection_gauge_never_wraps() {
        let m = ServerMetrics::default();
        m.connection_opened();
        m.connection_closed();
        m.connection_closed();
        assert_eq!(m.connections_active.load(Ordering::Relaxed), 0);
        assert_eq!(m.connections_total.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_avg_tick_without_ticks() {
        let m = ServerMetrics::default();
        assert_eq!(m.avg_tick_ms(), 0.0);
    }
}
