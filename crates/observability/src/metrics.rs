//! Prometheus-kompatible Metriken fuer Separee
//!
//! Registrierte Metriken:
//! - `separee_connected_clients` – Gauge: Aktuell verbundene Clients
//! - `separee_rooms_active` – Gauge: Aktive Raeume
//! - `separee_relayed_events_total` – Counter: Weitergeleitete Events
//! - `separee_dropped_events_total` – Counter: Verworfene Events (label: reason)

use anyhow::Result;
use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Separee-Prometheus-Metriken
#[derive(Clone)]
pub struct SepareeMetrics {
    pub registry: Arc<Registry>,

    /// Aktuell verbundene Clients
    pub connected_clients: Gauge,
    /// Aktive Raeume
    pub rooms_active: Gauge,
    /// Erfolgreich weitergeleitete Events
    pub relayed_events_total: IntCounter,
    /// Verworfene Events, nach Grund
    pub dropped_events_total: IntCounterVec,
}

impl SepareeMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = Gauge::with_opts(Opts::new(
            "separee_connected_clients",
            "Anzahl aktuell verbundener Clients",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let rooms_active = Gauge::with_opts(Opts::new(
            "separee_rooms_active",
            "Anzahl aktiver Raeume",
        ))?;
        registry.register(Box::new(rooms_active.clone()))?;

        let relayed_events_total = IntCounter::with_opts(Opts::new(
            "separee_relayed_events_total",
            "Gesamtanzahl weitergeleiteter Events",
        ))?;
        registry.register(Box::new(relayed_events_total.clone()))?;

        let dropped_events_total = IntCounterVec::new(
            Opts::new(
                "separee_dropped_events_total",
                "Gesamtanzahl verworfener Events",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(dropped_events_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            rooms_active,
            relayed_events_total,
            dropped_events_total,
        })
    }

    /// Rendert alle Metriken im Prometheus-Textformat
    pub fn rendern(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let familien = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&familien, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metrics: SepareeMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

/// `GET /metrics` – Prometheus scrape format
async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SepareeMetrics>,
) -> impl IntoResponse {
    match metrics.rendern() {
        Ok(body) => (axum::http::StatusCode::OK, body),
        Err(e) => {
            tracing::error!(fehler = %e, "Metriken-Rendering fehlgeschlagen");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                String::new(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_registrieren_und_rendern() {
        let metrics = SepareeMetrics::neu().unwrap();

        metrics.connected_clients.set(3.0);
        metrics.rooms_active.set(1.0);
        metrics.relayed_events_total.inc();
        metrics
            .dropped_events_total
            .with_label_values(&["oversized"])
            .inc();

        let text = metrics.rendern().unwrap();
        assert!(text.contains("separee_connected_clients 3"));
        assert!(text.contains("separee_rooms_active 1"));
        assert!(text.contains("separee_relayed_events_total 1"));
        assert!(text.contains("reason=\"oversized\""));
    }

    #[test]
    fn doppelte_registry_ist_unabhaengig() {
        let a = SepareeMetrics::neu().unwrap();
        let b = SepareeMetrics::neu().unwrap();
        a.relayed_events_total.inc();
        assert_eq!(b.relayed_events_total.get(), 0);
    }
}
