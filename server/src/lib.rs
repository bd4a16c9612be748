//! separee-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use anyhow::Result;
use config::ServerConfig;
use separee_observability::{observability_server_starten, SepareeMetrics};
use separee_relay::{RelayServer, RelayState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. RelayState aufbauen (reiner Speicher-Zustand, nichts persistent)
    /// 2. TCP-Relay-Listener starten
    /// 3. Observability-Server starten (+ Statistik-Spiegelung)
    /// 4. Auf Ctrl-C warten, dann Shutdown via watch-Kanal
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            relay = %self.config.relay_bind_adresse(),
            observability = %self.config.observability_bind_adresse(),
            "Server startet"
        );

        let state = RelayState::neu(self.config.relay_config());
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        // TCP-Relay
        let relay_addr: SocketAddr = self.config.relay_bind_adresse().parse()?;
        let relay = RelayServer::neu(Arc::clone(&state), relay_addr);
        let relay_task = tokio::spawn(relay.starten(shutdown_rx.clone()));

        // Observability (Metriken + Health)
        if self.config.observability.aktiviert {
            let metrics = SepareeMetrics::neu()?;
            let obs_addr: SocketAddr = self.config.observability_bind_adresse().parse()?;

            let obs_metrics = metrics.clone();
            tokio::spawn(async move {
                if let Err(e) = observability_server_starten(obs_addr, obs_metrics).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });

            let sampler_state = Arc::clone(&state);
            let mut sampler_shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = statistik_spiegeln(sampler_state, metrics) => {}
                    _ = sampler_shutdown.changed() => {}
                }
            });
        }

        tracing::info!("Separee-Relay laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        let _ = shutdown_tx.send(true);
        let _ = relay_task.await;
        Ok(())
    }
}

/// Spiegelt die Relay-Statistik periodisch in die Prometheus-Metriken
async fn statistik_spiegeln(state: Arc<RelayState>, metrics: SepareeMetrics) {
    let mut intervall = tokio::time::interval(Duration::from_secs(5));
    let mut letzter_weitergeleitet = 0u64;
    let mut letzter_verworfen = (0u64, 0u64, 0u64);

    loop {
        intervall.tick().await;

        metrics
            .connected_clients
            .set(state.broadcaster.client_anzahl() as f64);
        metrics.rooms_active.set(state.register.raum_anzahl() as f64);

        // Counter sind monoton: nur die Differenz seit dem letzten Tick
        let weitergeleitet = state.statistik.weitergeleitet_stand();
        metrics
            .relayed_events_total
            .inc_by(weitergeleitet - letzter_weitergeleitet);
        letzter_weitergeleitet = weitergeleitet;

        let verworfen = state.statistik.verworfen_stand();
        metrics
            .dropped_events_total
            .with_label_values(&["room-missing"])
            .inc_by(verworfen.0 - letzter_verworfen.0);
        metrics
            .dropped_events_total
            .with_label_values(&["oversized"])
            .inc_by(verworfen.1 - letzter_verworfen.1);
        metrics
            .dropped_events_total
            .with_label_values(&["invalid"])
            .inc_by(verworfen.2 - letzter_verworfen.2);
        letzter_verworfen = verworfen;
    }
}
