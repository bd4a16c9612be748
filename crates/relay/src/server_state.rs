//! Gemeinsamer Server-Zustand fuer den Relay-Dienst
//!
//! Haelt Konfiguration, Registry, Broadcaster und Presence-Notifier als
//! Arc-Referenzen, die sicher zwischen tokio-Tasks geteilt werden koennen.
//! Der Relay haelt bewusst keinerlei persistenten Zustand: alles hier lebt
//! nur im Speicher und verschwindet mit dem Prozess.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::broadcast::EventBroadcaster;
use crate::presence::PresenceNotifier;
use crate::raum::RaumRegister;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Standard-Obergrenze fuer Datei-Payloads (10 MiB Klartext)
pub const DEFAULT_MAX_DATEI_BYTES: usize = 10 * 1024 * 1024;

/// Konfiguration fuer den Relay-Dienst
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximale gleichzeitige Verbindungen
    pub max_clients: u32,
    /// Teilnehmer-Obergrenze pro Raum (2 = exklusiver Paar-Kanal)
    pub max_teilnehmer: usize,
    /// Obergrenze fuer Datei-Payloads in Bytes (deklarierte Klartext-Groesse)
    pub max_datei_bytes: usize,
    /// Maximale Frame-Groesse auf dem Draht
    pub max_frame_bytes: usize,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_clients: 512,
            max_teilnehmer: 2,
            max_datei_bytes: DEFAULT_MAX_DATEI_BYTES,
            max_frame_bytes: separee_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

// ---------------------------------------------------------------------------
// Statistik
// ---------------------------------------------------------------------------

/// Laufende Zaehler fuer den Metrics-Endpunkt
///
/// Reine Atomics, damit die Relay-Pfade nichts von Prometheus wissen
/// muessen; der Server-Prozess spiegelt die Werte periodisch.
#[derive(Debug, Default)]
pub struct RelayStatistik {
    /// Erfolgreich weitergeleitete Events (alle Arten)
    pub weitergeleitet: AtomicU64,
    /// Verworfen: Raum existiert nicht (mehr)
    pub verworfen_raum_fehlt: AtomicU64,
    /// Verworfen: Datei ueber der Groessen-Obergrenze
    pub verworfen_zu_gross: AtomicU64,
    /// Verworfen: ungueltiger oder unvollstaendiger Payload
    pub verworfen_ungueltig: AtomicU64,
}

impl RelayStatistik {
    pub fn weitergeleitet_zaehlen(&self) {
        self.weitergeleitet.fetch_add(1, Ordering::Relaxed);
    }

    pub fn raum_fehlt_zaehlen(&self) {
        self.verworfen_raum_fehlt.fetch_add(1, Ordering::Relaxed);
    }

    pub fn zu_gross_zaehlen(&self) {
        self.verworfen_zu_gross.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ungueltig_zaehlen(&self) {
        self.verworfen_ungueltig.fetch_add(1, Ordering::Relaxed);
    }

    pub fn weitergeleitet_stand(&self) -> u64 {
        self.weitergeleitet.load(Ordering::Relaxed)
    }

    pub fn verworfen_stand(&self) -> (u64, u64, u64) {
        (
            self.verworfen_raum_fehlt.load(Ordering::Relaxed),
            self.verworfen_zu_gross.load(Ordering::Relaxed),
            self.verworfen_ungueltig.load(Ordering::Relaxed),
        )
    }
}

// ---------------------------------------------------------------------------
// RelayState
// ---------------------------------------------------------------------------

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    /// Relay-Konfiguration
    pub config: Arc<RelayConfig>,
    /// Raum-Registry (alleiniger Eigentuemer des Raum-Zustands)
    pub register: RaumRegister,
    /// Event-Broadcaster (Send-Queues aller Clients)
    pub broadcaster: EventBroadcaster,
    /// Presence-Notifier
    pub presence: PresenceNotifier,
    /// Laufende Zaehler fuer Metriken
    pub statistik: RelayStatistik,
    /// Startzeitpunkt (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl RelayState {
    /// Erstellt einen neuen RelayState
    pub fn neu(config: RelayConfig) -> Arc<Self> {
        let broadcaster = EventBroadcaster::neu();
        let presence = PresenceNotifier::neu(broadcaster.clone());
        let register = RaumRegister::neu(config.max_teilnehmer);
        Arc::new(Self {
            config: Arc::new(config),
            register,
            broadcaster,
            presence,
            statistik: RelayStatistik::default(),
            start_time: Instant::now(),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_plausibel() {
        let config = RelayConfig::default();
        assert_eq!(config.max_teilnehmer, 2);
        assert_eq!(config.max_datei_bytes, 10 * 1024 * 1024);
        assert!(config.max_frame_bytes > config.max_datei_bytes);
    }

    #[test]
    fn statistik_zaehlt() {
        let statistik = RelayStatistik::default();
        statistik.weitergeleitet_zaehlen();
        statistik.weitergeleitet_zaehlen();
        statistik.zu_gross_zaehlen();

        assert_eq!(statistik.weitergeleitet_stand(), 2);
        assert_eq!(statistik.verworfen_stand(), (0, 1, 0));
    }
}
