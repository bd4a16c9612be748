//! Medien-Erfassung – Naht zwischen Anruf-Maschine und Hardware
//!
//! Kamera und Mikrofon gehoeren dem einbettenden Client (UI-Schicht); die
//! Maschine fordert Spuren an und garantiert die Freigabe auf jedem
//! Austrittspfad (Auflegen, remote call-end, Fehler, Logout). Haengende
//! Geraete-Handles sind fuer den Nutzer sichtbar ("Kamera in Benutzung").

use async_trait::async_trait;
use std::sync::Arc;
use webrtc::track::track_local::TrackLocal;

use crate::error::AnrufFehler;

/// Lokale Medien-Spur, wie sie an die Peer Connection gehaengt wird
pub type MedienSpur = Arc<dyn TrackLocal + Send + Sync>;

/// Zugriff auf Kamera und Mikrofon
#[async_trait]
pub trait MedienGeraete: Send + Sync {
    /// Erfasst die lokalen Aufnahme-Geraete und liefert die Spuren
    ///
    /// Eine verweigerte Berechtigung ist ein normaler Fehlerfall
    /// ([`AnrufFehler::Medien`]) und beendet den Anrufversuch.
    async fn erfassen(&self) -> Result<Vec<MedienSpur>, AnrufFehler>;

    /// Gibt die Aufnahme-Geraete wieder frei (idempotent)
    fn freigeben(&self);
}
