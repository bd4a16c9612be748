//! separee-klient – Klient-Bibliothek
//!
//! Kapselt die Gegenstelle des Relay-Protokolls: eine persistente
//! TCP-Verbindung mit Request/Ack-Zuordnung und darauf die Raum-Sitzung,
//! die den Schluessel aus Code und Salt ableitet, Inhalte ver- und
//! entschluesselt und die Anruf-Signalisierung des Raums bedient.
//!
//! Der Relay bleibt dabei blind: alles was diese Bibliothek verschickt,
//! sind opake Umschlaege (IV + Ciphertext) und woertlich durchgereichte
//! SDP/ICE-Blobs.

pub mod sitzung;
pub mod verbindung;

// Bequeme Re-Exporte
pub use sitzung::{RaumSignalAusgang, RaumSitzung, SitzungsEreignis};
pub use verbindung::{KlientFehler, ServerVerbindung};
