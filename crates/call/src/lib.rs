//! separee-call – Client-seitige Anruf-Zustandsmaschine
//!
//! Der Anruf-Zustand lebt vollstaendig im Client; der Relay reicht SDP- und
//! ICE-Blobs nur blind durch. Dieser Crate implementiert die Verhandlung:
//! Offer/Answer-Austausch, ICE-Kandidaten-Pufferung und den deterministischen
//! Abbau (Kamera/Mikrofon freigeben, Peer Connection schliessen) auf jedem
//! Austrittspfad.
//!
//! ## Zustaende
//! ```text
//! Anrufer:    Leerlauf -> Anbieten -> Verbinden -> Aktiv -> Leerlauf
//! Angerufener: Leerlauf -> Beantworten -> Aktiv -> Leerlauf
//! ```
//!
//! Medienerfassung ([`MedienGeraete`]) und Signal-Ausgang ([`SignalAusgang`])
//! sind Traits an den Naehten: die echte Implementierung liefert der
//! einbettende Client, Tests verwenden Attrappen.

pub mod engine;
pub mod error;
pub mod kandidaten;
pub mod medien;
pub mod signal;
pub mod zustand;

// Bequeme Re-Exporte
pub use engine::{AnrufEreignis, AnrufMaschine};
pub use kandidaten::KandidatenPuffer;
pub use error::{AnrufFehler, AnrufResult};
pub use medien::MedienGeraete;
pub use signal::{AnrufSignal, SignalAusgang};
pub use zustand::AnrufZustand;
