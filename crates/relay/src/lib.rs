//! separee-relay – Blinder Relay-Dienst
//!
//! Dieser Crate implementiert die Server-Seite von Separee: ephemere Raeume
//! hinter geheimen Codes, blindes Weiterleiten verschluesselter Umschlaege
//! und das Durchreichen der WebRTC-Signalisierung. Der Relay sieht nie
//! Klartext und persistiert nichts; ein Raum lebt genau so lange wie seine
//! Teilnehmermenge nicht leer ist.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (RelayServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  Framed(FrameCodec) + Send-Queue + Keepalive
//!     |
//!     v
//! EventDispatcher
//!     |
//!     +-- raum_handler   (CreateRoom, JoinRoom, Logout – mit Ack)
//!     +-- relay_handler  (Message, File, Typing, MediaState – fire-and-forget)
//!     +-- rtc_handler    (WebrtcOffer/Answer/Ice, CallEnd – woertlich)
//!
//! RaumRegister     – Raum-Tabelle + Rueckwaerts-Index, pro Raum serialisiert
//! PresenceNotifier – Teilnehmerzahl an alle Raum-Mitglieder
//! EventBroadcaster – Send-Queues aller verbundenen Clients
//! ```

pub mod broadcast;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod presence;
pub mod raum;
pub mod server_state;
pub mod tcp;
pub mod verbindung;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use dispatcher::{EventDispatcher, VerbindungsKontext};
pub use error::{RelayError, RelayResult};
pub use presence::PresenceNotifier;
pub use raum::{RaumFehler, RaumRegister};
pub use server_state::{RelayConfig, RelayState, RelayStatistik};
pub use tcp::RelayServer;
pub use verbindung::ClientConnection;
