//! separee-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichtentypen, Enums und Strukturen
//! die zwischen Client und Relay ausgetauscht werden, sowie das
//! Frame-basierte Wire-Format fuer die persistente TCP-Verbindung.

pub mod events;
pub mod wire;

pub use events::{DateiMeta, ErrorCode, RelayMessage, RelayPayload};
pub use wire::FrameCodec;
