//! Handler fuer alle Relay-Ereignisse
//!
//! Jeder Handler ist fuer eine Ereignis-Familie zustaendig und hat Zugriff
//! auf den gemeinsamen RelayState. Acked-Anfragen geben eine Antwort-
//! Nachricht zurueck, fire-and-forget-Handler nichts.

pub mod raum_handler;
pub mod relay_handler;
pub mod rtc_handler;
