//! Fehlertypen fuer den Relay-Dienst

use thiserror::Error;

/// Fehlertyp fuer den Relay-Dienst
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Protokollfehler (ungueltiges Frame, falscher Zustand)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Senden an Client fehlgeschlagen (Queue geschlossen)
    #[error("Senden fehlgeschlagen")]
    SendFehler,

    /// Server ist voll
    #[error("Server ist voll")]
    ServerVoll,

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl RelayError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }
}

/// Result-Typ fuer den Relay-Dienst
pub type RelayResult<T> = Result<T, RelayError>;
