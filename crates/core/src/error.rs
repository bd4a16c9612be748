//! Fehlertypen fuer Separee
//!
//! Zentraler Fehler-Enum der alle moeglichen Fehlerzustaende abdeckt.
//! Untermodule koennen eigene Fehler definieren und via `#[from]` konvertieren.

use thiserror::Error;

/// Globaler Result-Alias fuer Separee
pub type Result<T> = std::result::Result<T, SepareeError>;

/// Alle moeglichen Fehler im Separee-System
#[derive(Debug, Error)]
pub enum SepareeError {
    // --- Verbindung & Netzwerk ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    // --- Raum-Verwaltung ---
    #[error("Raum-Code bereits vergeben")]
    RaumKonflikt,

    #[error("Raum nicht gefunden")]
    RaumNichtGefunden,

    #[error("Raum ist voll")]
    RaumVoll,

    // --- Protokoll ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl SepareeError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler wiederholbar sein koennte
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(
            self,
            Self::Zeitlimit(_) | Self::Verbindung(_) | Self::Getrennt(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = SepareeError::Konfiguration("Port fehlt".into());
        assert_eq!(e.to_string(), "Konfigurationsfehler: Port fehlt");
    }

    #[test]
    fn wiederholbar_erkennung() {
        assert!(SepareeError::Zeitlimit("test".into()).ist_wiederholbar());
        assert!(!SepareeError::RaumKonflikt.ist_wiederholbar());
    }
}
