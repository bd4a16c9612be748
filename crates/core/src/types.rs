//! Gemeinsame Identifikationstypen fuer Separee
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Verbindungs-ID
///
/// Wird beim Accept vergeben und lebt genau so lange wie die
/// Transportverbindung. Eine Verbindung gehoert zu hoechstens einem Raum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Geheimer Raum-Code
///
/// Der Code ist das gemeinsame Geheimnis beider Teilnehmer und zugleich die
/// einzige Eingabe der Schluesselableitung. `Display` zeigt deshalb nur ein
/// gekuerztes Praefix; der vollstaendige Code darf nie in Logs landen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaumCode(String);

impl RaumCode {
    /// Erstellt einen RaumCode aus einem beliebigen String
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Gibt den vollstaendigen Code zurueck (nicht fuer Logs!)
    pub fn als_str(&self) -> &str {
        &self.0
    }

    /// Prueft ob der Code leer ist
    pub fn ist_leer(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for RaumCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RaumCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for RaumCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Nur Praefix und Laenge, der Rest bleibt geheim
        let praefix: String = self.0.chars().take(2).collect();
        write!(f, "raum:{}..({})", praefix, self.0.len())
    }
}
