//! ICE-Kandidaten-Puffer
//!
//! ICE-Kandidaten koennen vor der Remote-Description eintreffen (Wettlauf
//! zwischen Signalisierung und ICE-Gathering der Gegenseite). Ein Kandidat
//! darf aber erst nach gesetzter Remote-Description angewendet werden.
//!
//! Dieser Puffer macht die fruehe Anwendung strukturell unmoeglich: die
//! Entscheidung "puffern oder durchlassen" faellt unter einem einzigen Lock,
//! und der Abfluss gibt die Warteschlange in urspruenglicher
//! Ankunftsreihenfolge frei.

use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;

/// Geordnete Warteschlange fuer verfruehte ICE-Kandidaten
#[derive(Debug, Default)]
pub struct KandidatenPuffer {
    remote_gesetzt: bool,
    warteschlange: Vec<RTCIceCandidateInit>,
}

impl KandidatenPuffer {
    /// Erstellt einen leeren Puffer (Remote-Description noch nicht gesetzt)
    pub fn neu() -> Self {
        Self::default()
    }

    /// Entscheidet ueber einen eintreffenden Kandidaten
    ///
    /// Vor gesetzter Remote-Description wird gepuffert (`None`); danach
    /// wird der Kandidat zum direkten Anwenden durchgelassen (`Some`).
    pub fn einreihen_oder_durchlassen(
        &mut self,
        kandidat: RTCIceCandidateInit,
    ) -> Option<RTCIceCandidateInit> {
        if self.remote_gesetzt {
            Some(kandidat)
        } else {
            self.warteschlange.push(kandidat);
            None
        }
    }

    /// Markiert die Remote-Description als gesetzt und entleert die
    /// Warteschlange in urspruenglicher Ankunftsreihenfolge
    pub fn remote_gesetzt_und_abfluss(&mut self) -> Vec<RTCIceCandidateInit> {
        self.remote_gesetzt = true;
        std::mem::take(&mut self.warteschlange)
    }

    /// Setzt den Puffer fuer den naechsten Anruf zurueck
    pub fn zuruecksetzen(&mut self) {
        self.remote_gesetzt = false;
        self.warteschlange.clear();
    }

    /// Anzahl der wartenden Kandidaten
    pub fn wartend(&self) -> usize {
        self.warteschlange.len()
    }

    /// Prueft ob die Remote-Description bereits gesetzt wurde
    pub fn ist_remote_gesetzt(&self) -> bool {
        self.remote_gesetzt
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
