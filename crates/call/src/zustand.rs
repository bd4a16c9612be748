//! Anruf-Zustaende
//!
//! Anrufer-Seite:     Leerlauf -> Anbieten -> Verbinden -> Aktiv -> Leerlauf
//! Angerufenen-Seite: Leerlauf -> Beantworten -> Aktiv -> Leerlauf

/// Zustand der Anruf-Verhandlung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnrufZustand {
    /// Kein Anruf
    Leerlauf,
    /// Lokales Offer erzeugt und versendet, warte auf Answer
    Anbieten,
    /// Eingehendes Offer wird beantwortet
    Beantworten,
    /// Remote-Answer empfangen, ICE-Austausch laeuft
    Verbinden,
    /// Medien fliessen
    Aktiv,
}

impl AnrufZustand {
    /// Prueft ob gerade ein Anruf laeuft (in irgendeiner Phase)
    pub fn im_anruf(&self) -> bool {
        !matches!(self, AnrufZustand::Leerlauf)
    }
}

impl std::fmt::Display for AnrufZustand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnrufZustand::Leerlauf => "leerlauf",
            AnrufZustand::Anbieten => "anbieten",
            AnrufZustand::Beantworten => "beantworten",
            AnrufZustand::Verbinden => "verbinden",
            AnrufZustand::Aktiv => "aktiv",
        };
        write!(f, "{}", name)
    }
}
