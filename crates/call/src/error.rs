//! Fehlertypen fuer die Anruf-Zustandsmaschine

use thiserror::Error;

/// Fehler beim Auf- und Abbau eines Anrufs
///
/// Verhandlungs- und ICE-Fehler werden nicht automatisch wiederholt: der
/// Anruf endet aus Nutzersicht und muss manuell neu gestartet werden.
#[derive(Debug, Error)]
pub enum AnrufFehler {
    #[error("WebRTC-Fehler: {0}")]
    WebRtc(String),

    #[error("Ungueltiges SDP: {0}")]
    UngueltigesSdp(String),

    #[error("Ungueltiger ICE-Kandidat: {0}")]
    UngueltigerKandidat(String),

    #[error("Medien-Erfassung fehlgeschlagen: {0}")]
    Medien(String),

    #[error("Kein aktiver Anruf")]
    KeinAktiverAnruf,

    #[error("Bereits in einem Anruf")]
    BereitsImAnruf,
}

pub type AnrufResult<T> = Result<T, AnrufFehler>;
