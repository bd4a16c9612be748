//! Signal-Ausgang – Naht zwischen Anruf-Maschine und Relay-Kanal
//!
//! Die Maschine kennt keine Raum-Codes und keine Transportdetails; sie
//! reicht fertige Signale an einen [`SignalAusgang`] weiter. Die
//! Klient-Bibliothek verpackt sie dort in die Relay-Events des Raums.

/// Ein ausgehendes Signal der Anruf-Maschine
#[derive(Debug, Clone)]
pub enum AnrufSignal {
    /// SDP-Offer (als JSON, Browser-kompatible Form `{type, sdp}`)
    Offer(serde_json::Value),
    /// SDP-Answer
    Answer(serde_json::Value),
    /// ICE-Kandidat
    Ice(serde_json::Value),
    /// Anruf beendet (nur bei lokal ausgeloestem Auflegen)
    CallEnd,
    /// Mute/Kamera-Status (rein informativ, beruehrt die Verhandlung nie)
    MediaState { audio_an: bool, video_an: bool },
}

/// Nimmt Signale der Anruf-Maschine entgegen und transportiert sie
///
/// Die Zustellung ist fire-and-forget; ein verlorenes Signal beendet den
/// Anruf aus Nutzersicht, wiederholt wird nicht.
pub trait SignalAusgang: Send + Sync {
    fn senden(&self, signal: AnrufSignal);
}
