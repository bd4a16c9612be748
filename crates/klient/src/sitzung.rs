//! Raum-Sitzung – Schluessel-Lebenszyklus und Inhalts-Kryptografie
//!
//! Eine `RaumSitzung` entsteht beim Erstellen oder Beitreten eines Raums
//! und haelt das daraus abgeleitete Schluesselmaterial genau so lange wie
//! die Mitgliedschaft: `abmelden` (oder Drop) verwirft den Schluessel,
//! der Container nullt sich dabei selbst.
//!
//! Eingehende Pushes werden hier entschluesselt; ein Fehlschlag faellt
//! geschlossen aus und wird der Anwendung als eigenes Ereignis gemeldet,
//! nie als Absturz oder halber Klartext.

use std::sync::Arc;

use separee_call::signal::{AnrufSignal, SignalAusgang};
use separee_core::types::RaumCode;
use separee_crypto::key::{schluessel_ableiten, salz_erzeugen, zufalls_code, SchluesselMaterial, CODE_LAENGE};
use separee_crypto::types::{Salz, Umschlag};
use separee_crypto::{datei_entschluesseln, datei_verschluesseln, text_entschluesseln, text_verschluesseln};
use separee_protocol::events::{
    CallEndRelay, CreateRoomRequest, DateiMeta, FileRelay, IceRelay, JoinRoomRequest,
    LogoutRequest, MediaStateRelay, MessageRelay, RelayMessage, RelayPayload, SdpRelay,
    TypingRelay,
};

use crate::verbindung::{KlientFehler, ServerVerbindung};

// ---------------------------------------------------------------------------
// Ereignisse
// ---------------------------------------------------------------------------

/// Entschluesseltes bzw. aufbereitetes Ereignis fuer die Anwendung
#[derive(Debug)]
pub enum SitzungsEreignis {
    /// Entschluesselte Textnachricht der Gegenseite
    Nachricht(String),
    /// Entschluesselte Datei samt kanonischer Metadaten
    Datei { daten: Vec<u8>, meta: DateiMeta },
    /// Umschlag liess sich nicht entschluesseln (falscher Schluessel,
    /// Manipulation); wird der Anwendung gemeldet, Sitzung laeuft weiter
    Unlesbar,
    /// Gegenseite tippt / tippt nicht mehr
    Tippen(bool),
    /// Aktuelle Teilnehmerzahl des Raums
    Teilnehmer(u32),
    /// Mute/Kamera-Status der Gegenseite
    MedienStatus { audio_an: bool, video_an: bool },
    /// Eingehendes SDP-Offer
    AnrufAngebot(serde_json::Value),
    /// Eingehendes SDP-Answer
    AnrufAntwort(serde_json::Value),
    /// Eingehender ICE-Kandidat
    AnrufKandidat(serde_json::Value),
    /// Gegenseite hat aufgelegt
    AnrufEnde,
}

// ---------------------------------------------------------------------------
// RaumSitzung
// ---------------------------------------------------------------------------

/// Mitgliedschaft in einem Raum samt abgeleitetem Schluessel
pub struct RaumSitzung {
    verbindung: Arc<ServerVerbindung>,
    code: RaumCode,
    schluessel: SchluesselMaterial,
}

impl RaumSitzung {
    /// Erstellt einen neuen Raum mit frischem Code und Salt
    ///
    /// Der Code ist das Geheimnis, das ausserhalb des Systems an die
    /// Gegenseite gereicht wird (der Relay sieht ihn nur als opaken
    /// Schluessel der Raum-Tabelle).
    pub async fn erstellen(verbindung: Arc<ServerVerbindung>) -> Result<Self, KlientFehler> {
        let code = zufalls_code(CODE_LAENGE);
        let salz = salz_erzeugen();

        let antwort = verbindung
            .anfragen(RelayPayload::CreateRoom(CreateRoomRequest {
                code: code.clone(),
                salt: salz.als_base64(),
            }))
            .await?;

        match antwort.payload {
            RelayPayload::CreateRoomResponse(_) => {
                let schluessel = schluessel_ableiten(&code, &salz);
                tracing::info!(raum = %code, "Raum erstellt");
                Ok(Self {
                    verbindung,
                    code,
                    schluessel,
                })
            }
            RelayPayload::Error(e) => Err(KlientFehler::ServerFehler {
                code: e.code,
                message: e.message,
            }),
            andere => Err(KlientFehler::UnerwarteteAntwort(format!("{:?}", andere))),
        }
    }

    /// Tritt einem bestehenden Raum ueber den geheimen Code bei
    ///
    /// Das oeffentliche Salt kommt aus der Ack-Antwort; zusammen mit dem
    /// Code ergibt sich derselbe Schluessel wie auf der Gegenseite.
    pub async fn beitreten(
        verbindung: Arc<ServerVerbindung>,
        code: RaumCode,
    ) -> Result<Self, KlientFehler> {
        let antwort = verbindung
            .anfragen(RelayPayload::JoinRoom(JoinRoomRequest { code: code.clone() }))
            .await?;

        match antwort.payload {
            RelayPayload::JoinRoomResponse(r) => {
                let salz = Salz::aus_base64(&r.salt)
                    .map_err(|e| KlientFehler::Krypto(e.to_string()))?;
                let schluessel = schluessel_ableiten(&code, &salz);
                tracing::info!(raum = %code, "Raum beigetreten");
                Ok(Self {
                    verbindung,
                    code,
                    schluessel,
                })
            }
            RelayPayload::Error(e) => Err(KlientFehler::ServerFehler {
                code: e.code,
                message: e.message,
            }),
            andere => Err(KlientFehler::UnerwarteteAntwort(format!("{:?}", andere))),
        }
    }

    /// Der geheime Raum-Code dieser Sitzung
    pub fn code(&self) -> &RaumCode {
        &self.code
    }

    /// Verschluesselt und versendet eine Textnachricht
    pub fn nachricht_senden(&self, text: &str) -> Result<(), KlientFehler> {
        let payload = nachricht_event(&self.schluessel, &self.code, text)?;
        self.verbindung.senden(payload)
    }

    /// Verschluesselt und versendet eine Datei
    pub fn datei_senden(&self, daten: &[u8], name: &str, mime: &str) -> Result<(), KlientFehler> {
        let payload = datei_event(&self.schluessel, &self.code, daten, name, mime)?;
        self.verbindung.senden(payload)
    }

    /// Meldet den Tipp-Status
    pub fn tippen_melden(&self, is_typing: bool) -> Result<(), KlientFehler> {
        self.verbindung.senden(RelayPayload::Typing(TypingRelay {
            room_code: self.code.clone(),
            is_typing,
        }))
    }

    /// Uebersetzt einen Server-Push in ein Anwendungs-Ereignis
    ///
    /// Verschluesselte Inhalte werden hier entschluesselt; `None` fuer
    /// Nachrichten die diese Sitzung nichts angehen (z.B. Pong).
    pub fn push_verarbeiten(&self, nachricht: RelayMessage) -> Option<SitzungsEreignis> {
        push_entschluesseln(&self.schluessel, nachricht.payload)
    }

    /// Signal-Ausgang fuer die Anruf-Maschine dieses Raums
    pub fn signal_ausgang(&self) -> Arc<RaumSignalAusgang> {
        Arc::new(RaumSignalAusgang {
            verbindung: Arc::clone(&self.verbindung),
            code: self.code.clone(),
        })
    }

    /// Verlaesst den Raum und verwirft den Schluessel
    ///
    /// Logout ist antwortlos; das Schluesselmaterial wird beim Drop der
    /// Sitzung genullt.
    pub fn abmelden(self) {
        let _ = self.verbindung.senden(RelayPayload::Logout(LogoutRequest {
            code: self.code.clone(),
        }));
        tracing::info!(raum = %self.code, "Raum verlassen, Schluessel verworfen");
    }
}

// ---------------------------------------------------------------------------
// Signal-Ausgang fuer die Anruf-Maschine
// ---------------------------------------------------------------------------

/// Verpackt Anruf-Signale in die Relay-Events des Raums
///
/// Es gibt keinen separaten Anruf-Kanal: die Signalisierung laeuft ueber
/// denselben Raum wie der Chat und verlaesst sich darauf, dass der Raum
/// genau eine Gegenseite enthaelt.
pub struct RaumSignalAusgang {
    verbindung: Arc<ServerVerbindung>,
    code: RaumCode,
}

impl SignalAusgang for RaumSignalAusgang {
    fn senden(&self, signal: AnrufSignal) {
        let payload = match signal {
            AnrufSignal::Offer(sdp) => RelayPayload::WebrtcOffer(SdpRelay {
                room_code: self.code.clone(),
                sdp,
            }),
            AnrufSignal::Answer(sdp) => RelayPayload::WebrtcAnswer(SdpRelay {
                room_code: self.code.clone(),
                sdp,
            }),
            AnrufSignal::Ice(candidate) => RelayPayload::WebrtcIce(IceRelay {
                room_code: self.code.clone(),
                candidate,
            }),
            AnrufSignal::CallEnd => RelayPayload::CallEnd(CallEndRelay {
                room_code: self.code.clone(),
            }),
            AnrufSignal::MediaState { audio_an, video_an } => {
                RelayPayload::MediaState(MediaStateRelay {
                    room_code: self.code.clone(),
                    audio_on: audio_an,
                    video_on: video_an,
                })
            }
        };

        if self.verbindung.senden(payload).is_err() {
            // Fire-and-forget: ein verlorenes Signal beendet den Anruf aus
            // Nutzersicht, wiederholt wird nicht
            tracing::warn!(raum = %self.code, "Anruf-Signal nicht zustellbar");
        }
    }
}

// ---------------------------------------------------------------------------
// Interne Bausteine (separat testbar)
// ---------------------------------------------------------------------------

fn nachricht_event(
    schluessel: &SchluesselMaterial,
    code: &RaumCode,
    text: &str,
) -> Result<RelayPayload, KlientFehler> {
    let umschlag = text_verschluesseln(schluessel, text)
        .map_err(|e| KlientFehler::Krypto(e.to_string()))?;
    let (iv, ciphertext) = umschlag.als_base64();
    Ok(RelayPayload::Message(MessageRelay {
        room_code: code.clone(),
        iv,
        ciphertext,
    }))
}

fn datei_event(
    schluessel: &SchluesselMaterial,
    code: &RaumCode,
    daten: &[u8],
    name: &str,
    mime: &str,
) -> Result<RelayPayload, KlientFehler> {
    let umschlag = datei_verschluesseln(schluessel, daten)
        .map_err(|e| KlientFehler::Krypto(e.to_string()))?;
    let (iv, ciphertext) = umschlag.als_base64();
    Ok(RelayPayload::File(FileRelay {
        room_code: code.clone(),
        iv,
        ciphertext,
        name: Some(name.to_string()),
        mime: Some(mime.to_string()),
        size: Some(daten.len() as u64),
    }))
}

fn push_entschluesseln(
    schluessel: &SchluesselMaterial,
    payload: RelayPayload,
) -> Option<SitzungsEreignis> {
    match payload {
        RelayPayload::MessagePush(m) => {
            let klartext = Umschlag::aus_base64(&m.iv, &m.ciphertext)
                .ok()
                .and_then(|u| text_entschluesseln(schluessel, &u).ok());
            Some(match klartext {
                Some(text) => SitzungsEreignis::Nachricht(text),
                None => SitzungsEreignis::Unlesbar,
            })
        }
        RelayPayload::FilePush(f) => {
            let daten = Umschlag::aus_base64(&f.iv, &f.ciphertext)
                .ok()
                .and_then(|u| datei_entschluesseln(schluessel, &u).ok());
            Some(match daten {
                Some(daten) => SitzungsEreignis::Datei { daten, meta: f.meta },
                None => SitzungsEreignis::Unlesbar,
            })
        }
        RelayPayload::TypingPush(t) => Some(SitzungsEreignis::Tippen(t.is_typing)),
        RelayPayload::Presence(p) => Some(SitzungsEreignis::Teilnehmer(p.count)),
        RelayPayload::MediaStatePush(m) => Some(SitzungsEreignis::MedienStatus {
            audio_an: m.audio_on,
            video_an: m.video_on,
        }),
        RelayPayload::WebrtcOfferPush(s) => Some(SitzungsEreignis::AnrufAngebot(s.sdp)),
        RelayPayload::WebrtcAnswerPush(s) => Some(SitzungsEreignis::AnrufAntwort(s.sdp)),
        RelayPayload::WebrtcIcePush(i) => Some(SitzungsEreignis::AnrufKandidat(i.candidate)),
        RelayPayload::CallEndPush => Some(SitzungsEreignis::AnrufEnde),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use separee_crypto::types::Salz;

    fn schluessel_paar(code: &str) -> (SchluesselMaterial, SchluesselMaterial) {
        let code = RaumCode::new(code);
        let salz = Salz::erzeugen();
        (
            schluessel_ableiten(&code, &salz),
            schluessel_ableiten(&code, &salz),
        )
    }

    /// Simuliert den Relay: baut aus einer Client-Anfrage das Push-Event
    fn als_push(payload: RelayPayload) -> RelayPayload {
        match payload {
            RelayPayload::Message(m) => {
                RelayPayload::MessagePush(separee_protocol::events::MessagePush {
                    iv: m.iv,
                    ciphertext: m.ciphertext,
                })
            }
            RelayPayload::File(f) => {
                let meta = f.meta_normalisieren().expect("Meta vorhanden");
                RelayPayload::FilePush(separee_protocol::events::FilePush {
                    iv: f.iv,
                    ciphertext: f.ciphertext,
                    meta,
                })
            }
            andere => andere,
        }
    }

    #[test]
    fn nachricht_von_a_liest_b_im_klartext() {
        let (schluessel_a, schluessel_b) = schluessel_paar("PAAR000001");
        let code = RaumCode::new("PAAR000001");

        let event = nachricht_event(&schluessel_a, &code, "Treffen um acht").unwrap();
        let ereignis = push_entschluesseln(&schluessel_b, als_push(event)).unwrap();

        match ereignis {
            SitzungsEreignis::Nachricht(text) => assert_eq!(text, "Treffen um acht"),
            andere => panic!("Nachricht erwartet, war: {:?}", andere),
        }
    }

    #[test]
    fn falscher_schluessel_liefert_unlesbar_statt_absturz() {
        let (schluessel_a, _) = schluessel_paar("PAAR000001");
        let (fremder, _) = schluessel_paar("ANDERE0001");
        let code = RaumCode::new("PAAR000001");

        let event = nachricht_event(&schluessel_a, &code, "Geheim").unwrap();
        let ereignis = push_entschluesseln(&fremder, als_push(event)).unwrap();

        assert!(matches!(ereignis, SitzungsEreignis::Unlesbar));
    }

    #[test]
    fn datei_roundtrip_mit_metadaten() {
        let (schluessel_a, schluessel_b) = schluessel_paar("DATEI00001");
        let code = RaumCode::new("DATEI00001");
        let daten = vec![0x89u8, 0x50, 0x4e, 0x47, 0x0d, 0x0a];

        let event = datei_event(&schluessel_a, &code, &daten, "bild.png", "image/png").unwrap();
        let ereignis = push_entschluesseln(&schluessel_b, als_push(event)).unwrap();

        match ereignis {
            SitzungsEreignis::Datei { daten: erhalten, meta } => {
                assert_eq!(erhalten, daten);
                assert_eq!(meta.name, "bild.png");
                assert_eq!(meta.mime, "image/png");
                assert_eq!(meta.size, Some(6));
            }
            andere => panic!("Datei erwartet, war: {:?}", andere),
        }
    }

    #[test]
    fn pong_geht_die_sitzung_nichts_an() {
        let (schluessel, _) = schluessel_paar("PAAR000001");
        let pong = RelayPayload::Pong(separee_protocol::events::PongMessage {
            echo_timestamp_ms: 1,
            server_timestamp_ms: 2,
        });
        assert!(push_entschluesseln(&schluessel, pong).is_none());
    }

    #[test]
    fn anruf_pushes_werden_durchgereicht() {
        let (schluessel, _) = schluessel_paar("PAAR000001");
        let sdp = serde_json::json!({"type": "offer", "sdp": "v=0"});

        let ereignis = push_entschluesseln(
            &schluessel,
            RelayPayload::WebrtcOfferPush(separee_protocol::events::SdpPush { sdp: sdp.clone() }),
        )
        .unwrap();

        match ereignis {
            SitzungsEreignis::AnrufAngebot(erhalten) => assert_eq!(erhalten, sdp),
            andere => panic!("AnrufAngebot erwartet, war: {:?}", andere),
        }

        let ende = push_entschluesseln(&schluessel, RelayPayload::CallEndPush).unwrap();
        assert!(matches!(ende, SitzungsEreignis::AnrufEnde));
    }
}
