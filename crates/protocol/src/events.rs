//! Relay-Protokoll
//!
//! Definiert alle Ereignisse die ueber die persistente Verbindung zwischen
//! Client und Relay ausgetauscht werden.
//!
//! ## Design
//! - Raum-Verwaltung (create/join) laeuft als Request/Response: jede
//!   Nachricht traegt eine `request_id: u32`, der Relay kopiert sie in die
//!   Antwort.
//! - Relay-Ereignisse (message, file, typing, webrtc-*, media-state) sind
//!   fire-and-forget: keine Antwort, `request_id` bleibt 0. Der Relay baut
//!   aus der Anfrage ein Push-Ereignis ohne Raum-Code und verteilt es an
//!   alle anderen Raum-Mitglieder.
//! - JSON-Serialisierung via serde; SDP- und ICE-Blobs bleiben als rohe
//!   `serde_json::Value` erhalten und werden woertlich weitergereicht.

use serde::{Deserialize, Serialize};
use separee_core::types::RaumCode;

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer Error-Responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Allgemein
    InternalError,
    InvalidRequest,
    // Raum
    RoomConflict,
    RoomNotFound,
    RoomFull,
}

// ---------------------------------------------------------------------------
// Raum-Verwaltung (Request/Response)
// ---------------------------------------------------------------------------

/// Raum anlegen: geheimer Code + oeffentliches Salt (Base64, 16 Bytes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub code: RaumCode,
    pub salt: String,
}

/// Bestaetigung der Raum-Erstellung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomResponse {}

/// Raum beitreten: nur der geheime Code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    pub code: RaumCode,
}

/// Bestaetigung des Beitritts; liefert das Salt fuer die Schluesselableitung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    pub salt: String,
}

/// Raum verlassen (keine Antwort)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub code: RaumCode,
}

// ---------------------------------------------------------------------------
// Inhalts-Relay (fire-and-forget)
// ---------------------------------------------------------------------------

/// Verschluesselte Textnachricht, Client -> Relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRelay {
    pub room_code: RaumCode,
    /// 12 Bytes IV, Base64
    pub iv: String,
    /// Ciphertext inkl. GCM-Auth-Tag, Base64
    pub ciphertext: String,
}

/// Verschluesselte Textnachricht, Relay -> andere Raum-Mitglieder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePush {
    pub iv: String,
    pub ciphertext: String,
}

/// Kanonische Datei-Metadaten
///
/// Aeltere Client-Versionen senden abweichende Schluesselnamen
/// (`fileName`/`filename`, `fileType`/`mime`, `fileSize`/`size`); die
/// Normalisierung passiert in [`FileRelay::meta_normalisieren`]. Ausgehend
/// wird immer diese eine Form verwendet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateiMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub mime: String,
    /// Deklarierte Klartext-Groesse in Bytes; aeltere Clients lassen sie weg
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Verschluesselte Datei, Client -> Relay
///
/// Die Metadaten-Felder akzeptieren die Alias-Schluessel heterogener
/// Client-Versionen und sind deshalb optional; nach der Normalisierung
/// sind `name` und `type` Pflicht.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRelay {
    pub room_code: RaumCode,
    pub iv: String,
    pub ciphertext: String,
    #[serde(default, alias = "fileName", alias = "filename")]
    pub name: Option<String>,
    #[serde(default, rename = "type", alias = "fileType", alias = "mime")]
    pub mime: Option<String>,
    #[serde(default, alias = "fileSize")]
    pub size: Option<u64>,
}

impl FileRelay {
    /// Normalisiert die Alias-Schluessel in die kanonische Form
    ///
    /// Gibt `None` zurueck wenn Name oder Typ fehlen – solche Events werden
    /// verworfen, nicht weitergeleitet.
    pub fn meta_normalisieren(&self) -> Option<DateiMeta> {
        let name = self.name.as_deref()?.trim();
        let mime = self.mime.as_deref()?.trim();
        if name.is_empty() || mime.is_empty() {
            return None;
        }
        Some(DateiMeta {
            name: name.to_string(),
            mime: mime.to_string(),
            size: self.size,
        })
    }
}

/// Verschluesselte Datei, Relay -> andere Raum-Mitglieder (nur kanonische Form)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePush {
    pub iv: String,
    pub ciphertext: String,
    #[serde(flatten)]
    pub meta: DateiMeta,
}

/// Tipp-Indikator, Client -> Relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingRelay {
    pub room_code: RaumCode,
    pub is_typing: bool,
}

/// Tipp-Indikator, Relay -> andere Raum-Mitglieder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingPush {
    pub is_typing: bool,
}

/// Mute/Kamera-Status, Client -> Relay (rein informativ)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaStateRelay {
    pub room_code: RaumCode,
    pub audio_on: bool,
    pub video_on: bool,
}

/// Mute/Kamera-Status, Relay -> andere Raum-Mitglieder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaStatePush {
    pub audio_on: bool,
    pub video_on: bool,
}

// ---------------------------------------------------------------------------
// WebRTC-Signalisierung (fire-and-forget, woertlich weitergereicht)
// ---------------------------------------------------------------------------

/// SDP-Blob (Offer oder Answer), Client -> Relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdpRelay {
    pub room_code: RaumCode,
    /// Vollstaendige Session-Description, vom Relay nicht interpretiert
    pub sdp: serde_json::Value,
}

/// SDP-Blob, Relay -> andere Raum-Mitglieder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdpPush {
    pub sdp: serde_json::Value,
}

/// ICE-Kandidat, Client -> Relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceRelay {
    pub room_code: RaumCode,
    /// Kandidat als rohes JSON, vom Relay nicht interpretiert
    pub candidate: serde_json::Value,
}

/// ICE-Kandidat, Relay -> andere Raum-Mitglieder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcePush {
    pub candidate: serde_json::Value,
}

/// Anruf-Ende, Client -> Relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEndRelay {
    pub room_code: RaumCode,
}

// ---------------------------------------------------------------------------
// Relay -> Client
// ---------------------------------------------------------------------------

/// Teilnehmerzahl nach jeder Mitgliedschafts-Aenderung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresencePush {
    pub count: u32,
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

/// Keepalive-Ping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingMessage {
    pub timestamp_ms: u64,
}

/// Keepalive-Pong
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongMessage {
    pub echo_timestamp_ms: u64,
    pub server_timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Payload-Enum
// ---------------------------------------------------------------------------

/// Alle Nachrichtentypen des Relay-Protokolls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RelayPayload {
    // Raum-Verwaltung (mit Ack)
    CreateRoom(CreateRoomRequest),
    CreateRoomResponse(CreateRoomResponse),
    JoinRoom(JoinRoomRequest),
    JoinRoomResponse(JoinRoomResponse),
    Logout(LogoutRequest),

    // Inhalts-Relay
    Message(MessageRelay),
    MessagePush(MessagePush),
    File(FileRelay),
    FilePush(FilePush),
    Typing(TypingRelay),
    TypingPush(TypingPush),
    MediaState(MediaStateRelay),
    MediaStatePush(MediaStatePush),

    // WebRTC-Signalisierung
    WebrtcOffer(SdpRelay),
    WebrtcOfferPush(SdpPush),
    WebrtcAnswer(SdpRelay),
    WebrtcAnswerPush(SdpPush),
    WebrtcIce(IceRelay),
    WebrtcIcePush(IcePush),
    CallEnd(CallEndRelay),
    CallEndPush,

    // Relay -> Client
    Presence(PresencePush),

    // Keepalive
    Ping(PingMessage),
    Pong(PongMessage),

    // Fehler
    Error(ErrorResponse),
}

/// Standardisierte Fehler-Antwort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    /// Optionale maschinenlesbare Details
    pub details: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Relay-Nachricht (Umschlag fuer alle Nachrichten)
// ---------------------------------------------------------------------------

/// Protokoll-Nachricht mit Request/Response-Zuordnung
///
/// Acked-Anfragen tragen eine vom Client vergebene `request_id`, die der
/// Relay in die Antwort kopiert. Push-Ereignisse tragen `request_id = 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayMessage {
    /// Eindeutige Nachrichten-ID fuer Request/Response-Zuordnung (0 = Push)
    pub request_id: u32,
    /// Inhalt der Nachricht
    pub payload: RelayPayload,
}

impl RelayMessage {
    /// Erstellt eine neue Relay-Nachricht
    pub fn new(request_id: u32, payload: RelayPayload) -> Self {
        Self {
            request_id,
            payload,
        }
    }

    /// Erstellt ein Push-Ereignis (request_id = 0)
    pub fn push(payload: RelayPayload) -> Self {
        Self::new(0, payload)
    }

    /// Erstellt eine Ping-Nachricht
    pub fn ping(request_id: u32, timestamp_ms: u64) -> Self {
        Self::new(request_id, RelayPayload::Ping(PingMessage { timestamp_ms }))
    }

    /// Erstellt eine Pong-Antwort
    pub fn pong(request_id: u32, echo_timestamp_ms: u64, server_timestamp_ms: u64) -> Self {
        Self::new(
            request_id,
            RelayPayload::Pong(PongMessage {
                echo_timestamp_ms,
                server_timestamp_ms,
            }),
        )
    }

    /// Erstellt eine Fehler-Antwort
    pub fn error(request_id: u32, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(
            request_id,
            RelayPayload::Error(ErrorResponse {
                code,
                message: message.into(),
                details: None,
            }),
        )
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_nachricht_json_roundtrip() {
        let original = RelayMessage::new(
            7,
            RelayPayload::Message(MessageRelay {
                room_code: "ABC123XYZ0".into(),
                iv: "aXYtYnl0ZXM=".into(),
                ciphertext: "Y2lwaGVy".into(),
            }),
        );

        let json = original.to_json().unwrap();
        let zurueck = RelayMessage::from_json(&json).unwrap();

        assert_eq!(zurueck.request_id, 7);
        match zurueck.payload {
            RelayPayload::Message(m) => {
                assert_eq!(m.room_code.als_str(), "ABC123XYZ0");
                assert_eq!(m.iv, "aXYtYnl0ZXM=");
            }
            andere => panic!("Unerwarteter Payload: {:?}", andere),
        }
    }

    #[test]
    fn datei_aliase_werden_akzeptiert() {
        // Alte Client-Version: fileName / mime / fileSize
        let json = r#"{"request_id":0,"payload":{"File":{
            "room_code":"R","iv":"aQ==","ciphertext":"Yw==",
            "fileName":"bild.png","mime":"image/png","fileSize":1234}}}"#;

        let msg = RelayMessage::from_json(json).unwrap();
        let datei = match msg.payload {
            RelayPayload::File(f) => f,
            andere => panic!("Unerwarteter Payload: {:?}", andere),
        };

        let meta = datei.meta_normalisieren().expect("Meta muss vorhanden sein");
        assert_eq!(meta.name, "bild.png");
        assert_eq!(meta.mime, "image/png");
        assert_eq!(meta.size, Some(1234));
    }

    #[test]
    fn datei_kanonische_schluessel_werden_akzeptiert() {
        let json = r#"{"request_id":0,"payload":{"File":{
            "room_code":"R","iv":"aQ==","ciphertext":"Yw==",
            "name":"notiz.txt","type":"text/plain","size":7}}}"#;

        let msg = RelayMessage::from_json(json).unwrap();
        let datei = match msg.payload {
            RelayPayload::File(f) => f,
            andere => panic!("Unerwarteter Payload: {:?}", andere),
        };
        let meta = datei.meta_normalisieren().unwrap();
        assert_eq!(meta.name, "notiz.txt");
        assert_eq!(meta.mime, "text/plain");
    }

    #[test]
    fn datei_ohne_namen_wird_abgelehnt() {
        let datei = FileRelay {
            room_code: "R".into(),
            iv: "aQ==".into(),
            ciphertext: "Yw==".into(),
            name: None,
            mime: Some("image/png".into()),
            size: None,
        };
        assert!(datei.meta_normalisieren().is_none());
    }

    #[test]
    fn datei_mit_leerem_typ_wird_abgelehnt() {
        let datei = FileRelay {
            room_code: "R".into(),
            iv: "aQ==".into(),
            ciphertext: "Yw==".into(),
            name: Some("a.bin".into()),
            mime: Some("   ".into()),
            size: None,
        };
        assert!(datei.meta_normalisieren().is_none());
    }

    #[test]
    fn file_push_serialisiert_kanonisch() {
        let push = FilePush {
            iv: "aQ==".into(),
            ciphertext: "Yw==".into(),
            meta: DateiMeta {
                name: "a.png".into(),
                mime: "image/png".into(),
                size: Some(99),
            },
        };
        let json = serde_json::to_string(&push).unwrap();
        assert!(json.contains("\"name\":\"a.png\""));
        assert!(json.contains("\"type\":\"image/png\""));
        assert!(json.contains("\"size\":99"));
        // Keine Alias-Schluessel im Ausgang
        assert!(!json.contains("fileName"));
        assert!(!json.contains("fileSize"));
    }

    #[test]
    fn fehler_helfer_baut_error_payload() {
        let msg = RelayMessage::error(3, ErrorCode::RoomConflict, "Raum-Code bereits vergeben");
        assert_eq!(msg.request_id, 3);
        match msg.payload {
            RelayPayload::Error(e) => {
                assert_eq!(e.code, ErrorCode::RoomConflict);
                assert!(e.details.is_none());
            }
            andere => panic!("Unerwarteter Payload: {:?}", andere),
        }
    }

    #[test]
    fn error_code_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::RoomNotFound).unwrap();
        assert_eq!(json, "\"ROOM_NOT_FOUND\"");
    }

    #[test]
    fn sdp_blob_bleibt_woertlich_erhalten() {
        let sdp = serde_json::json!({"type": "offer", "sdp": "v=0\r\no=- 42 2 IN IP4 127.0.0.1"});
        let msg = RelayMessage::push(RelayPayload::WebrtcOffer(SdpRelay {
            room_code: "R".into(),
            sdp: sdp.clone(),
        }));
        let json = msg.to_json().unwrap();
        let zurueck = RelayMessage::from_json(&json).unwrap();
        match zurueck.payload {
            RelayPayload::WebrtcOffer(s) => assert_eq!(s.sdp, sdp),
            andere => panic!("Unerwarteter Payload: {:?}", andere),
        }
    }
}
