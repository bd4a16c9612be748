//! Event-Dispatcher – Routet RelayMessages an die richtigen Handler
//!
//! Der Dispatcher empfaengt RelayMessages von einer ClientConnection,
//! bestimmt den richtigen Handler und gibt bei acked-Anfragen die Antwort
//! zurueck.
//!
//! ## Zustellarten
//! Ein Interface, zwei explizite Varianten:
//! - Request/Response (CreateRoom, JoinRoom): Antwort traegt die
//!   `request_id` des Clients; Fehler gehen ueber den Ack-Kanal.
//! - One-way (Message, File, Typing, MediaState, Webrtc*, CallEnd, Logout):
//!   keine Antwort; Fehler ohne adressierten Empfaenger werden verworfen.

use separee_core::types::{ConnectionId, RaumCode};
use separee_protocol::events::{RelayMessage, RelayPayload};
use std::sync::Arc;

use crate::handlers::{raum_handler, relay_handler, rtc_handler};
use crate::server_state::RelayState;

/// Dispatcher-Kontext – Zustand der aktuellen Verbindung
///
/// Eine Verbindung gehoert zu hoechstens einem Raum; `raum` ist die
/// verbindungs-lokale Sicht darauf (die Registry bleibt die Wahrheit).
pub struct VerbindungsKontext {
    /// ID dieser Verbindung
    pub conn_id: ConnectionId,
    /// Raum dem die Verbindung aktuell angehoert
    pub raum: Option<RaumCode>,
}

impl VerbindungsKontext {
    /// Erstellt einen frischen Kontext fuer eine neue Verbindung
    pub fn neu(conn_id: ConnectionId) -> Self {
        Self { conn_id, raum: None }
    }
}

/// Zentraler Event-Dispatcher
///
/// Routet eingehende RelayMessages an die entsprechenden Handler.
pub struct EventDispatcher {
    state: Arc<RelayState>,
}

impl EventDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<RelayState>) -> Self {
        Self { state }
    }

    /// Verarbeitet eine eingehende RelayMessage
    ///
    /// Gibt `Some(antwort)` fuer acked-Anfragen zurueck, `None` fuer
    /// fire-and-forget-Ereignisse.
    pub fn dispatch(
        &self,
        message: RelayMessage,
        ctx: &mut VerbindungsKontext,
    ) -> Option<RelayMessage> {
        let request_id = message.request_id;

        match message.payload {
            // -------------------------------------------------------------------
            // Raum-Verwaltung (acked)
            // -------------------------------------------------------------------
            RelayPayload::CreateRoom(req) => Some(raum_handler::handle_create_room(
                req, request_id, ctx, &self.state,
            )),

            RelayPayload::JoinRoom(req) => Some(raum_handler::handle_join_room(
                req, request_id, ctx, &self.state,
            )),

            RelayPayload::Logout(req) => {
                raum_handler::handle_logout(req, ctx, &self.state);
                None
            }

            // -------------------------------------------------------------------
            // Inhalts-Relay (fire-and-forget)
            // -------------------------------------------------------------------
            RelayPayload::Message(relay) => {
                relay_handler::handle_message(relay, ctx, &self.state);
                None
            }

            RelayPayload::File(relay) => {
                relay_handler::handle_file(relay, ctx, &self.state);
                None
            }

            RelayPayload::Typing(relay) => {
                relay_handler::handle_typing(relay, ctx, &self.state);
                None
            }

            RelayPayload::MediaState(relay) => {
                relay_handler::handle_media_state(relay, ctx, &self.state);
                None
            }

            // -------------------------------------------------------------------
            // WebRTC-Signalisierung (fire-and-forget, woertlich)
            // -------------------------------------------------------------------
            RelayPayload::WebrtcOffer(relay) => {
                rtc_handler::handle_offer(relay, ctx, &self.state);
                None
            }

            RelayPayload::WebrtcAnswer(relay) => {
                rtc_handler::handle_answer(relay, ctx, &self.state);
                None
            }

            RelayPayload::WebrtcIce(relay) => {
                rtc_handler::handle_ice(relay, ctx, &self.state);
                None
            }

            RelayPayload::CallEnd(relay) => {
                rtc_handler::handle_call_end(relay, ctx, &self.state);
                None
            }

            // -------------------------------------------------------------------
            // Keepalive
            // -------------------------------------------------------------------
            RelayPayload::Ping(ping) => {
                let server_ts = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis() as u64;
                Some(RelayMessage::pong(request_id, ping.timestamp_ms, server_ts))
            }

            RelayPayload::Pong(_) => {
                // Pong-Antworten vom Client werden nur geloggt (RTT-Messung)
                tracing::trace!("Pong empfangen (RTT-Messung)");
                None
            }

            // -------------------------------------------------------------------
            // Server->Client-Nachrichten vom Client: verwerfen, nie crashen
            // -------------------------------------------------------------------
            RelayPayload::CreateRoomResponse(_)
            | RelayPayload::JoinRoomResponse(_)
            | RelayPayload::MessagePush(_)
            | RelayPayload::FilePush(_)
            | RelayPayload::TypingPush(_)
            | RelayPayload::MediaStatePush(_)
            | RelayPayload::WebrtcOfferPush(_)
            | RelayPayload::WebrtcAnswerPush(_)
            | RelayPayload::WebrtcIcePush(_)
            | RelayPayload::CallEndPush
            | RelayPayload::Presence(_)
            | RelayPayload::Error(_) => {
                self.state.statistik.ungueltig_zaehlen();
                tracing::warn!(
                    conn = %ctx.conn_id,
                    request_id,
                    "Unerwartete Server->Client Nachricht vom Client verworfen"
                );
                None
            }
        }
    }

    /// Bereinigt alle Ressourcen einer Verbindung beim Trennen
    ///
    /// Entfernt die Verbindung aus ihrem Raum (mit Presence-Rebroadcast an
    /// die Verbleibenden, atomar unter dem Raum-Lock) und loescht die
    /// Send-Queue.
    pub fn verbindung_trennen(&self, ctx: &mut VerbindungsKontext) {
        let presence = self.state.presence.clone();
        if let Some(code) = self
            .state
            .register
            .trennen(ctx.conn_id, |mitglieder, anzahl| {
                presence.melden(mitglieder, anzahl)
            })
        {
            tracing::debug!(conn = %ctx.conn_id, raum = %code, "Verbindung aus Raum entfernt");
        }
        ctx.raum = None;
        self.state.broadcaster.entfernen(&ctx.conn_id);
        tracing::debug!(conn = %ctx.conn_id, "Verbindungs-Ressourcen bereinigt");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_state::RelayConfig;
    use separee_protocol::events::{
        CallEndRelay, CreateRoomRequest, ErrorCode, FileRelay, JoinRoomRequest, LogoutRequest,
        MessageRelay, TypingRelay,
    };
    use tokio::sync::mpsc;

    fn test_state() -> Arc<RelayState> {
        RelayState::neu(RelayConfig::default())
    }

    /// Registriert eine Verbindung und gibt Kontext + Empfangs-Queue zurueck
    fn verbinden(state: &Arc<RelayState>) -> (VerbindungsKontext, mpsc::Receiver<RelayMessage>) {
        let conn_id = ConnectionId::new();
        let rx = state.broadcaster.registrieren(conn_id);
        (VerbindungsKontext::neu(conn_id), rx)
    }

    /// Leert eine Empfangs-Queue (z.B. Presence-Events aus dem Setup)
    fn leeren(rx: &mut mpsc::Receiver<RelayMessage>) {
        while rx.try_recv().is_ok() {}
    }

    fn create_room(code: &str) -> RelayMessage {
        RelayMessage::new(
            1,
            RelayPayload::CreateRoom(CreateRoomRequest {
                code: code.into(),
                salt: "c2FsdC1zYWx0LXNhbHQh".into(),
            }),
        )
    }

    fn join_room(code: &str) -> RelayMessage {
        RelayMessage::new(2, RelayPayload::JoinRoom(JoinRoomRequest { code: code.into() }))
    }

    /// Baut einen Raum mit zwei verbundenen Teilnehmern auf
    fn raum_mit_zwei(
        state: &Arc<RelayState>,
        dispatcher: &EventDispatcher,
        code: &str,
    ) -> (
        VerbindungsKontext,
        mpsc::Receiver<RelayMessage>,
        VerbindungsKontext,
        mpsc::Receiver<RelayMessage>,
    ) {
        let (mut ctx_a, mut rx_a) = verbinden(state);
        let (mut ctx_b, mut rx_b) = verbinden(state);

        let antwort = dispatcher.dispatch(create_room(code), &mut ctx_a).unwrap();
        assert!(matches!(antwort.payload, RelayPayload::CreateRoomResponse(_)));

        let antwort = dispatcher.dispatch(join_room(code), &mut ctx_b).unwrap();
        assert!(matches!(antwort.payload, RelayPayload::JoinRoomResponse(_)));

        leeren(&mut rx_a);
        leeren(&mut rx_b);
        (ctx_a, rx_a, ctx_b, rx_b)
    }

    #[tokio::test]
    async fn create_liefert_ack_und_presence() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx, mut rx) = verbinden(&state);

        let antwort = dispatcher.dispatch(create_room("RAUM000001"), &mut ctx).unwrap();
        assert_eq!(antwort.request_id, 1);
        assert!(matches!(antwort.payload, RelayPayload::CreateRoomResponse(_)));
        assert!(ctx.raum.is_some());

        let presence = rx.try_recv().expect("Presence nach Create erwartet");
        match presence.payload {
            RelayPayload::Presence(p) => assert_eq!(p.count, 1),
            andere => panic!("Unerwarteter Payload: {:?}", andere),
        }
    }

    #[tokio::test]
    async fn doppeltes_create_ist_konflikt() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx_a, _rx_a) = verbinden(&state);
        let (mut ctx_b, _rx_b) = verbinden(&state);

        dispatcher.dispatch(create_room("KONFLIKT01"), &mut ctx_a).unwrap();
        let antwort = dispatcher.dispatch(create_room("KONFLIKT01"), &mut ctx_b).unwrap();

        match antwort.payload {
            RelayPayload::Error(e) => assert_eq!(e.code, ErrorCode::RoomConflict),
            andere => panic!("Konflikt erwartet, war: {:?}", andere),
        }
        assert!(ctx_b.raum.is_none(), "Fehlgeschlagenes Create bindet nicht");
    }

    #[tokio::test]
    async fn join_auf_unbekannten_code_ohne_presence() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx, mut rx) = verbinden(&state);

        let antwort = dispatcher.dispatch(join_room("FEHLT00000"), &mut ctx).unwrap();
        match antwort.payload {
            RelayPayload::Error(e) => assert_eq!(e.code, ErrorCode::RoomNotFound),
            andere => panic!("RoomNotFound erwartet, war: {:?}", andere),
        }
        assert!(rx.try_recv().is_err(), "Kein Presence-Event bei Fehlschlag");
    }

    #[tokio::test]
    async fn join_liefert_salt_des_raums() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx_a, _rx_a) = verbinden(&state);
        let (mut ctx_b, _rx_b) = verbinden(&state);

        dispatcher.dispatch(create_room("SALZRAUM01"), &mut ctx_a).unwrap();
        let antwort = dispatcher.dispatch(join_room("SALZRAUM01"), &mut ctx_b).unwrap();

        match antwort.payload {
            RelayPayload::JoinRoomResponse(r) => assert_eq!(r.salt, "c2FsdC1zYWx0LXNhbHQh"),
            andere => panic!("JoinRoomResponse erwartet, war: {:?}", andere),
        }
    }

    #[tokio::test]
    async fn dritter_teilnehmer_wird_abgelehnt() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (_ctx_a, _rx_a, _ctx_b, _rx_b) = raum_mit_zwei(&state, &dispatcher, "ZUZWEIT001");
        let (mut ctx_c, _rx_c) = verbinden(&state);

        let antwort = dispatcher.dispatch(join_room("ZUZWEIT001"), &mut ctx_c).unwrap();
        match antwort.payload {
            RelayPayload::Error(e) => assert_eq!(e.code, ErrorCode::RoomFull),
            andere => panic!("RoomFull erwartet, war: {:?}", andere),
        }
    }

    #[tokio::test]
    async fn nachricht_erreicht_b_aber_nie_den_sender() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx_a, mut rx_a, _ctx_b, mut rx_b) =
            raum_mit_zwei(&state, &dispatcher, "ECHOFREI01");

        let relay = RelayMessage::push(RelayPayload::Message(MessageRelay {
            room_code: "ECHOFREI01".into(),
            iv: "aXY=".into(),
            ciphertext: "Y2lwaGVydGV4dA==".into(),
        }));
        assert!(dispatcher.dispatch(relay, &mut ctx_a).is_none());

        let bei_b = rx_b.try_recv().expect("B muss die Nachricht bekommen");
        match bei_b.payload {
            RelayPayload::MessagePush(m) => {
                assert_eq!(m.iv, "aXY=");
                assert_eq!(m.ciphertext, "Y2lwaGVydGV4dA==");
            }
            andere => panic!("MessagePush erwartet, war: {:?}", andere),
        }
        assert!(rx_a.try_recv().is_err(), "Kein Echo an den Sender");
    }

    #[tokio::test]
    async fn relay_in_unbekannten_raum_wird_still_verworfen() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx, mut rx) = verbinden(&state);

        let relay = RelayMessage::push(RelayPayload::Message(MessageRelay {
            room_code: "WEG0000000".into(),
            iv: "aXY=".into(),
            ciphertext: "Yw==".into(),
        }));
        assert!(dispatcher.dispatch(relay, &mut ctx).is_none(), "Kein Ack, kein Fehler");
        assert!(rx.try_recv().is_err());
        assert_eq!(state.statistik.verworfen_stand().0, 1);
    }

    #[tokio::test]
    async fn datei_mit_alias_schluesseln_kommt_kanonisch_an() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx_a, _rx_a, _ctx_b, mut rx_b) =
            raum_mit_zwei(&state, &dispatcher, "ALIAS00001");

        // Alte Client-Version: fileName / mime / fileSize
        let json = r#"{"request_id":0,"payload":{"File":{
            "room_code":"ALIAS00001","iv":"aXY=","ciphertext":"Y2lwaGVy",
            "fileName":"foto.jpg","mime":"image/jpeg","fileSize":2048}}}"#;
        let relay = RelayMessage::from_json(json).unwrap();

        dispatcher.dispatch(relay, &mut ctx_a);

        let bei_b = rx_b.try_recv().expect("B muss die Datei bekommen");
        match bei_b.payload {
            RelayPayload::FilePush(f) => {
                assert_eq!(f.meta.name, "foto.jpg");
                assert_eq!(f.meta.mime, "image/jpeg");
                assert_eq!(f.meta.size, Some(2048));
            }
            andere => panic!("FilePush erwartet, war: {:?}", andere),
        }
    }

    #[tokio::test]
    async fn zu_grosse_datei_wird_verworfen() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx_a, _rx_a, _ctx_b, mut rx_b) =
            raum_mit_zwei(&state, &dispatcher, "ZUGROSS001");

        let relay = RelayMessage::push(RelayPayload::File(FileRelay {
            room_code: "ZUGROSS001".into(),
            iv: "aXY=".into(),
            ciphertext: "Y2lwaGVy".into(),
            name: Some("riesig.bin".into()),
            mime: Some("application/octet-stream".into()),
            size: Some(11 * 1024 * 1024), // ueber dem 10-MiB-Limit
        }));
        dispatcher.dispatch(relay, &mut ctx_a);

        assert!(rx_b.try_recv().is_err(), "Empfaenger sieht kein Event");
        assert_eq!(state.statistik.verworfen_stand().1, 1);
    }

    #[tokio::test]
    async fn datei_ohne_namen_wird_verworfen() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx_a, _rx_a, _ctx_b, mut rx_b) =
            raum_mit_zwei(&state, &dispatcher, "OHNENAME01");

        let relay = RelayMessage::push(RelayPayload::File(FileRelay {
            room_code: "OHNENAME01".into(),
            iv: "aXY=".into(),
            ciphertext: "Y2lwaGVy".into(),
            name: None,
            mime: Some("image/png".into()),
            size: None,
        }));
        dispatcher.dispatch(relay, &mut ctx_a);

        assert!(rx_b.try_recv().is_err());
        assert_eq!(state.statistik.verworfen_stand().2, 1);
    }

    #[tokio::test]
    async fn typing_wird_weitergeleitet() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx_a, _rx_a, _ctx_b, mut rx_b) =
            raum_mit_zwei(&state, &dispatcher, "TIPPEN0001");

        let relay = RelayMessage::push(RelayPayload::Typing(TypingRelay {
            room_code: "TIPPEN0001".into(),
            is_typing: true,
        }));
        dispatcher.dispatch(relay, &mut ctx_a);

        let bei_b = rx_b.try_recv().unwrap();
        match bei_b.payload {
            RelayPayload::TypingPush(t) => assert!(t.is_typing),
            andere => panic!("TypingPush erwartet, war: {:?}", andere),
        }
    }

    #[tokio::test]
    async fn call_end_wird_weitergeleitet() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx_a, _rx_a, _ctx_b, mut rx_b) =
            raum_mit_zwei(&state, &dispatcher, "AUFLEGEN01");

        let relay = RelayMessage::push(RelayPayload::CallEnd(CallEndRelay {
            room_code: "AUFLEGEN01".into(),
        }));
        dispatcher.dispatch(relay, &mut ctx_a);

        let bei_b = rx_b.try_recv().unwrap();
        assert!(matches!(bei_b.payload, RelayPayload::CallEndPush));
    }

    #[tokio::test]
    async fn logout_meldet_presence_an_verbleibende() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx_a, _rx_a, _ctx_b, mut rx_b) =
            raum_mit_zwei(&state, &dispatcher, "ABMELDEN01");

        let logout = RelayMessage::push(RelayPayload::Logout(LogoutRequest {
            code: "ABMELDEN01".into(),
        }));
        assert!(dispatcher.dispatch(logout, &mut ctx_a).is_none(), "Logout hat kein Ack");
        assert!(ctx_a.raum.is_none());

        let bei_b = rx_b.try_recv().expect("Presence an Verbleibende");
        match bei_b.payload {
            RelayPayload::Presence(p) => assert_eq!(p.count, 1),
            andere => panic!("Presence erwartet, war: {:?}", andere),
        }
    }

    #[tokio::test]
    async fn letzter_disconnect_entfernt_raum() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx, _rx) = verbinden(&state);

        dispatcher.dispatch(create_room("ALLEINE001"), &mut ctx).unwrap();
        dispatcher.verbindung_trennen(&mut ctx);

        // Raum ist weg: join liefert RoomNotFound
        let (mut ctx2, _rx2) = verbinden(&state);
        let antwort = dispatcher.dispatch(join_room("ALLEINE001"), &mut ctx2).unwrap();
        match antwort.payload {
            RelayPayload::Error(e) => assert_eq!(e.code, ErrorCode::RoomNotFound),
            andere => panic!("RoomNotFound erwartet, war: {:?}", andere),
        }
    }

    #[tokio::test]
    async fn ping_wird_mit_pong_beantwortet() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx, _rx) = verbinden(&state);

        let antwort = dispatcher
            .dispatch(RelayMessage::ping(77, 123456), &mut ctx)
            .unwrap();
        assert_eq!(antwort.request_id, 77);
        match antwort.payload {
            RelayPayload::Pong(p) => assert_eq!(p.echo_timestamp_ms, 123456),
            andere => panic!("Pong erwartet, war: {:?}", andere),
        }
    }

    #[tokio::test]
    async fn server_payload_vom_client_wird_verworfen() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx, _rx) = verbinden(&state);

        let frech = RelayMessage::push(RelayPayload::Presence(
            separee_protocol::events::PresencePush { count: 99 },
        ));
        assert!(dispatcher.dispatch(frech, &mut ctx).is_none());
        assert_eq!(state.statistik.verworfen_stand().2, 1);
    }

    #[tokio::test]
    async fn zweites_join_derselben_verbindung_wird_abgelehnt() {
        let state = test_state();
        let dispatcher = EventDispatcher::neu(state.clone());
        let (mut ctx_a, _rx_a) = verbinden(&state);
        let (mut ctx_b, _rx_b) = verbinden(&state);

        dispatcher.dispatch(create_room("EINRAUM001"), &mut ctx_a).unwrap();
        dispatcher.dispatch(create_room("EINRAUM002"), &mut ctx_b).unwrap();

        // A haengt schon in EINRAUM001
        let antwort = dispatcher.dispatch(join_room("EINRAUM002"), &mut ctx_a).unwrap();
        match antwort.payload {
            RelayPayload::Error(e) => assert_eq!(e.code, ErrorCode::InvalidRequest),
            andere => panic!("InvalidRequest erwartet, war: {:?}", andere),
        }
    }
}
