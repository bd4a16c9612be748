//! Raum-Handler – CreateRoom, JoinRoom, Logout
//!
//! Die einzigen acked-Pfade des Protokolls: create/join antworten mit der
//! `request_id` des Clients, Logout ist wie im Relay-Pfad antwortlos.

use separee_protocol::events::{
    CreateRoomRequest, CreateRoomResponse, ErrorCode, JoinRoomRequest, JoinRoomResponse,
    LogoutRequest, RelayMessage, RelayPayload,
};
use std::sync::Arc;

use crate::dispatcher::VerbindungsKontext;
use crate::raum::RaumFehler;
use crate::server_state::RelayState;

/// Verarbeitet eine Raum-Erstellung
pub fn handle_create_room(
    request: CreateRoomRequest,
    request_id: u32,
    ctx: &mut VerbindungsKontext,
    state: &Arc<RelayState>,
) -> RelayMessage {
    if ctx.raum.is_some() {
        return RelayMessage::error(
            request_id,
            ErrorCode::InvalidRequest,
            "Verbindung ist bereits in einem Raum",
        );
    }
    if request.code.ist_leer() || request.salt.is_empty() {
        return RelayMessage::error(request_id, ErrorCode::InvalidRequest, "Ungueltiger Payload");
    }

    let presence = state.presence.clone();
    match state.register.erstellen(
        request.code.clone(),
        request.salt,
        ctx.conn_id,
        |mitglieder, anzahl| presence.melden(mitglieder, anzahl),
    ) {
        Ok(()) => {
            ctx.raum = Some(request.code);
            RelayMessage::new(
                request_id,
                RelayPayload::CreateRoomResponse(CreateRoomResponse {}),
            )
        }
        Err(RaumFehler::Konflikt) => RelayMessage::error(
            request_id,
            ErrorCode::RoomConflict,
            "Raum-Code bereits vergeben",
        ),
        Err(andere) => {
            tracing::warn!(fehler = %andere, "Unerwarteter Registry-Fehler bei CreateRoom");
            RelayMessage::error(request_id, ErrorCode::InternalError, andere.to_string())
        }
    }
}

/// Verarbeitet einen Raum-Beitritt
pub fn handle_join_room(
    request: JoinRoomRequest,
    request_id: u32,
    ctx: &mut VerbindungsKontext,
    state: &Arc<RelayState>,
) -> RelayMessage {
    if ctx.raum.is_some() {
        return RelayMessage::error(
            request_id,
            ErrorCode::InvalidRequest,
            "Verbindung ist bereits in einem Raum",
        );
    }
    if request.code.ist_leer() {
        return RelayMessage::error(request_id, ErrorCode::InvalidRequest, "Ungueltiger Payload");
    }

    let presence = state.presence.clone();
    match state
        .register
        .beitreten(&request.code, ctx.conn_id, |mitglieder, anzahl| {
            presence.melden(mitglieder, anzahl)
        }) {
        Ok(salt) => {
            ctx.raum = Some(request.code);
            RelayMessage::new(
                request_id,
                RelayPayload::JoinRoomResponse(JoinRoomResponse { salt }),
            )
        }
        Err(RaumFehler::NichtGefunden) => {
            RelayMessage::error(request_id, ErrorCode::RoomNotFound, "Raum nicht gefunden")
        }
        Err(RaumFehler::Voll) => {
            RelayMessage::error(request_id, ErrorCode::RoomFull, "Raum ist voll")
        }
        Err(andere) => {
            tracing::warn!(fehler = %andere, "Unerwarteter Registry-Fehler bei JoinRoom");
            RelayMessage::error(request_id, ErrorCode::InternalError, andere.to_string())
        }
    }
}

/// Verarbeitet einen Logout (Raum verlassen, Verbindung bleibt bestehen)
pub fn handle_logout(
    request: LogoutRequest,
    ctx: &mut VerbindungsKontext,
    state: &Arc<RelayState>,
) {
    if request.code.ist_leer() {
        return;
    }

    let presence = state.presence.clone();
    state
        .register
        .verlassen(&request.code, ctx.conn_id, |mitglieder, anzahl| {
            presence.melden(mitglieder, anzahl)
        });

    if ctx.raum.as_ref() == Some(&request.code) {
        ctx.raum = None;
    }
}
