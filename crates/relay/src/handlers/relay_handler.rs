//! Relay-Handler – Message, File, Typing, MediaState
//!
//! Fire-and-forget: der Relay prueft nur, ob der Raum existiert (sonst
//! stilles Verwerfen – der Raum kann gerade abgebaut worden sein, es gibt
//! keinen adressierten Empfaenger fuer eine Fehlermeldung) und leitet den
//! Payload woertlich an alle anderen Raum-Mitglieder weiter, nie zurueck an
//! den Sender. Inhalte bleiben opaque: IV und Ciphertext werden nicht
//! interpretiert.

use separee_protocol::events::{
    FilePush, FileRelay, MediaStatePush, MediaStateRelay, MessagePush, MessageRelay, RelayMessage,
    RelayPayload, TypingPush, TypingRelay,
};
use std::sync::Arc;

use crate::dispatcher::VerbindungsKontext;
use crate::server_state::RelayState;

/// Toleranz fuer den Vergleich Ciphertext-Laenge gegen Klartext-Limit
/// (GCM-Auth-Tag plus Rundung der Base64-Rueckrechnung)
const CIPHERTEXT_TOLERANZ: usize = 64;

/// Leitet eine verschluesselte Textnachricht weiter
pub fn handle_message(
    relay: MessageRelay,
    ctx: &VerbindungsKontext,
    state: &Arc<RelayState>,
) {
    if relay.iv.is_empty() || relay.ciphertext.is_empty() {
        state.statistik.ungueltig_zaehlen();
        return;
    }

    let Some(empfaenger) = state.register.mitglieder_ausser(&relay.room_code, ctx.conn_id) else {
        state.statistik.raum_fehlt_zaehlen();
        return;
    };

    let push = RelayMessage::push(RelayPayload::MessagePush(MessagePush {
        iv: relay.iv,
        ciphertext: relay.ciphertext,
    }));
    state.broadcaster.an_mehrere_senden(&empfaenger, push);
    state.statistik.weitergeleitet_zaehlen();
}

/// Leitet eine verschluesselte Datei weiter (groessenbegrenzt, Meta normalisiert)
pub fn handle_file(relay: FileRelay, ctx: &VerbindungsKontext, state: &Arc<RelayState>) {
    if relay.iv.is_empty() || relay.ciphertext.is_empty() {
        state.statistik.ungueltig_zaehlen();
        return;
    }

    // Alias-Schluessel heterogener Client-Versionen in die kanonische Form
    // bringen; ohne Name oder Typ wird das Event verworfen
    let Some(meta) = relay.meta_normalisieren() else {
        state.statistik.ungueltig_zaehlen();
        tracing::debug!(raum = %relay.room_code, "Datei-Event ohne Name/Typ verworfen");
        return;
    };

    // Groessen-Obergrenze: deklarierte Klartext-Groesse ...
    let limit = state.config.max_datei_bytes;
    if meta.size.is_some_and(|groesse| groesse as usize > limit) {
        state.statistik.zu_gross_zaehlen();
        tracing::debug!(raum = %relay.room_code, "Datei ueber dem Limit verworfen");
        return;
    }
    // ... und die tatsaechliche Ciphertext-Laenge (die Deklaration koennte
    // luegen; der Relay sieht die echte Laenge ohnehin)
    let ciphertext_bytes = relay.ciphertext.len() / 4 * 3;
    if ciphertext_bytes > limit + CIPHERTEXT_TOLERANZ {
        state.statistik.zu_gross_zaehlen();
        tracing::debug!(raum = %relay.room_code, "Datei-Ciphertext ueber dem Limit verworfen");
        return;
    }

    let Some(empfaenger) = state.register.mitglieder_ausser(&relay.room_code, ctx.conn_id) else {
        state.statistik.raum_fehlt_zaehlen();
        return;
    };

    let push = RelayMessage::push(RelayPayload::FilePush(FilePush {
        iv: relay.iv,
        ciphertext: relay.ciphertext,
        meta,
    }));
    state.broadcaster.an_mehrere_senden(&empfaenger, push);
    state.statistik.weitergeleitet_zaehlen();
}

/// Leitet einen Tipp-Indikator weiter
pub fn handle_typing(relay: TypingRelay, ctx: &VerbindungsKontext, state: &Arc<RelayState>) {
    let Some(empfaenger) = state.register.mitglieder_ausser(&relay.room_code, ctx.conn_id) else {
        state.statistik.raum_fehlt_zaehlen();
        return;
    };

    let push = RelayMessage::push(RelayPayload::TypingPush(TypingPush {
        is_typing: relay.is_typing,
    }));
    state.broadcaster.an_mehrere_senden(&empfaenger, push);
    state.statistik.weitergeleitet_zaehlen();
}

/// Leitet einen Mute/Kamera-Status weiter (rein informativ)
pub fn handle_media_state(
    relay: MediaStateRelay,
    ctx: &VerbindungsKontext,
    state: &Arc<RelayState>,
) {
    let Some(empfaenger) = state.register.mitglieder_ausser(&relay.room_code, ctx.conn_id) else {
        state.statistik.raum_fehlt_zaehlen();
        return;
    };

    let push = RelayMessage::push(RelayPayload::MediaStatePush(MediaStatePush {
        audio_on: relay.audio_on,
        video_on: relay.video_on,
    }));
    state.broadcaster.an_mehrere_senden(&empfaenger, push);
    state.statistik.weitergeleitet_zaehlen();
}
