//! RTC-Handler – WebrtcOffer, WebrtcAnswer, WebrtcIce, CallEnd
//!
//! Der Relay ist fuer die Anruf-Signalisierung ein reiner Durchreicher:
//! SDP- und ICE-Blobs werden woertlich an die anderen Raum-Mitglieder
//! verteilt, niemals interpretiert oder gespeichert. Der Anruf-Zustand lebt
//! vollstaendig in den Clients.

use separee_protocol::events::{
    CallEndRelay, IcePush, IceRelay, RelayMessage, RelayPayload, SdpPush, SdpRelay,
};
use std::sync::Arc;

use crate::dispatcher::VerbindungsKontext;
use crate::server_state::RelayState;

/// Leitet ein SDP-Offer weiter
pub fn handle_offer(relay: SdpRelay, ctx: &VerbindungsKontext, state: &Arc<RelayState>) {
    sdp_weiterleiten(relay, ctx, state, |push| RelayPayload::WebrtcOfferPush(push));
}

/// Leitet ein SDP-Answer weiter
pub fn handle_answer(relay: SdpRelay, ctx: &VerbindungsKontext, state: &Arc<RelayState>) {
    sdp_weiterleiten(relay, ctx, state, |push| {
        RelayPayload::WebrtcAnswerPush(push)
    });
}

fn sdp_weiterleiten(
    relay: SdpRelay,
    ctx: &VerbindungsKontext,
    state: &Arc<RelayState>,
    einpacken: impl FnOnce(SdpPush) -> RelayPayload,
) {
    if relay.sdp.is_null() {
        state.statistik.ungueltig_zaehlen();
        return;
    }

    let Some(empfaenger) = state.register.mitglieder_ausser(&relay.room_code, ctx.conn_id) else {
        state.statistik.raum_fehlt_zaehlen();
        return;
    };

    let push = RelayMessage::push(einpacken(SdpPush { sdp: relay.sdp }));
    state.broadcaster.an_mehrere_senden(&empfaenger, push);
    state.statistik.weitergeleitet_zaehlen();
}

/// Leitet einen ICE-Kandidaten weiter
pub fn handle_ice(relay: IceRelay, ctx: &VerbindungsKontext, state: &Arc<RelayState>) {
    if relay.candidate.is_null() {
        state.statistik.ungueltig_zaehlen();
        return;
    }

    let Some(empfaenger) = state.register.mitglieder_ausser(&relay.room_code, ctx.conn_id) else {
        state.statistik.raum_fehlt_zaehlen();
        return;
    };

    let push = RelayMessage::push(RelayPayload::WebrtcIcePush(IcePush {
        candidate: relay.candidate,
    }));
    state.broadcaster.an_mehrere_senden(&empfaenger, push);
    state.statistik.weitergeleitet_zaehlen();
}

/// Leitet ein Anruf-Ende weiter
///
/// Der Empfaenger darf darauf kein eigenes call-end zuruecksenden, sonst
/// benachrichtigen sich beide Seiten endlos – das stellt die Client-
/// Zustandsmaschine sicher, der Relay reicht nur durch.
pub fn handle_call_end(relay: CallEndRelay, ctx: &VerbindungsKontext, state: &Arc<RelayState>) {
    let Some(empfaenger) = state.register.mitglieder_ausser(&relay.room_code, ctx.conn_id) else {
        state.statistik.raum_fehlt_zaehlen();
        return;
    };

    let push = RelayMessage::push(RelayPayload::CallEndPush);
    state.broadcaster.an_mehrere_senden(&empfaenger, push);
    state.statistik.weitergeleitet_zaehlen();
}
