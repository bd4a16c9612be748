//! Presence-Notifier – Teilnehmerzahl an alle Raum-Mitglieder
//!
//! Nach jeder erfolgreichen Mitgliedschafts-Aenderung (erstellen, beitreten,
//! verlassen, disconnect) bekommt jedes verbleibende Raum-Mitglied ein
//! `Presence { count }`-Push. Rein beobachtend; die Relay-Korrektheit haengt
//! nicht daran.
//!
//! Der Notifier wird als Callback in die Registry-Mutationen eingehaengt und
//! laeuft dort noch unter dem Eintrags-Lock des Raums (Sends sind
//! nicht-blockierend), damit gleichzeitige Joins keine veralteten
//! Zaehlerstaende verteilen.

use separee_core::types::ConnectionId;
use separee_protocol::events::{PresencePush, RelayMessage, RelayPayload};

use crate::broadcast::EventBroadcaster;

/// Verteilt Presence-Ereignisse ueber den EventBroadcaster
#[derive(Clone)]
pub struct PresenceNotifier {
    broadcaster: EventBroadcaster,
}

impl PresenceNotifier {
    /// Erstellt einen neuen PresenceNotifier
    pub fn neu(broadcaster: EventBroadcaster) -> Self {
        Self { broadcaster }
    }

    /// Meldet die aktuelle Teilnehmerzahl an alle gegebenen Mitglieder
    pub fn melden(&self, mitglieder: &[ConnectionId], anzahl: usize) {
        let nachricht = RelayMessage::push(RelayPayload::Presence(PresencePush {
            count: anzahl as u32,
        }));
        let gesendet = self.broadcaster.an_mehrere_senden(mitglieder, nachricht);
        tracing::trace!(anzahl, gesendet, "Presence verteilt");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn presence_erreicht_alle_mitglieder() {
        let broadcaster = EventBroadcaster::neu();
        let presence = PresenceNotifier::neu(broadcaster.clone());

        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let mut rx_a = broadcaster.registrieren(a);
        let mut rx_b = broadcaster.registrieren(b);

        presence.melden(&[a, b], 2);

        for rx in [&mut rx_a, &mut rx_b] {
            let msg = rx.try_recv().expect("Presence-Event erwartet");
            assert_eq!(msg.request_id, 0, "Presence ist ein Push");
            match msg.payload {
                RelayPayload::Presence(p) => assert_eq!(p.count, 2),
                andere => panic!("Unerwarteter Payload: {:?}", andere),
            }
        }
    }

    #[tokio::test]
    async fn presence_an_leere_liste_ist_noop() {
        let broadcaster = EventBroadcaster::neu();
        let presence = PresenceNotifier::neu(broadcaster.clone());
        // Kein Panik, kein Send
        presence.melden(&[], 0);
    }
}
