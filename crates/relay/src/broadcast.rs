//! Event-Broadcaster – Sendet Events an verbundene Clients
//!
//! Der EventBroadcaster verwaltet die Send-Queues aller verbundenen Clients.
//! Welche Verbindungen zu einem Raum gehoeren, weiss ausschliesslich das
//! [`RaumRegister`](crate::raum::RaumRegister); der Broadcaster bekommt
//! fertige Empfaengerlisten.
//!
//! Alle Sends sind nicht-blockierende try_sends: eine volle oder
//! geschlossene Queue verwirft die Nachricht (Relay-Semantik ist
//! fire-and-forget, nie blockieren).

use dashmap::DashMap;
use separee_core::types::ConnectionId;
use separee_protocol::events::RelayMessage;
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Client
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Clients
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub conn_id: ConnectionId,
    pub tx: mpsc::Sender<RelayMessage>,
}

impl ClientSender {
    /// Sendet eine Nachricht nicht-blockierend an den Client
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, nachricht: RelayMessage) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn = %self.conn_id, "Send-Queue voll – Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(conn = %self.conn_id, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Event-Broadcaster fuer alle verbundenen Clients
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

struct EventBroadcasterInner {
    /// Client-Sender, indiziert nach ConnectionId
    clients: DashMap<ConnectionId, ClientSender>,
}

impl EventBroadcaster {
    /// Erstellt einen neuen EventBroadcaster
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(EventBroadcasterInner {
                clients: DashMap::new(),
            }),
        }
    }

    /// Registriert einen neuen Client und gibt seine Empfangs-Queue zurueck
    ///
    /// Die `ClientConnection` liest aus dieser Queue und sendet via TCP.
    pub fn registrieren(&self, conn_id: ConnectionId) -> mpsc::Receiver<RelayMessage> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        let sender = ClientSender { conn_id, tx };
        self.inner.clients.insert(conn_id, sender);
        tracing::debug!(conn = %conn_id, "Client im Broadcaster registriert");
        rx
    }

    /// Entfernt einen Client aus dem Broadcaster
    pub fn entfernen(&self, conn_id: &ConnectionId) {
        self.inner.clients.remove(conn_id);
        tracing::debug!(conn = %conn_id, "Client aus Broadcaster entfernt");
    }

    /// Sendet eine Nachricht an einen einzelnen Client
    ///
    /// Gibt `true` zurueck wenn der Client gefunden und die Nachricht
    /// eingereiht wurde.
    pub fn an_verbindung_senden(&self, conn_id: &ConnectionId, nachricht: RelayMessage) -> bool {
        match self.inner.clients.get(conn_id) {
            Some(sender) => sender.senden(nachricht),
            None => {
                tracing::debug!(conn = %conn_id, "Senden an unbekannten Client");
                false
            }
        }
    }

    /// Sendet eine Nachricht an eine Liste von Verbindungen
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_mehrere_senden(
        &self,
        empfaenger: &[ConnectionId],
        nachricht: RelayMessage,
    ) -> usize {
        let mut gesendet = 0;
        for conn_id in empfaenger {
            if let Some(sender) = self.inner.clients.get(conn_id) {
                if sender.senden(nachricht.clone()) {
                    gesendet += 1;
                }
            }
        }
        gesendet
    }

    /// Gibt die Anzahl der registrierten Clients zurueck
    pub fn client_anzahl(&self) -> usize {
        self.inner.clients.len()
    }

    /// Prueft ob ein Client registriert ist
    pub fn ist_registriert(&self, conn_id: &ConnectionId) -> bool {
        self.inner.clients.contains_key(conn_id)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
