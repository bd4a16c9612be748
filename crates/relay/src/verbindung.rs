//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Die Verbindung ist vom ersten Frame an vollwertig – es gibt
//! keine Authentifizierung, die Paarung ist der geheime Raum-Code selbst.
//!
//! ## Ablauf
//! ```text
//! Accept -> registrieren (Send-Queue) -> Frame-Loop -> trennen (Cleanup)
//! ```
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen Ping
//! - Client muss innerhalb von `verbindungs_timeout_sek` irgendein Frame
//!   schicken, sonst wird die Verbindung getrennt

use futures_util::{SinkExt, StreamExt};
use separee_core::types::ConnectionId;
use separee_protocol::wire::FrameCodec;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::dispatcher::{EventDispatcher, VerbindungsKontext};
use crate::server_state::RelayState;

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `FrameCodec`, dispatcht an den `EventDispatcher` und
/// leert parallel die Send-Queue des Broadcasters. Laeuft in einem eigenen
/// tokio-Task.
pub struct ClientConnection {
    state: Arc<RelayState>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<RelayState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird, der Keepalive-Timeout
    /// zuschlaegt oder ein Shutdown-Signal eingeht. Der Cleanup (Raum
    /// verlassen, Presence an Verbleibende, Queue loeschen) passiert auf
    /// jedem Austrittspfad.
    pub async fn verarbeiten(
        self,
        stream: TcpStream,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let peer_addr = self.peer_addr;
        let conn_id = ConnectionId::new();
        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek);
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek);

        tracing::info!(peer = %peer_addr, conn = %conn_id, "Neue Verbindung");

        // Framed-Stream mit FrameCodec einrichten
        let mut framed = Framed::new(
            stream,
            FrameCodec::with_max_size(self.state.config.max_frame_bytes),
        );

        // Send-Queue beim Broadcaster registrieren (Broadcaster -> TCP)
        let mut sende_rx = self.state.broadcaster.registrieren(conn_id);

        // Dispatcher und Kontext initialisieren
        let dispatcher = EventDispatcher::neu(Arc::clone(&self.state));
        let mut ctx = VerbindungsKontext::neu(conn_id);

        // Zeitpunkt des letzten empfangenen Frames
        let mut letzter_empfang = Instant::now();
        let mut ping_intervall = tokio::time::interval(keepalive_intervall);
        ping_intervall.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Erster Tick feuert sofort
        ping_intervall.tick().await;

        loop {
            tokio::select! {
                // Eingehendes Frame vom Client
                frame = framed.next() => match frame {
                    Some(Ok(nachricht)) => {
                        letzter_empfang = Instant::now();
                        if let Some(antwort) = dispatcher.dispatch(nachricht, &mut ctx) {
                            if framed.send(antwort).await.is_err() {
                                tracing::debug!(conn = %conn_id, "Antwort-Send fehlgeschlagen");
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        // Kaputtes Frame: nur diese Verbindung beenden,
                        // der Relay-Prozess laeuft weiter
                        tracing::warn!(conn = %conn_id, fehler = %e, "Ungueltiges Frame, Verbindung wird getrennt");
                        break;
                    }
                    None => {
                        tracing::debug!(conn = %conn_id, "Client hat Verbindung geschlossen");
                        break;
                    }
                },

                // Ausgehende Nachricht aus der Broadcaster-Queue
                Some(nachricht) = sende_rx.recv() => {
                    if framed.send(nachricht).await.is_err() {
                        tracing::debug!(conn = %conn_id, "Push-Send fehlgeschlagen");
                        break;
                    }
                }

                // Keepalive-Tick
                _ = ping_intervall.tick() => {
                    if letzter_empfang.elapsed() > timeout_dauer {
                        tracing::info!(conn = %conn_id, "Keepalive-Timeout, Verbindung wird getrennt");
                        break;
                    }
                    let ping = separee_protocol::events::RelayMessage::ping(0, jetzt_ms());
                    if framed.send(ping).await.is_err() {
                        break;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!(conn = %conn_id, "Shutdown, Verbindung wird geschlossen");
                        break;
                    }
                }
            }
        }

        // Cleanup auf jedem Austrittspfad: Raum verlassen (inkl. Presence an
        // Verbleibende) und Send-Queue entfernen
        dispatcher.verbindung_trennen(&mut ctx);
        tracing::info!(peer = %peer_addr, conn = %conn_id, "Verbindung beendet");
    }
}

/// Aktuelle Unix-Zeit in Millisekunden
fn jetzt_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
