//! Klient-seitige TCP-Verbindung zum Relay
//!
//! Nutzt den FrameCodec aus separee-protocol fuer das Wire-Format
//! (u32 BE length + JSON payload). Eine Hintergrund-Leseschleife
//! beantwortet Server-Pings automatisch, loest Acks ueber die
//! `request_id` auf und reicht Push-Ereignisse an die Anwendung weiter.

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use separee_protocol::{
    events::{ErrorCode, RelayMessage, RelayPayload},
    wire::FrameCodec,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Timeout fuer acked-Anfragen
const ANTWORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Groesse der Sende-Queue
const SENDE_QUEUE_GROESSE: usize = 64;

/// Groesse der Push-Queue zur Anwendung
const PUSH_QUEUE_GROESSE: usize = 256;

// ---------------------------------------------------------------------------
// Fehler-Typ
// ---------------------------------------------------------------------------

/// Fehler die bei der Relay-Verbindung auftreten koennen
#[derive(Debug)]
pub enum KlientFehler {
    /// TCP-Verbindung fehlgeschlagen
    Io(std::io::Error),
    /// Relay hat mit Fehler geantwortet
    ServerFehler { code: ErrorCode, message: String },
    /// Unerwartete Antwort vom Relay
    UnerwarteteAntwort(String),
    /// Nicht verbunden
    NichtVerbunden,
    /// Keine Antwort innerhalb des Timeouts
    Zeitlimit,
    /// Kryptografie-Fehler (Salt, Umschlag, Entschluesselung)
    Krypto(String),
}

impl std::fmt::Display for KlientFehler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KlientFehler::Io(e) => write!(f, "IO-Fehler: {}", e),
            KlientFehler::ServerFehler { code, message } => {
                write!(f, "Relay-Fehler ({:?}): {}", code, message)
            }
            KlientFehler::UnerwarteteAntwort(msg) => {
                write!(f, "Unerwartete Antwort: {}", msg)
            }
            KlientFehler::NichtVerbunden => write!(f, "Nicht mit Relay verbunden"),
            KlientFehler::Zeitlimit => write!(f, "Keine Antwort vom Relay"),
            KlientFehler::Krypto(msg) => write!(f, "Krypto-Fehler: {}", msg),
        }
    }
}

impl std::error::Error for KlientFehler {}

impl From<std::io::Error> for KlientFehler {
    fn from(e: std::io::Error) -> Self {
        KlientFehler::Io(e)
    }
}

impl From<KlientFehler> for String {
    fn from(e: KlientFehler) -> Self {
        e.to_string()
    }
}

// ---------------------------------------------------------------------------
// ServerVerbindung
// ---------------------------------------------------------------------------

/// TCP-Verbindung zum Separee-Relay
///
/// Clone-bar und zwischen Tasks teilbar; Schreiben laeuft ueber eine
/// interne Queue, Lesen in einem Hintergrund-Task.
pub struct ServerVerbindung {
    /// Ausgehende Nachrichten (Schreib-Task leert die Queue)
    sende_tx: mpsc::Sender<RelayMessage>,
    /// Offene acked-Anfragen, indiziert nach request_id
    wartende: Arc<DashMap<u32, oneshot::Sender<RelayMessage>>>,
    /// Monoton steigender Request-ID Zaehler (0 ist fuer Pushes reserviert)
    next_request_id: AtomicU32,
}

impl ServerVerbindung {
    /// Baut eine TCP-Verbindung zum Relay auf
    ///
    /// Gibt die Verbindung plus die Push-Queue zurueck, aus der die
    /// Anwendung alle Server-Pushes (Message, File, Presence, Webrtc*, ...)
    /// liest.
    pub async fn verbinden(
        addr: &str,
    ) -> Result<(Arc<Self>, mpsc::Receiver<RelayMessage>), KlientFehler> {
        tracing::info!(adresse = %addr, "Verbinde mit Relay");
        let stream = TcpStream::connect(addr).await?;
        let framed = Framed::new(stream, FrameCodec::new());
        let (mut sink, mut quelle) = framed.split();

        let (sende_tx, mut sende_rx) = mpsc::channel::<RelayMessage>(SENDE_QUEUE_GROESSE);
        let (push_tx, push_rx) = mpsc::channel::<RelayMessage>(PUSH_QUEUE_GROESSE);
        let wartende: Arc<DashMap<u32, oneshot::Sender<RelayMessage>>> = Arc::new(DashMap::new());

        // Schreib-Task: leert die Sende-Queue in den TCP-Strom
        tokio::spawn(async move {
            while let Some(nachricht) = sende_rx.recv().await {
                if sink.send(nachricht).await.is_err() {
                    tracing::debug!("Schreib-Task: Verbindung beendet");
                    break;
                }
            }
        });

        // Lese-Task: Pings beantworten, Acks aufloesen, Pushes weiterreichen
        let wartende_lese = Arc::clone(&wartende);
        let sende_tx_lese = sende_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = quelle.next().await {
                let nachricht = match frame {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::warn!(fehler = %e, "Ungueltiges Frame vom Relay");
                        break;
                    }
                };

                // Server-Ping automatisch beantworten
                if let RelayPayload::Ping(ref ping) = nachricht.payload {
                    let pong =
                        RelayMessage::pong(nachricht.request_id, ping.timestamp_ms, jetzt_ms());
                    let _ = sende_tx_lese.send(pong).await;
                    continue;
                }

                // Ack einer offenen Anfrage?
                if nachricht.request_id != 0 {
                    if let Some((_, tx)) = wartende_lese.remove(&nachricht.request_id) {
                        let _ = tx.send(nachricht);
                        continue;
                    }
                }

                // Push an die Anwendung
                if push_tx.send(nachricht).await.is_err() {
                    tracing::debug!("Anwendung liest keine Pushes mehr");
                    break;
                }
            }
            tracing::info!("Verbindung zum Relay beendet");
        });

        let verbindung = Arc::new(Self {
            sende_tx,
            wartende,
            next_request_id: AtomicU32::new(1),
        });
        Ok((verbindung, push_rx))
    }

    /// Generiert die naechste Request-ID (nie 0, die ist fuer Pushes reserviert)
    fn next_id(&self) -> u32 {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        if id == 0 {
            self.next_request_id.fetch_add(1, Ordering::Relaxed)
        } else {
            id
        }
    }

    /// Sendet eine acked-Anfrage und wartet auf die Antwort
    pub async fn anfragen(&self, payload: RelayPayload) -> Result<RelayMessage, KlientFehler> {
        let request_id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.wartende.insert(request_id, tx);

        if self
            .sende_tx
            .send(RelayMessage::new(request_id, payload))
            .await
            .is_err()
        {
            self.wartende.remove(&request_id);
            return Err(KlientFehler::NichtVerbunden);
        }

        match tokio::time::timeout(ANTWORT_TIMEOUT, rx).await {
            Ok(Ok(antwort)) => Ok(antwort),
            Ok(Err(_)) => Err(KlientFehler::NichtVerbunden),
            Err(_) => {
                self.wartende.remove(&request_id);
                Err(KlientFehler::Zeitlimit)
            }
        }
    }

    /// Sendet ein fire-and-forget-Ereignis (request_id = 0)
    pub fn senden(&self, payload: RelayPayload) -> Result<(), KlientFehler> {
        self.sende_tx
            .try_send(RelayMessage::push(payload))
            .map_err(|_| KlientFehler::NichtVerbunden)
    }
}

/// Aktuelle Unix-Zeit in Millisekunden
fn jetzt_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
