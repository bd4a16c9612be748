//! Anruf-Maschine
//!
//! Steuert die WebRTC-Verhandlung einer 1:1-Sitzung: Offer/Answer-Austausch,
//! ICE-Kandidaten (inkl. Pufferung verfruehter Kandidaten) und den
//! deterministischen Abbau. Medienerfassung und Signal-Transport kommen von
//! aussen ueber die Traits [`MedienGeraete`] und [`SignalAusgang`].

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use crate::error::{AnrufFehler, AnrufResult};
use crate::kandidaten::KandidatenPuffer;
use crate::medien::MedienGeraete;
use crate::signal::{AnrufSignal, SignalAusgang};
use crate::zustand::AnrufZustand;

// ---------------------------------------------------------------------------
// Ereignisse
// ---------------------------------------------------------------------------

/// Events die die Anruf-Maschine ausloest
#[derive(Debug, Clone)]
pub enum AnrufEreignis {
    /// Zustandswechsel (fuer die UI-Schicht)
    ZustandGeaendert(AnrufZustand),
    /// Verhandlung oder Verbindung fehlgeschlagen; kein Auto-Retry
    Fehlgeschlagen(String),
}

/// Groesse des Event-Kanals
const EVENT_KANAL_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ICE-Server
// ---------------------------------------------------------------------------

/// Standard-STUN-Server
pub fn default_ice_servers() -> Vec<RTCIceServer> {
    vec![RTCIceServer {
        urls: vec![
            "stun:stun.l.google.com:19302".to_string(),
            "stun:stun1.l.google.com:19302".to_string(),
        ],
        ..Default::default()
    }]
}

// ---------------------------------------------------------------------------
// AnrufMaschine
// ---------------------------------------------------------------------------

/// Zustandsmaschine fuer eine 1:1-Anruf-Sitzung
///
/// Anrufer:     `anruf_starten` -> Anbieten -> `antwort_verarbeiten` ->
/// Verbinden -> (Connected) -> Aktiv.
/// Angerufener: `angebot_verarbeiten` -> Beantworten -> (Connected) -> Aktiv.
/// `beenden` fuehrt von ueberall nach Leerlauf zurueck und gibt dabei immer
/// Geraete und Peer Connection frei.
pub struct AnrufMaschine {
    zustand: Arc<Mutex<AnrufZustand>>,
    pc: Arc<Mutex<Option<Arc<RTCPeerConnection>>>>,
    kandidaten: Arc<Mutex<KandidatenPuffer>>,
    geraete: Arc<dyn MedienGeraete>,
    signal: Arc<dyn SignalAusgang>,
    event_tx: broadcast::Sender<AnrufEreignis>,
    ice_servers: Vec<RTCIceServer>,
}

impl AnrufMaschine {
    /// Erstellt eine neue Anruf-Maschine
    pub fn neu(geraete: Arc<dyn MedienGeraete>, signal: Arc<dyn SignalAusgang>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_KANAL_GROESSE);
        Self {
            zustand: Arc::new(Mutex::new(AnrufZustand::Leerlauf)),
            pc: Arc::new(Mutex::new(None)),
            kandidaten: Arc::new(Mutex::new(KandidatenPuffer::neu())),
            geraete,
            signal,
            event_tx,
            ice_servers: default_ice_servers(),
        }
    }

    /// Ersetzt die ICE-Server-Liste (z.B. um einen TURN-Server zu ergaenzen)
    pub fn mit_ice_servern(mut self, ice_servers: Vec<RTCIceServer>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    /// Abonniert die Ereignisse der Maschine
    pub fn abonnieren(&self) -> broadcast::Receiver<AnrufEreignis> {
        self.event_tx.subscribe()
    }

    /// Gibt den aktuellen Zustand zurueck
    pub fn zustand(&self) -> AnrufZustand {
        *self.zustand.lock()
    }

    /// Anzahl der aktuell gepufferten ICE-Kandidaten
    pub fn wartende_kandidaten(&self) -> usize {
        self.kandidaten.lock().wartend()
    }

    // -----------------------------------------------------------------------
    // Anrufer-Seite
    // -----------------------------------------------------------------------

    /// Startet einen ausgehenden Anruf
    ///
    /// Erfasst die lokalen Geraete, baut die Peer Connection, erzeugt das
    /// Offer und verschickt es ueber den Signal-Ausgang.
    pub async fn anruf_starten(&self) -> AnrufResult<()> {
        {
            let mut z = self.zustand.lock();
            if z.im_anruf() {
                return Err(AnrufFehler::BereitsImAnruf);
            }
            *z = AnrufZustand::Anbieten;
        }
        let _ = self
            .event_tx
            .send(AnrufEreignis::ZustandGeaendert(AnrufZustand::Anbieten));

        match self.offer_aufbauen().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fehlschlag(&e).await;
                Err(e)
            }
        }
    }

    async fn offer_aufbauen(&self) -> AnrufResult<()> {
        let spuren = self.geraete.erfassen().await?;
        let pc = self.pc_erstellen().await?;

        for spur in spuren {
            pc.add_track(spur)
                .await
                .map_err(|e| AnrufFehler::WebRtc(e.to_string()))?;
        }
        *self.pc.lock() = Some(Arc::clone(&pc));

        let offer = pc
            .create_offer(None)
            .await
            .map_err(|e| AnrufFehler::WebRtc(e.to_string()))?;
        pc.set_local_description(offer.clone())
            .await
            .map_err(|e| AnrufFehler::WebRtc(e.to_string()))?;

        let json = serde_json::to_value(&offer)
            .map_err(|e| AnrufFehler::UngueltigesSdp(e.to_string()))?;
        self.signal.senden(AnrufSignal::Offer(json));
        Ok(())
    }

    /// Verarbeitet das SDP-Answer der Gegenseite
    pub async fn antwort_verarbeiten(&self, sdp: serde_json::Value) -> AnrufResult<()> {
        if self.zustand() != AnrufZustand::Anbieten {
            return Err(AnrufFehler::KeinAktiverAnruf);
        }
        let pc = self
            .pc
            .lock()
            .clone()
            .ok_or(AnrufFehler::KeinAktiverAnruf)?;

        let ergebnis = async {
            let answer: RTCSessionDescription = serde_json::from_value(sdp)
                .map_err(|e| AnrufFehler::UngueltigesSdp(e.to_string()))?;
            pc.set_remote_description(answer)
                .await
                .map_err(|e| AnrufFehler::WebRtc(e.to_string()))?;
            self.kandidaten_abfliessen(&pc).await
        }
        .await;

        match ergebnis {
            Ok(()) => {
                self.zustand_setzen(AnrufZustand::Verbinden);
                Ok(())
            }
            Err(e) => {
                self.fehlschlag(&e).await;
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Angerufenen-Seite
    // -----------------------------------------------------------------------

    /// Verarbeitet ein eingehendes SDP-Offer (nur im Leerlauf erlaubt)
    ///
    /// Erfasst die lokalen Geraete, setzt die Remote-Description, laesst
    /// gepufferte Kandidaten abfliessen und verschickt das Answer.
    pub async fn angebot_verarbeiten(&self, sdp: serde_json::Value) -> AnrufResult<()> {
        {
            let mut z = self.zustand.lock();
            if z.im_anruf() {
                return Err(AnrufFehler::BereitsImAnruf);
            }
            *z = AnrufZustand::Beantworten;
        }
        let _ = self
            .event_tx
            .send(AnrufEreignis::ZustandGeaendert(AnrufZustand::Beantworten));

        match self.antwort_aufbauen(sdp).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fehlschlag(&e).await;
                Err(e)
            }
        }
    }

    async fn antwort_aufbauen(&self, sdp: serde_json::Value) -> AnrufResult<()> {
        let offer: RTCSessionDescription = serde_json::from_value(sdp)
            .map_err(|e| AnrufFehler::UngueltigesSdp(e.to_string()))?;

        let spuren = self.geraete.erfassen().await?;
        let pc = self.pc_erstellen().await?;

        for spur in spuren {
            pc.add_track(spur)
                .await
                .map_err(|e| AnrufFehler::WebRtc(e.to_string()))?;
        }
        *self.pc.lock() = Some(Arc::clone(&pc));

        pc.set_remote_description(offer)
            .await
            .map_err(|e| AnrufFehler::WebRtc(e.to_string()))?;
        self.kandidaten_abfliessen(&pc).await?;

        let answer = pc
            .create_answer(None)
            .await
            .map_err(|e| AnrufFehler::WebRtc(e.to_string()))?;
        pc.set_local_description(answer.clone())
            .await
            .map_err(|e| AnrufFehler::WebRtc(e.to_string()))?;

        let json = serde_json::to_value(&answer)
            .map_err(|e| AnrufFehler::UngueltigesSdp(e.to_string()))?;
        self.signal.senden(AnrufSignal::Answer(json));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // ICE
    // -----------------------------------------------------------------------

    /// Verarbeitet einen eintreffenden ICE-Kandidaten
    ///
    /// Vor gesetzter Remote-Description wird gepuffert; die Entscheidung
    /// faellt unter dem Puffer-Lock, eine verfruehte Anwendung ist damit
    /// strukturell ausgeschlossen.
    pub async fn kandidat_verarbeiten(&self, kandidat: serde_json::Value) -> AnrufResult<()> {
        let init: RTCIceCandidateInit = serde_json::from_value(kandidat)
            .map_err(|e| AnrufFehler::UngueltigerKandidat(e.to_string()))?;

        let durchgelassen = self.kandidaten.lock().einreihen_oder_durchlassen(init);
        let Some(init) = durchgelassen else {
            tracing::debug!("ICE-Kandidat gepuffert (Remote-Description fehlt noch)");
            return Ok(());
        };

        let pc = self
            .pc
            .lock()
            .clone()
            .ok_or(AnrufFehler::KeinAktiverAnruf)?;
        pc.add_ice_candidate(init)
            .await
            .map_err(|e| AnrufFehler::WebRtc(e.to_string()))
    }

    /// Entleert den Kandidaten-Puffer in Ankunftsreihenfolge
    async fn kandidaten_abfliessen(&self, pc: &Arc<RTCPeerConnection>) -> AnrufResult<()> {
        let wartend = self.kandidaten.lock().remote_gesetzt_und_abfluss();
        for init in wartend {
            pc.add_ice_candidate(init)
                .await
                .map_err(|e| AnrufFehler::WebRtc(e.to_string()))?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Abbau
    // -----------------------------------------------------------------------

    /// Beendet den Anruf und raeumt auf (idempotent)
    ///
    /// `lokal = true` bei einem vom Nutzer ausgeloesten Auflegen: dann geht
    /// ein call-end an die Gegenseite. Ein empfangenes call-end wird mit
    /// `lokal = false` verarbeitet und nie zurueckgespiegelt, sonst
    /// benachrichtigen sich beide Seiten endlos.
    pub async fn beenden(&self, lokal: bool) {
        let vorher = {
            let mut z = self.zustand.lock();
            std::mem::replace(&mut *z, AnrufZustand::Leerlauf)
        };

        if lokal && vorher.im_anruf() {
            self.signal.senden(AnrufSignal::CallEnd);
        }

        // Freigabe auf jedem Austrittspfad: haengende Geraete-Handles sind
        // fuer den Nutzer sichtbar
        self.geraete.freigeben();
        self.kandidaten.lock().zuruecksetzen();

        if let Some(pc) = self.pc.lock().take() {
            tokio::spawn(async move {
                let _ = pc.close().await;
            });
        }

        if vorher.im_anruf() {
            let _ = self
                .event_tx
                .send(AnrufEreignis::ZustandGeaendert(AnrufZustand::Leerlauf));
            tracing::info!(lokal, "Anruf beendet");
        }
    }

    /// Meldet den Mute/Kamera-Status an die Gegenseite
    ///
    /// Rein informativ fuer die Anzeige; die Verhandlung bleibt unberuehrt.
    pub fn medien_status_melden(&self, audio_an: bool, video_an: bool) {
        self.signal
            .senden(AnrufSignal::MediaState { audio_an, video_an });
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    fn zustand_setzen(&self, neu: AnrufZustand) {
        *self.zustand.lock() = neu;
        let _ = self.event_tx.send(AnrufEreignis::ZustandGeaendert(neu));
    }

    /// Fehlerpfad: Ereignis melden und lokal abbauen (kein call-end-Echo,
    /// kein Auto-Retry)
    async fn fehlschlag(&self, fehler: &AnrufFehler) {
        tracing::warn!(fehler = %fehler, "Anruf fehlgeschlagen");
        let _ = self
            .event_tx
            .send(AnrufEreignis::Fehlgeschlagen(fehler.to_string()));
        self.beenden(false).await;
    }

    /// Erstellt eine neue Peer Connection samt Event-Handlern
    async fn pc_erstellen(&self) -> AnrufResult<Arc<RTCPeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| AnrufFehler::WebRtc(e.to_string()))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)
            .map_err(|e| AnrufFehler::WebRtc(e.to_string()))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: self.ice_servers.clone(),
            ..Default::default()
        };

        let pc = Arc::new(
            api.new_peer_connection(config)
                .await
                .map_err(|e| AnrufFehler::WebRtc(e.to_string()))?,
        );

        self.handler_einrichten(&pc);
        Ok(pc)
    }

    /// Registriert die Event-Handler der Peer Connection
    fn handler_einrichten(&self, pc: &Arc<RTCPeerConnection>) {
        // Verbindungszustand: Connected -> Aktiv; Failed/Closed -> Abbau
        let zustand = Arc::clone(&self.zustand);
        let kandidaten = Arc::clone(&self.kandidaten);
        let geraete = Arc::clone(&self.geraete);
        let event_tx = self.event_tx.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            tracing::debug!(pc_zustand = ?s, "Peer-Connection-Zustand");
            match s {
                RTCPeerConnectionState::Connected => {
                    let mut z = zustand.lock();
                    if z.im_anruf() && *z != AnrufZustand::Aktiv {
                        *z = AnrufZustand::Aktiv;
                        let _ = event_tx
                            .send(AnrufEreignis::ZustandGeaendert(AnrufZustand::Aktiv));
                    }
                }
                RTCPeerConnectionState::Failed
                | RTCPeerConnectionState::Disconnected
                | RTCPeerConnectionState::Closed => {
                    // Beim regulaeren `beenden` steht der Zustand schon auf
                    // Leerlauf; nur ein echter Verbindungsabriss raeumt hier auf
                    let vorher = {
                        let mut z = zustand.lock();
                        std::mem::replace(&mut *z, AnrufZustand::Leerlauf)
                    };
                    if vorher.im_anruf() {
                        geraete.freigeben();
                        kandidaten.lock().zuruecksetzen();
                        let _ = event_tx.send(AnrufEreignis::Fehlgeschlagen(format!(
                            "Verbindung verloren: {:?}",
                            s
                        )));
                        let _ = event_tx
                            .send(AnrufEreignis::ZustandGeaendert(AnrufZustand::Leerlauf));
                    }
                }
                _ => {}
            }
            Box::pin(async {})
        }));

        // Eigene ICE-Kandidaten an die Gegenseite signalisieren
        let signal = Arc::clone(&self.signal);
        pc.on_ice_candidate(Box::new(move |kandidat| {
            if let Some(k) = kandidat {
                if let Ok(init) = k.to_json() {
                    if let Ok(json) = serde_json::to_value(&init) {
                        signal.senden(AnrufSignal::Ice(json));
                    }
                }
            }
            Box::pin(async {})
        }));

        // Eingehende Spuren: das Rendern uebernimmt die UI-Schicht
        pc.on_track(Box::new(move |track, _, _| {
            Box::pin(async move {
                tracing::info!(codec = ?track.codec(), "Eingehende Medien-Spur");
            })
        }));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
    use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
    use webrtc::track::track_local::TrackLocal;

    use crate::medien::MedienSpur;

    /// Geraete-Attrappe: liefert eine statische Opus-Spur, zaehlt Freigaben
    struct TestGeraete {
        freigaben: AtomicUsize,
    }

    impl TestGeraete {
        fn neu() -> Arc<Self> {
            Arc::new(Self {
                freigaben: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MedienGeraete for TestGeraete {
        async fn erfassen(&self) -> Result<Vec<MedienSpur>, AnrufFehler> {
            let spur = Arc::new(TrackLocalStaticRTP::new(
                RTCRtpCodecCapability {
                    mime_type: "audio/opus".to_string(),
                    clock_rate: 48000,
                    channels: 2,
                    ..Default::default()
                },
                "audio".to_string(),
                "separee".to_string(),
            ));
            Ok(vec![spur as Arc<dyn TrackLocal + Send + Sync>])
        }

        fn freigeben(&self) {
            self.freigaben.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Geraete-Attrappe: Berechtigung verweigert
    struct VerweigerteGeraete {
        freigaben: AtomicUsize,
    }

    #[async_trait]
    impl MedienGeraete for VerweigerteGeraete {
        async fn erfassen(&self) -> Result<Vec<MedienSpur>, AnrufFehler> {
            Err(AnrufFehler::Medien("Berechtigung verweigert".into()))
        }

        fn freigeben(&self) {
            self.freigaben.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Signal-Attrappe: zeichnet alle Signale auf
    #[derive(Default)]
    struct TestSignal {
        signale: Mutex<Vec<AnrufSignal>>,
    }

    impl TestSignal {
        fn neu() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn offers(&self) -> Vec<serde_json::Value> {
            self.signale
                .lock()
                .iter()
                .filter_map(|s| match s {
                    AnrufSignal::Offer(v) => Some(v.clone()),
                    _ => None,
                })
                .collect()
        }

        fn answers(&self) -> Vec<serde_json::Value> {
            self.signale
                .lock()
                .iter()
                .filter_map(|s| match s {
                    AnrufSignal::Answer(v) => Some(v.clone()),
                    _ => None,
                })
                .collect()
        }

        fn call_ends(&self) -> usize {
            self.signale
                .lock()
                .iter()
                .filter(|s| matches!(s, AnrufSignal::CallEnd))
                .count()
        }

        fn media_states(&self) -> usize {
            self.signale
                .lock()
                .iter()
                .filter(|s| matches!(s, AnrufSignal::MediaState { .. }))
                .count()
        }
    }

    impl SignalAusgang for TestSignal {
        fn senden(&self, signal: AnrufSignal) {
            self.signale.lock().push(signal);
        }
    }

    fn test_kandidat_json() -> serde_json::Value {
        serde_json::json!({
            "candidate": "candidate:1 1 UDP 2122252543 192.0.2.7 51234 typ host",
            "sdpMid": "0",
            "sdpMLineIndex": 0,
            "usernameFragment": null
        })
    }

    #[tokio::test]
    async fn anruf_starten_erzeugt_offer() {
        let geraete = TestGeraete::neu();
        let signal = TestSignal::neu();
        let maschine = AnrufMaschine::neu(geraete.clone(), signal.clone());

        maschine.anruf_starten().await.unwrap();

        assert_eq!(maschine.zustand(), AnrufZustand::Anbieten);
        let offers = signal.offers();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0]["type"], "offer");
        assert!(offers[0]["sdp"].as_str().unwrap().contains("v=0"));

        maschine.beenden(false).await;
    }

    #[tokio::test]
    async fn zweiter_anruf_waehrend_anruf_wird_abgelehnt() {
        let maschine = AnrufMaschine::neu(TestGeraete::neu(), TestSignal::neu());
        maschine.anruf_starten().await.unwrap();

        let result = maschine.anruf_starten().await;
        assert!(matches!(result, Err(AnrufFehler::BereitsImAnruf)));

        maschine.beenden(false).await;
    }

    #[tokio::test]
    async fn handshake_offer_answer() {
        let signal_a = TestSignal::neu();
        let signal_b = TestSignal::neu();
        let maschine_a = AnrufMaschine::neu(TestGeraete::neu(), signal_a.clone());
        let maschine_b = AnrufMaschine::neu(TestGeraete::neu(), signal_b.clone());

        // A ruft an
        maschine_a.anruf_starten().await.unwrap();
        let offer = signal_a.offers().pop().expect("Offer von A");

        // B beantwortet
        maschine_b.angebot_verarbeiten(offer).await.unwrap();
        assert_eq!(maschine_b.zustand(), AnrufZustand::Beantworten);
        let answer = signal_b.answers().pop().expect("Answer von B");
        assert_eq!(answer["type"], "answer");

        // A verarbeitet das Answer
        maschine_a.antwort_verarbeiten(answer).await.unwrap();
        assert_eq!(maschine_a.zustand(), AnrufZustand::Verbinden);

        maschine_a.beenden(false).await;
        maschine_b.beenden(false).await;
    }

    #[tokio::test]
    async fn verfruehte_kandidaten_werden_gepuffert() {
        let maschine = AnrufMaschine::neu(TestGeraete::neu(), TestSignal::neu());

        // Kandidaten treffen vor jedem Offer ein (Signalisierungs-Wettlauf):
        // kein Fehler, keine Anwendung, nur Pufferung
        for _ in 0..3 {
            maschine.kandidat_verarbeiten(test_kandidat_json()).await.unwrap();
        }
        assert_eq!(maschine.wartende_kandidaten(), 3);
        assert_eq!(maschine.zustand(), AnrufZustand::Leerlauf);
    }

    #[tokio::test]
    async fn remote_call_end_wird_nicht_zurueckgespiegelt() {
        let geraete = TestGeraete::neu();
        let signal = TestSignal::neu();
        let maschine = AnrufMaschine::neu(geraete.clone(), signal.clone());

        maschine.anruf_starten().await.unwrap();
        // Gegenseite hat aufgelegt
        maschine.beenden(false).await;

        assert_eq!(maschine.zustand(), AnrufZustand::Leerlauf);
        assert_eq!(signal.call_ends(), 0, "Kein call-end-Echo");
        assert!(geraete.freigaben.load(Ordering::SeqCst) >= 1, "Geraete freigegeben");
    }

    #[tokio::test]
    async fn lokales_auflegen_sendet_genau_ein_call_end() {
        let signal = TestSignal::neu();
        let maschine = AnrufMaschine::neu(TestGeraete::neu(), signal.clone());

        maschine.anruf_starten().await.unwrap();
        maschine.beenden(true).await;
        // Doppeltes Auflegen ist idempotent
        maschine.beenden(true).await;

        assert_eq!(signal.call_ends(), 1);
        assert_eq!(maschine.zustand(), AnrufZustand::Leerlauf);
    }

    #[tokio::test]
    async fn medien_status_beruehrt_verhandlung_nicht() {
        let signal = TestSignal::neu();
        let maschine = AnrufMaschine::neu(TestGeraete::neu(), signal.clone());

        maschine.medien_status_melden(false, true);

        assert_eq!(signal.media_states(), 1);
        assert_eq!(maschine.zustand(), AnrufZustand::Leerlauf);
    }

    #[tokio::test]
    async fn verweigerte_berechtigung_beendet_anrufversuch() {
        let geraete = Arc::new(VerweigerteGeraete {
            freigaben: AtomicUsize::new(0),
        });
        let signal = TestSignal::neu();
        let maschine = AnrufMaschine::neu(geraete.clone(), signal.clone());
        let mut ereignisse = maschine.abonnieren();

        let result = maschine.anruf_starten().await;

        assert!(matches!(result, Err(AnrufFehler::Medien(_))));
        assert_eq!(maschine.zustand(), AnrufZustand::Leerlauf);
        assert!(geraete.freigaben.load(Ordering::SeqCst) >= 1);
        assert_eq!(signal.call_ends(), 0, "Fehlschlag erzeugt kein call-end");

        // Ereignisse: Anbieten -> Fehlgeschlagen -> Leerlauf
        let mut fehlgeschlagen_gesehen = false;
        while let Ok(ereignis) = ereignisse.try_recv() {
            if matches!(ereignis, AnrufEreignis::Fehlgeschlagen(_)) {
                fehlgeschlagen_gesehen = true;
            }
        }
        assert!(fehlgeschlagen_gesehen, "call-failed Ereignis erwartet");
    }

    #[tokio::test]
    async fn angebot_waehrend_anruf_wird_abgelehnt() {
        let maschine = AnrufMaschine::neu(TestGeraete::neu(), TestSignal::neu());
        maschine.anruf_starten().await.unwrap();

        let result = maschine
            .angebot_verarbeiten(serde_json::json!({"type": "offer", "sdp": "v=0"}))
            .await;
        assert!(matches!(result, Err(AnrufFehler::BereitsImAnruf)));

        maschine.beenden(false).await;
    }
}
