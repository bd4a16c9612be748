//! Raum-Registry – Ephemere Raum-Tabelle mit Rueckwaerts-Index
//!
//! Alleiniger Eigentuemer des geteilten Raum-Zustands. Jede Mutation
//! (erstellen, beitreten, verlassen, trennen) laeuft unter dem Eintrags-Lock
//! des betroffenen Raums (DashMap-Shard), sodass gleichzeitige Joins nie
//! einen veralteten Teilnehmerstand beobachten.
//!
//! Der Presence-Callback wird noch unter diesem Lock aufgerufen; die Sends
//! dahinter sind nicht-blockierende try_sends. Damit sind Mitgliedschafts-
//! Aenderung und Presence-Verteilung atomar.
//!
//! Ein Raum existiert genau dann, wenn seine Teilnehmermenge nicht leer ist:
//! der letzte `verlassen`/`trennen` loescht den Eintrag vollstaendig, und der
//! Code kann von einem spaeteren, voellig unabhaengigen `erstellen`
//! wiederverwendet werden.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use separee_core::types::{ConnectionId, RaumCode};
use std::sync::Arc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehler der Raum-Registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RaumFehler {
    /// Code bereits registriert – first-writer-wins, nie ueberschreiben
    #[error("Raum-Code bereits vergeben")]
    Konflikt,

    /// Kein Raum unter diesem Code
    #[error("Raum nicht gefunden")]
    NichtGefunden,

    /// Teilnehmer-Obergrenze erreicht
    #[error("Raum ist voll")]
    Voll,
}

// ---------------------------------------------------------------------------
// Raum
// ---------------------------------------------------------------------------

/// Ein ephemerer Raum: oeffentliches Salt + Teilnehmermenge
///
/// Das Salt ist fuer den Relay ein opaker Base64-String; interpretiert wird
/// es nur client-seitig bei der Schluesselableitung. Nach der Erstellung
/// unveraenderlich.
#[derive(Debug)]
struct Raum {
    salt: String,
    teilnehmer: Vec<ConnectionId>,
}

// ---------------------------------------------------------------------------
// RaumRegister
// ---------------------------------------------------------------------------

/// Verwaltet alle aktiven Raeume
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct RaumRegister {
    inner: Arc<RaumRegisterInner>,
}

struct RaumRegisterInner {
    /// Raum-Tabelle: Code -> Raum
    raeume: DashMap<RaumCode, Raum>,
    /// Rueckwaerts-Index: Verbindung -> Raum-Code (eine Verbindung,
    /// hoechstens ein Raum – macht den Disconnect-Sweep O(1))
    mitgliedschaft: DashMap<ConnectionId, RaumCode>,
    /// Teilnehmer-Obergrenze pro Raum
    max_teilnehmer: usize,
}

impl RaumRegister {
    /// Erstellt eine neue Registry mit der gegebenen Teilnehmer-Obergrenze
    pub fn neu(max_teilnehmer: usize) -> Self {
        Self {
            inner: Arc::new(RaumRegisterInner {
                raeume: DashMap::new(),
                mitgliedschaft: DashMap::new(),
                max_teilnehmer,
            }),
        }
    }

    /// Legt einen neuen Raum an und traegt den Ersteller als Teilnehmer ein
    ///
    /// First-writer-wins: ein bereits registrierter Code liefert `Konflikt`,
    /// der bestehende Raum bleibt unveraendert. `melden` laeuft unter dem
    /// Eintrags-Lock und bekommt die Mitglieder plus Teilnehmerzahl.
    pub fn erstellen(
        &self,
        code: RaumCode,
        salt: String,
        conn: ConnectionId,
        melden: impl FnOnce(&[ConnectionId], usize),
    ) -> Result<(), RaumFehler> {
        match self.inner.raeume.entry(code.clone()) {
            Entry::Occupied(_) => Err(RaumFehler::Konflikt),
            Entry::Vacant(eintrag) => {
                let raum = eintrag.insert(Raum {
                    salt,
                    teilnehmer: vec![conn],
                });
                self.inner.mitgliedschaft.insert(conn, code.clone());
                melden(&raum.teilnehmer, raum.teilnehmer.len());
                tracing::info!(raum = %code, conn = %conn, "Raum erstellt");
                Ok(())
            }
        }
    }

    /// Tritt einem bestehenden Raum bei
    ///
    /// Liefert das Salt des Raums fuer die Schluesselableitung des Clients.
    pub fn beitreten(
        &self,
        code: &RaumCode,
        conn: ConnectionId,
        melden: impl FnOnce(&[ConnectionId], usize),
    ) -> Result<String, RaumFehler> {
        let mut eintrag = self
            .inner
            .raeume
            .get_mut(code)
            .ok_or(RaumFehler::NichtGefunden)?;

        if eintrag.teilnehmer.len() >= self.inner.max_teilnehmer {
            return Err(RaumFehler::Voll);
        }

        eintrag.teilnehmer.push(conn);
        self.inner.mitgliedschaft.insert(conn, code.clone());
        melden(&eintrag.teilnehmer, eintrag.teilnehmer.len());
        tracing::info!(raum = %code, conn = %conn, anzahl = eintrag.teilnehmer.len(), "Raum beigetreten");
        Ok(eintrag.salt.clone())
    }

    /// Entfernt eine Verbindung aus einem Raum (idempotent)
    ///
    /// Wird die Teilnehmermenge leer, verschwindet der Raum vollstaendig;
    /// `melden` wird dann nicht aufgerufen (es gibt keine Adressaten mehr).
    /// Gibt `true` zurueck wenn die Verbindung tatsaechlich Mitglied war.
    pub fn verlassen(
        &self,
        code: &RaumCode,
        conn: ConnectionId,
        melden: impl FnOnce(&[ConnectionId], usize),
    ) -> bool {
        match self.inner.raeume.entry(code.clone()) {
            Entry::Occupied(mut eintrag) => {
                let raum = eintrag.get_mut();
                let vorher = raum.teilnehmer.len();
                raum.teilnehmer.retain(|c| c != &conn);
                let entfernt = raum.teilnehmer.len() != vorher;

                if entfernt {
                    self.inner.mitgliedschaft.remove(&conn);
                }

                if raum.teilnehmer.is_empty() {
                    eintrag.remove();
                    tracing::info!(raum = %code, "Raum geleert und entfernt");
                } else if entfernt {
                    let verbleibend = eintrag.get().teilnehmer.clone();
                    melden(&verbleibend, verbleibend.len());
                    tracing::debug!(raum = %code, conn = %conn, "Raum verlassen");
                }

                entfernt
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Disconnect-Sweep: entfernt die Verbindung aus ihrem Raum, falls
    /// vorhanden
    ///
    /// Ueber den Rueckwaerts-Index in O(1); gibt den betroffenen Raum-Code
    /// zurueck.
    pub fn trennen(
        &self,
        conn: ConnectionId,
        melden: impl FnOnce(&[ConnectionId], usize),
    ) -> Option<RaumCode> {
        let (_, code) = self.inner.mitgliedschaft.remove(&conn)?;
        self.verlassen(&code, conn, melden);
        Some(code)
    }

    /// Prueft ob ein Raum existiert
    pub fn existiert(&self, code: &RaumCode) -> bool {
        self.inner.raeume.contains_key(code)
    }

    /// Gibt alle Mitglieder eines Raums ausser dem Sender zurueck
    ///
    /// `None` wenn der Raum nicht (mehr) existiert – der Aufrufer soll das
    /// Event dann stillschweigend verwerfen.
    pub fn mitglieder_ausser(
        &self,
        code: &RaumCode,
        sender: ConnectionId,
    ) -> Option<Vec<ConnectionId>> {
        let eintrag = self.inner.raeume.get(code)?;
        Some(
            eintrag
                .teilnehmer
                .iter()
                .copied()
                .filter(|c| *c != sender)
                .collect(),
        )
    }

    /// Gibt den Raum einer Verbindung zurueck
    pub fn raum_von(&self, conn: &ConnectionId) -> Option<RaumCode> {
        self.inner.mitgliedschaft.get(conn).map(|e| e.clone())
    }

    /// Anzahl der aktiven Raeume
    pub fn raum_anzahl(&self) -> usize {
        self.inner.raeume.len()
    }

    /// Anzahl der Verbindungen die aktuell in einem Raum sind
    pub fn gebundene_verbindungen(&self) -> usize {
        self.inner.mitgliedschaft.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
