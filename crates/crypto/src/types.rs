//! Gemeinsame Typen fuer das Kryptografie-Subsystem

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{KryptoFehler, KryptoResult};

/// Laenge der AES-GCM-Nonce in Bytes
pub const NONCE_LAENGE: usize = 12;

/// Laenge des oeffentlichen Salts in Bytes
pub const SALZ_LAENGE: usize = 16;

/// Sicherer Schluessel-Container (wird beim Drop genullt)
#[derive(Clone)]
pub struct SecretBytes(pub Vec<u8>);

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED] {} bytes)", self.0.len())
    }
}

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Eine kryptografische Nonce (Number used once)
///
/// Wird fuer jede Verschluesselung frisch aus dem OS-RNG gezogen;
/// Wiederverwendung unter demselben Schluessel ist verboten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce {
    pub bytes: [u8; NONCE_LAENGE],
}

impl Nonce {
    /// Erzeugt eine frische zufaellige Nonce
    pub fn zufaellig() -> Self {
        let mut bytes = [0u8; NONCE_LAENGE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Baut eine Nonce aus rohen Bytes (muss exakt 12 Bytes lang sein)
    pub fn aus_bytes(bytes: &[u8]) -> KryptoResult<Self> {
        let bytes: [u8; NONCE_LAENGE] =
            bytes
                .try_into()
                .map_err(|_| KryptoFehler::UngueltigeNonce {
                    erwartet: NONCE_LAENGE,
                    erhalten: bytes.len(),
                })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LAENGE] {
        &self.bytes
    }
}

/// Oeffentliches Raum-Salt (16 Zufalls-Bytes, Base64 auf dem Draht)
///
/// Das Salt ist nicht geheim; es verhindert vorberechnete Tabellen gegen
/// den menschlich getippten Raum-Code. Nach der Raum-Erstellung unveraenderlich.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salz {
    pub bytes: [u8; SALZ_LAENGE],
}

impl Salz {
    /// Erzeugt ein frisches zufaelliges Salt
    pub fn erzeugen() -> Self {
        let mut bytes = [0u8; SALZ_LAENGE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Kodiert das Salt als Base64 fuer den Draht
    pub fn als_base64(&self) -> String {
        BASE64.encode(self.bytes)
    }

    /// Dekodiert ein Salt aus Base64
    pub fn aus_base64(b64: &str) -> KryptoResult<Self> {
        let roh = BASE64.decode(b64)?;
        let bytes: [u8; SALZ_LAENGE] =
            roh.as_slice()
                .try_into()
                .map_err(|_| KryptoFehler::UngueltigesSalz {
                    erwartet: SALZ_LAENGE,
                    erhalten: roh.len(),
                })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; SALZ_LAENGE] {
        &self.bytes
    }
}

/// Verschluesselter Umschlag: IV + Ciphertext (inkl. 16 Bytes GCM-Auth-Tag)
///
/// Datei-Metadaten (Name, Typ, Groesse) reisen ausserhalb des Umschlags
/// im Protokoll-Event mit.
#[derive(Debug, Clone)]
pub struct Umschlag {
    pub iv: Nonce,
    pub ciphertext: Vec<u8>,
}

impl Umschlag {
    /// Kodiert IV und Ciphertext als Base64-Paar fuer den Draht
    pub fn als_base64(&self) -> (String, String) {
        (BASE64.encode(self.iv.bytes), BASE64.encode(&self.ciphertext))
    }

    /// Dekodiert einen Umschlag aus dem Base64-Paar des Drahts
    pub fn aus_base64(iv_b64: &str, ciphertext_b64: &str) -> KryptoResult<Self> {
        let iv_roh = BASE64.decode(iv_b64)?;
        let iv = Nonce::aus_bytes(&iv_roh)?;
        let ciphertext = BASE64.decode(ciphertext_b64)?;
        Ok(Self { iv, ciphertext })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_bytes_debug_verraet_nichts() {
        let s = SecretBytes::new(vec![1, 2, 3, 4]);
        let anzeige = format!("{:?}", s);
        assert!(anzeige.contains("REDACTED"));
        assert!(!anzeige.contains("1"));
    }

    #[test]
    fn nonce_zufaellig_ist_verschieden() {
        let a = Nonce::zufaellig();
        let b = Nonce::zufaellig();
        assert_ne!(a, b);
    }

    #[test]
    fn nonce_aus_bytes_falsche_laenge() {
        let result = Nonce::aus_bytes(&[0u8; 11]);
        assert!(matches!(
            result,
            Err(KryptoFehler::UngueltigeNonce {
                erwartet: 12,
                erhalten: 11
            })
        ));
    }

    #[test]
    fn salz_base64_roundtrip() {
        let salz = Salz::erzeugen();
        let b64 = salz.als_base64();
        let zurueck = Salz::aus_base64(&b64).unwrap();
        assert_eq!(salz, zurueck);
    }

    #[test]
    fn salz_falsche_laenge_wird_abgelehnt() {
        // 8 Bytes statt 16
        let b64 = BASE64.encode([0u8; 8]);
        let result = Salz::aus_base64(&b64);
        assert!(matches!(
            result,
            Err(KryptoFehler::UngueltigesSalz { erhalten: 8, .. })
        ));
    }

    #[test]
    fn salz_ungueltiges_base64() {
        let result = Salz::aus_base64("kein base64 %%%");
        assert!(matches!(result, Err(KryptoFehler::Base64(_))));
    }

    #[test]
    fn umschlag_base64_roundtrip() {
        let umschlag = Umschlag {
            iv: Nonce::zufaellig(),
            ciphertext: vec![0xde, 0xad, 0xbe, 0xef],
        };
        let (iv_b64, ct_b64) = umschlag.als_base64();
        let zurueck = Umschlag::aus_base64(&iv_b64, &ct_b64).unwrap();
        assert_eq!(zurueck.iv, umschlag.iv);
        assert_eq!(zurueck.ciphertext, umschlag.ciphertext);
    }
}
