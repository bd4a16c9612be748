//! AEAD-Codec fuer Text- und Datei-Inhalte
//!
//! AES-256-GCM: Vertraulichkeit und Integritaet in einem. Manipulierter
//! oder mit falschem Schluessel erzeugter Ciphertext schlaegt bei der
//! Entschluesselung fehl und liefert nie stillschweigend Datenmuell.
//!
//! ## Format
//! ```text
//! [iv(12, zufaellig pro Aufruf)] [ciphertext + auth_tag(16)]
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce as AesNonce,
};

use crate::error::{KryptoFehler, KryptoResult};
use crate::key::{SchluesselMaterial, SCHLUESSEL_LAENGE};
use crate::types::{Nonce, Umschlag};

/// Verschluesselt einen Klartext-String
///
/// Zieht eine frische 12-Byte-Nonce aus dem OS-RNG; Wiederverwendung einer
/// Nonce unter demselben Schluessel ist verboten.
pub fn text_verschluesseln(
    schluessel: &SchluesselMaterial,
    klartext: &str,
) -> KryptoResult<Umschlag> {
    bytes_verschluesseln(schluessel, klartext.as_bytes())
}

/// Entschluesselt einen Umschlag zu einem String
///
/// Jeder Fehlschlag (falscher Schluessel, Manipulation, Truncation,
/// ungueltiges UTF-8) wird zu [`KryptoFehler::Entschluesselung`].
pub fn text_entschluesseln(
    schluessel: &SchluesselMaterial,
    umschlag: &Umschlag,
) -> KryptoResult<String> {
    let klartext = bytes_entschluesseln(schluessel, umschlag)?;
    String::from_utf8(klartext).map_err(|_| KryptoFehler::Entschluesselung)
}

/// Verschluesselt rohe Datei-Bytes
///
/// Name, Typ und Groesse reisen ausserhalb des Umschlags im Protokoll-Event.
pub fn datei_verschluesseln(
    schluessel: &SchluesselMaterial,
    daten: &[u8],
) -> KryptoResult<Umschlag> {
    bytes_verschluesseln(schluessel, daten)
}

/// Entschluesselt rohe Datei-Bytes
pub fn datei_entschluesseln(
    schluessel: &SchluesselMaterial,
    umschlag: &Umschlag,
) -> KryptoResult<Vec<u8>> {
    bytes_entschluesseln(schluessel, umschlag)
}

// ---------------------------------------------------------------------------
// Interne Primitiven
// ---------------------------------------------------------------------------

fn cipher_bauen(schluessel: &SchluesselMaterial) -> KryptoResult<Aes256Gcm> {
    let key_bytes = schluessel.as_bytes();
    if key_bytes.len() != SCHLUESSEL_LAENGE {
        return Err(KryptoFehler::UngueltigeSchluesselLaenge {
            erwartet: SCHLUESSEL_LAENGE,
            erhalten: key_bytes.len(),
        });
    }
    let key = Key::<Aes256Gcm>::from_slice(key_bytes);
    Ok(Aes256Gcm::new(key))
}

fn bytes_verschluesseln(
    schluessel: &SchluesselMaterial,
    klartext: &[u8],
) -> KryptoResult<Umschlag> {
    let cipher = cipher_bauen(schluessel)?;
    let iv = Nonce::zufaellig();
    let nonce = AesNonce::from_slice(iv.as_bytes());

    let ciphertext = cipher
        .encrypt(nonce, klartext)
        .map_err(|e| KryptoFehler::Verschluesselung(e.to_string()))?;

    Ok(Umschlag { iv, ciphertext })
}

fn bytes_entschluesseln(
    schluessel: &SchluesselMaterial,
    umschlag: &Umschlag,
) -> KryptoResult<Vec<u8>> {
    let cipher = cipher_bauen(schluessel)?;
    let nonce = AesNonce::from_slice(umschlag.iv.as_bytes());

    cipher
        .decrypt(nonce, umschlag.ciphertext.as_slice())
        .map_err(|_| KryptoFehler::Entschluesselung)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
