//! Schluesselableitung aus Raum-Code und Salt
//!
//! `schluessel_ableiten` ist deterministisch: identische (Code, Salt)-Paare
//! liefern auf beiden Seiten denselben Schluessel, sodass die Paarung ohne
//! jeden Schluesselaustausch ueber das Netz funktioniert.
//!
//! PBKDF2-HMAC-SHA256 mit 100 000 Iterationen und 256 Bit Ausgabe: teuer
//! genug gegen Offline-Brute-Force eines menschlich getippten Codes,
//! interaktiv aber noch unter einer Zehntelsekunde.

use rand::rngs::OsRng;
use rand::Rng;
use ring::pbkdf2;
use std::num::NonZeroU32;

use separee_core::types::RaumCode;

use crate::types::{Salz, SecretBytes};

/// PBKDF2-Iterationen (muss auf beiden Seiten identisch sein)
pub const PBKDF2_ITERATIONEN: u32 = 100_000;

/// Schluessel-Laenge in Bytes (AES-256)
pub const SCHLUESSEL_LAENGE: usize = 32;

/// Alphabet fuer generierte Raum-Codes
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Standard-Laenge generierter Raum-Codes
pub const CODE_LAENGE: usize = 10;

/// Abgeleitetes symmetrisches Schluesselmaterial
///
/// Lebt genau so lange wie die Raum-Mitgliedschaft des Clients und wird
/// beim Drop genullt. Verlaesst den Prozess nie.
#[derive(Debug, Clone)]
pub struct SchluesselMaterial {
    bytes: SecretBytes,
}

impl SchluesselMaterial {
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_bytes()
    }
}

/// Leitet das symmetrische Schluesselmaterial aus Code und Salt ab
pub fn schluessel_ableiten(code: &RaumCode, salz: &Salz) -> SchluesselMaterial {
    let mut out = vec![0u8; SCHLUESSEL_LAENGE];
    // Die Iterationszahl ist eine Konstante > 0
    let iterationen = NonZeroU32::new(PBKDF2_ITERATIONEN).unwrap();
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterationen,
        salz.as_bytes(),
        code.als_str().as_bytes(),
        &mut out,
    );
    SchluesselMaterial {
        bytes: SecretBytes::new(out),
    }
}

/// Erzeugt einen zufaelligen Raum-Code (A-Z, 0-9)
pub fn zufalls_code(laenge: usize) -> RaumCode {
    let mut rng = OsRng;
    let code: String = (0..laenge)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    RaumCode::new(code)
}

/// Erzeugt ein frisches oeffentliches Salt (16 Zufalls-Bytes)
pub fn salz_erzeugen() -> Salz {
    Salz::erzeugen()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
