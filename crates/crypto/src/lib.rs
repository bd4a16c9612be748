//! # separee-crypto
//!
//! Client-seitige Kryptografie fuer Separee: Schluesselableitung aus dem
//! geheimen Raum-Code und AEAD-Verschluesselung der Nachrichten- und
//! Datei-Inhalte. Der Relay sieht ausschliesslich die hier erzeugten
//! Umschlaege (IV + Ciphertext), nie Klartext oder Schluessel.
//!
//! ## Module
//! - `key` - PBKDF2-Schluesselableitung und Code/Salt-Generatoren
//! - `codec` - AES-256-GCM Ver-/Entschluesselung fuer Text und Dateien
//! - `types` - Gemeinsame Typen (SecretBytes, Nonce, Salz, Umschlag)
//! - `error` - Fehlertypen

pub mod codec;
pub mod error;
pub mod key;
pub mod types;

// Bequeme Re-Exports
pub use codec::{
    datei_entschluesseln, datei_verschluesseln, text_entschluesseln, text_verschluesseln,
};
pub use error::{KryptoFehler, KryptoResult};
pub use key::{salz_erzeugen, schluessel_ableiten, zufalls_code, SchluesselMaterial};
pub use types::{Nonce, Salz, SecretBytes, Umschlag};
