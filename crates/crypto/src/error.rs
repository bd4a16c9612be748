//! Fehlertypen fuer das Kryptografie-Subsystem

use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum KryptoFehler {
    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    /// Eine einzige, bewusst undifferenzierte Bedingung fuer jeden
    /// fehlgeschlagenen Entschluesselungsversuch: falscher Schluessel,
    /// manipulierter Ciphertext, Truncation oder ungueltiges UTF-8 nach
    /// der Entschluesselung sind von aussen nicht unterscheidbar.
    #[error("Entschluesselung fehlgeschlagen")]
    Entschluesselung,

    #[error("Ungueltige Nonce-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeNonce { erwartet: usize, erhalten: usize },

    #[error("Ungueltige Salz-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigesSalz { erwartet: usize, erhalten: usize },

    #[error("Ungueltige Schluessel-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeSchluesselLaenge { erwartet: usize, erhalten: usize },

    #[error("Base64-Dekodierung fehlgeschlagen: {0}")]
    Base64(#[from] base64::DecodeError),
}

pub type KryptoResult<T> = Result<T, KryptoFehler>;
