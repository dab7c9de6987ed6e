//! PKCS#7-Padding
//!
//! Es wird immer aufgefuellt: ein bereits blockbuendiger Klartext erhaelt
//! einen vollen zusaetzlichen Block. Beim Entfernen werden alle
//! Padding-Bytes streng geprueft.

use efris_core::{EfrisError, Result};

/// AES-Blockgroesse in Bytes
pub const BLOCK_GROESSE: usize = 16;

/// Haengt `n` Bytes mit dem Wert `n` an (`n` in `1..=block_groesse`)
pub fn pkcs7_pad(daten: &[u8], block_groesse: usize) -> Vec<u8> {
    let n = block_groesse - (daten.len() % block_groesse);
    let mut out = Vec::with_capacity(daten.len() + n);
    out.extend_from_slice(daten);
    out.resize(daten.len() + n, n as u8);
    out
}

/// Entfernt und verifiziert das PKCS#7-Padding
pub fn pkcs7_unpad(daten: &[u8], block_groesse: usize) -> Result<Vec<u8>> {
    let Some(&letztes) = daten.last() else {
        return Err(EfrisError::verschluesselung("Padding fehlt: leere Daten"));
    };

    let n = letztes as usize;
    if n == 0 || n > block_groesse || n > daten.len() {
        return Err(EfrisError::verschluesselung(format!(
            "Ungueltige Padding-Laenge: {n}"
        )));
    }

    let (inhalt, padding) = daten.split_at(daten.len() - n);
    if padding.iter().any(|&b| b != letztes) {
        return Err(EfrisError::verschluesselung("Padding-Bytes inkonsistent"));
    }

    Ok(inhalt.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpad_nach_pad_fuer_alle_laengen() {
        for laenge in 0..=64usize {
            let daten: Vec<u8> = (0..laenge).map(|i| (i * 7) as u8).collect();
            let gepolstert = pkcs7_pad(&daten, BLOCK_GROESSE);
            assert_eq!(gepolstert.len() % BLOCK_GROESSE, 0);
            assert!(gepolstert.len() > daten.len());
            assert_eq!(pkcs7_unpad(&gepolstert, BLOCK_GROESSE).unwrap(), daten);
        }
    }

    #[test]
    fn blockbuendig_bekommt_vollen_block() {
        let gepolstert = pkcs7_pad(&[0xAA; 16], BLOCK_GROESSE);
        assert_eq!(gepolstert.len(), 32);
        assert!(gepolstert[16..].iter().all(|&b| b == 16));
    }

    #[test]
    fn null_als_padding_laenge_abgelehnt() {
        let mut daten = vec![1u8; 16];
        daten[15] = 0;
        assert!(pkcs7_unpad(&daten, BLOCK_GROESSE).is_err());
    }

    #[test]
    fn zu_grosse_padding_laenge_abgelehnt() {
        let daten = vec![17u8; 32];
        assert!(pkcs7_unpad(&daten, BLOCK_GROESSE).is_err());
    }

    #[test]
    fn inkonsistente_padding_bytes_abgelehnt() {
        let mut daten = pkcs7_pad(b"hallo", BLOCK_GROESSE);
        // Vorletztes Padding-Byte verfaelschen
        let idx = daten.len() - 2;
        daten[idx] ^= 0x01;
        assert!(pkcs7_unpad(&daten, BLOCK_GROESSE).is_err());
    }

    #[test]
    fn leere_daten_abgelehnt() {
        assert!(pkcs7_unpad(&[], BLOCK_GROESSE).is_err());
    }
}
