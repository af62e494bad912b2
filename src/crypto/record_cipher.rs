//! Authenticated encryption of run tracks.
//!
//! The plaintext is the JSON encoding of the track. The cleartext
//! `uploaded` column is bound into the tag as a single AAD byte, so
//! flipping it outside the application makes the row fail to open.

use anyhow::{Context, Result};
use log::warn;
use rand::{rngs::OsRng, RngCore};

use crate::{db::models::RunRecord, track::Track};

use super::{KeyHandle, Keystore, RECORD_KEY_ALIAS};

/// 96-bit nonce, fresh for every seal.
pub const IV_LEN: usize = 12;
/// 128-bit Poly1305 tag appended to the ciphertext.
pub const TAG_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedTrack {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
}

fn uploaded_aad(uploaded: bool) -> [u8; 1] {
    [u8::from(uploaded)]
}

#[derive(Debug, Clone)]
pub struct RecordCipher {
    key: KeyHandle,
}

impl RecordCipher {
    pub fn new(key: KeyHandle) -> Self {
        Self { key }
    }

    pub fn from_keystore(keystore: &dyn Keystore) -> Result<Self> {
        let key = keystore
            .get_or_generate(RECORD_KEY_ALIAS)
            .context("failed to obtain record encryption key")?;
        Ok(Self::new(key))
    }

    pub fn encrypt(&self, track: &Track, uploaded: bool) -> Result<SealedTrack> {
        let plaintext = track.to_json().context("failed to encode track")?;
        let mut iv = vec![0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let ciphertext = self
            .key
            .seal(&iv, plaintext.as_bytes(), &uploaded_aad(uploaded))?;
        Ok(SealedTrack { ciphertext, iv })
    }

    /// Seals without the flag binding, as rows were written before schema v2.
    #[cfg(test)]
    pub(crate) fn encrypt_unbound(&self, track: &Track) -> Result<SealedTrack> {
        let plaintext = track.to_json().context("failed to encode track")?;
        let mut iv = vec![0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let ciphertext = self.key.seal(&iv, plaintext.as_bytes(), &[])?;
        Ok(SealedTrack { ciphertext, iv })
    }

    /// Opens a payload under the current contract (uploaded flag bound).
    pub fn decrypt(&self, ciphertext: &[u8], iv: &[u8], uploaded: bool) -> Option<Track> {
        self.open_with(ciphertext, iv, &uploaded_aad(uploaded))
    }

    /// Opens a payload written before the flag was bound. Only the schema
    /// migration should need this.
    pub fn decrypt_unbound(&self, ciphertext: &[u8], iv: &[u8]) -> Option<Track> {
        self.open_with(ciphertext, iv, &[])
    }

    pub fn decrypt_record(&self, record: &RunRecord) -> Option<Track> {
        let track = self.decrypt(&record.ciphertext, &record.iv, record.uploaded);
        if track.is_none() {
            warn!("record {} failed to decrypt, treating as corrupted", record.id);
        }
        track
    }

    fn open_with(&self, ciphertext: &[u8], iv: &[u8], aad: &[u8]) -> Option<Track> {
        if iv.len() != IV_LEN || ciphertext.len() < TAG_LEN {
            return None;
        }
        let plaintext = self.key.open(iv, ciphertext, aad)?;
        let json = std::str::from_utf8(&plaintext).ok()?;
        Track::from_json(json).ok()
    }
}
