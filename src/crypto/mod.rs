pub mod keystore;
pub mod record_cipher;

pub use keystore::{FileKeystore, KeyHandle, Keystore, MemoryKeystore, RECORD_KEY_ALIAS};
pub use record_cipher::{RecordCipher, SealedTrack, IV_LEN, TAG_LEN};
