//! Cryptographic intrinsics and the PRNG opcode.
//!
//! The VM exposes three opcodes here:
//!
//! - **SHA512** `(ptr, size) -> (hash_ptr)`: hashes `size` heap cells
//!   masked to their low byte and writes the 64-byte digest as 8 big-endian
//!   words at `hp`.
//! - **KEYGEN** `(--) -> (desc_ptr)`: generates an Ed25519 keypair, lays
//!   out the public key (4 words), the private key (4 words), then a
//!   two-word `[pub_ptr, priv_ptr]` descriptor, and returns the descriptor.
//! - **RAND** `(--) -> (v)`: a fresh 63-bit integer.
//!
//! Ledger entries store key material and digests in this big-endian 64-bit
//! word form, so the byte/word bridging helpers are public for hosts that
//! stage or read such blocks, as is a detached [`sign_message`] helper.

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};

use crate::vm::Vm;

/// Pack bytes into big-endian 64-bit words, zero-padding the final chunk.
pub fn bytes_to_words(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf[..chunk.len()].copy_from_slice(chunk);
            u64::from_be_bytes(buf)
        })
        .collect()
}

/// Unpack big-endian 64-bit words back into bytes.
pub fn words_to_bytes(words: &[u64]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// Sign a message with a private key given in VM-word form (4 big-endian
/// words, as laid out by KEYGEN). Returns the 64-byte signature as 8 words,
/// or `None` when the key material has the wrong shape.
pub fn sign_message(message: &[u8], priv_words: &[u64]) -> Option<[u64; 8]> {
    let bytes = words_to_bytes(priv_words);
    let key_bytes: [u8; 32] = bytes.try_into().ok()?;
    let signing_key = SigningKey::from_bytes(&key_bytes);
    let signature = signing_key.sign(message);
    let words = bytes_to_words(&signature.to_bytes());
    words.try_into().ok()
}

impl Vm {
    pub(crate) fn op_sha512(&mut self, at: usize) {
        let Some(size) = self.pop_value(at) else { return };
        let Some(ptr) = self.pop_value(at) else { return };

        let mut data = Vec::with_capacity(size as usize);
        for i in 0..size {
            let Some(cell) = self.heap_load(ptr.wrapping_add(i), at) else {
                return;
            };
            data.push((cell & 0xFF) as u8);
        }

        let digest = Sha512::digest(&data);
        let res_ptr = self.hp;
        for word in bytes_to_words(digest.as_slice()) {
            let addr = self.hp;
            if !self.heap_store(addr, word, at) {
                return;
            }
            self.hp += 1;
        }
        self.stack.push(res_ptr);
    }

    pub(crate) fn op_keygen(&mut self, at: usize) {
        let signing_key = SigningKey::generate(&mut OsRng);
        let pub_words = bytes_to_words(signing_key.verifying_key().as_bytes());
        let priv_words = bytes_to_words(&signing_key.to_bytes());

        let Some(pub_ptr) = self.write_words(&pub_words, at) else {
            return;
        };
        let Some(priv_ptr) = self.write_words(&priv_words, at) else {
            return;
        };
        let Some(desc_ptr) = self.write_words(&[pub_ptr, priv_ptr], at) else {
            return;
        };
        self.stack.push(desc_ptr);
    }

    pub(crate) fn op_rand(&mut self) {
        self.stack.push(rand::random::<u64>() >> 1);
    }

    /// Write words at `hp`, advancing it; returns the base address.
    fn write_words(&mut self, words: &[u64], at: usize) -> Option<u64> {
        let base = self.hp;
        for w in words {
            let addr = self.hp;
            if !self.heap_store(addr, *w, at) {
                return None;
            }
            self.hp += 1;
        }
        Some(base)
    }
}
