//! Module `pipeline` implement the byte-handler pipeline applied to
//! page bytes on write and reversed on read.
//!
//! Steps compose in configuration order: what `apply` does first,
//! `restore` undoes last. An empty pipeline is the zero-copy path, the
//! page bytes pass through borrowed.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};

use std::{borrow::Cow, io::Read};

use crate::Result;

/// Length of the nonce prefix on AES encrypted pages.
const AES_NONCE_LEN: usize = 12;

/// One byte-handler step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStep {
    /// Zstandard block compression.
    Zstd,
    /// RFC-1951 deflate compression.
    Deflate,
    /// AES-256-GCM encryption, requires a key in the configuration.
    Aes,
    /// Trailing CRC32 checksum.
    Crc32,
}

/// Ordered byte-handler pipeline.
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
    cipher_key: Option<[u8; 32]>,
}

impl Pipeline {
    pub fn new(steps: Vec<PipelineStep>, cipher_key: Option<[u8; 32]>) -> Result<Pipeline> {
        if steps.contains(&PipelineStep::Aes) && cipher_key.is_none() {
            err_at!(InvalidState, msg: "aes step configured without a key")
        } else {
            Ok(Pipeline { steps, cipher_key })
        }
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Transform page bytes for the wire, in configured order.
    pub fn apply<'a>(&self, data: Cow<'a, [u8]>) -> Result<Cow<'a, [u8]>> {
        let mut data = data;
        for step in self.steps.iter() {
            data = Cow::Owned(self.apply_step(*step, &data)?);
        }
        Ok(data)
    }

    /// Undo the pipeline, in reverse order.
    pub fn restore<'a>(&self, data: Cow<'a, [u8]>) -> Result<Cow<'a, [u8]>> {
        let mut data = data;
        for step in self.steps.iter().rev() {
            data = Cow::Owned(self.restore_step(*step, &data)?);
        }
        Ok(data)
    }

    fn apply_step(&self, step: PipelineStep, data: &[u8]) -> Result<Vec<u8>> {
        match step {
            PipelineStep::Zstd => err_at!(IOError, zstd::encode_all(data, 3)),
            PipelineStep::Deflate => {
                let mut buf = vec![];
                let mut encoder =
                    flate2::read::DeflateEncoder::new(data, flate2::Compression::default());
                err_at!(IOError, encoder.read_to_end(&mut buf))?;
                Ok(buf)
            }
            PipelineStep::Aes => {
                let cipher = self.cipher()?;
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let mut buf = nonce.to_vec();
                let ct = match cipher.encrypt(&nonce, data) {
                    Ok(ct) => ct,
                    Err(err) => return err_at!(Fatal, msg: "aes encrypt {}", err),
                };
                buf.extend_from_slice(&ct);
                Ok(buf)
            }
            PipelineStep::Crc32 => {
                let mut buf = data.to_vec();
                buf.extend_from_slice(&crc32fast::hash(data).to_be_bytes());
                Ok(buf)
            }
        }
    }

    fn restore_step(&self, step: PipelineStep, data: &[u8]) -> Result<Vec<u8>> {
        match step {
            PipelineStep::Zstd => err_at!(Corrupt, zstd::decode_all(data)),
            PipelineStep::Deflate => {
                let mut buf = vec![];
                let mut decoder = flate2::read::DeflateDecoder::new(data);
                err_at!(Corrupt, decoder.read_to_end(&mut buf))?;
                Ok(buf)
            }
            PipelineStep::Aes => {
                if data.len() < AES_NONCE_LEN {
                    return err_at!(Corrupt, msg: "aes payload too short {}", data.len());
                }
                let cipher = self.cipher()?;
                let nonce = Nonce::from_slice(&data[..AES_NONCE_LEN]);
                match cipher.decrypt(nonce, &data[AES_NONCE_LEN..]) {
                    Ok(pt) => Ok(pt),
                    Err(err) => err_at!(Corrupt, msg: "aes decrypt {}", err),
                }
            }
            PipelineStep::Crc32 => {
                if data.len() < 4 {
                    return err_at!(Corrupt, msg: "crc payload too short {}", data.len());
                }
                let at = data.len() - 4;
                let mut stored = [0_u8; 4];
                stored.copy_from_slice(&data[at..]);
                let computed = crc32fast::hash(&data[..at]);
                if u32::from_be_bytes(stored) != computed {
                    err_at!(
                        Corrupt, msg: "crc mismatch {:x} {:x}",
                        u32::from_be_bytes(stored), computed
                    )
                } else {
                    Ok(data[..at].to_vec())
                }
            }
        }
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        match &self.cipher_key {
            Some(key) => match Aes256Gcm::new_from_slice(key) {
                Ok(cipher) => Ok(cipher),
                Err(err) => err_at!(Fatal, msg: "aes key {}", err),
            },
            None => err_at!(InvalidState, msg: "aes step without key"),
        }
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;
