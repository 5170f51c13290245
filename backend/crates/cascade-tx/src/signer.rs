use std::collections::HashMap;

use solana_keypair::Keypair;
use solana_pubkey::Pubkey;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;
use thiserror::Error;
use tracing::{debug, warn};

use crate::batcher::TransactionPayload;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningError {
  #[error("Payload {payload} needs a signature from {signer}, which is not available")]
  MissingSigner { payload: usize, signer: Pubkey },

  #[error("Payload {payload} was compiled for fee payer {expected}, not {actual}")]
  FeePayerMismatch { payload: usize, expected: Pubkey, actual: Pubkey },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignedPayload {
  pub index: usize,
  pub transaction: VersionedTransaction,
  pub size: usize,
}

/// Participant keypairs by public key
#[derive(Default)]
pub struct KeyRing {
  keys: HashMap<Pubkey, Keypair>,
}

impl KeyRing {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, keypair: Keypair) {
    self.keys.insert(keypair.pubkey(), keypair);
  }

  pub fn get(&self, key: &Pubkey) -> Option<&Keypair> {
    self.keys.get(key)
  }

  pub fn contains(&self, key: &Pubkey) -> bool {
    self.keys.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }

  pub fn is_empty(&self) -> bool {
    self.keys.is_empty()
  }
}

impl FromIterator<Keypair> for KeyRing {
  fn from_iter<I: IntoIterator<Item = Keypair>>(iter: I) -> Self {
    let mut ring = Self::new();
    for keypair in iter {
      ring.insert(keypair);
    }
    ring
  }
}

impl std::fmt::Debug for KeyRing {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("KeyRing").field("keys", &self.keys.keys().collect::<Vec<_>>()).finish()
  }
}

/// Signs compiled payloads with the fee payer and whichever participant keys they require
pub struct TransactionSigner<'a> {
  fee_payer: &'a Keypair,
  keys: &'a KeyRing,
}

impl<'a> TransactionSigner<'a> {
  pub fn new(fee_payer: &'a Keypair, keys: &'a KeyRing) -> Self {
    Self { fee_payer, keys }
  }

  fn keypair_for(&self, key: &Pubkey) -> Option<&Keypair> {
    if *key == self.fee_payer.pubkey() {
      Some(self.fee_payer)
    } else {
      self.keys.get(key)
    }
  }

  /// Sign every required signer slot of the payload's message
  ///
  /// The message itself is left untouched; signatures follow its signer order.
  pub fn sign(&self, payload: &TransactionPayload) -> Result<SignedPayload, SigningError> {
    let fee_payer = self.fee_payer.pubkey();
    if payload.fee_payer != fee_payer {
      return Err(SigningError::FeePayerMismatch {
        payload: payload.index,
        expected: payload.fee_payer,
        actual: fee_payer,
      });
    }

    let message_bytes = payload.message.serialize();
    let signatures = payload
      .required_signers()
      .iter()
      .map(|signer| {
        self
          .keypair_for(signer)
          .map(|keypair| keypair.sign_message(&message_bytes))
          .ok_or(SigningError::MissingSigner { payload: payload.index, signer: *signer })
      })
      .collect::<Result<Vec<_>, _>>()?;

    debug!(payload = payload.index, signatures = signatures.len(), "Payload signed");

    Ok(SignedPayload {
      index: payload.index,
      transaction: VersionedTransaction { signatures, message: payload.message.clone() },
      size: payload.size,
    })
  }

  /// Sign in order, stopping at the first payload that cannot be signed
  pub fn sign_all(&self, payloads: &[TransactionPayload]) -> Result<Vec<SignedPayload>, SigningError> {
    payloads.iter().map(|payload| self.sign(payload)).collect()
  }

  /// Sign every payload that can be signed and return the failures for the rest
  pub fn sign_each(&self, payloads: &[TransactionPayload]) -> (Vec<SignedPayload>, Vec<SigningError>) {
    let mut signed = Vec::with_capacity(payloads.len());
    let mut failed = Vec::new();

    for payload in payloads {
      match self.sign(payload) {
        Ok(payload) => signed.push(payload),
        Err(error) => {
          warn!(payload = payload.index, %error, "Payload cannot be signed, not submitting it");
          failed.push(error);
        }
      }
    }
    (signed, failed)
  }
}
