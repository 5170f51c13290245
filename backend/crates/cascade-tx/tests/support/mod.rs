#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use cascade_chain::{
    BuildError, BundleId, BundleRelay, BundleResult, ChainError, ConfirmationStatus,
    ExecutionRpc, InstructionBuilder, InstructionSet, LookupTableResolution, ValidityToken,
};
use cascade_core::{AllocationRecord, Participant};
use cascade_store::AllocationStore;
use solana_hash::Hash;
use solana_instruction::{AccountMeta, Instruction};
use solana_keypair::Keypair;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;

/// The first token `FakeRpc` hands out; later requests count the blockhash byte up from 7
pub fn validity() -> ValidityToken {
    ValidityToken { blockhash: Hash::new_from_array([7u8; 32]), last_valid_block_height: 150 }
}

/// Participants with keypairs and a store holding a complete record for each
pub fn launch_fixture(n: usize) -> (Vec<Keypair>, Vec<Participant>, AllocationStore) {
    let keypairs: Vec<Keypair> = (0..n).map(|_| Keypair::new()).collect();
    let participants = Participant::enumerate(keypairs.iter().map(|k| k.pubkey()));
    let records: Vec<AllocationRecord> = participants
        .iter()
        .map(|p| AllocationRecord {
            participant: *p,
            contributed: (p.ordinal as u64 + 1) * 100_000_000,
            granted: (p.ordinal as u64 + 1) * 1_000_000,
            share_percent: 0.0001,
        })
        .collect();

    let mut store = AllocationStore::default();
    store.record_allocations(&records);
    (keypairs, participants, store)
}

/// Two small instructions per participant, both signed by the participant
pub struct PairBuilder {
    pub program: Pubkey,
    pub shared: [Pubkey; 2],
    pub fail_for: Option<usize>,
}

impl PairBuilder {
    pub fn new() -> Self {
        Self { program: Pubkey::new_unique(), shared: [Pubkey::new_unique(), Pubkey::new_unique()], fail_for: None }
    }
}

impl InstructionBuilder for PairBuilder {
    fn build(&self, participant: &Participant, record: &AllocationRecord) -> Result<InstructionSet, BuildError> {
        if self.fail_for == Some(participant.ordinal) {
            return Err(BuildError::Encode("scripted failure".into()));
        }
        let first = Instruction::new_with_bytes(
            self.program,
            &[participant.ordinal as u8],
            vec![AccountMeta::new(participant.key, true), AccountMeta::new_readonly(self.shared[0], false)],
        );
        let second = Instruction::new_with_bytes(
            self.program,
            &record.granted.to_le_bytes(),
            vec![AccountMeta::new(participant.key, true), AccountMeta::new(self.shared[1], false)],
        );
        Ok(InstructionSet::new(participant.key, vec![first, second]))
    }
}

#[derive(Default)]
pub struct FakeRpc {
    /// Consumed one per send; an empty script means success
    pub send_script: Mutex<VecDeque<Result<(), ChainError>>>,
    pub sent: Mutex<Vec<VersionedTransaction>>,
    pub confirmation: Option<ConfirmationStatus>,
    pub balances: HashMap<Pubkey, Result<u64, ChainError>>,
    pub table: Option<LookupTableResolution>,
    pub token_requests: Mutex<usize>,
}

impl FakeRpc {
    pub fn scripted(script: Vec<Result<(), ChainError>>) -> Self {
        Self { send_script: Mutex::new(script.into()), ..Default::default() }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl ExecutionRpc for FakeRpc {
    async fn latest_validity_token(&self) -> Result<ValidityToken, ChainError> {
        let mut requests = self.token_requests.lock().unwrap();
        let token = ValidityToken {
            blockhash: Hash::new_from_array([7u8 + *requests as u8; 32]),
            ..validity()
        };
        *requests += 1;
        Ok(token)
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature, ChainError> {
        self.sent.lock().unwrap().push(transaction.clone());
        match self.send_script.lock().unwrap().pop_front() {
            Some(Err(e)) => Err(e),
            _ => Ok(transaction.signatures[0]),
        }
    }

    async fn confirm(&self, _signature: &Signature) -> Result<ConfirmationStatus, ChainError> {
        Ok(self.confirmation.clone().unwrap_or(ConfirmationStatus::Confirmed))
    }

    async fn balance(&self, account: &Pubkey) -> Result<u64, ChainError> {
        self.balances.get(account).cloned().unwrap_or(Ok(0))
    }

    async fn lookup_table(&self, _address: &Pubkey) -> Result<LookupTableResolution, ChainError> {
        Ok(self.table.clone().unwrap_or(LookupTableResolution::NotFound))
    }
}

pub enum RelayBehavior {
    Land,
    RefuseSend,
    Result(BundleResult),
    ResultError,
}

pub struct FakeRelay {
    pub behavior: RelayBehavior,
    pub bundles: Mutex<Vec<usize>>,
}

impl FakeRelay {
    pub fn new(behavior: RelayBehavior) -> Self {
        Self { behavior, bundles: Mutex::new(Vec::new()) }
    }

    pub fn bundle_sizes(&self) -> Vec<usize> {
        self.bundles.lock().unwrap().clone()
    }
}

#[async_trait]
impl BundleRelay for FakeRelay {
    async fn send_bundle(&self, transactions: &[VersionedTransaction]) -> Result<BundleId, ChainError> {
        self.bundles.lock().unwrap().push(transactions.len());
        match self.behavior {
            RelayBehavior::RefuseSend => Err(ChainError::Transport("connection reset".into())),
            _ => Ok(BundleId(format!("bundle-{}", self.bundles.lock().unwrap().len()))),
        }
    }

    async fn bundle_result(&self, bundle_id: &BundleId) -> Result<BundleResult, ChainError> {
        match &self.behavior {
            RelayBehavior::Land | RelayBehavior::RefuseSend => Ok(BundleResult::Landed),
            RelayBehavior::Result(result) => Ok(result.clone()),
            RelayBehavior::ResultError => Err(ChainError::BundleTimeout { bundle_id: bundle_id.0.clone(), polls: 3 }),
        }
    }
}
