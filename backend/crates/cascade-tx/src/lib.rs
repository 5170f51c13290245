pub mod batcher;
pub mod pipeline;
pub mod signer;
pub mod submitter;

pub use batcher::{BatchConfig, BatchError, InstructionBatcher, TransactionPayload};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, ReclaimReport, TipConfig};
pub use signer::{KeyRing, SignedPayload, SigningError, TransactionSigner};
pub use submitter::{
  BundleOutcome, BundleReport, BundleSubmitter, PayloadResult, SendOutcome, SubmissionReport,
  SubmitterConfig,
};
