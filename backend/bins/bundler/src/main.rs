mod cli;
mod plan;

use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};
use cascade_chain::{
  load_participant_keys, parse_base58_keypair, CurveAccounts, CurvePurchaseBuilder, HttpRelayClient,
  HttpRpcClient, RelayClientConfig, RetryPolicy, RpcClientConfig,
};
use cascade_config::Settings;
use cascade_core::{
  constants::RECLAIM_DUST_LAMPORTS, units::format_native_amount, Participant, ReserveState, SimulationOutcome,
};
use cascade_store::{AllocationRepository, JsonFileRepository};
use cascade_tx::{
  BatchConfig, BundleOutcome, KeyRing, Pipeline, PipelineConfig, SubmissionReport, SubmitterConfig, TipConfig,
};
use clap::Parser;
use solana_keypair::Keypair;
use solana_pubkey::Pubkey;
use solana_signer::Signer;
use tracing::info;

use crate::cli::{Cli, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  cascade_telemetry::init()?;
  let cli = Cli::parse();

  let settings = Settings::from_env().context("Failed to load configuration")?;
  info!(?settings, command = ?cli.command, "Starting bundler");

  run(cli.command, &settings).await
}

async fn run(command: Command, settings: &Settings) -> Result<()> {
  let repository = JsonFileRepository::new(&settings.store_path);
  let rpc = HttpRpcClient::new(&settings.endpoints.rpc_url, rpc_config(settings))?;
  let relay = HttpRelayClient::new(&settings.endpoints.relay_url, relay_config(settings))?;
  let payer = parse_base58_keypair(&settings.payer_private_key).context("PAYER_PRIVATE_KEY is not a valid keypair")?;

  let keypairs = match command {
    Command::Fund | Command::Launch | Command::Reclaim => load_participant_keys(&settings.keypairs_dir)
      .with_context(|| format!("Failed to load keypairs from {}", settings.keypairs_dir.display()))?,
    Command::Simulate(_) | Command::Clear => Vec::new(),
  };
  let participants = Participant::enumerate(keypairs.iter().map(|k| k.pubkey()));
  let keys: KeyRing = keypairs.into_iter().collect();

  let pipeline = Pipeline::new(&rpc, &relay, &repository, &payer, &keys, pipeline_config(settings)?);

  match command {
    Command::Simulate(args) => {
      let contributions = plan::read_contributions(&args.contributions)?;
      let outcome = pipeline.simulate(ReserveState::launch(), &contributions, !args.dry_run)?;
      print_simulation(&outcome, args.dry_run);
    }
    Command::Fund => {
      let report = pipeline.fund(&participants).await?;
      print_submission("fund", &report);
    }
    Command::Launch => {
      let builder = purchase_builder(settings, &repository, &payer)?;
      let report = pipeline.launch(&participants, &builder).await?;
      print_submission("launch", &report);
    }
    Command::Reclaim => {
      let report = pipeline.reclaim(&participants).await?;
      for (participant, lamports) in &report.swept {
        println!("reclaimed {} from {participant}", format_native_amount(*lamports));
      }
      println!("skipped {} participants, cleared {} records", report.skipped.len(), report.cleared);
      print_submission("reclaim", &report.submission);
    }
    Command::Clear => {
      let store = pipeline.clear()?;
      println!("cleared participant records, {} remain", store.len());
    }
  }
  Ok(())
}

fn read_retry(settings: &Settings) -> RetryPolicy {
  RetryPolicy::new(
    settings.retry.attempts,
    Duration::from_millis(settings.retry.delay_ms),
    settings.retry.multiplier,
  )
}

fn rpc_config(settings: &Settings) -> RpcClientConfig {
  RpcClientConfig {
    read_retry: read_retry(settings),
    balance_retry: RetryPolicy::new(
      settings.retry.balance_attempts,
      Duration::from_millis(settings.retry.balance_delay_ms),
      2.0,
    ),
    confirm_polls: settings.poll.confirm_polls,
    confirm_poll_interval: Duration::from_millis(settings.poll.confirm_poll_ms),
    request_timeout: Duration::from_millis(settings.poll.request_timeout_ms),
  }
}

fn relay_config(settings: &Settings) -> RelayClientConfig {
  RelayClientConfig {
    read_retry: read_retry(settings),
    polls: settings.poll.bundle_result_polls,
    poll_interval: Duration::from_millis(settings.poll.bundle_result_poll_ms),
    request_timeout: Duration::from_millis(settings.poll.request_timeout_ms),
  }
}

fn pipeline_config(settings: &Settings) -> Result<PipelineConfig> {
  let tip = match &settings.tip.account {
    Some(account) if settings.tip.lamports > 0 => Some(TipConfig {
      account: pubkey("TIP_ACCOUNT", account)?,
      lamports: settings.tip.lamports,
    }),
    _ => None,
  };

  Ok(PipelineConfig {
    batch: BatchConfig {
      group_size: settings.batch.group_size,
      flat_group_size: settings.batch.flat_group_size,
      size_ceiling: settings.batch.max_payload_bytes,
    },
    submitter: SubmitterConfig { max_bundle_len: settings.batch.max_bundle_len },
    reclaim_group_size: settings.batch.reclaim_group_size,
    dust_lamports: RECLAIM_DUST_LAMPORTS,
    tip,
  })
}

/// Purchase builder for the configured curve; the mint comes from `MINT` or the store
fn purchase_builder(
  settings: &Settings,
  repository: &dyn AllocationRepository,
  payer: &Keypair,
) -> Result<CurvePurchaseBuilder> {
  let curve = settings.curve.as_ref().context("CURVE_PROGRAM_ID is required to launch")?;
  let mint = match &settings.mint {
    Some(mint) => mint.clone(),
    None => repository.load()?.mint.context("No mint configured or recorded in the allocation store")?,
  };

  let accounts = CurveAccounts {
    program_id: pubkey("CURVE_PROGRAM_ID", &curve.program_id)?,
    global: pubkey("CURVE_GLOBAL", &curve.global)?,
    fee_recipient: pubkey("CURVE_FEE_RECIPIENT", &curve.fee_recipient)?,
    event_authority: pubkey("CURVE_EVENT_AUTHORITY", &curve.event_authority)?,
    mint: pubkey("MINT", &mint)?,
  };
  Ok(CurvePurchaseBuilder::new(accounts, payer.pubkey(), curve.slippage_bps))
}

fn pubkey(name: &str, raw: &str) -> Result<Pubkey> {
  Pubkey::from_str(raw).with_context(|| format!("{name} is not a valid public key: {raw:?}"))
}

fn print_simulation(outcome: &SimulationOutcome, dry_run: bool) {
  for record in &outcome.records {
    println!(
      "{}: {} in, {} out ({:.4}% of supply)",
      record.participant,
      format_native_amount(record.contributed),
      record.granted,
      record.share_percent
    );
  }
  for skipped in &outcome.skipped {
    println!("{}: skipped ({:?})", skipped.participant, skipped.reason);
  }
  println!(
    "{} allocations, {} tokens, {:.4}% of supply{}",
    outcome.records.len(),
    outcome.total_granted(),
    outcome.total_share_percent(),
    if dry_run { " (dry run, not saved)" } else { "" }
  );
}

fn print_submission(phase: &str, report: &SubmissionReport) {
  for bundle in &report.bundles {
    match &bundle.outcome {
      BundleOutcome::AtomicLanded { bundle_id } => {
        println!("{phase} bundle {}: landed as {bundle_id}", bundle.bundle)
      }
      BundleOutcome::FallbackCompleted { succeeded, failed, .. } => println!(
        "{phase} bundle {}: sent individually, {succeeded} succeeded, {failed} failed",
        bundle.bundle
      ),
      BundleOutcome::FallbackAbortedNoPayloads => println!("{phase} bundle {}: nothing to send", bundle.bundle),
    }
  }
  println!(
    "{phase}: {} bundles, {} landed atomically, {} payloads succeeded, {} failed",
    report.bundles.len(),
    report.landed_atomically(),
    report.payloads_succeeded(),
    report.payloads_failed()
  );
  for error in &report.unsigned {
    println!("{phase}: not submitted, {error}");
  }
}
