//! Launch-wide constants
//! Centralized location for curve parameters and packaging limits

// PRECISION CONSTANTS
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000; // 1e9 lamports
pub const TOKEN_PRECISION: u64 = 1_000_000;      // 1e6 (6 decimals)
pub const BPS_PRECISION: u64 = 10_000;           // 100% = 10000 bps

// CURVE PARAMETERS
pub const TOTAL_SUPPLY: u64 = 1_000_000_000 * TOKEN_PRECISION;
pub const VIRTUAL_INPUT_BASELINE: u64 = 30 * LAMPORTS_PER_SOL;
pub const INITIAL_VIRTUAL_OUTPUT: u64 = 1_073_000_000 * TOKEN_PRECISION;
pub const INITIAL_REAL_OUTPUT: u64 = 793_100_000 * TOKEN_PRECISION;

// PACKAGING LIMITS
pub const MAX_PAYLOAD_BYTES: usize = 1232;       // packet data size
pub const MAX_BUNDLE_LEN: usize = 5;             // relay bundle limit
pub const DEFAULT_GROUP_SIZE: usize = 6;         // participants per payload, 2 ixs each
pub const DEFAULT_FLAT_GROUP_SIZE: usize = 20;   // instructions per flat payload
pub const DEFAULT_RECLAIM_GROUP_SIZE: usize = 7;

// FUNDING
pub const FUNDING_MARKUP_PER_MILLE: u64 = 1_015;  // 1.5% over the contribution
pub const FUNDING_BUFFER_LAMPORTS: u64 = 2_500_000; // 0.0025 SOL for rent and fees

// RECLAIM
pub const RECLAIM_DUST_LAMPORTS: u64 = 10_000;
