pub mod analytics;
pub mod block;
pub mod difficulty;
pub mod engine;
pub mod mempool;
pub mod model;
pub mod params;
pub mod pow;

pub use block::Block;
pub use engine::{BlockTemplate, Simulator};
pub use model::Blockchain;
pub use params::NetworkParameters;
pub use pow::{Miner, SealReport};

/// Default Proof-of-Work difficulty (number of leading zeros).
pub const DEFAULT_DIFFICULTY: u32 = 3;

/// Fixed subsidy paid to the miner on top of collected fees.
pub const BASE_REWARD: f64 = 10.0;

/// How many recent blocks the retarget looks at
pub const DIFF_ADJUST_WINDOW: usize = 10;

/// Retarget after this many blocks unless configured otherwise
pub const DEFAULT_RETARGET_INTERVAL: usize = 10;

/// Nonce search bound so a bad difficulty cannot pin a worker forever
pub const DEFAULT_MAX_NONCE: u64 = 50_000_000;

/// Difficulty bounds (a hex SHA-256 digest has 64 characters)
pub const DIFF_MIN: u32 = 1;
pub const DIFF_MAX: u32 = 64;
