pub mod ledger;
pub mod model;

pub use ledger::Ledger;
pub use model::{REWARD_SENDER, Transaction, unix_now};
