use thiserror::Error;

/// Reasons a simulator operation can be refused. None of them leave partial
/// state behind: every check runs before the first mutation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("transaction too large")]
    TransactionTooLarge,
    #[error("no transactions to mine")]
    EmptyMempool,
    #[error("no valid transactions to mine")]
    NoValidTransactions,
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid amount")]
    InvalidAmount,
    #[error("stale chain tip")]
    StaleTip,
    #[error("difficulty unreachable")]
    DifficultyUnreachable,
    #[error("proof-of-work search cancelled")]
    Cancelled,
    #[error("unknown template")]
    UnknownTemplate,
    #[error("block does not meet difficulty")]
    InvalidProof,
}

/// A single rejected field of a network parameter update.
#[derive(Error, Debug, Clone, PartialEq, serde::Serialize)]
#[error("{field}: {reason}")]
pub struct ParamError {
    pub field: &'static str,
    pub reason: String,
}
