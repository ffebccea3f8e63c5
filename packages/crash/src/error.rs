use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CrashError {
    #[error("Insufficient balance: bet {requested}, available {available}")]
    InsufficientBalance { requested: u64, available: u64 },
    #[error("Invalid bet amount: {0}")]
    InvalidAmount(u64),
    #[error("A bet is already placed")]
    BetAlreadyPlaced,
    #[error("Invalid auto cash-out threshold: {0}")]
    InvalidThreshold(f64),
    #[error("Invalid rules: {0}")]
    InvalidRules(&'static str),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
