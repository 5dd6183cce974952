use thiserror::Error;

/// Errors raised while reading a pending restart signal off disk.
///
/// These never reach the host request loop:
/// [`consume_signal`](crate::fs::signal_files::consume_signal) logs every
/// variant and degrades it to "no signal pending".
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("failed to read signal file")]
    Io(#[from] std::io::Error),
    #[error("malformed signal payload")]
    Malformed(#[from] serde_json::Error),
}
