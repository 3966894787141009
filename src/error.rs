//! Command Error Types

use derive_more::{Display, Error};

/// A command error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for command handlers.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("unable to install the log subscriber")]
    Logging,
    #[display("unable to load configuration")]
    Config,
    #[display("unable to set up the pipeline")]
    Setup,
    #[display("unable to read the hook event from stdin")]
    HookInput,
    #[display("unable to write output")]
    Output,
    #[display("upload finalization failed")]
    Finalize,
    #[display("unable to read upload progress")]
    Status,
    #[display("no progress recorded for upload {_0:?}")]
    NoProgress(#[error(not(source))] String),
}
