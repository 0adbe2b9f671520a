use thiserror::Error;

use crate::chain::ConnectorError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ClipboardError(pub String);

/// Failures a user action can end in. None of them escape the controller:
/// each is logged and rendered as a notification at the operation boundary.
#[derive(Debug, Error)]
pub enum PortalError {
    /// No wallet capability is injected into the page.
    #[error("no wallet provider available")]
    ProviderUnavailable,

    #[error("request declined by the user")]
    UserRejected,

    /// The wallet granted access but reported no account.
    #[error("wallet returned no accounts")]
    NoAccounts,

    #[error("wallet is not connected")]
    NotConnected,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("transaction failed: {0}")]
    UnknownTransaction(String),

    #[error("failed to read {what}: {source}")]
    ReadFailure {
        what: &'static str,
        #[source]
        source: ConnectorError,
    },

    #[error("clipboard write failed: {0}")]
    ClipboardFailure(#[from] ClipboardError),
}

impl PortalError {
    pub fn read(what: &'static str) -> impl FnOnce(ConnectorError) -> PortalError {
        move |source| PortalError::ReadFailure { what, source }
    }
}

pub type Result<T, E = PortalError> = std::result::Result<T, E>;
