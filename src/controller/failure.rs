use crate::{
    chain::{ConnectorError, USER_REJECTED_CODE},
    error::PortalError,
};

use super::text;

/// Maps a failed `register` submission or confirmation onto the user-facing
/// taxonomy. Structured kinds and codes win; the message is only inspected
/// when the connector gave nothing better.
pub fn classify_transaction_error(err: ConnectorError, preview_chars: usize) -> PortalError {
    match err {
        ConnectorError::UserRejected => PortalError::UserRejected,
        ConnectorError::InsufficientFunds => PortalError::InsufficientFunds,
        ConnectorError::Rpc { code, .. } if code == USER_REJECTED_CODE => PortalError::UserRejected,
        other => {
            let message = other.to_string();
            if message.to_ascii_lowercase().contains("insufficient funds") {
                PortalError::InsufficientFunds
            } else {
                PortalError::UnknownTransaction(preview(&message, preview_chars))
            }
        }
    }
}

/// Text for the registration status line after a failed attempt.
pub fn registration_failure_status(err: &PortalError, preview_chars: usize) -> String {
    let detail = match err {
        PortalError::UserRejected => text::TX_DECLINED.to_string(),
        PortalError::InsufficientFunds => text::TX_INSUFFICIENT_FUNDS.to_string(),
        PortalError::UnknownTransaction(message) => message.clone(),
        other => preview(&other.to_string(), preview_chars),
    };
    format!("{}{}", text::REGISTRATION_FAILED, detail)
}

/// First `chars` characters of `s`.
pub fn preview(s: &str, chars: usize) -> String {
    s.chars().take(chars).collect()
}
