//! Boundary to the wallet / chain connector.
//!
//! The portal never talks to a node itself. Everything it knows about the
//! chain comes through a [`ChainConnector`]: account access, balance reads,
//! typed contract reads and value-bearing writes. A browser build wraps the
//! injected wallet object; tests and the CLI host use
//! [`crate::devnet::DevnetWallet`].

mod address;
mod amount;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::contract::{CallValue, ContractCall, ContractHandle};

pub use address::{parse_address, short_address, AddressError};
pub use alloy_primitives::{Address, TxHash, U256};
pub use amount::{display_ether, WEI_PER_ETHER};

/// EIP-1193 "user rejected request".
pub const USER_REJECTED_CODE: i64 = 4001;
/// JSON-RPC server error; nodes report insufficient balance under it.
pub const SERVER_ERROR_CODE: i64 = -32000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectorError {
    #[error("user rejected the request")]
    UserRejected,
    #[error("insufficient funds for gas * price + value")]
    InsufficientFunds,
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error("{method} returned an unexpected value (expected {expected})")]
    UnexpectedValue {
        method: &'static str,
        expected: &'static str,
    },
    #[error("{message} (code={code})")]
    Rpc { code: i64, message: String },
    #[error("{0}")]
    Transport(String),
}

impl ConnectorError {
    pub fn code(&self) -> Option<i64> {
        match self {
            ConnectorError::UserRejected => Some(USER_REJECTED_CODE),
            ConnectorError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOptions {
    pub value: U256,
    pub gas_limit: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Wallet-side notifications; the portal reacts to both by re-initialising.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

pub type AccountsListener = Box<dyn Fn(Vec<Address>) + Send + Sync>;
pub type ChainListener = Box<dyn Fn(u64) + Send + Sync>;

/// A submitted transaction that has not been confirmed yet.
#[async_trait]
pub trait PendingTransaction: Send {
    fn hash(&self) -> TxHash;

    /// Resolves once the transaction is mined, or fails if it reverted.
    async fn wait(self: Box<Self>) -> Result<TxReceipt, ConnectorError>;
}

#[async_trait]
pub trait ChainConnector: Send + Sync {
    /// Prompts the user for account access.
    async fn request_accounts(&self) -> Result<Vec<Address>, ConnectorError>;

    async fn get_balance(&self, address: Address) -> Result<U256, ConnectorError>;

    async fn read(
        &self,
        contract: &ContractHandle,
        call: ContractCall,
    ) -> Result<CallValue, ConnectorError>;

    async fn write(
        &self,
        contract: &ContractHandle,
        call: ContractCall,
        options: TxOptions,
    ) -> Result<Box<dyn PendingTransaction>, ConnectorError>;

    fn on_accounts_changed(&self, listener: AccountsListener);

    fn on_chain_changed(&self, listener: ChainListener);
}
