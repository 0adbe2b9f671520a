use serde::{Deserialize, Serialize};

use crate::chain::{Address, ConnectorError, U256};

/// Human-readable interface of the deployed referral contract.
pub const REFERRAL_INTERFACE: &[&str] = &[
    "function ENTRY_PRICE() view returns (uint256)",
    "function levelCount() view returns (uint256)",
    "function thresholds(uint256 level) view returns (uint256)",
    "function users(address account) view returns (bool exists, uint256 level, uint256 internalBalance, uint256 referralsInLevel, uint256 totalDirectReferrals, address referrer)",
    "function register(address referrer) payable",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterfaceDescription {
    fragments: &'static [&'static str],
}

impl InterfaceDescription {
    pub const fn new(fragments: &'static [&'static str]) -> Self {
        Self { fragments }
    }

    pub const fn referral() -> Self {
        Self::new(REFERRAL_INTERFACE)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.fragments.iter().any(|fragment| {
            fragment
                .strip_prefix("function ")
                .and_then(|rest| rest.split_once('('))
                .map(|(method, _)| method == name)
                .unwrap_or(false)
        })
    }
}

/// Contract address bound to the interface it is called through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContractHandle {
    pub address: Address,
    pub interface: InterfaceDescription,
}

impl ContractHandle {
    pub fn referral(address: Address) -> Self {
        Self {
            address,
            interface: InterfaceDescription::referral(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ContractCall {
    EntryPrice,
    LevelCount,
    Threshold { level: u64 },
    Registrant { account: Address },
    Register { referrer: Address },
}

impl ContractCall {
    pub fn method(&self) -> &'static str {
        match self {
            ContractCall::EntryPrice => "ENTRY_PRICE",
            ContractCall::LevelCount => "levelCount",
            ContractCall::Threshold { .. } => "thresholds",
            ContractCall::Registrant { .. } => "users",
            ContractCall::Register { .. } => "register",
        }
    }

    pub fn is_payable(&self) -> bool {
        matches!(self, ContractCall::Register { .. })
    }
}

/// Decoded return value of a contract read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallValue {
    Uint(U256),
    Registrant(RegistrantRecord),
}

impl CallValue {
    pub fn into_uint(self, method: &'static str) -> Result<U256, ConnectorError> {
        match self {
            CallValue::Uint(v) => Ok(v),
            _ => Err(ConnectorError::UnexpectedValue {
                method,
                expected: "uint256",
            }),
        }
    }

    pub fn into_u64(self, method: &'static str) -> Result<u64, ConnectorError> {
        let value = self.into_uint(method)?;
        u64::try_from(value).map_err(|_| ConnectorError::UnexpectedValue {
            method,
            expected: "uint64-sized integer",
        })
    }

    pub fn into_registrant(self, method: &'static str) -> Result<RegistrantRecord, ConnectorError> {
        match self {
            CallValue::Registrant(record) => Ok(record),
            _ => Err(ConnectorError::UnexpectedValue {
                method,
                expected: "registrant tuple",
            }),
        }
    }
}

/// Membership record as stored by the contract's `users` mapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RegistrantRecord {
    pub exists: bool,
    pub level: u64,
    pub internal_balance: U256,
    pub referrals_in_level: u64,
    pub total_direct_referrals: u64,
    pub referrer: Address,
}

impl RegistrantRecord {
    /// What the mapping yields for an account that never registered.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn joined(referrer: Address) -> Self {
        Self {
            exists: true,
            referrer,
            ..Self::default()
        }
    }
}
