use std::sync::Arc;

use serde::Serialize;

use crate::{
    chain::{display_ether, Address, ChainConnector},
    contract::{ContractHandle, RegistrantRecord},
};

/// Dashboard projection of a registrant record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegistrantView {
    pub level: u64,
    /// Ether-formatted internal balance.
    pub internal_balance: String,
    pub referrals_in_level: u64,
    pub total_direct_referrals: u64,
    pub referrer: Address,
    pub exists: bool,
}

impl RegistrantView {
    /// `None` for records of accounts that never registered.
    pub fn from_record(record: &RegistrantRecord) -> Option<Self> {
        if !record.exists {
            return None;
        }
        Some(Self {
            level: record.level,
            internal_balance: display_ether(record.internal_balance),
            referrals_in_level: record.referrals_in_level,
            total_direct_referrals: record.total_direct_referrals,
            referrer: record.referrer,
            exists: true,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Registration {
    /// Record not read yet, or the last read failed before any success.
    #[default]
    Unknown,
    Unregistered,
    Registered(RegistrantView),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Disconnected,
    Checking,
    Unregistered,
    Registered,
}

pub struct Connection {
    pub address: Address,
    pub contract: ContractHandle,
    pub connector: Arc<dyn ChainConnector>,
    pub registration: Registration,
    pub referral_link: Option<String>,
}

/// Everything the portal knows about the connected wallet. Dropping the
/// connection drops the registrant view with it.
#[derive(Default)]
pub struct Session {
    connection: Option<Connection>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn establish(
        &mut self,
        connector: Arc<dyn ChainConnector>,
        address: Address,
        contract: ContractHandle,
    ) {
        self.connection = Some(Connection {
            address,
            contract,
            connector,
            registration: Registration::Unknown,
            referral_link: None,
        });
    }

    pub fn clear(&mut self) {
        self.connection = None;
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn connection_mut(&mut self) -> Option<&mut Connection> {
        self.connection.as_mut()
    }

    pub fn address(&self) -> Option<Address> {
        self.connection.as_ref().map(|c| c.address)
    }

    pub fn registrant(&self) -> Option<&RegistrantView> {
        match &self.connection.as_ref()?.registration {
            Registration::Registered(view) => Some(view),
            _ => None,
        }
    }

    pub fn referral_link(&self) -> Option<&str> {
        self.connection.as_ref()?.referral_link.as_deref()
    }

    pub fn phase(&self) -> Phase {
        match &self.connection {
            None => Phase::Disconnected,
            Some(c) => match c.registration {
                Registration::Unknown => Phase::Checking,
                Registration::Unregistered => Phase::Unregistered,
                Registration::Registered(_) => Phase::Registered,
            },
        }
    }
}
