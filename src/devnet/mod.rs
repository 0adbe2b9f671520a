//! JSON-backed stand-in for a browser wallet and the chain behind it.
//!
//! [`DevnetWallet`] implements [`ChainConnector`] over an in-memory
//! [`DevnetState`]. It answers the referral contract's reads from the state,
//! accepts `register` writes, and applies them when the pending transaction
//! is awaited. Every call is recorded so tests can assert on what the
//! controller asked for, and [`Faults`] can make any step fail.
//!
//! Only what the portal observes is modelled: there is no EVM, no signing and
//! no reward distribution.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use alloy_primitives::address;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    chain::{
        AccountsListener, Address, ChainConnector, ChainListener, ConnectorError,
        PendingTransaction, TxHash, TxOptions, TxReceipt, U256, WEI_PER_ETHER,
    },
    config::DEFAULT_CONTRACT_ADDRESS,
    contract::{CallValue, ContractCall, ContractHandle, RegistrantRecord},
};

/// Gas charged for a confirmed registration.
pub const REGISTER_GAS_USED: u64 = 120_000;

const GWEI: U256 = U256::from_limbs([1_000_000_000, 0, 0, 0]);

#[derive(Debug, thiserror::Error)]
pub enum DevnetError {
    #[error("failed to access fixture {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid fixture {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode fixture state: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("fixture has no backing file")]
    NoPath,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DevnetEvent {
    Registered {
        account: Address,
        referrer: Address,
        value: U256,
        tx: TxHash,
        block: u64,
    },
    AccountsChanged {
        accounts: Vec<Address>,
    },
    ChainChanged {
        chain_id: u64,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DevnetState {
    pub chain_id: u64,
    pub block_number: u64,
    pub nonce: u64,
    pub gas_price: U256,
    /// Address the referral contract is deployed at.
    pub contract: Address,
    pub entry_price: U256,
    /// `None` models a contract without `levelCount()`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_count: Option<u64>,
    pub thresholds: Vec<u64>,
    /// Accounts the wallet exposes, selected account first.
    pub wallet_accounts: Vec<Address>,
    pub balances: BTreeMap<Address, U256>,
    pub registrants: BTreeMap<Address, RegistrantRecord>,
    #[serde(default)]
    pub events: Vec<DevnetEvent>,
}

pub const ALICE: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const BOB: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
pub const CAROL: Address = address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");

impl DevnetState {
    /// Local chain with three funded accounts: alice (1 ETH, selected), bob
    /// (0.01 ETH) and carol (2 ETH, already registered).
    pub fn sample() -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(ALICE, WEI_PER_ETHER);
        balances.insert(BOB, WEI_PER_ETHER / U256::from(100));
        balances.insert(CAROL, WEI_PER_ETHER * U256::from(2));
        let mut registrants = BTreeMap::new();
        registrants.insert(
            CAROL,
            RegistrantRecord {
                exists: true,
                level: 1,
                internal_balance: WEI_PER_ETHER / U256::from(40),
                referrals_in_level: 1,
                total_direct_referrals: 3,
                referrer: Address::ZERO,
            },
        );
        Self {
            chain_id: 31337,
            block_number: 1,
            nonce: 0,
            gas_price: GWEI,
            contract: DEFAULT_CONTRACT_ADDRESS,
            entry_price: WEI_PER_ETHER / U256::from(20),
            level_count: None,
            thresholds: vec![0, 3, 10, 25, 50],
            wallet_accounts: vec![ALICE, BOB, CAROL],
            balances,
            registrants,
            events: Vec::new(),
        }
    }

    pub fn balance_of(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_default()
    }
}

/// One request the connector received, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallRecord {
    RequestAccounts,
    GetBalance(Address),
    Read(ContractCall),
    Write {
        call: ContractCall,
        options: TxOptions,
    },
    Confirm(TxHash),
}

/// Injected failures. Each field, when set, makes the matching step fail
/// with that error.
#[derive(Clone, Debug, Default)]
pub struct Faults {
    pub request_accounts: Option<ConnectorError>,
    pub balance: Option<ConnectorError>,
    /// Keyed by contract method name.
    pub reads: BTreeMap<&'static str, ConnectorError>,
    pub write: Option<ConnectorError>,
    pub confirmation: Option<ConnectorError>,
}

struct Inner {
    state: Mutex<DevnetState>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<CallRecord>>,
    accounts_listeners: Mutex<Vec<AccountsListener>>,
    chain_listeners: Mutex<Vec<ChainListener>>,
    path: Option<PathBuf>,
}

#[derive(Clone)]
pub struct DevnetWallet {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DevnetWallet {
    pub fn new(state: DevnetState) -> Self {
        Self::with_path(state, None)
    }

    pub fn sample() -> Self {
        Self::new(DevnetState::sample())
    }

    fn with_path(state: DevnetState, path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                faults: Mutex::new(Faults::default()),
                calls: Mutex::new(Vec::new()),
                accounts_listeners: Mutex::new(Vec::new()),
                chain_listeners: Mutex::new(Vec::new()),
                path,
            }),
        }
    }

    pub fn load(path: &Path) -> Result<Self, DevnetError> {
        let raw = fs::read(path).map_err(|source| DevnetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let state = serde_json::from_slice(&raw).map_err(|source| DevnetError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::with_path(state, Some(path.to_path_buf())))
    }

    /// Writes the current state back to the file it was loaded from.
    pub fn save(&self) -> Result<(), DevnetError> {
        let path = self.inner.path.as_deref().ok_or(DevnetError::NoPath)?;
        write_state(path, &self.snapshot())
    }

    pub fn snapshot(&self) -> DevnetState {
        lock(&self.inner.state).clone()
    }

    pub fn accounts(&self) -> Vec<Address> {
        lock(&self.inner.state).wallet_accounts.clone()
    }

    pub fn balance_of(&self, account: &Address) -> U256 {
        lock(&self.inner.state).balance_of(account)
    }

    pub fn update_state(&self, update: impl FnOnce(&mut DevnetState)) {
        let mut state = lock(&self.inner.state);
        update(&mut *state);
    }

    pub fn set_faults(&self, update: impl FnOnce(&mut Faults)) {
        let mut faults = lock(&self.inner.faults);
        update(&mut *faults);
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        lock(&self.inner.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.inner.calls).clear();
    }

    pub fn count_calls(&self, matches: impl Fn(&CallRecord) -> bool) -> usize {
        lock(&self.inner.calls).iter().filter(|c| matches(c)).count()
    }

    /// Makes `account` the selected wallet account and notifies listeners.
    pub fn select_account(&self, account: Address) {
        let accounts = {
            let mut state = lock(&self.inner.state);
            state.wallet_accounts.retain(|a| *a != account);
            state.wallet_accounts.insert(0, account);
            let accounts = state.wallet_accounts.clone();
            state.events.push(DevnetEvent::AccountsChanged {
                accounts: accounts.clone(),
            });
            accounts
        };
        self.emit_accounts(accounts);
    }

    /// The wallet revokes access to every account.
    pub fn disconnect(&self) {
        {
            let mut state = lock(&self.inner.state);
            state.wallet_accounts.clear();
            state.events.push(DevnetEvent::AccountsChanged { accounts: vec![] });
        }
        self.emit_accounts(Vec::new());
    }

    pub fn switch_chain(&self, chain_id: u64) {
        {
            let mut state = lock(&self.inner.state);
            state.chain_id = chain_id;
            state.events.push(DevnetEvent::ChainChanged { chain_id });
        }
        for listener in lock(&self.inner.chain_listeners).iter() {
            listener(chain_id);
        }
    }

    fn emit_accounts(&self, accounts: Vec<Address>) {
        for listener in lock(&self.inner.accounts_listeners).iter() {
            listener(accounts.clone());
        }
    }

    fn record(&self, call: CallRecord) {
        debug!("devnet call {call:?}");
        lock(&self.inner.calls).push(call);
    }

    fn fault(&self, pick: impl FnOnce(&Faults) -> Option<ConnectorError>) -> Result<(), ConnectorError> {
        let faults = lock(&self.inner.faults);
        match pick(&*faults) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn queue_registration(
        &self,
        contract: &ContractHandle,
        referrer: Address,
        options: TxOptions,
    ) -> Result<QueuedRegistration, ConnectorError> {
        let mut state = lock(&self.inner.state);
        if contract.address != state.contract {
            return Err(ConnectorError::Reverted(format!(
                "no contract deployed at {}",
                contract.address
            )));
        }
        let from = *state
            .wallet_accounts
            .first()
            .ok_or_else(|| ConnectorError::Transport("no account selected".into()))?;
        let max_fee = state
            .gas_price
            .checked_mul(U256::from(options.gas_limit))
            .and_then(|fee| fee.checked_add(options.value))
            .ok_or_else(|| ConnectorError::Transport("fee overflow".into()))?;
        if state.balance_of(&from) < max_fee {
            return Err(ConnectorError::InsufficientFunds);
        }
        if options.gas_limit < REGISTER_GAS_USED {
            return Err(ConnectorError::Reverted("out of gas".into()));
        }
        if options.value != state.entry_price {
            return Err(ConnectorError::Reverted("incorrect entry price".into()));
        }
        if state.registrants.get(&from).is_some_and(|r| r.exists) {
            return Err(ConnectorError::Reverted("already registered".into()));
        }

        let hash = transaction_hash(&from, state.nonce, options.value, &referrer);
        state.nonce += 1;
        Ok(QueuedRegistration {
            hash,
            from,
            referrer,
            value: options.value,
        })
    }

    fn apply_registration(&self, tx: &QueuedRegistration) -> Result<TxReceipt, ConnectorError> {
        let mut state = lock(&self.inner.state);
        if state.registrants.get(&tx.from).is_some_and(|r| r.exists) {
            return Err(ConnectorError::Reverted("already registered".into()));
        }
        let gas_fee = state
            .gas_price
            .saturating_mul(U256::from(REGISTER_GAS_USED));
        let cost = gas_fee.saturating_add(tx.value);
        let balance = state.balance_of(&tx.from);
        if balance < cost {
            return Err(ConnectorError::InsufficientFunds);
        }
        state.balances.insert(tx.from, balance.saturating_sub(cost));
        let contract = state.contract;
        let pool = state.balance_of(&contract);
        state
            .balances
            .insert(contract, pool.saturating_add(tx.value));
        state
            .registrants
            .insert(tx.from, RegistrantRecord::joined(tx.referrer));
        state.block_number += 1;
        let block = state.block_number;
        state.events.push(DevnetEvent::Registered {
            account: tx.from,
            referrer: tx.referrer,
            value: tx.value,
            tx: tx.hash,
            block,
        });
        Ok(TxReceipt {
            hash: tx.hash,
            block_number: block,
            gas_used: REGISTER_GAS_USED,
        })
    }
}

pub fn write_state(path: &Path, state: &DevnetState) -> Result<(), DevnetError> {
    let bytes = serde_json::to_vec_pretty(state).map_err(DevnetError::Serialize)?;
    fs::write(path, bytes).map_err(|source| DevnetError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn transaction_hash(from: &Address, nonce: u64, value: U256, referrer: &Address) -> TxHash {
    let mut hasher = Sha256::new();
    hasher.update(b"register");
    hasher.update(from.as_slice());
    hasher.update(nonce.to_le_bytes());
    hasher.update(value.to_be_bytes::<32>());
    hasher.update(referrer.as_slice());
    let digest: [u8; 32] = hasher.finalize().into();
    TxHash::from(digest)
}

struct QueuedRegistration {
    hash: TxHash,
    from: Address,
    referrer: Address,
    value: U256,
}

struct DevnetPending {
    wallet: DevnetWallet,
    tx: QueuedRegistration,
}

#[async_trait]
impl PendingTransaction for DevnetPending {
    fn hash(&self) -> TxHash {
        self.tx.hash
    }

    async fn wait(self: Box<Self>) -> Result<TxReceipt, ConnectorError> {
        self.wallet.record(CallRecord::Confirm(self.tx.hash));
        self.wallet.fault(|f| f.confirmation.clone())?;
        self.wallet.apply_registration(&self.tx)
    }
}

#[async_trait]
impl ChainConnector for DevnetWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ConnectorError> {
        self.record(CallRecord::RequestAccounts);
        self.fault(|f| f.request_accounts.clone())?;
        Ok(self.accounts())
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ConnectorError> {
        self.record(CallRecord::GetBalance(address));
        self.fault(|f| f.balance.clone())?;
        Ok(self.balance_of(&address))
    }

    async fn read(
        &self,
        contract: &ContractHandle,
        call: ContractCall,
    ) -> Result<CallValue, ConnectorError> {
        self.record(CallRecord::Read(call.clone()));
        let method = call.method();
        self.fault(|f| f.reads.get(method).cloned())?;

        let state = lock(&self.inner.state);
        if contract.address != state.contract {
            return Err(ConnectorError::Reverted(format!(
                "no contract deployed at {}",
                contract.address
            )));
        }
        match call {
            ContractCall::EntryPrice => Ok(CallValue::Uint(state.entry_price)),
            ContractCall::LevelCount => state
                .level_count
                .map(|n| CallValue::Uint(U256::from(n)))
                .ok_or_else(|| ConnectorError::Reverted("function selector was not recognized".into())),
            ContractCall::Threshold { level } => usize::try_from(level)
                .ok()
                .and_then(|idx| state.thresholds.get(idx))
                .map(|t| CallValue::Uint(U256::from(*t)))
                .ok_or_else(|| ConnectorError::Reverted(format!("no threshold for level {level}"))),
            ContractCall::Registrant { account } => Ok(CallValue::Registrant(
                state
                    .registrants
                    .get(&account)
                    .cloned()
                    .unwrap_or_else(RegistrantRecord::absent),
            )),
            ContractCall::Register { .. } => Err(ConnectorError::Reverted(
                "register is not a view function".into(),
            )),
        }
    }

    async fn write(
        &self,
        contract: &ContractHandle,
        call: ContractCall,
        options: TxOptions,
    ) -> Result<Box<dyn PendingTransaction>, ConnectorError> {
        self.record(CallRecord::Write {
            call: call.clone(),
            options,
        });
        self.fault(|f| f.write.clone())?;
        let referrer = match &call {
            ContractCall::Register { referrer } => *referrer,
            other => {
                return Err(ConnectorError::Reverted(format!(
                    "{} cannot be sent as a transaction",
                    other.method()
                )))
            }
        };
        let tx = self.queue_registration(contract, referrer, options)?;
        Ok(Box::new(DevnetPending {
            wallet: self.clone(),
            tx,
        }))
    }

    fn on_accounts_changed(&self, listener: AccountsListener) {
        lock(&self.inner.accounts_listeners).push(listener);
    }

    fn on_chain_changed(&self, listener: ChainListener) {
        lock(&self.inner.chain_listeners).push(listener);
    }
}
