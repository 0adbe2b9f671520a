//! The view controller.
//!
//! [`ViewController`] owns the [`Session`], the page [`Document`] and the
//! pending UI deadlines. Every public operation is a user-visible action that
//! catches its own failures: errors are logged and turned into notifications,
//! never returned.
//!
//! The controller can be driven two ways. Tests and one-shot hosts call the
//! operations directly; an interactive host hands a channel of
//! [`UserAction`]s to [`ViewController::run`], which also services provider
//! events, the balance poll and the deadlines.

mod deadlines;
mod failure;
pub mod text;

use std::{future::Future, pin::Pin, sync::Arc};

use log::{debug, error, info, warn};
use tokio::{
    sync::mpsc,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    chain::{
        display_ether, parse_address, short_address, Address, ChainConnector, ConnectorError,
        PendingTransaction, ProviderEvent, TxOptions, TxReceipt, USER_REJECTED_CODE,
    },
    clipboard::Clipboard,
    config::PortalConfig,
    contract::{ContractCall, ContractHandle},
    document::{Document, ElementId, Tone},
    error::{PortalError, Result},
    location::PageLocation,
    session::{Phase, RegistrantView, Registration, Session},
};

pub use deadlines::{Deadlines, Expired};
pub use failure::{classify_transaction_error, preview, registration_failure_status};

/// Upper bound on listed levels, whatever the contract reports.
pub const MAX_LISTED_LEVELS: u64 = 64;

type Confirmation = Pin<Box<dyn Future<Output = Result<TxReceipt, ConnectorError>> + Send>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserAction {
    ConnectWallet,
    Register,
    CopyReferralLink,
}

pub struct ViewController<D> {
    /// Injected wallet capability; `None` when the page has no wallet.
    wallet: Option<Arc<dyn ChainConnector>>,
    clipboard: Arc<dyn Clipboard>,
    document: D,
    config: PortalConfig,
    location: PageLocation,
    session: Session,
    deadlines: Deadlines,
    events_tx: mpsc::UnboundedSender<ProviderEvent>,
    events_rx: mpsc::UnboundedReceiver<ProviderEvent>,
    listening: bool,
}

impl<D: Document> ViewController<D> {
    pub fn new(
        wallet: Option<Arc<dyn ChainConnector>>,
        clipboard: Arc<dyn Clipboard>,
        document: D,
        config: PortalConfig,
        location: PageLocation,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            wallet,
            clipboard,
            document,
            config,
            location,
            session: Session::new(),
            deadlines: Deadlines::default(),
            events_tx,
            events_rx,
            listening: false,
        }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn into_document(self) -> D {
        self.document
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Page-load step: pre-fills the referrer input from `?ref=`.
    ///
    /// Only the address syntax is checked; whether the referrer is actually
    /// registered is left to the contract.
    pub fn apply_referral_from_url(&mut self) -> Option<Address> {
        let raw = self.location.referral_param()?;
        match parse_address(&raw) {
            Ok(referrer) => {
                info!("referrer {referrer} taken from page url");
                self.document.set_value(ElementId::ReferrerInput, &raw);
                self.show_notification(text::REFERRER_FROM_LINK, false);
                Some(referrer)
            }
            Err(err) => {
                debug!("ignoring ref parameter: {err}");
                None
            }
        }
    }

    pub async fn connect_wallet(&mut self) {
        if let Err(err) = self.try_connect_wallet().await {
            let message = match &err {
                PortalError::ProviderUnavailable => text::INSTALL_WALLET.to_string(),
                PortalError::UserRejected => text::CONNECT_DECLINED.to_string(),
                other => format!("{}{other}", text::CONNECT_FAILED),
            };
            warn!("wallet connection failed: {err}");
            self.show_notification(&message, true);
        }
    }

    async fn try_connect_wallet(&mut self) -> Result<()> {
        let wallet = self.wallet.clone().ok_or(PortalError::ProviderUnavailable)?;
        self.show_notification(text::CONNECTING, false);

        let accounts = wallet.request_accounts().await.map_err(|err| match err {
            ConnectorError::UserRejected => PortalError::UserRejected,
            other if other.code() == Some(USER_REJECTED_CODE) => PortalError::UserRejected,
            other => PortalError::ReadFailure {
                what: "accounts",
                source: other,
            },
        })?;
        let address = *accounts.first().ok_or(PortalError::NoAccounts)?;
        let contract = ContractHandle::referral(self.config.contract_address);
        self.session.establish(wallet.clone(), address, contract);
        info!(
            "connected {address}, referral contract {}",
            contract.address
        );

        self.document
            .set_text(ElementId::WalletStatus, text::STATUS_CONNECTED);
        self.document
            .set_text(ElementId::WalletAddress, &format!("Address: {}", short_address(&address)));
        self.document
            .set_text(ElementId::ConnectWalletButton, text::BUTTON_CONNECTED);
        self.document
            .set_disabled(ElementId::ConnectWalletButton, true);
        self.document
            .set_tone(ElementId::ConnectWalletButton, Tone::Success);

        self.refresh_balance().await;
        self.load_static_contract_config().await;
        self.refresh_registration().await;
        self.show_notification(text::CONNECTED, false);
        self.listen_for_provider_events(&wallet);
        Ok(())
    }

    fn listen_for_provider_events(&mut self, wallet: &Arc<dyn ChainConnector>) {
        if self.listening {
            return;
        }
        let tx = self.events_tx.clone();
        wallet.on_accounts_changed(Box::new(move |accounts| {
            let _ = tx.send(ProviderEvent::AccountsChanged(accounts));
        }));
        let tx = self.events_tx.clone();
        wallet.on_chain_changed(Box::new(move |chain_id| {
            let _ = tx.send(ProviderEvent::ChainChanged(chain_id));
        }));
        self.listening = true;
    }

    /// Best effort: a failed read is logged and the previous value stays.
    pub async fn refresh_balance(&mut self) {
        let Some(conn) = self.session.connection() else {
            return;
        };
        let (connector, address) = (conn.connector.clone(), conn.address);
        match connector.get_balance(address).await {
            Ok(balance) => {
                let shown = preview(&display_ether(balance), self.config.balance_chars);
                self.document.set_text(
                    ElementId::EthBalance,
                    &format!("{}{shown}", text::BALANCE_PREFIX),
                );
            }
            Err(err) => error!("failed to read balance of {address}: {err}"),
        }
    }

    pub async fn load_static_contract_config(&mut self) {
        if let Err(err) = self.try_load_static_contract_config().await {
            error!("failed to load contract data: {err}");
        }
    }

    async fn try_load_static_contract_config(&mut self) -> Result<()> {
        let (connector, contract, _) = self.connected()?;
        let price = connector
            .read(&contract, ContractCall::EntryPrice)
            .await
            .and_then(|v| v.into_uint("ENTRY_PRICE"))
            .map_err(PortalError::read("entry price"))?;
        self.document
            .set_text(ElementId::EntryPrice, &display_ether(price));

        let count = self.level_count(connector.as_ref(), &contract).await;
        self.document.clear_items(ElementId::LevelsList);
        for level in 0..count {
            let threshold = connector
                .read(&contract, ContractCall::Threshold { level })
                .await
                .and_then(|v| v.into_u64("thresholds"))
                .map_err(PortalError::read("level threshold"))?;
            self.document.append_item(
                ElementId::LevelsList,
                &format!("Level {level}: requires {threshold} referrals"),
            );
        }
        Ok(())
    }

    async fn level_count(&self, connector: &dyn ChainConnector, contract: &ContractHandle) -> u64 {
        let count = match connector
            .read(contract, ContractCall::LevelCount)
            .await
            .and_then(|v| v.into_u64("levelCount"))
        {
            Ok(count) => count,
            Err(err) => {
                debug!(
                    "levelCount() not available ({err}), listing {} levels",
                    self.config.level_count
                );
                self.config.level_count
            }
        };
        if count > MAX_LISTED_LEVELS {
            warn!("contract reports {count} levels, listing the first {MAX_LISTED_LEVELS}");
        }
        count.min(MAX_LISTED_LEVELS)
    }

    pub async fn refresh_registration(&mut self) {
        match self.try_refresh_registration().await {
            Ok(()) => {}
            Err(PortalError::NotConnected) => debug!("registration check skipped: not connected"),
            Err(err) => {
                error!("registration check failed: {err}");
                self.show_notification(text::STATUS_CHECK_FAILED, true);
            }
        }
    }

    async fn try_refresh_registration(&mut self) -> Result<()> {
        let (connector, contract, address) = self.connected()?;
        let record = connector
            .read(&contract, ContractCall::Registrant { account: address })
            .await
            .and_then(|v| v.into_registrant("users"))
            .map_err(PortalError::read("registration status"))?;

        let (registration, link) = match RegistrantView::from_record(&record) {
            Some(view) => {
                let link = self.location.referral_link(&address);
                self.show_dashboard(&view, &link);
                (Registration::Registered(view), Some(link))
            }
            None => {
                self.show_registration_prompt();
                (Registration::Unregistered, None)
            }
        };
        if let Some(conn) = self.session.connection_mut() {
            conn.registration = registration;
            conn.referral_link = link;
        }
        Ok(())
    }

    fn show_dashboard(&mut self, view: &RegistrantView, link: &str) {
        let doc = &mut self.document;
        doc.set_text(ElementId::UserLevel, &view.level.to_string());
        doc.set_text(ElementId::InternalBalance, &view.internal_balance);
        doc.set_text(
            ElementId::ReferralsInLevel,
            &view.referrals_in_level.to_string(),
        );
        doc.set_text(
            ElementId::TotalDirectReferrals,
            &view.total_direct_referrals.to_string(),
        );
        doc.set_value(ElementId::ReferralLinkOutput, link);
        // hide first: the two views are never shown together
        doc.set_visible(ElementId::RegistrationSection, false);
        doc.set_visible(ElementId::DashboardSection, true);
    }

    fn show_registration_prompt(&mut self) {
        let doc = &mut self.document;
        for id in [
            ElementId::UserLevel,
            ElementId::InternalBalance,
            ElementId::ReferralsInLevel,
            ElementId::TotalDirectReferrals,
        ] {
            doc.set_text(id, "");
        }
        doc.set_value(ElementId::ReferralLinkOutput, "");
        doc.set_visible(ElementId::DashboardSection, false);
        doc.set_visible(ElementId::RegistrationSection, true);
    }

    /// Submits `register` and waits for its confirmation.
    pub async fn register(&mut self) {
        let Some(pending) = self.submit_registration().await else {
            return;
        };
        let outcome = pending.wait().await;
        self.complete_registration(outcome).await;
    }

    /// First half of [`register`](Self::register): everything up to and
    /// including the transaction submission.
    pub async fn submit_registration(&mut self) -> Option<Box<dyn PendingTransaction>> {
        match self.try_submit_registration().await {
            Ok(pending) => Some(pending),
            Err(PortalError::NotConnected) => {
                warn!("register requested without a connected wallet");
                self.show_notification(text::CONNECT_FIRST, true);
                None
            }
            Err(err) => {
                self.fail_registration(err);
                None
            }
        }
    }

    async fn try_submit_registration(&mut self) -> Result<Box<dyn PendingTransaction>> {
        let (connector, contract, address) = self.connected()?;
        self.document.set_disabled(ElementId::RegisterButton, true);
        self.document
            .set_text(ElementId::RegisterButton, text::BUTTON_SENDING);
        self.document.set_text(ElementId::RegisterStatus, "");

        let price = connector
            .read(&contract, ContractCall::EntryPrice)
            .await
            .and_then(|v| v.into_uint("ENTRY_PRICE"))
            .map_err(PortalError::read("entry price"))?;
        let referrer = parse_referrer(&self.document.value(ElementId::ReferrerInput))?;
        let options = TxOptions {
            value: price,
            gas_limit: self.config.gas_limit,
        };
        info!(
            "{address} registering with referrer {referrer}, value {} ETH",
            display_ether(options.value)
        );

        let preview_chars = self.config.error_preview_chars;
        let pending = connector
            .write(&contract, ContractCall::Register { referrer }, options)
            .await
            .map_err(|err| classify_transaction_error(err, preview_chars))?;

        let hash = pending.hash().to_string();
        info!("registration submitted: {hash}");
        self.document.set_text(
            ElementId::RegisterStatus,
            &format!(
                "Transaction sent! Hash: {}...",
                preview(&hash, self.config.hash_preview_chars)
            ),
        );
        self.show_notification(text::AWAITING_CONFIRMATION, false);
        Ok(pending)
    }

    /// Second half of [`register`](Self::register): renders the confirmation
    /// outcome and refreshes the dashboard on success.
    pub async fn complete_registration(&mut self, outcome: Result<TxReceipt, ConnectorError>) {
        match outcome {
            Ok(receipt) => {
                info!(
                    "registration {} confirmed in block {}",
                    receipt.hash, receipt.block_number
                );
                self.document
                    .set_text(ElementId::RegisterStatus, text::REGISTERED);
                self.document
                    .set_text(ElementId::RegisterButton, text::BUTTON_REGISTERED);
                self.show_notification(text::WELCOME, false);
                self.refresh_registration().await;
                self.refresh_balance().await;
            }
            Err(err) => {
                let err = classify_transaction_error(err, self.config.error_preview_chars);
                self.fail_registration(err);
            }
        }
    }

    fn fail_registration(&mut self, err: PortalError) {
        error!("registration failed: {err}");
        let status = registration_failure_status(&err, self.config.error_preview_chars);
        self.document.set_text(ElementId::RegisterStatus, &status);
        self.show_notification(&status, true);
        self.document.set_disabled(ElementId::RegisterButton, false);
        self.document
            .set_text(ElementId::RegisterButton, text::BUTTON_REGISTER);
    }

    pub async fn copy_referral_link(&mut self) {
        let Some(link) = self.session.referral_link().map(str::to_owned) else {
            warn!("copy requested before a referral link exists");
            self.show_notification(text::CONNECT_FIRST, true);
            return;
        };
        match self.clipboard.write_text(&link).await {
            Ok(()) => {
                let label = self.document.text(ElementId::CopyLinkButton);
                self.document
                    .set_text(ElementId::CopyLinkButton, text::BUTTON_COPIED);
                self.deadlines
                    .arm_copy_label(Instant::now() + self.config.copy_feedback_duration(), label);
                self.show_notification(text::LINK_COPIED, false);
            }
            Err(err) => {
                let err = PortalError::from(err);
                error!("{err}");
                self.show_notification(text::COPY_FAILED, true);
            }
        }
    }

    /// Shows `message` and (re)starts the auto-hide timer.
    pub fn show_notification(&mut self, message: &str, is_error: bool) {
        let tone = if is_error { Tone::Error } else { Tone::Neutral };
        self.document.set_text(ElementId::Notification, message);
        self.document.set_tone(ElementId::Notification, tone);
        self.document.set_visible(ElementId::Notification, true);
        self.deadlines
            .arm_notification(Instant::now() + self.config.notification_duration());
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.next()
    }

    pub fn fire_due_deadlines(&mut self, now: Instant) {
        for expired in self.deadlines.take_due(now) {
            match expired {
                Expired::HideNotification => {
                    self.document.set_visible(ElementId::Notification, false)
                }
                Expired::RestoreCopyLabel(label) => {
                    self.document.set_text(ElementId::CopyLinkButton, &label)
                }
            }
        }
    }

    /// Back to the freshly loaded page: no session, no pending timers, the
    /// referrer pre-filled again from the url.
    pub fn reinitialize(&mut self) {
        self.session.clear();
        self.deadlines.clear();
        self.document.reset();
        self.apply_referral_from_url();
    }

    pub fn handle_provider_event(&mut self, event: ProviderEvent) {
        match &event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
                Some(account) => info!("wallet switched to {account}, re-initialising"),
                None => info!("wallet disconnected, re-initialising"),
            },
            ProviderEvent::ChainChanged(chain_id) => {
                info!("network switched to chain {chain_id}, re-initialising")
            }
        }
        self.reinitialize();
    }

    /// Handles every provider event queued so far; returns how many.
    pub fn process_provider_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_provider_event(event);
            handled += 1;
        }
        handled
    }

    /// Drives the controller until `actions` closes, then hands the document
    /// back.
    pub async fn run(mut self, mut actions: mpsc::Receiver<UserAction>) -> D {
        let (_, idle) = mpsc::unbounded_channel();
        let mut events = std::mem::replace(&mut self.events_rx, idle);
        let period = self.config.balance_poll_interval();
        let mut poll = time::interval_at(Instant::now() + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pending: Option<Confirmation> = None;

        loop {
            let deadline = self.deadlines.next();
            tokio::select! {
                action = actions.recv() => {
                    let Some(action) = action else { break };
                    debug!("user action {action:?}");
                    match action {
                        UserAction::ConnectWallet => self.connect_wallet().await,
                        UserAction::Register if pending.is_some() => {
                            debug!("registration already pending");
                        }
                        UserAction::Register => {
                            if let Some(tx) = self.submit_registration().await {
                                pending = Some(tx.wait());
                            }
                        }
                        UserAction::CopyReferralLink => self.copy_referral_link().await,
                    }
                }
                Some(event) = events.recv() => {
                    pending = None;
                    self.handle_provider_event(event);
                }
                _ = poll.tick() => self.refresh_balance().await,
                outcome = wait_for(&mut pending), if pending.is_some() => {
                    pending = None;
                    self.complete_registration(outcome).await;
                }
                _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_due_deadlines(Instant::now());
                }
            }
        }
        self.document
    }

    fn connected(&self) -> Result<(Arc<dyn ChainConnector>, ContractHandle, Address)> {
        let conn = self.session.connection().ok_or(PortalError::NotConnected)?;
        Ok((conn.connector.clone(), conn.contract, conn.address))
    }
}

async fn wait_for(pending: &mut Option<Confirmation>) -> Result<TxReceipt, ConnectorError> {
    match pending {
        Some(confirmation) => confirmation.await,
        None => std::future::pending().await,
    }
}

/// Blank input means "no referrer".
fn parse_referrer(input: &str) -> Result<Address> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Address::ZERO);
    }
    parse_address(input)
        .map_err(|err| PortalError::UnknownTransaction(format!("invalid referrer: {err}")))
}
