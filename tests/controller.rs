use std::{sync::Arc, time::Duration};

use assert_matches::assert_matches;
use alloy_primitives::utils::parse_ether;
use pretty_assertions::assert_eq;
use tokio::{sync::mpsc, time::Instant};

use referral_portal::{
    chain::{Address, ChainConnector, ConnectorError, TxOptions},
    clipboard::MemoryClipboard,
    config::PortalConfig,
    contract::ContractCall,
    controller::text,
    devnet::{CallRecord, DevnetWallet, ALICE, BOB, CAROL},
    document::{Document, ElementId, MemoryDocument, Tone},
    location::PageLocation,
    session::Phase,
    UserAction, ViewController,
};

const PAGE: &str = "http://localhost:8080/";

fn carol() -> String {
    CAROL.to_checksum(None)
}

struct Harness {
    wallet: DevnetWallet,
    clipboard: Arc<MemoryClipboard>,
    portal: ViewController<MemoryDocument>,
}

impl Harness {
    fn new(url: &str) -> Self {
        Self::with_wallet(DevnetWallet::sample(), url)
    }

    fn with_wallet(wallet: DevnetWallet, url: &str) -> Self {
        let clipboard = Arc::new(MemoryClipboard::new());
        let connector: Arc<dyn ChainConnector> = Arc::new(wallet.clone());
        let mut portal = ViewController::new(
            Some(connector),
            clipboard.clone(),
            MemoryDocument::new(),
            PortalConfig::default(),
            PageLocation::parse(url).unwrap(),
        );
        portal.apply_referral_from_url();
        Self {
            wallet,
            clipboard,
            portal,
        }
    }

    fn as_carol(url: &str) -> Self {
        let wallet = DevnetWallet::sample();
        wallet.select_account(CAROL);
        Self::with_wallet(wallet, url)
    }

    fn doc(&self) -> &MemoryDocument {
        self.portal.document()
    }

    fn text(&self, id: ElementId) -> String {
        self.doc().text(id)
    }

    fn notification(&self) -> Option<(String, Tone)> {
        let doc = self.doc();
        doc.is_visible(ElementId::Notification)
            .then(|| (doc.text(ElementId::Notification), doc.tone(ElementId::Notification)))
    }

    fn writes(&self) -> usize {
        self.wallet
            .count_calls(|c| matches!(c, CallRecord::Write { .. }))
    }
}

#[tokio::test]
async fn valid_ref_prefills_referrer_and_notifies() {
    let url = format!("{PAGE}?ref={}", carol());
    let h = Harness::new(&url);
    assert_eq!(h.doc().value(ElementId::ReferrerInput), carol());
    assert_eq!(
        h.notification(),
        Some((text::REFERRER_FROM_LINK.to_string(), Tone::Neutral))
    );
}

#[tokio::test]
async fn invalid_or_missing_ref_changes_nothing() {
    for url in [
        format!("{PAGE}?ref=0x1234"),
        format!("{PAGE}?ref=not-an-address"),
        PAGE.to_string(),
    ] {
        let h = Harness::new(&url);
        assert_eq!(h.doc().value(ElementId::ReferrerInput), "", "{url}");
        assert_eq!(h.notification(), None, "{url}");
    }
}

#[tokio::test]
async fn missing_wallet_only_shows_install_notice() {
    let mut portal = ViewController::new(
        None,
        Arc::new(MemoryClipboard::new()),
        MemoryDocument::new(),
        PortalConfig::default(),
        PageLocation::parse(PAGE).unwrap(),
    );
    portal.connect_wallet().await;

    let doc = portal.document();
    assert_eq!(doc.text(ElementId::Notification), text::INSTALL_WALLET);
    assert_eq!(doc.tone(ElementId::Notification), Tone::Error);
    assert_eq!(doc.text(ElementId::WalletStatus), "Status: not connected");
    assert!(!doc.is_visible(ElementId::RegistrationSection));
    assert!(!doc.is_visible(ElementId::DashboardSection));
    assert_eq!(portal.phase(), Phase::Disconnected);
}

#[tokio::test]
async fn unregistered_account_sees_registration_prompt() {
    let mut h = Harness::new(PAGE);
    h.portal.connect_wallet().await;

    assert_eq!(h.portal.phase(), Phase::Unregistered);
    assert_eq!(h.portal.session().address(), Some(ALICE));
    assert_eq!(h.text(ElementId::WalletStatus), text::STATUS_CONNECTED);
    assert_eq!(h.text(ElementId::WalletAddress), "Address: 0xf39F...2266");
    assert_eq!(h.text(ElementId::EthBalance), "ETH balance: 1.0");
    assert_eq!(h.text(ElementId::EntryPrice), "0.05");
    assert_eq!(h.text(ElementId::ConnectWalletButton), text::BUTTON_CONNECTED);
    assert!(h.doc().is_disabled(ElementId::ConnectWalletButton));
    assert_eq!(
        h.doc().items(ElementId::LevelsList),
        [
            "Level 0: requires 0 referrals",
            "Level 1: requires 3 referrals",
            "Level 2: requires 10 referrals",
            "Level 3: requires 25 referrals",
            "Level 4: requires 50 referrals",
        ]
    );
    assert!(h.doc().is_visible(ElementId::RegistrationSection));
    assert!(!h.doc().is_visible(ElementId::DashboardSection));
    assert_eq!(h.portal.session().referral_link(), None);
    assert_eq!(
        h.notification(),
        Some((text::CONNECTED.to_string(), Tone::Neutral))
    );
}

#[tokio::test]
async fn registered_account_sees_dashboard_and_link() {
    let mut h = Harness::as_carol("https://portal.example/join?ref=0xdead#faq");
    h.portal.connect_wallet().await;

    assert_eq!(h.portal.phase(), Phase::Registered);
    assert!(h.doc().is_visible(ElementId::DashboardSection));
    assert!(!h.doc().is_visible(ElementId::RegistrationSection));
    assert_eq!(h.text(ElementId::UserLevel), "1");
    assert_eq!(h.text(ElementId::InternalBalance), "0.025");
    assert_eq!(h.text(ElementId::ReferralsInLevel), "1");
    assert_eq!(h.text(ElementId::TotalDirectReferrals), "3");
    let link = format!("https://portal.example/join?ref={}", carol());
    assert_eq!(h.doc().value(ElementId::ReferralLinkOutput), link);
    assert_eq!(h.portal.session().referral_link(), Some(link.as_str()));
}

#[tokio::test]
async fn contract_level_count_wins_over_configured_default() {
    let wallet = DevnetWallet::sample();
    wallet.update_state(|s| s.level_count = Some(2));
    let mut h = Harness::with_wallet(wallet, PAGE);
    h.portal.connect_wallet().await;
    assert_eq!(h.doc().items(ElementId::LevelsList).len(), 2);
}

#[tokio::test]
async fn failed_threshold_read_keeps_the_rest_of_the_page() {
    let mut h = Harness::new(PAGE);
    h.wallet.set_faults(|f| {
        f.reads
            .insert("thresholds", ConnectorError::Transport("rpc down".into()));
    });
    h.portal.connect_wallet().await;

    assert_eq!(h.text(ElementId::EntryPrice), "0.05");
    assert!(h.doc().items(ElementId::LevelsList).is_empty());
    assert_eq!(h.portal.phase(), Phase::Unregistered);
}

#[tokio::test]
async fn failed_status_check_is_reported() {
    let mut h = Harness::new(PAGE);
    h.wallet.set_faults(|f| {
        f.reads
            .insert("users", ConnectorError::Transport("timeout".into()));
    });
    h.portal.connect_wallet().await;

    assert_eq!(h.portal.phase(), Phase::Checking);
    assert!(!h.doc().is_visible(ElementId::RegistrationSection));
    assert!(!h.doc().is_visible(ElementId::DashboardSection));
    assert_eq!(
        h.notification(),
        Some((text::CONNECTED.to_string(), Tone::Neutral))
    );
}

#[tokio::test]
async fn failed_balance_read_keeps_previous_value() {
    let mut h = Harness::new(PAGE);
    h.portal.connect_wallet().await;
    assert_eq!(h.text(ElementId::EthBalance), "ETH balance: 1.0");

    h.wallet
        .set_faults(|f| f.balance = Some(ConnectorError::Transport("down".into())));
    h.wallet.update_state(|s| {
        s.balances.insert(ALICE, parse_ether("5").unwrap());
    });
    h.portal.refresh_balance().await;

    assert_eq!(h.text(ElementId::EthBalance), "ETH balance: 1.0");
    assert_eq!(h.portal.phase(), Phase::Unregistered);
}

#[tokio::test]
async fn failed_entry_price_read_leaves_contract_data_blank() {
    let mut h = Harness::new(PAGE);
    h.wallet.set_faults(|f| {
        f.reads
            .insert("ENTRY_PRICE", ConnectorError::Transport("rpc down".into()));
    });
    h.portal.connect_wallet().await;

    assert_eq!(h.text(ElementId::EntryPrice), "-");
    assert!(h.doc().items(ElementId::LevelsList).is_empty());
    assert_eq!(h.portal.phase(), Phase::Unregistered);
}

#[tokio::test]
async fn failed_entry_price_read_aborts_registration() {
    let mut h = Harness::new(PAGE);
    h.portal.connect_wallet().await;
    h.wallet.set_faults(|f| {
        f.reads
            .insert("ENTRY_PRICE", ConnectorError::Transport("rpc down".into()));
    });
    h.portal.register().await;

    assert_eq!(h.writes(), 0);
    let status = h.text(ElementId::RegisterStatus);
    assert!(status.starts_with(text::REGISTRATION_FAILED), "{status}");
    assert!(status.contains("rpc down"), "{status}");
    assert!(!h.doc().is_disabled(ElementId::RegisterButton));
    assert_eq!(h.text(ElementId::RegisterButton), text::BUTTON_REGISTER);
    assert_eq!(h.portal.phase(), Phase::Unregistered);
}

#[tokio::test]
async fn declined_connection_stays_disconnected() {
    let mut h = Harness::new(PAGE);
    h.wallet
        .set_faults(|f| f.request_accounts = Some(ConnectorError::UserRejected));
    h.portal.connect_wallet().await;

    assert_eq!(h.portal.phase(), Phase::Disconnected);
    assert_eq!(
        h.notification(),
        Some((text::CONNECT_DECLINED.to_string(), Tone::Error))
    );
    assert_eq!(h.wallet.calls(), vec![CallRecord::RequestAccounts]);
}

#[tokio::test]
async fn wallet_without_accounts_is_a_connection_failure() {
    let mut h = Harness::new(PAGE);
    h.wallet.update_state(|s| s.wallet_accounts.clear());
    h.portal.connect_wallet().await;

    assert_eq!(h.portal.phase(), Phase::Disconnected);
    assert_eq!(
        h.notification(),
        Some((
            "Connection failed: wallet returned no accounts".to_string(),
            Tone::Error
        ))
    );
}

#[tokio::test]
async fn register_without_session_sends_nothing() {
    let mut h = Harness::new(PAGE);
    h.portal.register().await;

    assert_eq!(h.writes(), 0);
    assert!(h.wallet.calls().is_empty());
    assert_eq!(
        h.notification(),
        Some((text::CONNECT_FIRST.to_string(), Tone::Error))
    );
}

#[tokio::test]
async fn blank_referrer_registers_with_zero_address_and_entry_price() {
    let mut h = Harness::new(PAGE);
    h.portal.connect_wallet().await;
    h.wallet.clear_calls();

    h.portal.register().await;

    let calls = h.wallet.calls();
    let writes: Vec<_> = calls
        .iter()
        .filter(|c| matches!(c, CallRecord::Write { .. }))
        .collect();
    assert_eq!(
        writes,
        [&CallRecord::Write {
            call: ContractCall::Register {
                referrer: Address::ZERO
            },
            options: TxOptions {
                value: parse_ether("0.05").unwrap(),
                gas_limit: 200_000,
            },
        }]
    );

    // after confirmation: one registration read and one balance read
    let confirmed = calls
        .iter()
        .position(|c| matches!(c, CallRecord::Confirm(_)))
        .unwrap();
    let after = &calls[confirmed + 1..];
    assert_eq!(
        after,
        [
            CallRecord::Read(ContractCall::Registrant { account: ALICE }),
            CallRecord::GetBalance(ALICE),
        ]
    );

    assert_eq!(h.portal.phase(), Phase::Registered);
    assert_eq!(h.text(ElementId::RegisterStatus), text::REGISTERED);
    assert_eq!(h.text(ElementId::RegisterButton), text::BUTTON_REGISTERED);
    assert!(h.doc().is_visible(ElementId::DashboardSection));
    assert!(!h.doc().is_visible(ElementId::RegistrationSection));
    assert_matches!(
        h.portal.session().registrant(),
        Some(view) if view.level == 0 && view.referrer == Address::ZERO
    );
    assert_eq!(h.text(ElementId::UserLevel), "0");
    assert_eq!(h.text(ElementId::EthBalance), "ETH balance: 0.94988");
    assert_eq!(
        h.notification(),
        Some((text::WELCOME.to_string(), Tone::Neutral))
    );
    assert!(h.wallet.snapshot().registrants[&ALICE].exists);
}

#[tokio::test]
async fn referrer_from_link_is_sent_with_registration() {
    let url = format!("{PAGE}?ref={}", carol());
    let mut h = Harness::new(&url);
    h.portal.connect_wallet().await;
    h.portal.register().await;

    assert_eq!(h.wallet.snapshot().registrants[&ALICE].referrer, CAROL);
    assert_eq!(h.portal.session().registrant().map(|r| r.referrer), Some(CAROL));
}

#[tokio::test]
async fn invalid_referrer_input_fails_before_sending() {
    let mut h = Harness::new(PAGE);
    h.portal.connect_wallet().await;
    h.portal
        .document_mut()
        .set_value(ElementId::ReferrerInput, "bob");
    h.portal.register().await;

    assert_eq!(h.writes(), 0);
    assert!(h
        .text(ElementId::RegisterStatus)
        .starts_with(text::REGISTRATION_FAILED));
    assert!(!h.doc().is_disabled(ElementId::RegisterButton));
}

#[tokio::test]
async fn rejected_transaction_reports_decline_and_reenables_button() {
    let mut h = Harness::new(PAGE);
    h.portal.connect_wallet().await;
    h.wallet.set_faults(|f| {
        f.write = Some(ConnectorError::Rpc {
            code: 4001,
            message: "MetaMask Tx Signature: User denied transaction signature.".into(),
        })
    });
    h.portal.register().await;

    let status = format!("{}{}", text::REGISTRATION_FAILED, text::TX_DECLINED);
    assert_eq!(h.text(ElementId::RegisterStatus), status);
    assert_eq!(h.notification(), Some((status, Tone::Error)));
    assert_eq!(h.text(ElementId::RegisterButton), text::BUTTON_REGISTER);
    assert!(!h.doc().is_disabled(ElementId::RegisterButton));
    assert_eq!(h.portal.phase(), Phase::Unregistered);
}

#[tokio::test]
async fn insufficient_funds_message_is_recognised() {
    let mut h = Harness::new(PAGE);
    h.portal.connect_wallet().await;
    h.wallet.set_faults(|f| {
        f.write = Some(ConnectorError::Transport(
            "err: insufficient funds for gas * price + value: address 0xf39F".into(),
        ))
    });
    h.portal.register().await;

    assert_eq!(
        h.text(ElementId::RegisterStatus),
        format!("{}{}", text::REGISTRATION_FAILED, text::TX_INSUFFICIENT_FUNDS)
    );
}

#[tokio::test]
async fn poor_account_gets_insufficient_funds_status() {
    let wallet = DevnetWallet::sample();
    wallet.select_account(BOB);
    let mut h = Harness::with_wallet(wallet, PAGE);
    h.portal.connect_wallet().await;
    h.portal.register().await;

    assert_eq!(
        h.text(ElementId::RegisterStatus),
        format!("{}{}", text::REGISTRATION_FAILED, text::TX_INSUFFICIENT_FUNDS)
    );
    assert_eq!(h.portal.phase(), Phase::Unregistered);
}

#[tokio::test]
async fn failed_confirmation_shows_truncated_reason() {
    let mut h = Harness::new(PAGE);
    h.portal.connect_wallet().await;
    h.wallet.set_faults(|f| {
        f.confirmation = Some(ConnectorError::Reverted("x".repeat(200)))
    });
    h.portal.register().await;

    let status = h.text(ElementId::RegisterStatus);
    let detail = status.strip_prefix(text::REGISTRATION_FAILED).unwrap();
    assert!(detail.starts_with("execution reverted: x"));
    assert_eq!(detail.chars().count(), h.portal.config().error_preview_chars);
    assert_eq!(h.portal.phase(), Phase::Unregistered);
    assert!(!h.wallet.snapshot().registrants.contains_key(&ALICE));
}

#[tokio::test]
async fn copy_before_link_exists_is_refused() {
    let mut h = Harness::new(PAGE);
    h.portal.copy_referral_link().await;
    assert!(h.clipboard.writes().is_empty());
    assert_eq!(
        h.notification(),
        Some((text::CONNECT_FIRST.to_string(), Tone::Error))
    );

    // connected but unregistered: still no link
    h.portal.connect_wallet().await;
    h.portal.copy_referral_link().await;
    assert!(h.clipboard.writes().is_empty());
}

#[tokio::test]
async fn clipboard_failure_is_notified() {
    let mut h = Harness::as_carol(PAGE);
    h.portal.connect_wallet().await;
    h.clipboard.refuse_with("permission denied");
    h.portal.copy_referral_link().await;

    assert_eq!(
        h.notification(),
        Some((text::COPY_FAILED.to_string(), Tone::Error))
    );
    assert_eq!(h.text(ElementId::CopyLinkButton), "Copy link");
}

#[tokio::test(start_paused = true)]
async fn copied_label_reverts_after_feedback_delay() {
    let mut h = Harness::as_carol(PAGE);
    h.portal.connect_wallet().await;
    h.portal.copy_referral_link().await;

    assert_eq!(h.clipboard.last(), Some(format!("{PAGE}?ref={}", carol())));
    assert_eq!(h.text(ElementId::CopyLinkButton), text::BUTTON_COPIED);

    // a second click inside the window must not capture "Copied!"
    tokio::time::advance(Duration::from_millis(500)).await;
    h.portal.copy_referral_link().await;

    tokio::time::advance(Duration::from_millis(1_600)).await;
    h.portal.fire_due_deadlines(Instant::now());
    assert_eq!(h.text(ElementId::CopyLinkButton), text::BUTTON_COPIED);

    tokio::time::advance(Duration::from_millis(500)).await;
    h.portal.fire_due_deadlines(Instant::now());
    assert_eq!(h.text(ElementId::CopyLinkButton), "Copy link");
    assert_eq!(h.clipboard.writes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn notification_hides_after_five_seconds_and_resets_on_overwrite() {
    let mut h = Harness::new(PAGE);
    h.portal.show_notification("first", false);

    tokio::time::advance(Duration::from_millis(4_900)).await;
    h.portal.fire_due_deadlines(Instant::now());
    assert_eq!(h.notification(), Some(("first".to_string(), Tone::Neutral)));

    h.portal.show_notification("second", true);
    tokio::time::advance(Duration::from_millis(200)).await;
    h.portal.fire_due_deadlines(Instant::now());
    assert_eq!(h.notification(), Some(("second".to_string(), Tone::Error)));

    tokio::time::advance(Duration::from_millis(4_800)).await;
    h.portal.fire_due_deadlines(Instant::now());
    assert_eq!(h.notification(), None);
    assert_eq!(h.portal.next_deadline(), None);
}

#[tokio::test]
async fn account_switch_resets_the_page() {
    let url = format!("{PAGE}?ref={}", carol());
    let mut h = Harness::as_carol(&url);
    h.portal.connect_wallet().await;
    assert_eq!(h.portal.phase(), Phase::Registered);

    h.wallet.select_account(ALICE);
    assert_eq!(h.portal.process_provider_events(), 1);

    assert_eq!(h.portal.phase(), Phase::Disconnected);
    assert_eq!(h.portal.session().registrant(), None);
    assert!(!h.doc().is_visible(ElementId::DashboardSection));
    assert_eq!(h.doc().value(ElementId::ReferralLinkOutput), "");
    assert_eq!(h.text(ElementId::ConnectWalletButton), "Connect wallet");
    assert!(!h.doc().is_disabled(ElementId::ConnectWalletButton));
    assert_eq!(h.doc().value(ElementId::ReferrerInput), carol());

    // reconnecting picks up the newly selected account
    h.portal.connect_wallet().await;
    assert_eq!(h.portal.session().address(), Some(ALICE));
    assert_eq!(h.portal.phase(), Phase::Unregistered);
}

#[tokio::test]
async fn chain_switch_and_disconnect_reset_the_page() {
    let mut h = Harness::new(PAGE);
    h.portal.connect_wallet().await;

    h.wallet.switch_chain(1);
    assert_eq!(h.portal.process_provider_events(), 1);
    assert_eq!(h.portal.phase(), Phase::Disconnected);
    assert_eq!(h.text(ElementId::EntryPrice), "-");

    h.portal.connect_wallet().await;
    h.wallet.disconnect();
    assert_eq!(h.portal.process_provider_events(), 1);
    assert_eq!(h.portal.phase(), Phase::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn run_loop_serves_actions_and_confirmation() {
    let h = Harness::new(PAGE);
    let wallet = h.wallet.clone();
    let (actions, inbox) = mpsc::channel(4);

    let driver = async move {
        actions.send(UserAction::ConnectWallet).await.unwrap();
        actions.send(UserAction::Register).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(actions);
    };
    let (doc, ()) = tokio::join!(h.portal.run(inbox), driver);

    assert_eq!(doc.text(ElementId::RegisterStatus), text::REGISTERED);
    assert!(doc.is_visible(ElementId::DashboardSection));
    assert_eq!(wallet.count_calls(|c| matches!(c, CallRecord::Confirm(_))), 1);
}

#[tokio::test(start_paused = true)]
async fn run_loop_polls_balance_and_hides_notifications() {
    let h = Harness::new(PAGE);
    let wallet = h.wallet.clone();
    let (actions, inbox) = mpsc::channel(4);

    let driver = async move {
        actions.send(UserAction::ConnectWallet).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        wallet.update_state(|s| {
            s.balances.insert(ALICE, parse_ether("3").unwrap());
        });
        tokio::time::sleep(Duration::from_secs(15)).await;
        drop(actions);
    };
    let (doc, ()) = tokio::join!(h.portal.run(inbox), driver);

    assert_eq!(doc.text(ElementId::EthBalance), "ETH balance: 3.0");
    assert!(!doc.is_visible(ElementId::Notification));
}

#[tokio::test(start_paused = true)]
async fn run_loop_reinitialises_on_account_change() {
    let h = Harness::new(PAGE);
    let wallet = h.wallet.clone();
    let (actions, inbox) = mpsc::channel(4);

    let driver = async move {
        actions.send(UserAction::ConnectWallet).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        wallet.select_account(BOB);
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(actions);
    };
    let (doc, ()) = tokio::join!(h.portal.run(inbox), driver);

    assert_eq!(doc.text(ElementId::WalletStatus), "Status: not connected");
    assert!(!doc.is_visible(ElementId::RegistrationSection));
    assert_eq!(doc.text(ElementId::EthBalance), "");
}
