//! User-facing strings.

pub const INSTALL_WALLET: &str = "Install a wallet extension such as MetaMask!";
pub const CONNECTING: &str = "Connecting...";
pub const CONNECTED: &str = "Wallet connected!";
pub const CONNECT_DECLINED: &str = "Connection failed: the request was declined.";
pub const CONNECT_FAILED: &str = "Connection failed: ";
pub const STATUS_CONNECTED: &str = "Status: connected";
pub const BUTTON_CONNECTED: &str = "Wallet connected";

pub const BALANCE_PREFIX: &str = "ETH balance: ";
pub const STATUS_CHECK_FAILED: &str = "Could not check your registration status";

pub const CONNECT_FIRST: &str = "Connect your wallet first";
pub const BUTTON_SENDING: &str = "Sending transaction...";
pub const BUTTON_REGISTER: &str = "Pay and register";
pub const BUTTON_REGISTERED: &str = "You are registered";
pub const AWAITING_CONFIRMATION: &str = "Waiting for network confirmation...";
pub const REGISTERED: &str = "Registration successful!";
pub const WELCOME: &str = "Congratulations! You are now a member of the project.";
pub const REGISTRATION_FAILED: &str = "Registration failed. ";
pub const TX_DECLINED: &str = "You declined the transaction.";
pub const TX_INSUFFICIENT_FUNDS: &str = "Not enough ETH on balance.";

pub const BUTTON_COPIED: &str = "Copied!";
pub const LINK_COPIED: &str = "Link copied to clipboard";
pub const COPY_FAILED: &str = "Could not copy the link";

pub const REFERRER_FROM_LINK: &str = "Referral code from the link was filled in automatically!";
