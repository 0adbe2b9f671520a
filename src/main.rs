use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use log::info;
use tokio::sync::mpsc;

use referral_portal::{
    chain::{parse_address, Address, ChainConnector},
    clipboard::Clipboard,
    config::PortalConfig,
    devnet::{write_state, DevnetState, DevnetWallet},
    document::{Document, ElementId, MemoryDocument},
    location::PageLocation,
    ClipboardError, UserAction, ViewController,
};

/// Drives the referral portal against a local devnet fixture and prints the
/// resulting page state as JSON.
#[derive(Parser)]
#[command(name = "referral-portal", version)]
struct Cli {
    /// Devnet fixture, created by `init`.
    #[arg(long, default_value = "devnet.fixture.json")]
    fixture: PathBuf,

    /// Portal config (JSON). Built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Url the page is opened at; a `ref` query parameter pre-fills the referrer.
    #[arg(long, default_value = "http://localhost:8080/")]
    url: String,

    /// Open the page as if no wallet extension were installed.
    #[arg(long)]
    no_wallet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a sample fixture with three funded accounts.
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Load the page without connecting.
    Open,
    /// Connect the wallet and show balance, levels and registration.
    Connect,
    /// Connect, then pay the entry price and register.
    Register {
        /// Referrer address; blank means none.
        #[arg(long)]
        referrer: Option<String>,
    },
    /// Connect, then copy the referral link.
    CopyLink,
    /// Connect, switch the wallet to another account, connect again.
    SwitchAccount {
        #[arg(value_parser = parse_address)]
        address: Address,
    },
    /// Connect, then switch the wallet to another chain.
    SwitchChain { chain_id: u64 },
    /// Connect, then revoke wallet access.
    Disconnect,
    /// Connect and keep the page running (balance poll, timers) for a while.
    Watch {
        #[arg(long, default_value_t = 30)]
        secs: u64,
    },
}

/// Prints copied text instead of touching a system clipboard.
struct TerminalClipboard;

#[async_trait]
impl Clipboard for TerminalClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        eprintln!("copied: {text}");
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Command::Init { force } = cli.command {
        if cli.fixture.exists() && !force {
            bail!(
                "{} already exists (pass --force to overwrite)",
                cli.fixture.display()
            );
        }
        write_state(&cli.fixture, &DevnetState::sample())?;
        println!("wrote {}", cli.fixture.display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => PortalConfig::load(path)?,
        None => PortalConfig::default(),
    };
    let location =
        PageLocation::parse(&cli.url).with_context(|| format!("invalid --url {}", cli.url))?;
    let wallet = DevnetWallet::load(&cli.fixture).with_context(|| {
        format!(
            "cannot open fixture {} (create one with `referral-portal init`)",
            cli.fixture.display()
        )
    })?;

    let injected: Option<Arc<dyn ChainConnector>> = if cli.no_wallet {
        None
    } else {
        Some(Arc::new(wallet.clone()))
    };
    let mut portal = ViewController::new(
        injected,
        Arc::new(TerminalClipboard),
        MemoryDocument::new(),
        config,
        location,
    );
    portal.apply_referral_from_url();

    let document = match cli.command {
        // handled before the page is loaded
        Command::Init { .. } => portal.into_document(),
        Command::Open => portal.into_document(),
        Command::Connect => {
            portal.connect_wallet().await;
            portal.into_document()
        }
        Command::Register { referrer } => {
            portal.connect_wallet().await;
            if let Some(referrer) = referrer {
                portal
                    .document_mut()
                    .set_value(ElementId::ReferrerInput, &referrer);
            }
            portal.register().await;
            portal.into_document()
        }
        Command::CopyLink => {
            portal.connect_wallet().await;
            portal.copy_referral_link().await;
            portal.into_document()
        }
        Command::SwitchAccount { address } => {
            portal.connect_wallet().await;
            wallet.select_account(address);
            portal.process_provider_events();
            portal.connect_wallet().await;
            portal.into_document()
        }
        Command::SwitchChain { chain_id } => {
            portal.connect_wallet().await;
            wallet.switch_chain(chain_id);
            portal.process_provider_events();
            portal.into_document()
        }
        Command::Disconnect => {
            portal.connect_wallet().await;
            wallet.disconnect();
            portal.process_provider_events();
            portal.into_document()
        }
        Command::Watch { secs } => {
            let (actions, inbox) = mpsc::channel(8);
            actions.send(UserAction::ConnectWallet).await?;
            info!("watching for {secs}s");
            let stop = async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                drop(actions);
            };
            let (document, ()) = tokio::join!(portal.run(inbox), stop);
            document
        }
    };

    wallet.save()?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
