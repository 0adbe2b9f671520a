//! Wallet-connected front end for an on-chain referral program.
//!
//! The crate is organised around a single [`controller::ViewController`]
//! that sits between three seams:
//!
//! * [`chain`]: the wallet / chain connector the page is given. Balance
//!   reads, contract reads and the `register` transaction all go through it.
//! * [`document`]: the page elements the controller writes into.
//! * [`clipboard`]: where referral links are copied to.
//!
//! [`devnet`] provides a JSON-backed connector used by the tests and by the
//! `referral-portal` binary; nothing in the controller depends on it.

pub mod chain;
pub mod clipboard;
pub mod config;
pub mod contract;
pub mod controller;
pub mod devnet;
pub mod document;
pub mod location;
pub mod session;

mod error;

pub use controller::{UserAction, ViewController};
pub use error::{ClipboardError, PortalError, Result};
