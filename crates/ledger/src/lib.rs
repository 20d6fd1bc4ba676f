//! Persistence, chain mirror, workflows and alerting for AnnSuraksha.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │  annsuraksha-ledger (this)         │
//! │                                    │
//! │  ┌──────────────┐   ┌───────────┐  │
//! │  │  Workflows   │──▶│  Chain    │ ← SupplyChain contract
//! │  │ log/confirm/ │   │  Mirror   │   (alloy)
//! │  │ complain/... │   └───────────┘  │
//! │  └──────┬───────┘                  │
//! │         │                          │
//! │    ┌────▼──────┐                   │
//! │    │  Storage  │ ← SQLite          │
//! │    └────▲──────┘                   │
//! │         │                          │
//! │  ┌──────┴───────┐                  │
//! │  │ TrustMonitor │ ← scoring models │
//! │  │ (tokio task) │   AI_ALERT logs  │
//! │  └──────────────┘                  │
//! └────────────────────────────────────┘
//!          │ shared DB
//! ┌────────▼───────────┐  ┌─────────────────────┐
//! │ annsuraksha-api    │  │ annsuraksha-cli     │
//! │ HTTP dashboard API │  │ seed, dealer, DAO   │
//! └────────────────────┘  └─────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod config;
pub mod logging;
pub mod monitor;
pub mod password;
pub mod seed;
pub mod storage;
pub mod workflow;

pub use annsuraksha_core::{types::*, *};
