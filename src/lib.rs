//! Triage core for a human-moderated file-request bot.
//!
//! This crate mediates a content-request workflow over a chat platform:
//! users submit an image of the file they want, a bounded set of admins
//! triages each request (approve / reject / fulfill / publish / explain),
//! and the requester is notified at every transition.
//!
//! Three components are composed around one event-driven control loop fed
//! by a messaging gateway: the request ledger (the authoritative state
//! machine), the membership gate (cached channel-membership checks), and
//! the per-admin interaction contexts (which follow-up artifact an admin
//! owes, and for which request). All state is in memory only.

pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod gate;
pub mod gateway;
pub mod ledger;
pub mod request;
pub mod router;

// Re-export commonly used types
pub use config::BotConfig;
pub use context::AdminContexts;
pub use domain::{AdminExpectation, MemberStatus};
pub use error::{Result, TriageError};
pub use gate::MembershipGate;
pub use gateway::{AdminButton, ChatGateway, GatewayCall, MockGateway, TelegramGateway, UserAction};
pub use ledger::RequestLedger;
pub use request::*;
pub use router::{InboundEvent, Router};
