//! Capability tickets: signed, time-boxed grants that bind an agent's audit
//! tier to its operational limits.
//!
//! ```no_run
//! use vigil_ticket::{AuditLevel, IssuerConfig, TicketConstraints, TicketIssuer, TicketOptions};
//!
//! let issuer = TicketIssuer::new(IssuerConfig::hs256("change-me"))?;
//! let token = issuer.generate(&TicketOptions::new(
//!     "agent-7",
//!     AuditLevel::Gold,
//!     TicketConstraints::new(250.0).allow_server("api.partner.example"),
//! ))?;
//! let ticket = issuer.validate(&token)?;
//! assert_eq!(ticket.subject, "agent-7");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod issuer;
pub mod types;


pub use config::{IssuerConfig, KeyMaterial};
pub use error::{IssueError, KeyError, TicketError, TicketErrorCode};
pub use issuer::{decode, TicketIssuer};
pub use types::{
    AuditLevel, CapabilityTicket, PaymentContext, TicketConstraints, TicketOptions,
    TransactionRequest,
};
