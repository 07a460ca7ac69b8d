//! Update intake and outbound delivery for the bot binary.
//!
//! Updates arrive as newline-delimited JSON on an input stream; outbound
//! messages leave as JSON lines on an output stream.

mod runner;
mod stdio;
mod update;

pub use runner::{Gateway, GatewayError, RunSummary};
pub use stdio::JsonLinesDelivery;
pub use update::{MembershipStatus, Registration, Update};
