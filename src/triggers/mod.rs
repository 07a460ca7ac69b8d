//! Keyword trigger engine.
//!
//! Matches chat messages against the effective categories of the chat and
//! answers with the category response once a user has hit the same category
//! often enough within the rate-limit window.

mod actions;
mod clock;
mod conditions;
mod delivery;
mod engine;
pub mod matcher;
mod message;
pub mod rate_limiter;

pub use actions::Action;
pub use clock::{Clock, ManualClock, SystemClock};
pub use conditions::{Condition, ConditionContext, KeywordMatch, UserTriggerCount};
pub use delivery::{Delivery, DeliveryError, MemoryDelivery, SentMessage};
pub use engine::{EngineConfig, NoMatchReason, Outcome, TriggerEngine, TriggerError};
pub use message::InboundMessage;
pub use rate_limiter::{RateLimitMode, RateLimitPolicy};
