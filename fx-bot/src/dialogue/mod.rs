//! The conversion dialogue.
//!
//! A user picks a base currency, a target currency and an amount; the bot
//! answers with the converted value:
//!
//! ```text
//! Idle --/list, /manual--> AwaitingBase --code--> AwaitingTarget --code--> AwaitingAmount
//!   ^                                                                          |
//!   +------------------------- amount (rate looked up) ------------------------+
//! ```
//!
//! `/start` and `/cancel` return to `Idle` from anywhere. Invalid input
//! re-prompts without moving.
//!
//! [`transition`] holds the rules and is pure; [`DialogueController`] wraps it
//! with session storage, per-session locking and the rate lookup.

mod controller;
mod event;
mod gate;
mod prompts;
mod transition;

pub use controller::{DialogueController, Handled, PendingLookup};
pub use event::{Command, DialogueEvent, LIST_BUTTON, MANUAL_BUTTON, Selection, SelectionRole};
pub use gate::{Lane, LaneGuard, SessionGate};
pub use prompts::{BUTTONS_PER_ROW, Directive, conversion_line, currency_keyboard, main_menu};
pub use transition::{ConversionRequest, Transition, parse_amount, transition};
