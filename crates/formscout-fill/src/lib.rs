//! # FormScout Fill
//!
//! Plans and executes form fills using what the knowledge base has
//! learned: which selector families work on a platform, how long fields
//! of each input type need before they become visible, and which canned
//! answer fits each question.
//!
//! ## Flow
//!
//! 1. [`AdaptiveFillStrategy::decide_plan`] turns a [`PageStructure`] into a [`FillPlan`]
//! 2. [`AdaptiveFillStrategy::execute`] runs the plan on a pool slot
//! 3. The outcome is written back as usage of the rules that were applied
//!
//! [`PageStructure`]: formscout_protocols::PageStructure

mod intent;
mod plan;
mod response;
mod script;
mod selectors;
mod strategy;

pub use intent::Intent;
pub use plan::{FieldOutcome, FillOutcome, FillPlan, FillStep, SelectorCandidate};
pub use response::{FillValue, ResponseGenerator};
pub use selectors::{SelectorFamily, wait_schedule};
pub use strategy::AdaptiveFillStrategy;
