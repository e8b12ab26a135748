//! Error types shared across FormScout crates.

mod browser;
mod category;
mod fill;
mod knowledge;
mod scheduler;

pub use browser::*;
pub use category::*;
pub use fill::*;
pub use knowledge::*;
pub use scheduler::*;
