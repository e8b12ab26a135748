//! # FormScout Browser
//!
//! Browser layer for the crawler.
//!
//! - [`cdp`] - Chrome DevTools Protocol client
//! - [`CdpDriver`] - [`BrowserDriver`](formscout_protocols::BrowserDriver) backed by a local Chrome
//! - [`BrowserPool`] - Fixed set of isolated contexts handed out one caller at a time
//! - [`mock`] - Scripted in-process driver for tests and dry runs

pub mod cdp;
mod driver;
mod launcher;
pub mod mock;
mod pool;

pub use driver::CdpDriver;
pub use launcher::ChromeLauncher;
pub use pool::{BrowserPool, PoolStats, SlotGuard};
