//! Chrome DevTools Protocol (CDP) client.
//!
//! Talks to Chrome over the browser-level WebSocket. Every page is
//! attached with a flattened session, so a single connection carries the
//! traffic of all pool contexts.
//!
//! ```rust,ignore
//! let client = CdpClient::connect("http://127.0.0.1:9222").await?;
//! let context_id = client.create_browser_context().await?;
//! let page = client.open_page(Some(&context_id)).await?;
//! page.navigate("https://example.com").await?;
//! ```

mod client;
mod error;
mod protocol;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use protocol::*;
pub use session::PageSession;
