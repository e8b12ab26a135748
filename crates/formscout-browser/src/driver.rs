//! [`BrowserDriver`] backed by Chrome over CDP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use formscout_config::BrowserConfig;
use formscout_protocols::{BrowserContext, BrowserDriver, BrowserError, BrowserPage, ContextOptions};
use serde_json::Value;
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::cdp::{CdpClient, PageSession};
use crate::launcher::ChromeLauncher;

/// One Chrome instance; each context is a CDP browser context.
pub struct CdpDriver {
    client: Arc<CdpClient>,
    chrome: tokio::sync::Mutex<Option<Child>>,
}

impl CdpDriver {
    /// Connect to Chrome on the configured debug port, launching it first
    /// if nothing is listening.
    pub async fn launch(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let launcher = ChromeLauncher::new(config.clone());
        let child = launcher.ensure_running().await?;
        let client = CdpClient::connect(&launcher.endpoint()).await?;

        info!("Connected to Chrome at {}", launcher.endpoint());
        Ok(Self {
            client: Arc::new(client),
            chrome: tokio::sync::Mutex::new(child),
        })
    }

    /// Connect to an already running Chrome.
    pub async fn connect(endpoint: &str) -> Result<Self, BrowserError> {
        let client = CdpClient::connect(endpoint).await?;
        Ok(Self {
            client: Arc::new(client),
            chrome: tokio::sync::Mutex::new(None),
        })
    }

    pub fn client(&self) -> &CdpClient {
        &self.client
    }
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn new_context(
        &self,
        options: ContextOptions,
    ) -> Result<Arc<dyn BrowserContext>, BrowserError> {
        let id = self.client.create_browser_context().await?;
        debug!("Created browser context {}", id);
        Ok(Arc::new(CdpContext {
            id,
            client: self.client.clone(),
            options,
        }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if let Some(mut child) = self.chrome.lock().await.take() {
            info!("Shutting down Chrome...");
            if let Err(e) = child.kill().await {
                warn!("Failed to stop Chrome: {}", e);
                return Err(BrowserError::Launch(e.to_string()));
            }
        }
        Ok(())
    }
}

struct CdpContext {
    id: String,
    client: Arc<CdpClient>,
    options: ContextOptions,
}

#[async_trait]
impl BrowserContext for CdpContext {
    fn id(&self) -> &str {
        &self.id
    }

    fn user_agent(&self) -> &str {
        &self.options.user_agent
    }

    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        let session = self.client.open_page(Some(&self.id)).await?;
        if !self.options.user_agent.is_empty() {
            session.set_user_agent(&self.options.user_agent).await?;
        }
        session
            .set_viewport(self.options.viewport_width, self.options.viewport_height)
            .await?;

        Ok(Box::new(CdpPage {
            session,
            client: self.client.clone(),
            navigation_timeout: Duration::from_millis(self.options.navigation_timeout_ms),
        }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.client.dispose_browser_context(&self.id).await?;
        debug!("Disposed browser context {}", self.id);
        Ok(())
    }
}

struct CdpPage {
    session: PageSession,
    client: Arc<CdpClient>,
    navigation_timeout: Duration,
}

#[async_trait]
impl BrowserPage for CdpPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        match tokio::time::timeout(
            self.navigation_timeout,
            self.session.navigate(url, self.navigation_timeout),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(BrowserError::Timeout(format!(
                "navigation to {} exceeded {:?}",
                url, self.navigation_timeout
            ))),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        Ok(self.session.evaluate(script).await?)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.client.close_target(self.session.target_id()).await?;
        Ok(())
    }
}
