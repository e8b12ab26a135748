//! Scripted in-process browser driver.
//!
//! Sites are registered by URL with a page structure, a navigation
//! behavior and a latency. Every call is appended to an event log with a
//! global sequence number so tests can check ordering across tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use formscout_protocols::{
    ANALYZE_SCRIPT_TAG, BrowserContext, BrowserDriver, BrowserError, BrowserPage, ContextOptions,
    PageStructure,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// How a failing navigation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Timeout,
    Navigation,
    Context,
}

impl MockFailure {
    fn error(&self, url: &str) -> BrowserError {
        match self {
            MockFailure::Timeout => BrowserError::Timeout(format!("navigation to {} timed out", url)),
            MockFailure::Navigation => {
                BrowserError::Navigation(format!("{}: net::ERR_CONNECTION_REFUSED", url))
            }
            MockFailure::Context => {
                BrowserError::Context("Execution context was destroyed".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockNavigation {
    Succeed,
    /// Fail the first `n` navigations, then succeed.
    FailTimes(u32, MockFailure),
    AlwaysFail(MockFailure),
    /// Never finish.
    Hang,
}

#[derive(Debug, Clone)]
pub struct MockSite {
    pub structure: PageStructure,
    pub navigation: MockNavigation,
    pub latency: Duration,
}

impl MockSite {
    pub fn new(structure: PageStructure) -> Self {
        Self {
            structure,
            navigation: MockNavigation::Succeed,
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_navigation(mut self, navigation: MockNavigation) -> Self {
        self.navigation = navigation;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEventKind {
    ContextCreated,
    ContextClosed,
    PageOpened,
    PageClosed,
    NavigationStarted,
    NavigationSucceeded,
    NavigationFailed,
    Evaluated,
}

#[derive(Debug, Clone)]
pub struct MockEvent {
    pub seq: u64,
    pub kind: MockEventKind,
    pub context_id: String,
    pub url: Option<String>,
}

/// Custom answer for `evaluate(url, script)`; `None` falls through to the
/// default behavior.
pub type MockResponder =
    Arc<dyn Fn(&str, &str) -> Option<Result<Value, BrowserError>> + Send + Sync>;

#[derive(Default)]
struct MockState {
    sites: HashMap<String, MockSite>,
    attempts: HashMap<String, u32>,
    events: Vec<MockEvent>,
    open_contexts: usize,
}

struct MockInner {
    state: Mutex<MockState>,
    seq: AtomicU64,
    contexts_created: AtomicUsize,
    close_failures: usize,
    responder: Option<MockResponder>,
}

impl MockInner {
    fn record(&self, kind: MockEventKind, context_id: &str, url: Option<&str>) {
        let mut state = self.state.lock();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        state.events.push(MockEvent {
            seq,
            kind,
            context_id: context_id.to_string(),
            url: url.map(|u| u.to_string()),
        });
    }
}

/// In-process [`BrowserDriver`] with scripted sites.
#[derive(Clone)]
pub struct MockDriver {
    inner: Arc<MockInner>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self::build(0, None)
    }

    fn build(close_failures: usize, responder: Option<MockResponder>) -> Self {
        Self {
            inner: Arc::new(MockInner {
                state: Mutex::new(MockState::default()),
                seq: AtomicU64::new(0),
                contexts_created: AtomicUsize::new(0),
                close_failures,
                responder,
            }),
        }
    }

    /// The first `n` contexts created fail when closed.
    pub fn with_close_failures(self, n: usize) -> Self {
        let sites = std::mem::take(&mut self.inner.state.lock().sites);
        let driver = Self::build(n, self.inner.responder.clone());
        driver.inner.state.lock().sites = sites;
        driver
    }

    pub fn with_responder(
        self,
        responder: impl Fn(&str, &str) -> Option<Result<Value, BrowserError>> + Send + Sync + 'static,
    ) -> Self {
        let sites = std::mem::take(&mut self.inner.state.lock().sites);
        let driver = Self::build(self.inner.close_failures, Some(Arc::new(responder)));
        driver.inner.state.lock().sites = sites;
        driver
    }

    pub fn with_site(self, url: impl Into<String>, site: MockSite) -> Self {
        self.add_site(url, site);
        self
    }

    pub fn add_site(&self, url: impl Into<String>, site: MockSite) {
        self.inner.state.lock().sites.insert(url.into(), site);
    }

    /// Navigations started for `url`, successful or not.
    pub fn navigation_attempts(&self, url: &str) -> u32 {
        self.inner.state.lock().attempts.get(url).copied().unwrap_or(0)
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.inner.state.lock().events.clone()
    }

    pub fn open_contexts(&self) -> usize {
        self.inner.state.lock().open_contexts
    }

    pub fn contexts_created(&self) -> usize {
        self.inner.contexts_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn new_context(
        &self,
        options: ContextOptions,
    ) -> Result<Arc<dyn BrowserContext>, BrowserError> {
        let index = self.inner.contexts_created.fetch_add(1, Ordering::SeqCst);
        let id = format!("mock-context-{}", index);
        self.inner.state.lock().open_contexts += 1;
        self.inner.record(MockEventKind::ContextCreated, &id, None);

        Ok(Arc::new(MockContext {
            id,
            index,
            user_agent: options.user_agent,
            inner: self.inner.clone(),
        }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

struct MockContext {
    id: String,
    index: usize,
    user_agent: String,
    inner: Arc<MockInner>,
}

#[async_trait]
impl BrowserContext for MockContext {
    fn id(&self) -> &str {
        &self.id
    }

    fn user_agent(&self) -> &str {
        &self.user_agent
    }

    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        self.inner.record(MockEventKind::PageOpened, &self.id, None);
        Ok(Box::new(MockPage {
            context_id: self.id.clone(),
            inner: self.inner.clone(),
            current_url: Mutex::new(None),
        }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        {
            let mut state = self.inner.state.lock();
            state.open_contexts = state.open_contexts.saturating_sub(1);
        }
        self.inner.record(MockEventKind::ContextClosed, &self.id, None);
        if self.index < self.inner.close_failures {
            return Err(BrowserError::Protocol(format!(
                "context {} refused to close",
                self.id
            )));
        }
        Ok(())
    }
}

struct MockPage {
    context_id: String,
    inner: Arc<MockInner>,
    current_url: Mutex<Option<String>>,
}

#[async_trait]
impl BrowserPage for MockPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let (site, attempt) = {
            let mut state = self.inner.state.lock();
            let attempt = {
                let count = state.attempts.entry(url.to_string()).or_insert(0);
                *count += 1;
                *count
            };
            (state.sites.get(url).cloned(), attempt)
        };
        self.inner
            .record(MockEventKind::NavigationStarted, &self.context_id, Some(url));

        let outcome = match site {
            None => Err(BrowserError::Navigation(format!(
                "{}: net::ERR_NAME_NOT_RESOLVED",
                url
            ))),
            Some(site) => {
                if !site.latency.is_zero() {
                    tokio::time::sleep(site.latency).await;
                }
                match site.navigation {
                    MockNavigation::Succeed => Ok(()),
                    MockNavigation::FailTimes(n, failure) if attempt <= n => Err(failure.error(url)),
                    MockNavigation::FailTimes(..) => Ok(()),
                    MockNavigation::AlwaysFail(failure) => Err(failure.error(url)),
                    MockNavigation::Hang => std::future::pending().await,
                }
            }
        };

        match &outcome {
            Ok(()) => {
                *self.current_url.lock() = Some(url.to_string());
                self.inner
                    .record(MockEventKind::NavigationSucceeded, &self.context_id, Some(url));
            }
            Err(_) => {
                self.inner
                    .record(MockEventKind::NavigationFailed, &self.context_id, Some(url));
            }
        }
        outcome
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let url = self
            .current_url
            .lock()
            .clone()
            .ok_or_else(|| BrowserError::Context("no document loaded".to_string()))?;
        self.inner
            .record(MockEventKind::Evaluated, &self.context_id, Some(&url));

        if let Some(responder) = &self.inner.responder {
            if let Some(result) = responder(&url, script) {
                return result;
            }
        }

        if script.contains(ANALYZE_SCRIPT_TAG) {
            let mut structure = self
                .inner
                .state
                .lock()
                .sites
                .get(&url)
                .map(|s| s.structure.clone())
                .unwrap_or_default();
            if structure.url.is_empty() {
                structure.url = url;
            }
            return serde_json::to_value(structure).map_err(|e| BrowserError::Script(e.to_string()));
        }

        Ok(json!({"ok": true}))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.inner.record(MockEventKind::PageClosed, &self.context_id, None);
        Ok(())
    }
}
