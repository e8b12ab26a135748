//! Chrome discovery and launch.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use formscout_config::BrowserConfig;
use formscout_protocols::BrowserError;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::cdp::CdpClient;

const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(200);
const STARTUP_ATTEMPTS: u32 = 50;

/// Starts Chrome with remote debugging, or finds one already listening.
pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// CDP HTTP endpoint for the configured debug port.
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.config.debug_port)
    }

    /// User data directory; a per-port temporary directory when unset.
    pub fn profile_dir(&self) -> PathBuf {
        self.config.profile_dir.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("formscout-chrome-{}", self.config.debug_port))
        })
    }

    /// Configured binary, else the first well-known install location.
    pub fn find_chrome(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config.chrome_path {
            return Some(path.clone());
        }

        #[cfg(target_os = "macos")]
        let paths: &[&str] = &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ];

        #[cfg(target_os = "linux")]
        let paths: &[&str] = &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ];

        #[cfg(target_os = "windows")]
        let paths: &[&str] = &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        let paths: &[&str] = &[];

        paths.iter().map(PathBuf::from).find(|p| p.exists())
    }

    /// Command-line flags for a crawler Chrome.
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.config.debug_port),
            format!("--user-data-dir={}", self.profile_dir().display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-sync".to_string(),
            "--disable-translate".to_string(),
            "--disable-popup-blocking".to_string(),
            "--metrics-recording-only".to_string(),
        ];
        if self.config.headless {
            args.push("--headless=new".to_string());
        }
        args
    }

    pub async fn is_running(&self) -> bool {
        CdpClient::version_at(&self.endpoint()).await.is_ok()
    }

    /// Spawn Chrome. The process is killed when the handle is dropped.
    pub async fn launch(&self) -> Result<Child, BrowserError> {
        let chrome_path = self.find_chrome().ok_or_else(|| {
            BrowserError::Launch("Chrome not found; set browser.chrome_path".to_string())
        })?;
        let profile_dir = self.profile_dir();

        if let Err(e) = tokio::fs::create_dir_all(&profile_dir).await {
            warn!("Failed to create profile directory: {}", e);
        }

        info!("Launching Chrome with profile at: {}", profile_dir.display());

        let child = Command::new(&chrome_path)
            .args(self.chrome_args())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrowserError::Launch(format!("{}: {}", chrome_path.display(), e)))?;

        info!("Chrome launched with PID: {:?}", child.id());
        Ok(child)
    }

    /// Make sure a debuggable Chrome is listening. Returns the child
    /// process when this call started it.
    pub async fn ensure_running(&self) -> Result<Option<Child>, BrowserError> {
        if self.is_running().await {
            info!("Chrome already running on port {}", self.config.debug_port);
            return Ok(None);
        }

        info!("Chrome not running on port {}, launching...", self.config.debug_port);
        let child = self.launch().await?;

        for _ in 0..STARTUP_ATTEMPTS {
            tokio::time::sleep(STARTUP_POLL_INTERVAL).await;
            if self.is_running().await {
                return Ok(Some(child));
            }
        }

        Err(BrowserError::Launch(
            "Chrome failed to start within timeout".to_string(),
        ))
    }
}
