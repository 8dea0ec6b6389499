use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::Browser as OxideBrowser;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::agent::AgentError;

/// Everything the agent loop needs from a live page.
///
/// Element references are opaque to the loop; they are only handed back to
/// `inner_text`, `is_visible` and `click` on the same page.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    type Element: Send + Sync;

    async fn goto(&self, url: &str) -> Result<(), AgentError>;
    async fn wait_for_load(&self) -> Result<(), AgentError>;
    /// Matches in document order.
    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Self::Element>, AgentError>;
    async fn inner_text(&self, element: &Self::Element) -> Result<String, AgentError>;
    async fn is_visible(&self, element: &Self::Element) -> Result<bool, AgentError>;
    async fn click(&self, element: &Self::Element) -> Result<(), AgentError>;
    /// PNG bytes of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, AgentError>;
    /// Close the page, the browser, and stop the engine.
    async fn close(self) -> Result<(), AgentError>;
}

#[derive(Clone)]
pub struct BrowserConfig {
    pub headless: bool,
    pub user_agent: Option<String>,
    pub viewport: (u32, u32),
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self { headless: true, user_agent: None, viewport: (1280, 800) }
    }
}

// ========================= Chromium Adapter =========================

// Playwright-style visibility: non-empty box and not visibility:hidden.
const IS_VISIBLE_JS: &str = r#"function() {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden';
}"#;

pub struct ChromiumPage {
    page: Page,
    browser: OxideBrowser,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
    viewport: (u32, u32),
}

impl ChromiumPage {
    pub async fn launch(cfg: BrowserConfig) -> Result<Self> {
        let mut builder = chromiumoxide::browser::BrowserConfig::builder();
        if !cfg.headless {
            builder = builder.with_head();
        }
        // A fresh profile per run keeps Chromium from tripping over a stale
        // ProcessSingleton lock left by a previous instance.
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let mut profile_dir: PathBuf = std::env::temp_dir();
        profile_dir.push(format!("browser-pilot-profile-{}-{}", std::process::id(), ts));
        std::fs::create_dir_all(&profile_dir)
            .with_context(|| format!("creating profile dir {}", profile_dir.display()))?;
        builder = builder
            .user_data_dir(profile_dir.clone())
            .window_size(cfg.viewport.0, cfg.viewport.1)
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        let bcfg = builder.build().map_err(|e| anyhow::anyhow!(e))?;

        let (browser, mut handler) = OxideBrowser::launch(bcfg).await?;
        let handler = tokio::spawn(async move { pump_events(&mut handler).await });
        let page = browser.new_page("about:blank").await?;
        if let Some(ua) = cfg.user_agent {
            page.set_user_agent(ua).await?;
        }

        let this = Self { page, browser, handler, profile_dir, viewport: cfg.viewport };
        this.apply_viewport().await?;
        Ok(this)
    }

    async fn apply_viewport(&self) -> Result<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(self.viewport.0 as i64)
            .height(self.viewport.1 as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| anyhow::anyhow!(e))?;
        self.page.execute(params).await?;
        Ok(())
    }

    async fn capture_png(&self) -> Result<Vec<u8>> {
        let take = || async {
            self.page
                .screenshot(ScreenshotParams::builder().format(CaptureScreenshotFormat::Png).build())
                .await
        };
        match take().await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("0 width") || msg.contains("0 height") {
                    // Viewport collapsed, force it back and retry once.
                    self.apply_viewport().await?;
                    sleep(Duration::from_millis(50)).await;
                    return Ok(take().await?);
                }
                Err(e.into())
            }
        }
    }

    async fn element_visible(&self, element: &Element) -> Result<bool> {
        let ret = element.call_js_fn(IS_VISIBLE_JS, false).await?;
        Ok(ret.result.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    async fn shutdown(self) -> Result<()> {
        let Self { page, mut browser, handler, profile_dir, .. } = self;
        drop(page);
        let closed = browser.close().await.map(|_| ()).context("closing browser");
        if let Err(e) = browser.wait().await {
            warn!("waiting for browser process failed: {}", e);
        }
        finish_teardown(closed, handler, &profile_dir).await
    }
}

/// Drain CDP events until the connection ends or yields its first error.
async fn pump_events<S, T, E>(events: &mut S)
where
    S: Stream<Item = std::result::Result<T, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(ev) = events.next().await {
        if let Err(e) = ev {
            debug!("browser handler stopped: {}", e);
            break;
        }
    }
}

/// Join the handler task and drop the profile dir, whatever `closed` says.
async fn finish_teardown(closed: Result<()>, handler: JoinHandle<()>, profile_dir: &Path) -> Result<()> {
    if let Err(e) = &closed {
        // A dead connection can leave the handler waiting forever.
        warn!("browser close failed: {:#}", e);
        handler.abort();
    }
    match handler.await {
        Err(e) if !e.is_cancelled() => warn!("browser handler task ended abnormally: {}", e),
        _ => {}
    }
    if let Err(e) = tokio::fs::remove_dir_all(profile_dir).await {
        debug!("profile dir {} not removed: {}", profile_dir.display(), e);
    }
    closed
}

fn browser_err(e: impl std::fmt::Display) -> AgentError {
    AgentError::Browser(format!("{:#}", e))
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    type Element = Element;

    async fn goto(&self, url: &str) -> Result<(), AgentError> {
        self.page.goto(url).await.map_err(browser_err)?;
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<(), AgentError> {
        self.page.wait_for_navigation().await.map_err(browser_err)?;
        Ok(())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, AgentError> {
        self.page.find_elements(selector).await.map_err(browser_err)
    }

    async fn inner_text(&self, element: &Element) -> Result<String, AgentError> {
        Ok(element.inner_text().await.map_err(browser_err)?.unwrap_or_default())
    }

    async fn is_visible(&self, element: &Element) -> Result<bool, AgentError> {
        self.element_visible(element).await.map_err(browser_err)
    }

    async fn click(&self, element: &Element) -> Result<(), AgentError> {
        element.click().await.map_err(browser_err)?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AgentError> {
        self.capture_png().await.map_err(browser_err)
    }

    async fn close(self) -> Result<(), AgentError> {
        self.shutdown().await.map_err(browser_err)
    }
}
