//! Shared headless-browser session and page capture
//!
//! One `BrowserSession` wraps one Chromium process. Launching it is
//! expensive; opening a page on it is cheap, so a whole batch reuses a
//! single session. Two captures may run concurrently on the same session,
//! each on its own isolated page.

use std::path::Path;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::CaptureOptions;

/// A long-lived headless Chromium session
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    navigation_timeout_secs: u64,
    network_settle_ms: u64,
}

impl BrowserSession {
    /// Launch a headless Chromium and start its CDP event loop
    pub async fn launch(config: &Config) -> Result<Self> {
        let browser_config = BrowserConfig::builder()
            .build()
            .map_err(Error::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| Error::BrowserLaunch(e.to_string()))?;

        // The handler stream must be polled for the whole session lifetime;
        // every CDP request is routed through it.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        debug!("Launched headless browser session");

        Ok(Self {
            browser,
            handler_task,
            navigation_timeout_secs: config.navigation_timeout_secs,
            network_settle_ms: config.network_settle_ms,
        })
    }

    /// Navigate to `url` on a fresh page and capture it to `path` as PNG
    ///
    /// The page is closed on every exit path, including navigation failures
    /// and timeouts.
    pub async fn capture(&self, url: &str, path: &Path, options: &CaptureOptions) -> Result<()> {
        let page = self.browser.new_page("about:blank").await?;
        let guard = PageGuard::new(page, url.to_string());

        let outcome = self.capture_on_page(&guard, url, path, options).await;

        if let Err(e) = guard.close().await {
            warn!("Failed to close page for {}: {}", url, e);
        }

        outcome
    }

    async fn capture_on_page(
        &self,
        page: &Page,
        url: &str,
        path: &Path,
        options: &CaptureOptions,
    ) -> Result<()> {
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(options.viewport.width as i64)
            .height(options.viewport.height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(Error::Internal)?;
        page.execute(metrics).await?;

        // Bound goto + load together; a page that never settles must not
        // stall the batch.
        let timeout = Duration::from_secs(self.navigation_timeout_secs);
        tokio::time::timeout(timeout, async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, CdpError>(())
        })
        .await
        .map_err(|_| Error::NavigationTimeout {
            url: url.to_string(),
            seconds: self.navigation_timeout_secs,
        })?
        .map_err(|e| Error::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        // Late XHR/image traffic often lands just after the load event
        tokio::time::sleep(Duration::from_millis(self.network_settle_ms)).await;

        for selector in &options.hide_selectors {
            let script = format!(
                "document.querySelectorAll('{}').forEach(el => el.style.display = 'none')",
                escape_selector(selector)
            );
            // Zero matches is fine; only a broken selector raises
            page.evaluate(script).await?;
        }

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(options.full_page)
            .build();
        page.save_screenshot(params, path).await?;

        debug!("Captured {} -> {}", url, path.display());
        Ok(())
    }

    /// Shut down the browser process and its event loop
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        Ok(())
    }
}

/// Escape a CSS selector for embedding in a single-quoted JS string
///
/// Control characters would otherwise end the literal mid-script and kill
/// the whole injection.
fn escape_selector(selector: &str) -> String {
    let mut escaped = String::with_capacity(selector.len());
    for c in selector.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() => escaped.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Page wrapper that guarantees cleanup on every exit path
///
/// chromiumoxide pages hold CDP targets that are only released by an explicit
/// async `close()`. The guard prefers that path; if it is dropped without
/// closing (an early return or panic), a background task closes the page.
struct PageGuard {
    page: Option<Page>,
    url: String,
    runtime: tokio::runtime::Handle,
}

impl PageGuard {
    fn new(page: Page, url: String) -> Self {
        Self {
            page: Some(page),
            url,
            runtime: tokio::runtime::Handle::current(),
        }
    }

    async fn close(mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            page.close().await?;
        }
        Ok(())
    }
}

impl std::ops::Deref for PageGuard {
    type Target = Page;

    fn deref(&self) -> &Page {
        self.page.as_ref().expect("page already closed")
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let url = std::mem::take(&mut self.url);
            self.runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    warn!("Page cleanup failed for {}: {}", url, e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_escaping() {
        assert_eq!(escape_selector(".ad-banner"), ".ad-banner");
        assert_eq!(escape_selector("a[title='x']"), "a[title=\\'x\\']");
        assert_eq!(escape_selector("div\\:first"), "div\\\\:first");
    }

    #[test]
    fn selector_escaping_neutralizes_control_characters() {
        assert_eq!(escape_selector(".a\n.b"), ".a\\n.b");
        assert_eq!(escape_selector("\r\t"), "\\r\\t");
        assert_eq!(escape_selector("x\u{1}y"), "x\\u{1}y");
    }
}
