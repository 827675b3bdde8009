//! The PDF export pipeline.
//!
//! One browser per request: navigate to the render route, hand the payload
//! to the page through local storage, wait out the asynchronous QR image,
//! strip interactive chrome, and print to PDF. Every wait is individually
//! bounded; a late QR degrades to a fixed settle delay instead of failing
//! the export.

use std::time::Duration;

use anyhow::{anyhow, Context};
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::page::{PrintToPdfParams, ReloadParams};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use service_core::error::AppError;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use crate::config::BrowserSettings;
use crate::services::browser::BrowserLauncher;

/// The transfer QR image on the render routes.
const QR_SELECTOR: &str = "img[data-qr]";

/// Local-storage key the print page reads its data from.
const STORAGE_KEY: &str = "receiptData";

const A4_WIDTH_IN: f64 = 8.27;
const A4_HEIGHT_IN: f64 = 11.69;
const MM_PER_INCH: f64 = 25.4;

/// Full-page exports keep document margins; content-only exports print
/// nearly edge to edge.
const FULL_MARGIN_MM: f64 = 15.0;
const CONTENT_MARGIN_MM: f64 = 5.0;

const HIDE_CHROME_JS: &str = r#"
(() => {
  const nav = document.querySelector('nav');
  if (nav) nav.style.display = 'none';
  document.querySelectorAll('.print-hidden').forEach((el) => {
    el.style.display = 'none';
  });
})()
"#;

struct RenderPlan {
    nav_timeout: Duration,
    qr_timeout: Duration,
    margin_mm: f64,
    payload: Option<String>,
    hide_chrome: bool,
}

pub struct PdfExporter {
    launcher: BrowserLauncher,
    settings: BrowserSettings,
}

impl PdfExporter {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            launcher: BrowserLauncher::new(settings.clone()),
            settings,
        }
    }

    /// Print the interactive form page as-is.
    pub async fn export_form_page(&self, target_url: &str) -> Result<Vec<u8>, AppError> {
        let plan = RenderPlan {
            nav_timeout: Duration::from_secs(self.settings.nav_timeout_secs),
            qr_timeout: Duration::from_secs(self.settings.qr_wait_secs),
            margin_mm: FULL_MARGIN_MM,
            payload: None,
            hide_chrome: false,
        };
        self.export(target_url, plan).await
    }

    /// Print the content-only route, optionally seeding it with a payload.
    pub async fn export_content(
        &self,
        target_url: &str,
        payload: Option<String>,
    ) -> Result<Vec<u8>, AppError> {
        let plan = RenderPlan {
            nav_timeout: Duration::from_secs(self.settings.content_nav_timeout_secs),
            qr_timeout: Duration::from_secs(self.settings.content_qr_wait_secs),
            margin_mm: CONTENT_MARGIN_MM,
            payload,
            hide_chrome: true,
        };
        self.export(target_url, plan).await
    }

    async fn export(&self, target_url: &str, plan: RenderPlan) -> Result<Vec<u8>, AppError> {
        let (browser, handler) = self.launcher.launch().await?;
        let handler_task = tokio::spawn(async move {
            let mut handler = handler;
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = self.render(&browser, target_url, plan).await;
        shutdown(browser, handler_task).await;
        result.map_err(AppError::PdfRender)
    }

    async fn render(
        &self,
        browser: &Browser,
        target_url: &str,
        plan: RenderPlan,
    ) -> anyhow::Result<Vec<u8>> {
        let page = browser.new_page("about:blank").await?;
        let result = self.render_on(&page, target_url, &plan).await;
        if let Err(err) = page.close().await {
            tracing::warn!(error = %err, "failed to close page");
        }
        result
    }

    async fn render_on(
        &self,
        page: &Page,
        target_url: &str,
        plan: &RenderPlan,
    ) -> anyhow::Result<Vec<u8>> {
        timeout(plan.nav_timeout, async {
            page.goto(target_url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, anyhow::Error>(())
        })
        .await
        .context("navigation to render route timed out")??;

        if let Some(payload) = &plan.payload {
            // A failed injection is not fatal; the page falls back to a
            // blank receipt.
            if let Err(err) = self.inject_and_reload(page, payload, plan.nav_timeout).await {
                tracing::warn!(error = %err, "failed to seed receipt data");
            }
        }

        let qr_ready = async {
            self.wait_for_qr(page, plan.qr_timeout).await?;
            self.wait_for_images(page).await
        }
        .await;
        if let Err(err) = qr_ready {
            tracing::warn!(error = %err, "QR code may not be loaded");
        }
        sleep(Duration::from_millis(self.settings.settle_delay_ms)).await;

        if plan.hide_chrome {
            page.evaluate(HIDE_CHROME_JS)
                .await
                .context("failed to hide page chrome")?;
        }

        let bytes = page
            .pdf(pdf_params(plan.margin_mm))
            .await
            .context("printToPDF failed")?;
        Ok(bytes)
    }

    /// Store the payload for the page script and reload so it re-reads it.
    async fn inject_and_reload(
        &self,
        page: &Page,
        payload: &str,
        nav_timeout: Duration,
    ) -> anyhow::Result<()> {
        let script = format!(
            "localStorage.setItem('{STORAGE_KEY}', {})",
            serde_json::to_string(payload)?
        );
        page.evaluate(script).await?;

        timeout(nav_timeout, async {
            page.execute(ReloadParams::default()).await?;
            page.wait_for_navigation().await?;
            Ok::<_, anyhow::Error>(())
        })
        .await
        .context("reload after seeding data timed out")??;

        // Give the hydration script a beat to repopulate the DOM.
        sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    /// Poll until the QR image element exists.
    async fn wait_for_qr(&self, page: &Page, deadline: Duration) -> anyhow::Result<()> {
        let poll = Duration::from_millis(250);
        let started = tokio::time::Instant::now();
        loop {
            if page.find_element(QR_SELECTOR).await.is_ok() {
                return Ok(());
            }
            if started.elapsed() >= deadline {
                return Err(anyhow!(
                    "QR element {QR_SELECTOR} did not appear within {deadline:?}"
                ));
            }
            sleep(poll).await;
        }
    }

    /// Wait in-page for every image to finish; broken images resolve too and
    /// each image is capped by the configured per-image timeout.
    async fn wait_for_images(&self, page: &Page) -> anyhow::Result<()> {
        let per_image_ms = self.settings.image_wait_secs * 1000;
        let script = format!(
            r#"Promise.all(Array.from(document.images).map((img) => {{
  if (img.complete) return Promise.resolve();
  return new Promise((resolve) => {{
    img.onload = resolve;
    img.onerror = resolve;
    setTimeout(resolve, {per_image_ms});
  }});
}}))"#
        );
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .build()
            .map_err(|e| anyhow!(e))?;

        let outer = Duration::from_secs(self.settings.image_wait_secs + 5);
        timeout(outer, page.evaluate(params))
            .await
            .context("image-load wait timed out")??;
        Ok(())
    }
}

async fn shutdown(mut browser: Browser, handler_task: JoinHandle<()>) {
    if let Err(err) = browser.close().await {
        tracing::warn!(error = %err, "failed to close browser cleanly");
    }
    if let Err(err) = browser.wait().await {
        tracing::warn!(error = %err, "failed to reap browser process");
    }
    handler_task.abort();
}

fn pdf_params(margin_mm: f64) -> PrintToPdfParams {
    let margin = margin_mm / MM_PER_INCH;
    PrintToPdfParams {
        print_background: Some(true),
        paper_width: Some(A4_WIDTH_IN),
        paper_height: Some(A4_HEIGHT_IN),
        margin_top: Some(margin),
        margin_bottom: Some(margin),
        margin_left: Some(margin),
        margin_right: Some(margin),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_params_use_a4_with_requested_margins() {
        let params = pdf_params(FULL_MARGIN_MM);
        assert_eq!(params.print_background, Some(true));
        assert_eq!(params.paper_width, Some(8.27));
        assert_eq!(params.paper_height, Some(11.69));

        let margin = params.margin_top.unwrap();
        assert!((margin - 15.0 / 25.4).abs() < 1e-9);
        assert_eq!(params.margin_top, params.margin_left);
    }

    #[test]
    fn content_margins_are_tighter_than_full_page() {
        let full = pdf_params(FULL_MARGIN_MM).margin_top.unwrap();
        let content = pdf_params(CONTENT_MARGIN_MM).margin_top.unwrap();
        assert!(content < full);
    }
}
