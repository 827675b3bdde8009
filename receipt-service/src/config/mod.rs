use anyhow::Result;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub bank: BankConfig,
    pub browser: BrowserSettings,
    pub service_name: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    /// Port 0 binds an ephemeral port; the bound port is written back after
    /// binding so handlers can build self-referencing URLs.
    pub port: u16,
}

/// Receiving account shown on the receipt and encoded into the QR URL.
#[derive(Clone, Debug)]
pub struct BankConfig {
    pub account_no: String,
    pub bank_code: String,
    pub bank_name: String,
    pub account_holder: String,
    pub qr_base_url: String,
}

/// Headless-browser tuning for the PDF pipeline.
#[derive(Clone, Debug)]
pub struct BrowserSettings {
    /// Explicit Chromium binary; probed paths are used when unset.
    pub executable: Option<PathBuf>,
    /// CDP request timeout; bounds the printToPDF call itself.
    pub request_timeout_secs: u64,
    pub nav_timeout_secs: u64,
    pub content_nav_timeout_secs: u64,
    pub qr_wait_secs: u64,
    pub content_qr_wait_secs: u64,
    /// Per-image cap inside the page's image-load wait script.
    pub image_wait_secs: u64,
    /// Extra delay after the QR wait so the image finishes painting.
    pub settle_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("RECEIPT_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("RECEIPT_SERVICE_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;

        let bank = BankConfig {
            account_no: env::var("RECEIPT_BANK_ACCOUNT")
                .unwrap_or_else(|_| "1058526128".to_string()),
            bank_code: env::var("RECEIPT_BANK_CODE").unwrap_or_else(|_| "VCB".to_string()),
            bank_name: env::var("RECEIPT_BANK_NAME").unwrap_or_else(|_| "Vietcombank".to_string()),
            account_holder: env::var("RECEIPT_ACCOUNT_HOLDER")
                .unwrap_or_else(|_| "DOANH NGHIEP TU NHAN Y99".to_string()),
            qr_base_url: env::var("RECEIPT_QR_BASE_URL")
                .unwrap_or_else(|_| "https://qr.sepay.vn/img".to_string()),
        };

        let browser = BrowserSettings {
            executable: env::var("RECEIPT_CHROME_PATH").ok().map(PathBuf::from),
            request_timeout_secs: env_u64("RECEIPT_BROWSER_REQUEST_TIMEOUT_SECS", 60),
            nav_timeout_secs: env_u64("RECEIPT_NAV_TIMEOUT_SECS", 45),
            content_nav_timeout_secs: env_u64("RECEIPT_CONTENT_NAV_TIMEOUT_SECS", 20),
            qr_wait_secs: env_u64("RECEIPT_QR_WAIT_SECS", 30),
            content_qr_wait_secs: env_u64("RECEIPT_CONTENT_QR_WAIT_SECS", 15),
            image_wait_secs: env_u64("RECEIPT_IMAGE_WAIT_SECS", 10),
            settle_delay_ms: env_u64("RECEIPT_SETTLE_DELAY_MS", 1000),
        };

        Ok(Self {
            server: ServerConfig { host, port },
            bank,
            browser,
            service_name: "receipt-service".to_string(),
        })
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_falls_back_to_defaults() {
        let config = Config::from_env().unwrap();

        assert_eq!(config.bank.bank_code, "VCB");
        assert_eq!(config.bank.qr_base_url, "https://qr.sepay.vn/img");
        assert_eq!(config.browser.qr_wait_secs, 30);
        assert_eq!(config.browser.settle_delay_ms, 1000);
        assert_eq!(config.service_name, "receipt-service");
    }
}
