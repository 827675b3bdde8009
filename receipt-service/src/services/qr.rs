use crate::config::BankConfig;

/// Builds transfer QR image URLs against the external QR rendering service.
///
/// The service draws a scannable bank-transfer code from the query string;
/// the amount and memo must not be altered by the payer, so they are baked
/// into the image URL.
#[derive(Clone, Debug)]
pub struct QrService {
    config: BankConfig,
}

impl QrService {
    pub fn new(config: BankConfig) -> Self {
        Self { config }
    }

    /// QR image URL for a transfer of `amount` with `description` as the memo.
    pub fn transfer_qr_url(&self, amount: u64, description: &str) -> String {
        format!(
            "{}?acc={}&bank={}&amount={}&des={}&template=compact&download=0",
            self.config.qr_base_url,
            self.config.account_no,
            self.config.bank_code,
            amount,
            urlencoding::encode(description),
        )
    }
}
