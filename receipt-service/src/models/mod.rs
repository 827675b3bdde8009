use serde::{Deserialize, Serialize};

use crate::utils::{format_currency, parse_currency};

/// One payment receipt, as submitted by the form or an API caller.
///
/// Wire names are camelCase to match the form payload. Every field is
/// optional; the renderer shows blanks for missing values. Amounts are
/// grouped display strings (see [`crate::utils`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReceiptData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub late_fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_settlement: Option<bool>,
}

impl ReceiptData {
    /// Sum of the five fee components, parsed from their display strings.
    pub fn fee_sum(&self) -> u64 {
        [
            &self.principal,
            &self.interest,
            &self.management_fee,
            &self.settlement_fee,
            &self.late_fee,
        ]
        .into_iter()
        .map(|fee| parse_currency(fee.as_deref().unwrap_or("")))
        .sum()
    }

    /// Reconcile `total_amount` with the fee breakdown.
    ///
    /// A positive fee sum always wins over the submitted total. With all fees
    /// empty or zero, a directly entered total is kept and an empty one stays
    /// empty.
    pub fn with_derived_total(mut self) -> Self {
        let sum = self.fee_sum();
        if sum > 0 {
            self.total_amount = Some(format_currency(sum));
        } else if self
            .total_amount
            .as_deref()
            .map_or(true, |total| total.trim().is_empty())
        {
            self.total_amount = None;
        }
        self
    }

    /// Integer amount encoded into the transfer QR.
    pub fn transfer_amount(&self) -> u64 {
        parse_currency(self.total_amount.as_deref().unwrap_or(""))
    }

    /// The settlement title is used unless the flag is explicitly false.
    pub fn is_settlement_receipt(&self) -> bool {
        self.is_settlement != Some(false)
    }
}

/// Presentation record for the receipt body template.
///
/// Fee lines hold re-formatted amounts and are empty when the fee was not
/// entered; the template hides empty lines.
#[derive(Debug, Clone)]
pub struct ReceiptView {
    pub title: &'static str,
    pub date: String,
    pub customer_name: String,
    pub customer_code: String,
    pub contract_code: String,
    pub address: String,
    pub total_amount: String,
    pub principal: String,
    pub interest: String,
    pub management_fee: String,
    pub settlement_fee: String,
    pub late_fee: String,
    pub description: String,
    pub qr_url: String,
}

pub const SETTLEMENT_TITLE: &str = "PHIẾU THU TIỀN TẤT TOÁN";
pub const RECEIPT_TITLE: &str = "PHIẾU THU TIỀN";

impl ReceiptView {
    pub fn from_data(data: &ReceiptData, qr_url: String) -> Self {
        Self {
            title: if data.is_settlement_receipt() {
                SETTLEMENT_TITLE
            } else {
                RECEIPT_TITLE
            },
            date: text(&data.date),
            customer_name: text(&data.customer_name),
            customer_code: text(&data.customer_code),
            contract_code: text(&data.contract_code),
            address: text(&data.address),
            total_amount: text(&data.total_amount),
            principal: fee_line(&data.principal),
            interest: fee_line(&data.interest),
            management_fee: fee_line(&data.management_fee),
            settlement_fee: fee_line(&data.settlement_fee),
            late_fee: fee_line(&data.late_fee),
            description: text(&data.description),
            qr_url,
        }
    }
}

fn text(field: &Option<String>) -> String {
    field.clone().unwrap_or_default()
}

/// Entered fees are re-formatted for display; absent fees stay empty so the
/// template can skip the line.
fn fee_line(field: &Option<String>) -> String {
    match field.as_deref() {
        Some(raw) if !raw.trim().is_empty() => format_currency(parse_currency(raw)),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_with_fees(fees: [&str; 5]) -> ReceiptData {
        let field = |s: &str| (!s.is_empty()).then(|| s.to_string());
        ReceiptData {
            principal: field(fees[0]),
            interest: field(fees[1]),
            management_fee: field(fees[2]),
            settlement_fee: field(fees[3]),
            late_fee: field(fees[4]),
            ..Default::default()
        }
    }

    #[test]
    fn positive_fee_sum_overrides_total() {
        let combos: [[&str; 5]; 4] = [
            ["1.000", "", "", "", ""],
            ["1.000.000", "200.000", "", "", ""],
            ["", "", "50.000", "30.000", "20.000"],
            ["1", "2", "3", "4", "5"],
        ];
        for fees in combos {
            let mut data = data_with_fees(fees);
            data.total_amount = Some("7".to_string());
            let sum = data.fee_sum();
            assert!(sum > 0);

            let normalized = data.with_derived_total();
            assert_eq!(
                normalized.total_amount.as_deref(),
                Some(format_currency(sum).as_str())
            );
        }
    }

    #[test]
    fn empty_fees_keep_total_empty() {
        let data = data_with_fees(["", "", "", "", ""]);
        let normalized = data.with_derived_total();
        assert_eq!(normalized.total_amount, None);
    }

    #[test]
    fn zero_fees_preserve_entered_total() {
        let mut data = data_with_fees(["0", "0", "", "", ""]);
        data.total_amount = Some("5.000.000".to_string());
        let normalized = data.with_derived_total();
        assert_eq!(normalized.total_amount.as_deref(), Some("5.000.000"));
    }

    #[test]
    fn transfer_amount_parses_display_string() {
        let data = ReceiptData {
            total_amount: Some("1.234.567".to_string()),
            ..Default::default()
        };
        assert_eq!(data.transfer_amount(), 1_234_567);
        assert_eq!(ReceiptData::default().transfer_amount(), 0);
    }

    #[test]
    fn settlement_flag_defaults_to_settlement_title() {
        assert!(ReceiptData::default().is_settlement_receipt());
        let explicit = ReceiptData {
            is_settlement: Some(false),
            ..Default::default()
        };
        assert!(!explicit.is_settlement_receipt());
    }

    #[test]
    fn view_formats_fee_lines_and_hides_absent_ones() {
        let mut data = data_with_fees(["1000000", "", "", "", ""]);
        data.total_amount = Some("1.000.000".to_string());
        data.customer_name = Some("Nguyễn Văn A".to_string());

        let view = ReceiptView::from_data(&data, "https://example.test/qr".to_string());

        assert_eq!(view.title, SETTLEMENT_TITLE);
        assert_eq!(view.principal, "1.000.000");
        assert!(view.interest.is_empty());
        assert_eq!(view.customer_name, "Nguyễn Văn A");
        assert_eq!(view.qr_url, "https://example.test/qr");
    }

    #[test]
    fn wire_format_is_camel_case() {
        let json = r#"{"customerName":"A","managementFee":"1.000","isSettlement":false}"#;
        let data: ReceiptData = serde_json::from_str(json).unwrap();
        assert_eq!(data.customer_name.as_deref(), Some("A"));
        assert_eq!(data.management_fee.as_deref(), Some("1.000"));
        assert_eq!(data.is_settlement, Some(false));

        let round = serde_json::to_string(&data).unwrap();
        assert!(round.contains("customerName"));
        assert!(round.contains("managementFee"));
    }
}
