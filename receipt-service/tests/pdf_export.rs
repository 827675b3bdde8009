//! End-to-end PDF export tests.
//!
//! These spawn the full application and drive the export endpoints, which
//! launch a headless Chromium. Run them on a machine with a browser
//! installed (or `RECEIPT_CHROME_PATH` set):
//! `cargo test -p receipt-service -- --ignored`

use receipt_service::{config::Config, Application};

struct TestApp {
    address: String,
    client: reqwest::Client,
}

impl TestApp {
    async fn spawn() -> Self {
        let mut config = Config::from_env().expect("failed to load configuration");
        config.server.port = 0;

        let application = Application::build(config)
            .await
            .expect("failed to build application");
        let address = format!("http://127.0.0.1:{}", application.port());
        tokio::spawn(application.run_until_stopped());

        Self {
            address,
            client: reqwest::Client::new(),
        }
    }
}

fn complete_payload() -> serde_json::Value {
    serde_json::json!({
        "date": "Ngày 6 tháng 8 năm 2026",
        "customerName": "Nguyễn Văn A",
        "customerCode": "KH0042",
        "contractCode": "AP0810251526",
        "address": "Cần Thơ",
        "principal": "1.000.000",
        "interest": "200.000",
        "managementFee": "50.000",
        "settlementFee": "30.000",
        "lateFee": "20.000",
        "totalAmount": "1.300.000",
        "description": "Thanh toán hợp đồng AP0810251526",
        "isSettlement": true,
    })
}

fn assert_pdf(response: &reqwest::Response) {
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/pdf")
    );
    assert!(response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .contains("phieu-thu-tien-tat-toan.pdf"));
}

#[tokio::test]
#[ignore = "Requires a Chromium installation"]
async fn content_export_returns_pdf_bytes() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/api/pdf/content", app.address))
        .json(&complete_payload())
        .send()
        .await
        .expect("failed to call export endpoint");

    assert_pdf(&response);
    let bytes = response.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
#[ignore = "Requires a Chromium installation"]
async fn content_export_via_query_string_returns_pdf_bytes() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/api/pdf/content", app.address))
        .query(&[("data", complete_payload().to_string())])
        .send()
        .await
        .expect("failed to call export endpoint");

    assert_pdf(&response);
    let bytes = response.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
#[ignore = "Requires a Chromium installation"]
async fn malformed_payload_still_produces_a_pdf() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/api/pdf/content", app.address))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("definitely not json")
        .send()
        .await
        .expect("failed to call export endpoint");

    // The page falls back to a blank receipt; the export itself succeeds.
    assert_pdf(&response);
    let bytes = response.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
#[ignore = "Requires a Chromium installation"]
async fn full_page_export_returns_pdf_bytes() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/api/pdf", app.address))
        .send()
        .await
        .expect("failed to call export endpoint");

    assert_pdf(&response);
    let bytes = response.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}
