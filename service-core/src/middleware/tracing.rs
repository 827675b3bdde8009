use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Ensure every request carries an `x-request-id` and echo it on the
/// response, so a PDF export can be correlated across the handler, the
/// browser pipeline, and the client.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match HeaderValue::from_str(&request_id) {
        Ok(header_value) => {
            req.headers_mut()
                .insert(REQUEST_ID_HEADER, header_value.clone());
            let mut response = next.run(req).await;
            response
                .headers_mut()
                .insert(REQUEST_ID_HEADER, header_value);
            response
        }
        // A caller-supplied id that is not a valid header value is dropped.
        Err(_) => next.run(req).await,
    }
}
