//! Generic HTTP webhook results.

use courier_core::{DeliveryResponse, ErrorLevel};

/// Translate the HTTP status a webhook endpoint answered with.
///
/// A code other than `expect_status`, when one is set, fails; so does any
/// code outside 2xx. Failures are always retried.
#[must_use]
pub fn interpret(status_code: u16, expect_status: Option<u16>) -> DeliveryResponse {
    let status = status_code.to_string();
    if let Some(expected) = expect_status
        && expected != status_code
    {
        return DeliveryResponse::failed(
            ErrorLevel::Minor,
            format!("Expected status code {status_code} to equal {expected}"),
        )
        .with_status(status);
    }
    if !(200..300).contains(&status_code) {
        return DeliveryResponse::failed(
            ErrorLevel::Minor,
            format!("Error-level status code: {status_code}"),
        )
        .with_status(status);
    }
    DeliveryResponse::delivered(status)
}
