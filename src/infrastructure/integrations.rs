use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[cfg(test)]
use std::sync::{Arc, Mutex, OnceLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    pub invoice_number: Option<String>,
    pub total_cents: Option<i64>,
    pub confidence: f64,
}

#[cfg(test)]
type OcrOverride = dyn Fn(&str) -> anyhow::Result<OcrResult> + Send + Sync;

#[cfg(test)]
static OCR_OVERRIDE: OnceLock<Mutex<Option<Arc<OcrOverride>>>> = OnceLock::new();

#[cfg(test)]
pub struct OcrOverrideGuard;

#[cfg(test)]
impl Drop for OcrOverrideGuard {
    fn drop(&mut self) {
        if let Some(cell) = OCR_OVERRIDE.get() {
            if let Ok(mut guard) = cell.lock() {
                *guard = None;
            }
        }
    }
}

#[cfg(test)]
pub fn install_ocr_override<F>(override_fn: F) -> OcrOverrideGuard
where
    F: Fn(&str) -> anyhow::Result<OcrResult> + Send + Sync + 'static,
{
    let cell = OCR_OVERRIDE.get_or_init(|| Mutex::new(None));
    let mut guard = cell.lock().expect("ocr override mutex poisoned");
    *guard = Some(Arc::new(override_fn));
    OcrOverrideGuard
}

/// Extracts structured fields from an uploaded invoice document. Stub
/// implementation; production wiring integrates with a document OCR
/// processor keyed by `document_key`.
pub async fn extract_invoice_fields(document_key: &str) -> anyhow::Result<OcrResult> {
    #[cfg(test)]
    {
        if let Some(override_fn) = OCR_OVERRIDE
            .get()
            .and_then(|cell| cell.lock().ok().and_then(|guard| guard.as_ref().cloned()))
        {
            return override_fn(document_key);
        }
    }

    info!(document_key, "ocr extraction stub invoked");
    Ok(OcrResult {
        invoice_number: None,
        total_cents: None,
        confidence: 0.0,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationOutcome {
    pub delivered: bool,
}

/// Sends a transactional email (approval requests, digests). Stub
/// implementation; production wiring integrates with an outbound email
/// provider.
pub async fn send_email(to_address: &str, subject: &str) -> anyhow::Result<NotificationOutcome> {
    info!(to_address, subject, "email notification stub invoked");
    Ok(NotificationOutcome { delivered: true })
}

/// Sends a push notification to a user's registered device token. Stub
/// implementation; production wiring integrates with a push provider.
pub async fn send_push(user_id: Uuid, fcm_token: &str, title: &str) -> anyhow::Result<NotificationOutcome> {
    info!(%user_id, fcm_token, title, "push notification stub invoked");
    Ok(NotificationOutcome { delivered: true })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentWebhookEvent {
    pub invoice_id: Uuid,
    pub paid: bool,
    pub reference: Option<String>,
}

/// Verifies and parses an inbound payment-gateway webhook payload. Stub
/// implementation that trusts the payload as-is; production wiring
/// verifies the gateway's signature header against `payment_webhook_secret`.
pub fn parse_payment_webhook(body: &[u8]) -> anyhow::Result<PaymentWebhookEvent> {
    serde_json::from_slice(body).map_err(|err| anyhow::anyhow!("invalid payment webhook payload: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extract_invoice_fields_stub_returns_zero_confidence() {
        let result = extract_invoice_fields("tenant/doc.pdf").await.unwrap();
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn extract_invoice_fields_honors_override() {
        let _guard = install_ocr_override(|_key| {
            Ok(OcrResult {
                invoice_number: Some("INV-1".to_string()),
                total_cents: Some(1234),
                confidence: 0.92,
            })
        });
        let result = extract_invoice_fields("tenant/doc.pdf").await.unwrap();
        assert_eq!(result.invoice_number.as_deref(), Some("INV-1"));
    }

    #[test]
    fn parse_payment_webhook_rejects_malformed_payload() {
        assert!(parse_payment_webhook(b"not json").is_err());
    }
}
