use base64::Engine;
use chrono::Utc;
use serde_json::Value;

use crate::config::MpesaConfig;
use crate::error::{AppError, AppResult};
use crate::services::sms::format_kenyan_phone;

/// Lightweight M-Pesa (Daraja) client wrapping raw HTTP calls: OAuth
/// client-credentials token plus the STK push used by the contribution flow.
#[derive(Clone)]
pub struct MpesaClient {
    consumer_key: String,
    consumer_secret: String,
    shortcode: String,
    passkey: String,
    base_url: String,
    callback_url: String,
    client: reqwest::Client,
}

/// Gateway acknowledgment of an STK push. An ack only means the push was
/// queued; settlement arrives later on the callback.
#[derive(Debug)]
pub struct StkPushAck {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
}

impl MpesaClient {
    pub fn new(config: &MpesaConfig) -> Option<Self> {
        if config.consumer_key.is_empty() || config.consumer_secret.is_empty() {
            return None;
        }
        Some(Self {
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
            shortcode: config.shortcode.clone(),
            passkey: config.passkey.clone(),
            base_url: config.base_url.clone(),
            callback_url: config.callback_url.clone(),
            client: reqwest::Client::new(),
        })
    }

    async fn access_token(&self) -> AppResult<String> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.base_url
        );
        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("M-Pesa token request failed: {e}")))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("M-Pesa token parse failed: {e}")))?;

        if !status.is_success() {
            return Err(AppError::Gateway(format!(
                "M-Pesa token endpoint returned {status}"
            )));
        }

        body["access_token"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| AppError::Gateway("M-Pesa token missing in response".into()))
    }

    pub async fn initiate_stk_push(
        &self,
        phone_number: &str,
        amount: f64,
        account_reference: &str,
        description: &str,
    ) -> AppResult<StkPushAck> {
        let token = self.access_token().await?;

        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let password = base64::engine::general_purpose::STANDARD
            .encode(format!("{}{}{}", self.shortcode, self.passkey, timestamp));
        let msisdn = format_kenyan_phone(phone_number).replace('+', "");

        let payload = serde_json::json!({
            "BusinessShortCode": self.shortcode,
            "Password": password,
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": amount as i64,
            "PartyA": msisdn,
            "PartyB": self.shortcode,
            "PhoneNumber": msisdn,
            "CallBackURL": self.callback_url,
            "AccountReference": account_reference,
            "TransactionDesc": description,
        });

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("STK push request failed: {e}")))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("STK push parse failed: {e}")))?;

        if !status.is_success() {
            let msg = body["errorMessage"].as_str().unwrap_or("Unknown M-Pesa error");
            return Err(AppError::Gateway(format!("STK push rejected: {msg}")));
        }

        Ok(StkPushAck {
            merchant_request_id: body["MerchantRequestID"].as_str().unwrap_or("").to_string(),
            checkout_request_id: body["CheckoutRequestID"].as_str().unwrap_or("").to_string(),
        })
    }
}
