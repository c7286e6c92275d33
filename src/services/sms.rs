use serde_json::Value;

use crate::config::SmsConfig;
use crate::error::{AppError, AppResult};

/// Africa's Talking SMS client. Constructed only when credentials are
/// configured; callers treat `None` as "SMS disabled" and every send failure
/// as non-fatal to the triggering write.
#[derive(Clone)]
pub struct SmsClient {
    username: String,
    api_key: String,
    sender_id: String,
    client: reqwest::Client,
}

impl SmsClient {
    pub fn new(config: &SmsConfig) -> Option<Self> {
        if config.username.is_empty() || config.api_key.is_empty() {
            return None;
        }
        Some(Self {
            username: config.username.clone(),
            api_key: config.api_key.clone(),
            sender_id: config.sender_id.clone(),
            client: reqwest::Client::new(),
        })
    }

    pub async fn send(&self, phone_number: &str, message: &str) -> AppResult<()> {
        let to = format_kenyan_phone(phone_number);
        let resp = self
            .client
            .post("https://api.africastalking.com/version1/messaging")
            .header("apiKey", &self.api_key)
            .header("Accept", "application/json")
            .form(&[
                ("username", self.username.as_str()),
                ("to", to.as_str()),
                ("message", message),
                ("from", self.sender_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("SMS request failed: {e}")))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("SMS response parse failed: {e}")))?;

        if !status.is_success() {
            return Err(AppError::Gateway(format!("SMS gateway returned {status}")));
        }

        let recipient_status = body["SMSMessageData"]["Recipients"][0]["status"]
            .as_str()
            .unwrap_or("Unknown");
        if recipient_status != "Success" {
            return Err(AppError::Gateway(format!(
                "SMS not accepted: {recipient_status}"
            )));
        }
        Ok(())
    }
}

pub fn reminder_message(name: &str, chama: &str, amount: f64, frequency: &str) -> String {
    format!(
        "Hi {name}, friendly reminder: Your {frequency} contribution of KSh {amount:.0} for {chama} is due. Reply STOP to opt out."
    )
}

pub fn confirmation_message(name: &str, chama: &str, amount: f64) -> String {
    format!(
        "Hi {name}, your contribution of KSh {amount:.0} to {chama} has been received and confirmed. Thank you!"
    )
}

pub fn welcome_message(name: &str, chama: &str, amount: f64, frequency: &str) -> String {
    format!(
        "Welcome to {chama}, {name}! Your contribution amount is KSh {amount:.0} {frequency}."
    )
}

/// Normalizes a Kenyan phone number to +254 form. Unrecognized formats are
/// returned as-is.
pub fn format_kenyan_phone(phone_number: &str) -> String {
    let digits: String = phone_number.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with("254") {
        format!("+{digits}")
    } else if digits.starts_with('0') {
        format!("+254{}", &digits[1..])
    } else if digits.len() == 9 {
        format!("+254{digits}")
    } else {
        phone_number.to_string()
    }
}

/// Accepts +2547XXXXXXXX / 2547XXXXXXXX / 07XXXXXXXX / 7XXXXXXXX shapes
/// (and the 1-prefixed mobile ranges).
pub fn validate_kenyan_phone(phone_number: &str) -> bool {
    let cleaned: String = phone_number
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let local = if let Some(rest) = digits.strip_prefix("254") {
        rest
    } else if let Some(rest) = digits.strip_prefix('0') {
        rest
    } else {
        digits
    };

    local.len() == 9 && (local.starts_with('7') || local.starts_with('1'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_common_kenyan_shapes() {
        assert_eq!(format_kenyan_phone("0712345678"), "+254712345678");
        assert_eq!(format_kenyan_phone("254712345678"), "+254712345678");
        assert_eq!(format_kenyan_phone("+254 712 345 678"), "+254712345678");
        assert_eq!(format_kenyan_phone("712345678"), "+254712345678");
    }

    #[test]
    fn leaves_unrecognized_numbers_alone() {
        assert_eq!(format_kenyan_phone("12345"), "12345");
    }

    #[test]
    fn validates_mobile_ranges() {
        assert!(validate_kenyan_phone("+254712345678"));
        assert!(validate_kenyan_phone("254112345678"));
        assert!(validate_kenyan_phone("0712345678"));
        assert!(validate_kenyan_phone("712345678"));
        assert!(!validate_kenyan_phone("0812345678"));
        assert!(!validate_kenyan_phone("071234567"));
        assert!(!validate_kenyan_phone("not-a-phone"));
    }
}
