//! Twilio Messages API transport.
//!
//! One `POST /2010-04-01/Accounts/{sid}/Messages.json` per message, form
//! encoded, HTTP basic auth with the account SID and auth token. WhatsApp
//! uses the same endpoint with `whatsapp:`-prefixed addresses.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use super::{Channel, MessageSender};
use crate::config::MessagingSettings;

const API_VERSION: &str = "2010-04-01";
const WHATSAPP_PREFIX: &str = "whatsapp:";

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    code: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

/// `MessageSender` backed by the Twilio REST API.
pub struct TwilioSender {
    settings: MessagingSettings,
    agent: ureq::Agent,
}

impl TwilioSender {
    pub fn new(settings: MessagingSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(settings.timeout)
            .user_agent(concat!("parking-watch/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { settings, agent }
    }

    /// Messages endpoint and `Authorization` value for the configured account.
    fn endpoint(&self) -> Result<(Url, Zeroizing<String>)> {
        let sid = required(self.settings.account_sid.as_deref(), "TWILIO_ACCOUNT_SID")?;
        let token = required(
            self.settings.auth_token.as_deref().map(String::as_str),
            "TWILIO_AUTH_TOKEN",
        )?;
        let url = messages_endpoint(&self.settings.api_base, sid)?;
        Ok((url, basic_auth(sid, token)))
    }

    /// `(from, to)` addresses for a channel.
    fn addresses(&self, channel: Channel) -> Result<(String, String)> {
        match channel {
            Channel::WhatsApp => {
                let from = required(
                    self.settings.whatsapp_from.as_deref(),
                    "TWILIO_WHATSAPP_FROM",
                )?;
                let to = required(self.settings.whatsapp_to.as_deref(), "OWNER_WHATSAPP")?;
                Ok((whatsapp_address(from), whatsapp_address(to)))
            }
            Channel::Sms => {
                let from = required(self.settings.sms_from.as_deref(), "TWILIO_SMS_FROM")?;
                let to = required(self.settings.sms_to.as_deref(), "OWNER_SMS")?;
                Ok((from.to_string(), to.to_string()))
            }
        }
    }
}

impl MessageSender for TwilioSender {
    fn name(&self) -> &'static str {
        "twilio"
    }

    fn send(&self, channel: Channel, body: &str) -> Result<String> {
        let (from, to) = self.addresses(channel)?;
        let (endpoint, authorization) = self.endpoint()?;
        let form = [("To", to.as_str()), ("From", from.as_str()), ("Body", body)];

        let request = self
            .agent
            .post(endpoint.as_str())
            .set("Authorization", authorization.as_str());
        match request.send_form(&form) {
            Ok(response) => {
                let message: MessageResponse = response
                    .into_json()
                    .context("failed to decode twilio message response")?;
                log::debug!(
                    "twilio accepted {} message {} (status {})",
                    channel,
                    message.sid,
                    message.status.as_deref().unwrap_or("unknown")
                );
                Ok(message.sid)
            }
            Err(ureq::Error::Status(code, response)) => {
                let detail = response.into_json::<ErrorResponse>().ok();
                let message = detail
                    .as_ref()
                    .and_then(|d| d.message.clone())
                    .unwrap_or_else(|| "no error detail".to_string());
                match detail.and_then(|d| d.code) {
                    Some(twilio_code) => Err(anyhow!(
                        "twilio rejected {} message (HTTP {}, code {}): {}",
                        channel,
                        code,
                        twilio_code,
                        message
                    )),
                    None => Err(anyhow!(
                        "twilio rejected {} message (HTTP {}): {}",
                        channel,
                        code,
                        message
                    )),
                }
            }
            // Kind and message only, without the request URL.
            Err(ureq::Error::Transport(transport)) => Err(anyhow!(
                "twilio request failed ({}): {}",
                transport.kind(),
                transport.message().unwrap_or("no detail")
            )),
        }
    }
}

fn messages_endpoint(api_base: &str, account_sid: &str) -> Result<Url> {
    let mut url = Url::parse(api_base)
        .with_context(|| format!("invalid messaging api base '{}'", api_base))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("messaging api base '{}' cannot carry a path", api_base))?
        .pop_if_empty()
        .extend([API_VERSION, "Accounts", account_sid, "Messages.json"]);
    Ok(url)
}

/// `Basic` credentials over the raw SID and token; no URL escaping applies.
fn basic_auth(account_sid: &str, auth_token: &str) -> Zeroizing<String> {
    let pair = Zeroizing::new(format!("{}:{}", account_sid, auth_token));
    Zeroizing::new(format!("Basic {}", STANDARD.encode(pair.as_bytes())))
}

fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with(WHATSAPP_PREFIX) {
        number.to_string()
    } else {
        format!("{}{}", WHATSAPP_PREFIX, number)
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("{} is not configured", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_includes_account_path_without_credentials() {
        let url = messages_endpoint("https://api.twilio.com", "AC123").unwrap();
        assert_eq!(url.path(), "/2010-04-01/Accounts/AC123/Messages.json");
        assert_eq!(url.username(), "");
        assert_eq!(url.password(), None);
    }

    #[test]
    fn basic_auth_encodes_reserved_characters_verbatim() {
        assert_eq!(
            basic_auth("ACtest", "p@ss:w/rd").as_str(),
            "Basic QUN0ZXN0OnBAc3M6dy9yZA=="
        );
    }

    #[test]
    fn endpoint_tolerates_trailing_slash_base() {
        let url = messages_endpoint("http://127.0.0.1:9000/", "AC1").unwrap();
        assert_eq!(url.path(), "/2010-04-01/Accounts/AC1/Messages.json");
    }

    #[test]
    fn whatsapp_numbers_get_prefixed_once() {
        assert_eq!(whatsapp_address("+14155238886"), "whatsapp:+14155238886");
        assert_eq!(
            whatsapp_address("whatsapp:+14155238886"),
            "whatsapp:+14155238886"
        );
    }

    #[test]
    fn missing_numbers_fail_without_network() {
        let sender = TwilioSender::new(MessagingSettings {
            account_sid: Some("AC123".to_string()),
            auth_token: Some(Zeroizing::new("secret".to_string())),
            sms_from: Some("+15005550006".to_string()),
            ..MessagingSettings::default()
        });
        let err = sender.send(Channel::Sms, "hi").unwrap_err();
        assert!(err.to_string().contains("OWNER_SMS is not configured"));
        let err = sender.send(Channel::WhatsApp, "hi").unwrap_err();
        assert!(err.to_string().contains("TWILIO_WHATSAPP_FROM is not configured"));
    }

    #[test]
    fn missing_credentials_fail_without_network() {
        let sender = TwilioSender::new(MessagingSettings {
            sms_from: Some("+15005550006".to_string()),
            sms_to: Some("+15005550007".to_string()),
            ..MessagingSettings::default()
        });
        let err = sender.send(Channel::Sms, "hi").unwrap_err();
        assert!(err.to_string().contains("TWILIO_ACCOUNT_SID is not configured"));
    }
}
