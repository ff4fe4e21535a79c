//! Alert dispatch to the owner's messaging channels.
//!
//! The dispatcher calls the send primitive once per selected channel. A
//! failure on one channel is logged and recorded, and never stops the attempt
//! on the next one. There is no retry, backoff or dead-lettering.

pub mod twilio;

use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::Serialize;

pub use twilio::TwilioSender;

/// External messaging transport used to reach the vehicle owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    WhatsApp,
    Sms,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Channel::WhatsApp => "whatsapp",
            Channel::Sms => "sms",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which channels an alert goes out on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ChannelSelection {
    pub whatsapp: bool,
    pub sms: bool,
}

impl ChannelSelection {
    pub const BOTH: ChannelSelection = ChannelSelection {
        whatsapp: true,
        sms: true,
    };
    pub const NONE: ChannelSelection = ChannelSelection {
        whatsapp: false,
        sms: false,
    };

    /// Selected channels in send order (WhatsApp first).
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels = Vec::with_capacity(2);
        if self.whatsapp {
            channels.push(Channel::WhatsApp);
        }
        if self.sms {
            channels.push(Channel::Sms);
        }
        channels
    }

    pub fn is_empty(&self) -> bool {
        !self.whatsapp && !self.sms
    }
}

impl Default for ChannelSelection {
    fn default() -> Self {
        Self::BOTH
    }
}

impl FromStr for ChannelSelection {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let mut selection = ChannelSelection::NONE;
        for part in value.split(',').map(|p| p.trim().to_lowercase()) {
            match part.as_str() {
                "whatsapp" => selection.whatsapp = true,
                "sms" => selection.sms = true,
                "both" | "all" => selection = ChannelSelection::BOTH,
                "none" | "" => {}
                other => {
                    return Err(anyhow!(
                        "unknown alert channel '{}'; expected whatsapp, sms, both or none",
                        other
                    ))
                }
            }
        }
        Ok(selection)
    }
}

/// Send primitive for one message on one channel.
///
/// Returns a provider receipt (message id) on success.
pub trait MessageSender: Send {
    /// Transport identifier, for logs.
    fn name(&self) -> &'static str;

    fn send(&self, channel: Channel, body: &str) -> Result<String>;
}

/// Outcome of one channel attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChannelOutcome {
    pub channel: Channel,
    pub receipt: Option<String>,
    pub error: Option<String>,
}

impl ChannelOutcome {
    pub fn delivered(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.delivered()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ChannelOutcome> {
        self.outcomes.iter().filter(|o| !o.delivered())
    }
}

/// Sends formatted alerts over the selected channels.
pub struct AlertDispatcher {
    sender: Box<dyn MessageSender>,
}

impl AlertDispatcher {
    pub fn new<S: MessageSender + 'static>(sender: S) -> Self {
        Self {
            sender: Box::new(sender),
        }
    }

    pub fn sender_name(&self) -> &'static str {
        self.sender.name()
    }

    /// Send `body` once per selected channel. Never fails; per-channel errors
    /// are logged and returned in the report.
    pub fn dispatch(&self, body: &str, selection: ChannelSelection) -> DispatchReport {
        let mut report = DispatchReport::default();
        log::debug!("alert body: {}", body);
        for channel in selection.channels() {
            match self.sender.send(channel, body) {
                Ok(receipt) => {
                    log::info!(
                        "alert sent via {} ({}), receipt {}",
                        channel,
                        self.sender.name(),
                        receipt
                    );
                    report.outcomes.push(ChannelOutcome {
                        channel,
                        receipt: Some(receipt),
                        error: None,
                    });
                }
                Err(e) => {
                    log::error!("{} alert failed: {:#}", channel, e);
                    report.outcomes.push(ChannelOutcome {
                        channel,
                        receipt: None,
                        error: Some(format!("{:#}", e)),
                    });
                }
            }
        }
        report
    }
}
