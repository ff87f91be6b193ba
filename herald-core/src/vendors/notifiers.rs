//! Breach notifiers. Each one checks the occurrence flag before acting so a
//! spurious call outside a round does nothing.

use std::sync::Arc;

use tracing::info;

use crate::error::CoreResult;
use crate::observer::handler::Handler;
use crate::observer::observable::Observable;
use crate::vendors::sink::Sink;

fn notify(sink: &dyn Sink, channel: &str, subject: &Observable) -> CoreResult<()> {
    if !subject.is_occurred() {
        return Ok(());
    }

    let message = subject.payload().unwrap_or_default();
    sink.deliver(&format!(
        "Security breach notification via {channel} - {message}"
    ))
}

/// Mails the security head and keeps a log line.
pub struct MailNotifier {
    sink: Arc<dyn Sink>,
}

impl MailNotifier {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink }
    }
}

impl Handler for MailNotifier {
    fn respond_to(&self, subject: &Observable) -> CoreResult<()> {
        notify(self.sink.as_ref(), "email", subject)?;
        if subject.is_occurred() {
            info!(payload = ?subject.payload(), "breach mailed");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mail"
    }
}

pub struct SmsNotifier {
    sink: Arc<dyn Sink>,
}

impl SmsNotifier {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink }
    }
}

impl Handler for SmsNotifier {
    fn respond_to(&self, subject: &Observable) -> CoreResult<()> {
        notify(self.sink.as_ref(), "sms", subject)
    }

    fn name(&self) -> &'static str {
        "sms"
    }
}

/// Log-only responder.
pub struct LogNotifier {
    sink: Arc<dyn Sink>,
}

impl LogNotifier {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink }
    }
}

impl Handler for LogNotifier {
    fn respond_to(&self, subject: &Observable) -> CoreResult<()> {
        notify(self.sink.as_ref(), "log", subject)
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
