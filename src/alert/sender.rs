/// Outbound alert delivery
use log::{debug, info};
use std::future::Future;

use crate::error::ProcessError;

/// Sends a text message back to the user who triggered an event
pub trait AlertSender {
    fn send(
        &self,
        reply_token: &str,
        message: &str,
    ) -> impl Future<Output = Result<(), ProcessError>> + Send;
}

/// Sender that writes alerts to the service log
///
/// Holds the messaging credential so that an HTTP sender can be swapped in
/// without touching configuration handling.
pub struct LogAlertSender {
    access_token: String,
}

impl LogAlertSender {
    pub fn new(access_token: impl Into<String>) -> Self {
        LogAlertSender {
            access_token: access_token.into(),
        }
    }
}

impl AlertSender for LogAlertSender {
    async fn send(&self, reply_token: &str, message: &str) -> Result<(), ProcessError> {
        let token_hint: String = self.access_token.chars().take(4).collect();
        debug!("Alert authorised with channel token {}...", token_hint);
        info!("Alert for reply token {}: {}", reply_token, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_sender_always_succeeds() {
        let sender = LogAlertSender::new("token");
        assert_eq!(sender.send("reply", "The bike has moved.").await, Ok(()));
    }
}
