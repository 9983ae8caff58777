//! Outbound channel back to the user who invoked a command.

use anyhow::Result;
use async_trait::async_trait;

/// Where a command's output goes.
#[async_trait]
pub trait Reply: Send + Sync {
    /// Let the user know the command was received and work is underway.
    async fn acknowledge(&self) -> Result<()>;

    /// Send a message to the channel the command came from.
    async fn say(&self, text: &str) -> Result<()>;

    /// Send a direct message to the invoking user.
    async fn direct_message(&self, text: &str) -> Result<()>;
}

#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use super::Reply;

    /// Records everything sent through it.
    #[derive(Debug, Default)]
    pub struct RecordingReply {
        acks: AtomicUsize,
        messages: Mutex<Vec<String>>,
        direct: Mutex<Vec<String>>,
        dms_closed: bool,
    }

    impl RecordingReply {
        pub fn new() -> Self {
            Self::default()
        }

        /// A user who does not accept direct messages.
        pub fn with_dms_closed() -> Self {
            Self {
                dms_closed: true,
                ..Self::default()
            }
        }

        pub fn acks(&self) -> usize {
            self.acks.load(Ordering::SeqCst)
        }

        pub fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }

        pub fn last(&self) -> String {
            self.messages().last().cloned().unwrap_or_default()
        }

        pub fn direct_messages(&self) -> Vec<String> {
            self.direct.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Reply for RecordingReply {
        async fn acknowledge(&self) -> Result<()> {
            self.acks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn say(&self, text: &str) -> Result<()> {
            self.messages.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn direct_message(&self, text: &str) -> Result<()> {
            if self.dms_closed {
                bail!("Cannot send messages to this user");
            }
            self.direct.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }
}
