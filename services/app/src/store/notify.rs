//! services/app/src/store/notify.rs
//!
//! Transient user-facing notices. Store failures are never fatal; they are
//! logged and pushed onto this channel for whatever front end is attached.

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// A broadcast channel of notices. Cloning shares the channel; sending with
/// no subscribers is fine.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn error(&self, message: impl Into<String>) {
        let _ = self.tx.send(Notice { level: NoticeLevel::Error, message: message.into() });
    }

    pub fn info(&self, message: impl Into<String>) {
        let _ = self.tx.send(Notice { level: NoticeLevel::Info, message: message.into() });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
