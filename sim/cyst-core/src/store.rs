//! Write-only persistence of what happened during a run.

use crate::{
    ip::Ipv4Address,
    message::{Message, MessageKind, Status, Time},
    session::SessionId,
};

/// A message as it was delivered to its final handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: u64,
    pub kind: MessageKind,
    pub time: Time,
    pub node: String,
    pub src_ip: Option<Ipv4Address>,
    pub dst_ip: Option<Ipv4Address>,
    pub src_service: String,
    pub dst_service: String,
    pub action: Option<String>,
    pub status: Option<Status>,
    pub content: Option<String>,
    pub session: Option<SessionId>,
    pub hops: usize,
}

impl MessageRecord {
    pub fn new(time: Time, node: &str, message: &Message) -> Self {
        Self {
            id: message.id().into_inner(),
            kind: message.kind(),
            time,
            node: node.to_string(),
            src_ip: message.src_ip(),
            dst_ip: message.dst_ip(),
            src_service: message.src_service().to_string(),
            dst_service: message.dst_service().to_string(),
            action: message.action().map(|a| a.id().to_string()),
            status: message.status(),
            content: message.content().map(str::to_string),
            session: message.session(),
            hops: message.path().count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub run_id: String,
    pub start_time_virtual: Time,
    pub end_time_virtual: Time,
    pub messages: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum DataStoreError {
    #[error("Data store backend failed: {0}")]
    Backend(String),
}

pub trait DataStore {
    fn add_message(&mut self, record: &MessageRecord) -> Result<(), DataStoreError>;
    fn add_statistics(&mut self, statistics: &Statistics) -> Result<(), DataStoreError>;
}

/// Keeps everything in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryDataStore {
    messages: Vec<MessageRecord>,
    statistics: Vec<Statistics>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[MessageRecord] {
        &self.messages
    }

    pub fn statistics(&self) -> &[Statistics] {
        &self.statistics
    }
}

impl DataStore for MemoryDataStore {
    fn add_message(&mut self, record: &MessageRecord) -> Result<(), DataStoreError> {
        self.messages.push(record.clone());
        Ok(())
    }

    fn add_statistics(&mut self, statistics: &Statistics) -> Result<(), DataStoreError> {
        self.statistics.push(statistics.clone());
        Ok(())
    }
}
