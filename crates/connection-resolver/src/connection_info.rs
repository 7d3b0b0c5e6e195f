use crate::error::{ConnectionError, ConnectionResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of a successful resolution: the winning protocol and its URLs.
///
/// Immutable. `update_heartbeat`, `set_as_disconnected` and `add_info` return
/// a new value with the remaining fields carried forward.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    stream_url: String,
    snapshot_url: Option<String>,
    backup_stream_url: Option<String>,
    is_connected: bool,
    connected_at: DateTime<Utc>,
    last_heartbeat: Option<DateTime<Utc>>,
    connection_type: String,
    additional_info: BTreeMap<String, String>,
}

impl ConnectionInfo {
    pub fn new(
        stream_url: impl Into<String>,
        connection_type: impl Into<String>,
        is_connected: bool,
    ) -> ConnectionResult<Self> {
        let stream_url = stream_url.into();
        let connection_type = connection_type.into();

        if stream_url.trim().is_empty() {
            return Err(ConnectionError::InvalidConnectionInfo(
                "stream URL cannot be empty".to_string(),
            ));
        }
        if connection_type.trim().is_empty() {
            return Err(ConnectionError::InvalidConnectionInfo(
                "connection type cannot be empty".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            stream_url,
            snapshot_url: None,
            backup_stream_url: None,
            is_connected,
            connected_at: now,
            last_heartbeat: is_connected.then_some(now),
            connection_type,
            additional_info: BTreeMap::new(),
        })
    }

    pub fn with_snapshot_url(mut self, url: Option<String>) -> Self {
        self.snapshot_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn with_backup_stream_url(mut self, url: Option<String>) -> Self {
        self.backup_stream_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn snapshot_url(&self) -> Option<&str> {
        self.snapshot_url.as_deref()
    }

    pub fn backup_stream_url(&self) -> Option<&str> {
        self.backup_stream_url.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat
    }

    pub fn connection_type(&self) -> &str {
        &self.connection_type
    }

    pub fn additional_info(&self) -> &BTreeMap<String, String> {
        &self.additional_info
    }

    pub fn info(&self, key: &str) -> Option<&str> {
        self.additional_info.get(key).map(String::as_str)
    }

    /// Confirm the connection is alive now.
    ///
    /// The heartbeat never moves backwards, even if the wall clock does.
    pub fn update_heartbeat(&self) -> Self {
        let now = Utc::now();
        let heartbeat = match self.last_heartbeat {
            Some(previous) if previous > now => previous,
            _ => now,
        };

        Self {
            is_connected: true,
            last_heartbeat: Some(heartbeat),
            ..self.clone()
        }
    }

    /// Mark the connection as lost; the last heartbeat is retained
    pub fn set_as_disconnected(&self) -> Self {
        Self {
            is_connected: false,
            ..self.clone()
        }
    }

    pub fn add_info(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.additional_info.insert(key.into(), value.into());
        next
    }
}

fn eq_opt_ignore_case(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (None, None) => true,
        _ => false,
    }
}

impl PartialEq for ConnectionInfo {
    fn eq(&self, other: &Self) -> bool {
        self.stream_url.eq_ignore_ascii_case(&other.stream_url)
            && eq_opt_ignore_case(self.snapshot_url(), other.snapshot_url())
            && eq_opt_ignore_case(self.backup_stream_url(), other.backup_stream_url())
            && self.is_connected == other.is_connected
            && self
                .connection_type
                .eq_ignore_ascii_case(&other.connection_type)
    }
}

impl Eq for ConnectionInfo {}
