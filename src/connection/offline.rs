//! Offline device backed by a configuration snapshot
//!
//! Serves a fixed running configuration for every show command and records
//! every batch of commands it is sent instead of applying them.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

use super::{Connection, ConnectionError, ConnectionResult};

/// Device snapshot that records what it is asked to do
#[derive(Debug)]
pub struct OfflineDevice {
    identifier: String,
    running_config: String,
    /// Error message returned by `send_commands`, when set
    send_failure: Option<String>,
    queries: Mutex<Vec<String>>,
    sent: Mutex<Vec<Vec<String>>>,
    closed: AtomicBool,
}

impl OfflineDevice {
    /// Create a device serving `running_config`
    pub fn new(identifier: impl Into<String>, running_config: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            running_config: running_config.into(),
            send_failure: None,
            queries: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Load the snapshot from a file, named after the file stem
    pub fn from_file(path: &Path) -> ConnectionResult<Self> {
        let running_config = std::fs::read_to_string(path)?;
        let identifier = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "offline".to_string());
        Ok(Self::new(identifier, running_config))
    }

    /// Make every `send_commands` call fail with `message`
    pub fn failing_send(mut self, message: impl Into<String>) -> Self {
        self.send_failure = Some(message.into());
        self
    }

    /// Show commands received so far
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }

    /// Command batches received so far
    pub fn sent(&self) -> Vec<Vec<String>> {
        self.sent.lock().clone()
    }

    /// Number of `send_commands` calls, failed ones included
    pub fn send_count(&self) -> usize {
        self.sent.lock().len()
    }

    fn ensure_open(&self) -> ConnectionResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ConnectionError::ConnectionClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Connection for OfflineDevice {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn get_config(&self, command: &str) -> ConnectionResult<String> {
        self.ensure_open()?;
        trace!(device = %self.identifier, command, "Serving snapshot");
        self.queries.lock().push(command.to_string());
        Ok(self.running_config.clone())
    }

    async fn send_commands(&self, commands: &[String]) -> ConnectionResult<()> {
        self.ensure_open()?;
        debug!(device = %self.identifier, count = commands.len(), "Recording commands");
        self.sent.lock().push(commands.to_vec());
        match &self.send_failure {
            Some(message) => Err(ConnectionError::ExecutionFailed(message.clone())),
            None => Ok(()),
        }
    }

    async fn close(&self) -> ConnectionResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_serves_snapshot_and_records() {
        let device = OfflineDevice::new("r1", "interface Vlan70\n");
        assert_eq!(device.identifier(), "r1");

        let text = device.get_config("show running-config | section ^interface").await.unwrap();
        assert_eq!(text, "interface Vlan70\n");
        assert_eq!(device.queries(), vec!["show running-config | section ^interface"]);

        device
            .send_commands(&["interface Vlan70".to_string(), "standby version 2".to_string()])
            .await
            .unwrap();
        assert_eq!(device.send_count(), 1);
        assert_eq!(device.sent()[0][1], "standby version 2");
    }

    #[tokio::test]
    async fn test_failing_send() {
        let device = OfflineDevice::new("r1", "").failing_send("% Invalid input");
        let err = device.send_commands(&["vlan 10".to_string()]).await.unwrap_err();
        assert!(matches!(err, ConnectionError::ExecutionFailed(msg) if msg.contains("Invalid")));
        assert_eq!(device.send_count(), 1);
    }

    #[tokio::test]
    async fn test_closed_device_refuses() {
        let device = OfflineDevice::new("r1", "");
        device.close().await.unwrap();
        assert!(!device.is_alive().await);
        assert!(matches!(
            device.get_config("show running-config").await,
            Err(ConnectionError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edge1.cfg");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "vlan 10").unwrap();

        let device = OfflineDevice::from_file(&path).unwrap();
        assert_eq!(device.identifier(), "edge1");
        assert_eq!(device.running_config, "vlan 10\n");
    }
}
