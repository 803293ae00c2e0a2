use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::error::Result;

/// Traffic record for a single proxied connection
///
/// Built once the backend dial succeeds, finalized after both forwarding
/// directions have stopped, then appended to the sink and discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionMetrics {
    /// Remote address of the TLS client
    pub client_address: String,
    /// Backend address the connection was routed to
    pub target_address: String,
    /// SNI hostname the client requested (lowercased)
    pub hostname: String,
    /// Bytes forwarded backend -> client
    pub bytes_sent: u64,
    /// Bytes forwarded client -> backend
    pub bytes_received: u64,
    /// When the backend connection was established
    pub connected_at: DateTime<Utc>,
    /// When both forwarding directions had finished
    pub disconnected_at: DateTime<Utc>,
}

/// Append-only sink writing one JSON record per line
///
/// Cheap to clone; all clones share the same file handle. Writes are
/// serialized under a mutex so records from concurrent connections never
/// interleave. A sink created with `disabled()` turns every record into a
/// no-op.
#[derive(Debug, Clone, Default)]
pub struct MetricsSink {
    file: Option<Arc<Mutex<File>>>,
}

impl MetricsSink {
    /// Create a sink that drops every record
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Open (or create) the metrics file in append mode
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                crate::error::ProxyError::config_error(format!(
                    "failed opening metrics file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        Ok(Self {
            file: Some(Arc::new(Mutex::new(file))),
        })
    }

    /// Whether records will actually be written
    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// Append one record
    ///
    /// Failures are logged and swallowed: a metrics problem must never
    /// affect the connection that produced the record.
    pub fn record(&self, metrics: &ConnectionMetrics) {
        let Some(file) = &self.file else {
            return;
        };

        if let Err(e) = Self::write_record(file, metrics) {
            warn!("Failed to write metrics record: {}", e);
        }
    }

    fn write_record(file: &Mutex<File>, metrics: &ConnectionMetrics) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(metrics)?;
        line.push(b'\n');

        let mut file = file.lock();
        file.write_all(&line)
    }
}
