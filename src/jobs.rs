//! Capture jobs: run the capture tool for a while, then turn the artifact into
//! a [`PacketGraph`].
//!
//! `create` returns as soon as the job is registered. The work happens on a
//! spawned task that only touches the registry to publish status changes, so
//! queries never wait behind a running capture.
use crate::capture::{CaptureRequest, CaptureTool, TsharkCapture};
use crate::config::CaptureConfig;
use crate::decode::{default_decoder, PacketDecoder};
use crate::error::{Error, Result};
use crate::models::domain::JobId;
use crate::models::dto::{CaptureTicket, JobSnapshot, StatusReport};
use crate::packets::{PacketGraph, PacketGraphBuilder};
use crate::registry::{CaptureJob, JobRegistry};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tracing::{debug, info, warn};

const MIN_POLL: Duration = Duration::from_millis(1);

#[derive(Clone)]
pub struct CaptureJobManager {
    registry: JobRegistry,
    tool: Arc<dyn CaptureTool>,
    decoder: Arc<dyn PacketDecoder>,
    config: CaptureConfig,
}

impl CaptureJobManager {
    pub fn new(
        config: CaptureConfig,
        tool: Arc<dyn CaptureTool>,
        decoder: Arc<dyn PacketDecoder>,
    ) -> Self {
        Self {
            registry: JobRegistry::new(),
            tool,
            decoder,
            config,
        }
    }

    /// tshark for capturing and the default decoder for parsing.
    pub fn with_defaults(config: CaptureConfig) -> Self {
        let tool = Arc::new(TsharkCapture::new(&config));
        Self::new(config, tool, default_decoder())
    }

    /// Registers a job and starts it in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create(&self, duration_secs: u64, interface: Option<String>) -> CaptureTicket {
        let duration_secs = CaptureConfig::clamp_duration(duration_secs);
        let interface = interface.filter(|i| !i.trim().is_empty());

        let job = CaptureJob::new(duration_secs, interface.clone());
        let id = job.id;
        self.registry.insert(job);
        info!(job = %id, duration_secs, interface = ?interface, "Capture job created");

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run(id, duration_secs, interface).await;
        });

        CaptureTicket {
            job_id: id,
            duration_seconds: duration_secs,
        }
    }

    pub fn status(&self, id: JobId) -> Result<StatusReport> {
        self.registry.status(id)
    }

    pub fn result(&self, id: JobId) -> Result<Arc<PacketGraph>> {
        self.registry.result(id)
    }

    pub fn snapshot(&self, id: JobId) -> Result<JobSnapshot> {
        self.registry.snapshot(id)
    }

    /// Polls until the job reaches a terminal status. A zero `poll` is raised
    /// to one millisecond.
    pub async fn wait(&self, id: JobId, poll: Duration) -> Result<StatusReport> {
        let mut interval = tokio::time::interval(poll.max(MIN_POLL));
        loop {
            interval.tick().await;
            let report = self.status(id)?;
            if report.status.is_terminal() {
                return Ok(report);
            }
        }
    }

    async fn run(&self, id: JobId, duration_secs: u64, interface: Option<String>) {
        if !self.registry.mark_running(id) {
            return;
        }

        // A panicking tool must still leave the job in a terminal state.
        let worker = self.clone();
        let outcome = tokio::spawn(async move {
            worker.capture_and_parse(id, duration_secs, interface).await
        })
        .await
        .unwrap_or_else(|e| {
            Err(Error::CaptureFailed(format!("capture task ended abnormally: {e}")))
        });

        match outcome {
            Ok(graph) => {
                info!(
                    job = %id,
                    hosts = graph.node_count(),
                    connections = graph.edge_count(),
                    "Capture job completed"
                );
                self.registry.complete(id, Arc::new(graph));
            }
            Err(e) => {
                warn!(job = %id, "Capture job failed: {e}");
                self.registry.fail(id, &e);
            }
        }
    }

    async fn capture_and_parse(
        &self,
        id: JobId,
        duration_secs: u64,
        interface: Option<String>,
    ) -> Result<PacketGraph> {
        let artifact = tempfile::Builder::new()
            .prefix("netmapper-")
            .suffix(".pcapng")
            .tempfile()
            .map_err(|e| Error::CaptureFailed(format!("cannot create capture file: {e}")))?
            .into_temp_path();

        let outcome = self.capture_into(&artifact, duration_secs, interface).await;
        let outcome = match outcome {
            Ok(()) => self.parse(&artifact).await,
            Err(e) => Err(e),
        };

        discard(id, artifact);
        outcome
    }

    async fn capture_into(
        &self,
        artifact: &TempPath,
        duration_secs: u64,
        interface: Option<String>,
    ) -> Result<()> {
        let request = CaptureRequest {
            duration: Duration::from_secs(duration_secs),
            interface: interface.unwrap_or_else(|| self.config.default_interface.clone()),
            output: artifact.to_path_buf(),
        };
        let deadline = self.config.deadline(duration_secs);

        match tokio::time::timeout(deadline, self.tool.capture(&request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CaptureTimeout(deadline)),
        }
    }

    async fn parse(&self, artifact: &TempPath) -> Result<PacketGraph> {
        let decoder = Arc::clone(&self.decoder);
        let path = artifact.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let packets = decoder.decode(&path)?;
            PacketGraphBuilder::from_stream(packets)
        })
        .await
        .map_err(|e| Error::ParseFailed(format!("decoder task ended abnormally: {e}")))?
    }
}

/// Removes the capture artifact; failures are only logged.
fn discard(id: JobId, artifact: TempPath) {
    let path = artifact.to_path_buf();
    if let Err(e) = artifact.close() {
        debug!(job = %id, "Could not remove {}: {e}", path.display());
    }
}
