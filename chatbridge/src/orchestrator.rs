//! Transfer orchestrator
//!
//! Runs the five-stage transfer pipeline on a background task. Progress is
//! published through a `watch` channel holding [`TransferState`] and, in order,
//! as [`TransferEvent`]s on a broadcast channel. At most one attempt runs at a
//! time; a trigger while an attempt is in flight is ignored.

use chatbridge_common::{
    ChatbridgeConfig, DeviceDescriptor, DeviceRole, DeviceSnapshot, MEDIA_SUBDIRS, PipelineStage,
    StagingLayout, TransferError, TransferErrorKind, TransferState, format_bytes,
    format_elapsed_time,
};
use chatbridge_helper::{MediaCopyReport, ToolLocator, audit, copy_media};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};

use crate::collaborators::{AdbBackup, IdeviceRestore, SourceBackup, TargetRestore};
use crate::converter::{FormatConverter, StagingConverter};

const EVENT_CAPACITY: usize = 64;

/// Pauses inserted by the pipeline so each stage stays visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineTiming {
    /// Pause after each completed stage
    pub stage_delay: Duration,
    /// How long the completed state stays up before `running` clears
    pub settle_delay: Duration,
}

impl PipelineTiming {
    /// No pauses at all
    pub fn immediate() -> Self {
        Self {
            stage_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
        }
    }

    pub fn from_config(config: &ChatbridgeConfig) -> Self {
        Self {
            stage_delay: config.stage_delay(),
            settle_delay: config.settle_delay(),
        }
    }
}

/// The pluggable parts of the pipeline
#[derive(Clone)]
pub struct Collaborators {
    pub backup: Arc<dyn SourceBackup>,
    pub converter: Arc<dyn FormatConverter>,
    pub restore: Arc<dyn TargetRestore>,
}

impl Collaborators {
    /// `adb`, the staging converter and `idevicebackup2`
    pub fn system(config: &ChatbridgeConfig) -> Self {
        let locator = ToolLocator::from_env();
        let layout = config.staging_layout();

        Self {
            backup: Arc::new(AdbBackup::new(locator.clone(), config.backup_timeout())),
            converter: Arc::new(StagingConverter::new(layout.converted)),
            restore: Arc::new(IdeviceRestore::new(locator, config.restore_timeout())),
        }
    }
}

/// Ordered notifications for a transfer attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransferEvent {
    Started {
        source: String,
        target: String,
    },
    Progress {
        stage: PipelineStage,
        progress: f64,
        step: String,
        status: String,
    },
    Completed {
        elapsed_secs: f64,
    },
    Failed {
        kind: TransferErrorKind,
        message: String,
    },
}

impl TransferEvent {
    fn progress(stage: PipelineStage) -> Self {
        TransferEvent::Progress {
            stage,
            progress: stage.progress(),
            step: stage.step_label().to_string(),
            status: stage.status_label().to_string(),
        }
    }
}

/// Why a transfer trigger was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("Source device is not connected")]
    SourceDisconnected,

    #[error("Target device is not connected")]
    TargetDisconnected,
}

struct Pipeline {
    collaborators: Collaborators,
    layout: StagingLayout,
    timing: PipelineTiming,
    state: watch::Sender<TransferState>,
    events: broadcast::Sender<TransferEvent>,
}

impl Pipeline {
    fn emit(&self, event: TransferEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn run(self: Arc<Self>, source: DeviceDescriptor, target: DeviceDescriptor) {
        let started = Instant::now();
        log::info!("Starting transfer from {} to {}", source.info, target.info);
        audit::log_transfer_started(&source.info, &target.info);

        match self.execute().await {
            Ok(()) => {
                let elapsed = started.elapsed();
                self.publish(PipelineStage::Complete);
                log::info!("Transfer completed in {}", format_elapsed_time(elapsed));
                audit::log_transfer_completed(elapsed.as_secs_f64());
                self.emit(TransferEvent::Completed {
                    elapsed_secs: elapsed.as_secs_f64(),
                });

                if !self.timing.settle_delay.is_zero() {
                    tokio::time::sleep(self.timing.settle_delay).await;
                }
                self.state.send_modify(TransferState::finish);
            }
            Err(err) => {
                let stage = err.stage();
                log::error!("Transfer failed during {}: {}", stage.as_str(), err);
                audit::log_transfer_failed(stage.as_str(), &err.to_string());

                let event = TransferEvent::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                };
                self.state.send_modify(|state| state.fail(err));
                self.emit(event);
            }
        }
    }

    async fn execute(&self) -> Result<(), TransferError> {
        let staging = self
            .collaborators
            .backup
            .backup(&self.layout)
            .await
            .map_err(|e| TransferError::SourceBackupFailed(format!("{e:#}")))?;
        self.complete_stage(PipelineStage::BackupSource).await;

        if !tokio::fs::try_exists(&staging).await.unwrap_or(false) {
            return Err(TransferError::BackupNotFound(staging));
        }
        self.complete_stage(PipelineStage::ExtractSource).await;

        let converted = self.collaborators.converter.convert(&staging).await?;
        self.complete_stage(PipelineStage::ConvertFormat).await;

        self.transfer_media(&staging, &converted).await;
        self.complete_stage(PipelineStage::TransferMedia).await;

        self.collaborators
            .restore
            .restore(&converted)
            .await
            .map_err(|e| TransferError::TargetRestoreFailed(format!("{e:#}")))?;
        self.complete_stage(PipelineStage::RestoreTarget).await;

        Ok(())
    }

    async fn transfer_media(&self, staging: &Path, converted: &Path) {
        let source = staging.to_path_buf();
        let dest = converted.to_path_buf();

        let report =
            tokio::task::spawn_blocking(move || copy_media(&source, &dest, MEDIA_SUBDIRS)).await;

        match report {
            Ok(MediaCopyReport {
                subdirs_found,
                files_copied,
                bytes_copied,
                failures,
            }) => {
                log::info!(
                    "Copied {} media files ({}) from {} folders",
                    files_copied,
                    format_bytes(bytes_copied),
                    subdirs_found
                );
                if failures > 0 {
                    log::warn!("{} media entries could not be copied", failures);
                }
            }
            Err(e) => log::warn!("Media copy task failed: {}", e),
        }
    }

    fn publish(&self, stage: PipelineStage) {
        log::info!("{}", stage.step_label());
        self.state.send_modify(|state| state.apply_stage(stage));
        self.emit(TransferEvent::progress(stage));
    }

    async fn complete_stage(&self, stage: PipelineStage) {
        self.publish(stage);
        if !self.timing.stage_delay.is_zero() {
            tokio::time::sleep(self.timing.stage_delay).await;
        }
    }
}

/// Runs transfer attempts one at a time
pub struct TransferOrchestrator {
    pipeline: Arc<Pipeline>,
}

impl TransferOrchestrator {
    pub fn new(collaborators: Collaborators, layout: StagingLayout, timing: PipelineTiming) -> Self {
        let (state, _) = watch::channel(TransferState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            pipeline: Arc::new(Pipeline {
                collaborators,
                layout,
                timing,
                state,
                events,
            }),
        }
    }

    pub fn from_config(config: &ChatbridgeConfig) -> Self {
        Self::new(
            Collaborators::system(config),
            config.staging_layout(),
            PipelineTiming::from_config(config),
        )
    }

    /// Begin a transfer attempt in the background
    ///
    /// Returns `false` without touching any state if an attempt is already
    /// running. Must be called from within a tokio runtime.
    pub fn start_transfer(&self, source: DeviceDescriptor, target: DeviceDescriptor) -> bool {
        let started = self.pipeline.state.send_if_modified(|state| {
            if state.running {
                return false;
            }
            state.begin_attempt();
            true
        });

        if !started {
            log::debug!("Transfer already running, ignoring trigger");
            return false;
        }

        self.pipeline.emit(TransferEvent::Started {
            source: source.info.clone(),
            target: target.info.clone(),
        });

        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(pipeline.run(source, target));

        true
    }

    /// Start a transfer only if both devices in `snapshot` are connected
    pub fn start_from_snapshot(&self, snapshot: &DeviceSnapshot) -> Result<bool, GateError> {
        let source = snapshot
            .descriptor(DeviceRole::Source)
            .ok_or(GateError::SourceDisconnected)?;
        let target = snapshot
            .descriptor(DeviceRole::Target)
            .ok_or(GateError::TargetDisconnected)?;

        Ok(self.start_transfer(source, target))
    }

    pub fn state(&self) -> TransferState {
        self.pipeline.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransferState> {
        self.pipeline.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TransferEvent> {
        self.pipeline.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.pipeline.state.borrow().running
    }

    /// Staging directory used by every attempt
    pub fn staging_root(&self) -> &Path {
        &self.pipeline.layout.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::TARGET_DATABASE;
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use chatbridge_common::{ConversionError, DeviceStatus, pipeline::FAILED_STATUS};
    use chatbridge_helper::pull_source_backup;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct FakeBackup {
        staging: PathBuf,
        failures_left: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl SourceBackup for FakeBackup {
        async fn backup(&self, _layout: &StagingLayout) -> Result<PathBuf> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                bail!("adb: no devices/emulators found");
            }
            Ok(self.staging.clone())
        }
    }

    /// Runs the real pull with a stand-in tool
    struct ToolBackup {
        tool: PathBuf,
    }

    #[async_trait]
    impl SourceBackup for ToolBackup {
        async fn backup(&self, layout: &StagingLayout) -> Result<PathBuf> {
            pull_source_backup(&self.tool, layout, Duration::from_secs(5)).await
        }
    }

    /// Converts, then puts a directory where one media file should land
    struct BlockingConverter {
        inner: StagingConverter,
        blocked: PathBuf,
    }

    #[async_trait]
    impl FormatConverter for BlockingConverter {
        async fn convert(&self, staging: &Path) -> Result<PathBuf, ConversionError> {
            let converted = self.inner.convert(staging).await?;
            fs::create_dir_all(&self.blocked).unwrap();
            Ok(converted)
        }
    }

    #[derive(Default)]
    struct FakeRestore {
        fail: bool,
        restored: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl TargetRestore for FakeRestore {
        async fn restore(&self, converted: &Path) -> Result<()> {
            self.restored.lock().unwrap().push(converted.to_path_buf());
            if self.fail {
                bail!("device locked");
            }
            Ok(())
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        layout: StagingLayout,
        staging: PathBuf,
        restore: Arc<FakeRestore>,
        orchestrator: TransferOrchestrator,
    }

    struct HarnessBuilder {
        backup_failures: usize,
        gate: Option<Arc<Notify>>,
        restore_fails: bool,
        missing_staging: bool,
        pull_tool: Option<PathBuf>,
        blocked_media: Option<&'static str>,
    }

    impl HarnessBuilder {
        fn new() -> Self {
            Self {
                backup_failures: 0,
                gate: None,
                restore_fails: false,
                missing_staging: false,
                pull_tool: None,
                blocked_media: None,
            }
        }

        fn build(self, stage_files: &[(&str, &str)]) -> Harness {
            let dir = tempfile::tempdir().unwrap();
            let layout = StagingLayout::new(dir.path());
            let staging = layout.source_backup.join("com.whatsapp");

            if !self.missing_staging {
                for (relative, content) in stage_files {
                    let path = staging.join(relative);
                    fs::create_dir_all(path.parent().unwrap()).unwrap();
                    fs::write(path, content).unwrap();
                }
                fs::create_dir_all(&staging).unwrap();
            }

            let restore = Arc::new(FakeRestore {
                fail: self.restore_fails,
                ..Default::default()
            });
            let backup: Arc<dyn SourceBackup> = match self.pull_tool {
                Some(tool) => Arc::new(ToolBackup { tool }),
                None => Arc::new(FakeBackup {
                    staging: staging.clone(),
                    failures_left: AtomicUsize::new(self.backup_failures),
                    gate: self.gate,
                }),
            };
            let converter: Arc<dyn FormatConverter> = match self.blocked_media {
                Some(relative) => Arc::new(BlockingConverter {
                    inner: StagingConverter::new(layout.converted.clone()),
                    blocked: layout.converted.join(relative),
                }),
                None => Arc::new(StagingConverter::new(layout.converted.clone())),
            };
            let collaborators = Collaborators {
                backup,
                converter,
                restore: restore.clone(),
            };

            Harness {
                orchestrator: TransferOrchestrator::new(
                    collaborators,
                    layout.clone(),
                    PipelineTiming::immediate(),
                ),
                _dir: dir,
                layout,
                staging,
                restore,
            }
        }
    }

    const DATABASE: (&str, &str) = ("Databases/msgstore.db", "sqlite bytes");

    fn devices() -> (DeviceDescriptor, DeviceDescriptor) {
        (
            DeviceDescriptor::new(DeviceRole::Source, "Model: Pixel_7"),
            DeviceDescriptor::new(DeviceRole::Target, "Device: iPhone"),
        )
    }

    fn start(orchestrator: &TransferOrchestrator) -> bool {
        let (source, target) = devices();
        orchestrator.start_transfer(source, target)
    }

    async fn wait_until_idle(orchestrator: &TransferOrchestrator) -> TransferState {
        let mut rx = orchestrator.subscribe();
        let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| !s.running))
            .await
            .expect("transfer did not finish")
            .unwrap();
        TransferState::clone(&state)
    }

    fn drain(rx: &mut broadcast::Receiver<TransferEvent>) -> Vec<TransferEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn progress_stages(events: &[TransferEvent]) -> Vec<PipelineStage> {
        events
            .iter()
            .filter_map(|event| match event {
                TransferEvent::Progress { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_successful_transfer_publishes_every_stage() {
        let harness = HarnessBuilder::new().build(&[DATABASE, ("Media/Images/a.jpg", "img")]);
        let mut events = harness.orchestrator.subscribe_events();

        assert!(start(&harness.orchestrator));
        let state = wait_until_idle(&harness.orchestrator).await;

        assert!(!state.running);
        assert_eq!(state.progress, 1.0);
        assert_eq!(state.current_step, "Transfer complete!");
        assert_eq!(state.status_message, "Data successfully transferred");
        assert!(state.last_error.is_none());

        let events = drain(&mut events);
        assert_eq!(
            events[0],
            TransferEvent::Started {
                source: "Model: Pixel_7".to_string(),
                target: "Device: iPhone".to_string(),
            }
        );

        let expected = [
            (0.1, "Backing up source data...", "Connecting to source device..."),
            (0.3, "Extracting source database...", "Processing source backup..."),
            (
                0.5,
                "Converting database format...",
                "Converting source database to target format...",
            ),
            (
                0.7,
                "Transferring media files...",
                "Copying photos, videos, and documents...",
            ),
            (0.9, "Restoring to target device...", "Writing data to target device..."),
            (1.0, "Transfer complete!", "Data successfully transferred"),
        ];
        assert_eq!(events.len(), expected.len() + 2);
        for ((event, stage), (progress, step, status)) in events[1..=expected.len()]
            .iter()
            .zip(PipelineStage::ALL)
            .zip(expected)
        {
            assert_eq!(
                *event,
                TransferEvent::Progress {
                    stage,
                    progress,
                    step: step.to_string(),
                    status: status.to_string(),
                }
            );
        }
        assert!(matches!(events.last(), Some(TransferEvent::Completed { .. })));

        assert!(harness.layout.converted.join(TARGET_DATABASE).is_file());
        assert!(harness.layout.converted.join("Media/Images/a.jpg").is_file());
        assert_eq!(
            *harness.restore.restored.lock().unwrap(),
            vec![harness.layout.converted.clone()]
        );
    }

    #[tokio::test]
    async fn test_trigger_while_running_is_ignored() {
        let gate = Arc::new(Notify::new());
        let mut builder = HarnessBuilder::new();
        builder.gate = Some(gate.clone());
        let harness = builder.build(&[DATABASE]);

        assert!(start(&harness.orchestrator));
        tokio::task::yield_now().await;

        let before = harness.orchestrator.state();
        assert!(before.running);

        assert!(!start(&harness.orchestrator));
        assert_eq!(harness.orchestrator.state(), before);

        gate.notify_one();
        let state = wait_until_idle(&harness.orchestrator).await;
        assert_eq!(state.progress, 1.0);
        assert_eq!(harness.restore.restored.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_source_backup_failure_stops_pipeline() {
        let mut builder = HarnessBuilder::new();
        builder.backup_failures = 1;
        let harness = builder.build(&[DATABASE]);
        let mut events = harness.orchestrator.subscribe_events();

        assert!(start(&harness.orchestrator));
        let state = wait_until_idle(&harness.orchestrator).await;

        assert_eq!(state.progress, 0.0);
        assert_eq!(state.status_message, FAILED_STATUS);
        assert_eq!(
            state.last_error,
            Some(TransferError::SourceBackupFailed(
                "adb: no devices/emulators found".to_string()
            ))
        );

        let events = drain(&mut events);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1],
            TransferEvent::Failed {
                kind: TransferErrorKind::SourceBackupFailed,
                ..
            }
        ));
        assert!(harness.restore.restored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_backup_freezes_progress_after_first_stage() {
        let mut builder = HarnessBuilder::new();
        builder.missing_staging = true;
        let harness = builder.build(&[]);
        let mut events = harness.orchestrator.subscribe_events();

        assert!(start(&harness.orchestrator));
        let state = wait_until_idle(&harness.orchestrator).await;

        assert_eq!(state.progress, 0.1);
        assert_eq!(state.current_step, "Backing up source data...");
        assert_eq!(
            state.last_error,
            Some(TransferError::BackupNotFound(harness.staging.clone()))
        );

        let events = drain(&mut events);
        assert_eq!(progress_stages(&events), vec![PipelineStage::BackupSource]);
        assert!(matches!(
            events.last(),
            Some(TransferEvent::Failed {
                kind: TransferErrorKind::BackupNotFound,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_encrypted_database_fails_conversion() {
        let harness =
            HarnessBuilder::new().build(&[("Databases/msgstore.db.crypt14", "cipher")]);
        let mut events = harness.orchestrator.subscribe_events();

        assert!(start(&harness.orchestrator));
        let state = wait_until_idle(&harness.orchestrator).await;

        assert_eq!(state.progress, 0.3);
        let err = state.last_error.unwrap();
        assert_eq!(err.kind(), TransferErrorKind::EncryptedDatabase);
        assert_eq!(
            err,
            TransferError::Conversion(ConversionError::EncryptedDatabase(
                "Database is encrypted. Please decrypt it first using the key file.".to_string()
            ))
        );

        let events = drain(&mut events);
        assert_eq!(
            progress_stages(&events),
            vec![PipelineStage::BackupSource, PipelineStage::ExtractSource]
        );
        assert!(harness.restore.restored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_failure_is_last_stage_error() {
        let mut builder = HarnessBuilder::new();
        builder.restore_fails = true;
        let harness = builder.build(&[DATABASE]);
        let mut events = harness.orchestrator.subscribe_events();

        assert!(start(&harness.orchestrator));
        let state = wait_until_idle(&harness.orchestrator).await;

        assert_eq!(state.progress, 0.7);
        assert_eq!(
            state.last_error,
            Some(TransferError::TargetRestoreFailed("device locked".to_string()))
        );

        let events = drain(&mut events);
        assert_eq!(progress_stages(&events).last(), Some(&PipelineStage::TransferMedia));
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, TransferEvent::Completed { .. }))
        );
    }

    #[tokio::test]
    async fn test_media_copy_failure_does_not_block() {
        let mut builder = HarnessBuilder::new();
        builder.blocked_media = Some("Media/a.jpg");
        let harness = builder.build(&[DATABASE, ("Media/a.jpg", "a"), ("Media/b.jpg", "b")]);

        assert!(start(&harness.orchestrator));
        let state = wait_until_idle(&harness.orchestrator).await;

        assert_eq!(state.progress, 1.0);
        assert!(state.last_error.is_none());
        assert!(harness.layout.converted.join("Media/b.jpg").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_pull_ignores_previous_backup() {
        let mut builder = HarnessBuilder::new();
        // `true` exits 0 without pulling anything
        builder.pull_tool = Some(PathBuf::from("/bin/true"));
        let harness = builder.build(&[
            ("Databases/msgstore.db", "previous phone"),
            ("Media/old.jpg", "previous phone"),
        ]);
        assert!(harness.staging.join("Databases/msgstore.db").is_file());

        assert!(start(&harness.orchestrator));
        let state = wait_until_idle(&harness.orchestrator).await;

        assert_eq!(state.progress, 0.1);
        assert_eq!(
            state.last_error,
            Some(TransferError::BackupNotFound(harness.staging.clone()))
        );
        assert!(!harness.layout.converted.join(TARGET_DATABASE).exists());
        assert!(harness.restore.restored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_state_is_visible_with_failed_event() {
        let mut builder = HarnessBuilder::new();
        builder.backup_failures = 1;
        let harness = builder.build(&[DATABASE]);
        let mut events = harness.orchestrator.subscribe_events();

        assert!(start(&harness.orchestrator));

        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("no failure event")
                .unwrap();
            if let TransferEvent::Failed { kind, .. } = event {
                assert_eq!(kind, TransferErrorKind::SourceBackupFailed);
                break;
            }
        }

        let state = harness.orchestrator.state();
        assert!(!state.running);
        assert_eq!(state.status_message, FAILED_STATUS);
        assert!(state.last_error.is_some());
    }

    #[tokio::test]
    async fn test_new_attempt_clears_previous_error() {
        let mut builder = HarnessBuilder::new();
        builder.backup_failures = 1;
        let harness = builder.build(&[DATABASE]);

        assert!(start(&harness.orchestrator));
        let failed = wait_until_idle(&harness.orchestrator).await;
        assert!(failed.last_error.is_some());

        assert!(start(&harness.orchestrator));
        let restarted = harness.orchestrator.state();
        assert!(restarted.running);
        assert_eq!(restarted.progress, 0.0);
        assert!(restarted.last_error.is_none());
        assert_eq!(restarted.status_message, "Starting transfer...");

        let state = wait_until_idle(&harness.orchestrator).await;
        assert_eq!(state.progress, 1.0);
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn test_gate_requires_both_devices() {
        let harness = HarnessBuilder::new().build(&[DATABASE]);
        let mut snapshot = DeviceSnapshot::default();

        assert_eq!(
            harness.orchestrator.start_from_snapshot(&snapshot),
            Err(GateError::SourceDisconnected)
        );

        snapshot.source = DeviceStatus::connected("Model: Pixel_7");
        assert_eq!(
            harness.orchestrator.start_from_snapshot(&snapshot),
            Err(GateError::TargetDisconnected)
        );
        assert!(!harness.orchestrator.is_running());
        assert_eq!(harness.orchestrator.state(), TransferState::default());

        snapshot.target = DeviceStatus::connected("Device: iPhone");
        assert_eq!(harness.orchestrator.start_from_snapshot(&snapshot), Ok(true));
        wait_until_idle(&harness.orchestrator).await;
    }

    #[test]
    fn test_events_serialize_with_tag() {
        let json = serde_json::to_value(TransferEvent::progress(PipelineStage::ConvertFormat))
            .unwrap();
        assert_eq!(json["event"], "progress");
        assert_eq!(json["stage"], "convert_format");
        assert_eq!(json["progress"], 0.5);
    }
}
