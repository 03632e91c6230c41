//! Video analysis jobs.
//!
//! Each job runs on its own tokio task: ffmpeg streams sampled frames, every
//! frame is classified on the blocking pool, and the per-frame summary is
//! folded into the job's report as it arrives, so polling clients see partial
//! results. A stop request flips the job's watch channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moodlens_media::{FaceAnalyzer, FrameSampler, MediaError, SampleEnd, SampleOptions};
use moodlens_models::{FrameSummary, JobId, JobState, LabelCounts, Taxonomy, VideoJobStatus, VideoReport};
use tempfile::NamedTempFile;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::history::{History, HistoryEntry};
use crate::metrics;

/// Finished jobs expire after this long.
const FINISHED_JOB_TTL: Duration = Duration::from_secs(3600);

struct JobEntry {
    status: VideoJobStatus,
    cancel_tx: watch::Sender<bool>,
    /// Finish order and time, set once the job is terminal
    finished: Option<(u64, Instant)>,
}

#[derive(Default)]
struct JobTable {
    entries: HashMap<JobId, JobEntry>,
    finished_count: u64,
}

/// In-memory job table.
///
/// Queued and running jobs are always kept. Finished jobs stay pollable
/// until they expire or more than `max_finished` of them pile up, oldest
/// first.
pub struct JobRegistry {
    jobs: RwLock<JobTable>,
    max_finished: usize,
    ttl: Duration,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(100)
    }
}

impl JobRegistry {
    pub fn new(max_finished: usize) -> Self {
        Self {
            jobs: RwLock::new(JobTable::default()),
            max_finished,
            ttl: FINISHED_JOB_TTL,
        }
    }

    /// Override how long finished jobs are kept.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Register a queued job. The receiver is the job's stop signal.
    pub async fn create(
        &self,
        filename: impl Into<String>,
        taxonomy: Taxonomy,
        frame_skip: u32,
    ) -> (JobId, watch::Receiver<bool>) {
        let id = JobId::new();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let status = VideoJobStatus::new(id.clone(), filename, VideoReport::new(taxonomy, frame_skip));

        let mut jobs = self.jobs.write().await;
        self.prune(&mut jobs);
        jobs.entries.insert(
            id.clone(),
            JobEntry {
                status,
                cancel_tx,
                finished: None,
            },
        );
        (id, cancel_rx)
    }

    pub async fn get(&self, id: &JobId) -> Option<VideoJobStatus> {
        self.jobs.read().await.entries.get(id).map(|e| e.status.clone())
    }

    /// Apply `f` to a job's status. Returns false for unknown jobs.
    pub async fn update<F>(&self, id: &JobId, f: F) -> bool
    where
        F: FnOnce(&mut VideoJobStatus),
    {
        let mut jobs = self.jobs.write().await;
        let table = &mut *jobs;
        let Some(entry) = table.entries.get_mut(id) else {
            return false;
        };

        f(&mut entry.status);
        if entry.status.state.is_terminal() && entry.finished.is_none() {
            table.finished_count += 1;
            entry.finished = Some((table.finished_count, Instant::now()));
            self.prune(table);
        }
        true
    }

    /// Ask a job to stop. The job task moves it to `stopped` once the frame
    /// loop notices; a job that has not started yet stops right away.
    pub async fn stop(&self, id: &JobId) -> ApiResult<JobState> {
        let mut jobs = self.jobs.write().await;
        let table = &mut *jobs;
        let entry = table
            .entries
            .get_mut(id)
            .ok_or_else(|| ApiError::not_found(format!("Job {} not found", id)))?;

        let state = entry.status.state;
        if state.is_terminal() {
            return Err(ApiError::conflict(format!("Job {} already {}", id, state)));
        }

        entry.cancel_tx.send_replace(true);
        if state == JobState::Queued {
            entry.status.transition(JobState::Stopped);
            table.finished_count += 1;
            entry.finished = Some((table.finished_count, Instant::now()));
        }
        Ok(entry.status.state)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.entries.len()
    }

    /// Drop expired finished jobs, then the oldest ones over the cap.
    fn prune(&self, table: &mut JobTable) {
        let now = Instant::now();
        table.entries.retain(|_, e| match e.finished {
            Some((_, at)) => now.duration_since(at) < self.ttl,
            None => true,
        });

        let mut finished: Vec<(u64, JobId)> = table
            .entries
            .iter()
            .filter_map(|(id, e)| e.finished.map(|(seq, _)| (seq, id.clone())))
            .collect();
        if finished.len() > self.max_finished {
            finished.sort_unstable_by_key(|(seq, _)| *seq);
            let to_remove = finished.len() - self.max_finished;
            for (_, id) in finished.into_iter().take(to_remove) {
                table.entries.remove(&id);
            }
            debug!("Evicted {} finished video jobs", to_remove);
        }
    }
}

/// Everything a job task needs.
#[derive(Clone)]
pub struct VideoJob {
    pub id: JobId,
    pub filename: String,
    pub options: SampleOptions,
    pub analyzer: Arc<FaceAnalyzer>,
    pub jobs: Arc<JobRegistry>,
    pub history: Arc<History>,
}

impl VideoJob {
    /// Analyze the uploaded video held in `upload`. The temp file is removed
    /// when this returns.
    pub async fn run(self, upload: NamedTempFile, cancel_rx: watch::Receiver<bool>) {
        if *cancel_rx.borrow() {
            info!(job_id = %self.id, "Job stopped before it started");
            self.finish(JobState::Stopped, None).await;
            return;
        }

        self.jobs
            .update(&self.id, |s| {
                if s.state == JobState::Queued {
                    s.transition(JobState::Running);
                }
            })
            .await;
        info!(job_id = %self.id, filename = %self.filename, "Video job started");

        let sampler = FrameSampler::new(upload.path(), self.options).with_cancel(cancel_rx);
        let result = sampler
            .run(|frame| {
                let analyzer = Arc::clone(&self.analyzer);
                let jobs = Arc::clone(&self.jobs);
                let id = self.id.clone();
                async move {
                    let (index, timestamp) = (frame.index, frame.timestamp);
                    let faces = tokio::task::spawn_blocking(move || analyzer.analyze_rgb(&frame.image))
                        .await
                        .map_err(|e| MediaError::internal(format!("frame task failed: {}", e)))??;

                    let summary = FrameSummary {
                        frame_index: index,
                        timestamp,
                        faces: faces.len(),
                        counts: LabelCounts::from_faces(&faces),
                    };
                    jobs.update(&id, |s| s.report.push_frame(summary)).await;
                    metrics::record_frame_analyzed();
                    Ok(())
                }
            })
            .await;

        match result {
            Ok(outcome) => {
                let state = match outcome.end {
                    SampleEnd::Stopped => JobState::Stopped,
                    SampleEnd::Finished | SampleEnd::FrameCap => JobState::Completed,
                };
                info!(
                    job_id = %self.id,
                    frames = outcome.frames,
                    state = %state,
                    "Video job finished"
                );
                self.finish(state, None).await;
            }
            Err(MediaError::Cancelled) => self.finish(JobState::Stopped, None).await,
            Err(e) => {
                warn!(job_id = %self.id, "Video job failed: {}", e);
                self.finish(JobState::Failed, Some(e.to_string())).await;
            }
        }
    }

    async fn finish(&self, state: JobState, error: Option<String>) {
        let mut summary = String::new();
        self.jobs
            .update(&self.id, |s| {
                match error {
                    Some(err) => s.fail(err),
                    None => s.transition(state),
                }
                summary = s.report.summary.clone();
            })
            .await;

        metrics::record_job_finished(state.as_str());

        if state != JobState::Failed {
            self.history
                .push(HistoryEntry::video(self.id.as_str(), &self.filename, summary))
                .await;
        }
    }
}
