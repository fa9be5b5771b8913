//! In-memory job table with a bounded worker pool.
//!
//! Jobs are submitted with [`JobRegistry::submit`] and run on the tokio runtime once a
//! worker permit is free. Running pipelines never touch the table; they send
//! [`JobEvent`]s over one channel and a single drain task applies them in order.

use crate::cancel::{CancelHandle, cancel_pair};
use crate::generator::{Pipeline, ProgressReporter};
use crate::models::{GenerationJob, GenerationRequest, JobEvent, JobId, JobStatus};
use crate::{logi, logok, logw};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, RwLock, Semaphore, mpsc};
use uuid::Uuid;

type JobTable = Arc<RwLock<HashMap<JobId, GenerationJob>>>;

pub struct JobRegistry {
    jobs: JobTable,
    cancels: Arc<Mutex<HashMap<JobId, CancelHandle>>>,
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
    events: mpsc::UnboundedSender<JobEvent>,
    updated: Arc<Notify>,
}

fn apply_event(jobs: &mut HashMap<JobId, GenerationJob>, event: JobEvent) {
    match event {
        JobEvent::Progress(update) => {
            let Some(job) = jobs.get_mut(&update.job_id) else {
                return;
            };
            if job.status.is_terminal() {
                return;
            }
            job.progress = job.progress.max(update.percent.min(100));
            job.message = update.message;
        }
        JobEvent::Finished { job_id, outcome } => {
            let Some(job) = jobs.get_mut(&job_id) else {
                return;
            };
            job.finished_at = Some(Utc::now());
            match outcome {
                Ok(path) => {
                    job.status = JobStatus::Completed;
                    job.progress = 100;
                    job.result = Some(path);
                }
                Err(reason) => {
                    job.status = JobStatus::Failed;
                    job.progress = 0;
                    job.message = format!("Error: {}", reason);
                    job.error = Some(reason);
                }
            }
        }
    }
}

/// Plain file names only: no separators, no `.`/`..`, no hidden files.
fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}

impl JobRegistry {
    /// Spawns the drain task, so this must be called inside a tokio runtime.
    pub fn new(pipeline: Pipeline, worker_count: usize) -> Self {
        let (events, mut rx) = mpsc::unbounded_channel::<JobEvent>();
        let jobs: JobTable = Arc::new(RwLock::new(HashMap::new()));
        let updated = Arc::new(Notify::new());

        let table = Arc::clone(&jobs);
        let notify = Arc::clone(&updated);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                apply_event(&mut *table.write().await, event);
                notify.notify_waiters();
            }
        });

        Self {
            jobs,
            cancels: Arc::new(Mutex::new(HashMap::new())),
            pipeline: Arc::new(pipeline),
            permits: Arc::new(Semaphore::new(worker_count.max(1))),
            events,
            updated,
        }
    }

    pub async fn submit(&self, request: GenerationRequest) -> JobId {
        let id = Uuid::new_v4();
        self.jobs
            .write()
            .await
            .insert(id, GenerationJob::new(id, request.clone()));

        let (handle, cancel) = cancel_pair();
        if let Ok(mut cancels) = self.cancels.lock() {
            cancels.insert(id, handle);
        }

        let pipeline = Arc::clone(&self.pipeline);
        let permits = Arc::clone(&self.permits);
        let events = self.events.clone();
        let cancels = Arc::clone(&self.cancels);
        let reporter = ProgressReporter::new(id, events.clone());

        logi(format!(
            "Job {} queued: {} surah {} verses {}-{}",
            id, request.reciter_id, request.surah, request.verse_start, request.verse_end
        ));

        tokio::spawn(async move {
            let outcome = match cancel.run(permits.acquire_owned()).await {
                None => Err("job cancelled".to_string()),
                Some(Err(_)) => Err("worker pool closed".to_string()),
                Some(Ok(_permit)) => pipeline
                    .run(&request, &reporter, &cancel)
                    .await
                    .map_err(|e| e.to_string()),
            };

            match &outcome {
                Ok(path) => logok(format!("Job {} completed: {}", id, path.display())),
                Err(reason) => logw(format!("Job {} failed: {}", id, reason)),
            }
            if let Ok(mut cancels) = cancels.lock() {
                cancels.remove(&id);
            }
            let _ = events.send(JobEvent::Finished { job_id: id, outcome });
        });

        id
    }

    pub async fn get(&self, id: JobId) -> Option<GenerationJob> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// All jobs, oldest first.
    pub async fn list(&self) -> Vec<GenerationJob> {
        let mut jobs: Vec<_> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Returns false when the job is unknown or already finished.
    pub fn cancel(&self, id: JobId) -> bool {
        let Ok(cancels) = self.cancels.lock() else {
            return false;
        };
        match cancels.get(&id) {
            Some(handle) => {
                handle.cancel();
                logi(format!("Job {} cancellation requested", id));
                true
            }
            None => false,
        }
    }

    /// Resolves with the job once it is terminal.
    pub async fn wait(&self, id: JobId) -> Option<GenerationJob> {
        loop {
            let notified = self.updated.notified();
            let job = self.get(id).await?;
            if job.status.is_terminal() {
                return Some(job);
            }
            notified.await;
        }
    }

    /// Calls `on_change` with every distinct (progress, message) state until the job is terminal.
    pub async fn watch<F>(&self, id: JobId, mut on_change: F) -> Option<GenerationJob>
    where
        F: FnMut(&GenerationJob),
    {
        let mut last: Option<(u8, String)> = None;
        loop {
            let notified = self.updated.notified();
            let job = self.get(id).await?;
            let state = (job.progress, job.message.clone());
            if last.as_ref() != Some(&state) {
                on_change(&job);
                last = Some(state);
            }
            if job.status.is_terminal() {
                return Some(job);
            }
            notified.await;
        }
    }

    /// Resolves a finished video by plain file name inside the output directory.
    pub fn output_path(&self, filename: &str) -> Option<PathBuf> {
        if !is_plain_file_name(filename) {
            return None;
        }
        let path = self.pipeline.output_dir().join(filename);
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProgressUpdate;

    fn job(id: JobId) -> GenerationJob {
        GenerationJob::new(id, GenerationRequest::new("abdul_basit", 1, 1, 3))
    }

    fn progress(id: JobId, percent: u8, message: &str) -> JobEvent {
        JobEvent::Progress(ProgressUpdate {
            job_id: id,
            percent,
            message: message.to_string(),
        })
    }

    #[test]
    fn test_progress_is_monotonic_while_processing() {
        let id = Uuid::new_v4();
        let mut jobs = HashMap::from([(id, job(id))]);

        apply_event(&mut jobs, progress(id, 30, "Preparing background video..."));
        apply_event(&mut jobs, progress(id, 0, "Error: failed to prepare background video"));
        assert_eq!(jobs[&id].progress, 30);
        assert_eq!(jobs[&id].message, "Error: failed to prepare background video");

        apply_event(
            &mut jobs,
            JobEvent::Finished {
                job_id: id,
                outcome: Err("failed to prepare background video".to_string()),
            },
        );
        assert_eq!(jobs[&id].status, JobStatus::Failed);
        assert_eq!(jobs[&id].progress, 0);
        assert_eq!(jobs[&id].error.as_deref(), Some("failed to prepare background video"));
        assert!(jobs[&id].finished_at.is_some());

        apply_event(&mut jobs, progress(id, 50, "late"));
        assert_eq!(jobs[&id].progress, 0);
    }

    #[test]
    fn test_completion_sets_result() {
        let id = Uuid::new_v4();
        let mut jobs = HashMap::from([(id, job(id))]);
        apply_event(
            &mut jobs,
            JobEvent::Finished {
                job_id: id,
                outcome: Ok(PathBuf::from("output/a.mp4")),
            },
        );
        assert_eq!(jobs[&id].status, JobStatus::Completed);
        assert_eq!(jobs[&id].progress, 100);
        assert_eq!(jobs[&id].result, Some(PathBuf::from("output/a.mp4")));
    }

    #[test]
    fn test_unknown_job_events_are_ignored() {
        let mut jobs = HashMap::new();
        apply_event(&mut jobs, progress(Uuid::new_v4(), 10, "x"));
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_plain_file_names() {
        assert!(is_plain_file_name("Abdul_Basit_-_Murattal_الفاتحة_verse1-3.mp4"));
        assert!(!is_plain_file_name("../config.json"));
        assert!(!is_plain_file_name("sub/a.mp4"));
        assert!(!is_plain_file_name("..\\a.mp4"));
        assert!(!is_plain_file_name("/etc/passwd"));
        assert!(!is_plain_file_name(".hidden"));
        assert!(!is_plain_file_name(""));
    }
}
