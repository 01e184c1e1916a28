//! Roster polling and change detection.
//!
//! A [`RosterPoller`] periodically fetches the user's job list, keeps the
//! latest snapshot readable without locking callers out, and publishes the
//! difference between consecutive polls as [`RosterEvent`]s.

mod job;

pub use job::{JobId, JobSnapshot, JobStage};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{JobsClient, ServiceError};
use crate::config::PollConfig;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A job present in consecutive polls whose stage moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageChange {
    pub id: JobId,
    pub old: JobStage,
    pub new: JobStage,
}

/// A job that disappeared from the roster between polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedJob {
    pub id: JobId,
    pub last_stage: JobStage,
}

impl RemovedJob {
    /// A job last seen running that vanished from the roster finished
    /// outside our view; its disappearance is reported as a completion,
    /// not a plain removal.
    pub fn implicitly_completed(&self) -> bool {
        self.last_stage == JobStage::Running
    }
}

/// Difference between two roster snapshots.
///
/// Jobs are compared by stage only; message or spec edits without a stage
/// move do not register as changes.
#[derive(Debug, Clone, Default)]
pub struct RosterDiff {
    pub changed: Vec<StageChange>,
    pub removed: Vec<RemovedJob>,
    pub added: Vec<JobSnapshot>,
}

impl RosterDiff {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty() && self.added.is_empty()
    }
}

/// Compute the stage-level difference between two rosters.
///
/// Each bucket is sorted by job id, so equal inputs always produce the same
/// diff regardless of map iteration order.
pub fn diff_rosters(
    old: &HashMap<JobId, JobSnapshot>,
    new: &HashMap<JobId, JobSnapshot>,
) -> RosterDiff {
    let mut diff = RosterDiff::default();

    for (id, old_snapshot) in old {
        match new.get(id) {
            Some(new_snapshot) => {
                if old_snapshot.stage != new_snapshot.stage {
                    diff.changed.push(StageChange {
                        id: id.clone(),
                        old: old_snapshot.stage,
                        new: new_snapshot.stage,
                    });
                }
            }
            None => diff.removed.push(RemovedJob {
                id: id.clone(),
                last_stage: old_snapshot.stage,
            }),
        }
    }

    for (id, snapshot) in new {
        if !old.contains_key(id) {
            diff.added.push(snapshot.clone());
        }
    }

    diff.changed.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
    diff.removed.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
    diff.added.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
    diff
}

/// Roster change notification, enriched with display names so subscribers
/// can render it without holding a snapshot.
#[derive(Debug, Clone)]
pub enum RosterEvent {
    StageChanged {
        id: JobId,
        display_name: String,
        old: JobStage,
        new: JobStage,
    },
    JobRemoved {
        id: JobId,
        display_name: String,
        last_stage: JobStage,
        implicitly_completed: bool,
    },
    JobAdded {
        id: JobId,
        display_name: String,
        stage: JobStage,
    },
}

/// Background service that keeps the job roster current.
///
/// The snapshot is swapped wholesale on every successful poll; readers get a
/// cheap `Arc` clone and are never blocked by a poll in flight. A failed
/// poll keeps the previous snapshot and emits nothing.
pub struct RosterPoller {
    client: Arc<JobsClient>,
    config: PollConfig,
    roster: RwLock<Arc<HashMap<JobId, JobSnapshot>>>,
    events: broadcast::Sender<RosterEvent>,
    /// False until the first successful poll has primed the roster. The
    /// priming poll publishes no events; pre-existing jobs are not news.
    primed: AtomicBool,
}

impl RosterPoller {
    pub fn new(client: Arc<JobsClient>, config: PollConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            client,
            config,
            roster: RwLock::new(Arc::new(HashMap::new())),
            events,
            primed: AtomicBool::new(false),
        }
    }

    /// Subscribe to roster change events.
    pub fn subscribe(&self) -> broadcast::Receiver<RosterEvent> {
        self.events.subscribe()
    }

    /// Latest roster snapshot.
    pub fn snapshot(&self) -> Arc<HashMap<JobId, JobSnapshot>> {
        Arc::clone(&self.roster.read().unwrap())
    }

    /// Stage of a job in the latest snapshot, if the roster knows it.
    pub fn stage_of(&self, id: &JobId) -> Option<JobStage> {
        self.roster.read().unwrap().get(id).map(|job| job.stage)
    }

    /// Fetch the roster once, swap the snapshot, and publish the diff.
    ///
    /// The first successful poll only primes the snapshot and returns an
    /// empty diff.
    pub async fn poll_once(&self) -> Result<RosterDiff, ServiceError> {
        let start = Instant::now();
        let jobs = match self.client.list_jobs().await {
            Ok(jobs) => jobs,
            Err(error) => {
                metrics::counter!("lookout_polls_total", "outcome" => "error").increment(1);
                return Err(error);
            }
        };
        metrics::counter!("lookout_polls_total", "outcome" => "success").increment(1);
        metrics::histogram!("lookout_roster_poll_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        let new: Arc<HashMap<JobId, JobSnapshot>> =
            Arc::new(jobs.into_iter().map(|job| (job.id.clone(), job)).collect());

        let old = {
            let mut roster = self.roster.write().unwrap();
            std::mem::replace(&mut *roster, Arc::clone(&new))
        };

        if !self.primed.swap(true, Ordering::Relaxed) {
            tracing::debug!(jobs = new.len(), "Roster primed");
            return Ok(RosterDiff::default());
        }

        let diff = diff_rosters(&old, &new);
        if !diff.is_empty() {
            tracing::info!(
                changed = diff.changed.len(),
                removed = diff.removed.len(),
                added = diff.added.len(),
                "Roster changed"
            );
            self.publish(&diff, &old, &new);
        }
        Ok(diff)
    }

    fn publish(
        &self,
        diff: &RosterDiff,
        old: &HashMap<JobId, JobSnapshot>,
        new: &HashMap<JobId, JobSnapshot>,
    ) {
        let title = |roster: &HashMap<JobId, JobSnapshot>, id: &JobId| {
            roster
                .get(id)
                .map(|job| job.title().to_string())
                .unwrap_or_else(|| id.to_string())
        };

        // Ignore send errors; no receivers just means nobody is watching.
        for change in &diff.changed {
            let _ = self.events.send(RosterEvent::StageChanged {
                id: change.id.clone(),
                display_name: title(new, &change.id),
                old: change.old,
                new: change.new,
            });
        }
        for removed in &diff.removed {
            let _ = self.events.send(RosterEvent::JobRemoved {
                id: removed.id.clone(),
                display_name: title(old, &removed.id),
                last_stage: removed.last_stage,
                implicitly_completed: removed.implicitly_completed(),
            });
        }
        for added in &diff.added {
            let _ = self.events.send(RosterEvent::JobAdded {
                id: added.id.clone(),
                display_name: added.title().to_string(),
                stage: added.stage,
            });
        }
    }

    /// Start the polling background task.
    /// Returns a JoinHandle that resolves when the poller stops.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let cadence = self.config.effective_interval();
            let mut interval = tokio::time::interval(cadence);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(interval_seconds = cadence.as_secs(), "Roster poller started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Roster poller shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(error) = self.poll_once().await {
                            tracing::warn!(
                                error = %error,
                                "Roster poll failed, keeping previous snapshot"
                            );
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: &str, stage: JobStage) -> JobSnapshot {
        JobSnapshot {
            id: JobId::from(id),
            display_name: String::new(),
            stage,
            message: String::new(),
            created_at: None,
            spec: serde_json::Value::Null,
        }
    }

    fn roster(jobs: Vec<JobSnapshot>) -> HashMap<JobId, JobSnapshot> {
        jobs.into_iter().map(|job| (job.id.clone(), job)).collect()
    }

    #[test]
    fn test_diff_changed_removed_added() {
        let old = roster(vec![
            snapshot("a", JobStage::Running),
            snapshot("b", JobStage::Completed),
        ]);
        let new = roster(vec![
            snapshot("a", JobStage::Completed),
            snapshot("c", JobStage::Running),
        ]);

        let diff = diff_rosters(&old, &new);

        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].id, JobId::from("a"));
        assert_eq!(diff.changed[0].old, JobStage::Running);
        assert_eq!(diff.changed[0].new, JobStage::Completed);

        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].id, JobId::from("b"));
        assert_eq!(diff.removed[0].last_stage, JobStage::Completed);
        assert!(!diff.removed[0].implicitly_completed());

        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].id, JobId::from("c"));
        assert_eq!(diff.added[0].stage, JobStage::Running);
    }

    #[test]
    fn test_diff_identical_rosters_is_empty() {
        let old = roster(vec![
            snapshot("a", JobStage::Running),
            snapshot("b", JobStage::Pending),
        ]);
        let new = roster(vec![
            snapshot("a", JobStage::Running),
            snapshot("b", JobStage::Pending),
        ]);

        assert!(diff_rosters(&old, &new).is_empty());
    }

    #[test]
    fn test_diff_ignores_non_stage_edits() {
        let old = roster(vec![snapshot("a", JobStage::Running)]);
        let mut changed = snapshot("a", JobStage::Running);
        changed.display_name = "renamed".to_string();
        changed.message = "epoch 9/10".to_string();
        let new = roster(vec![changed]);

        assert!(diff_rosters(&old, &new).is_empty());
    }

    #[test]
    fn test_removed_running_job_is_implicitly_completed() {
        let old = roster(vec![snapshot("a", JobStage::Running)]);
        let new = roster(vec![]);

        let diff = diff_rosters(&old, &new);
        assert_eq!(diff.removed.len(), 1);
        assert!(diff.removed[0].implicitly_completed());
    }

    #[test]
    fn test_removed_non_running_job_is_plain_removal() {
        for stage in [
            JobStage::Pending,
            JobStage::Queued,
            JobStage::Updating,
            JobStage::Completed,
            JobStage::Error,
            JobStage::Unknown,
        ] {
            let old = roster(vec![snapshot("a", stage)]);
            let diff = diff_rosters(&old, &HashMap::new());
            assert!(
                !diff.removed[0].implicitly_completed(),
                "stage {stage} should not imply completion"
            );
        }
    }

    #[test]
    fn test_diff_buckets_are_sorted_by_id() {
        let old = roster(vec![
            snapshot("m", JobStage::Running),
            snapshot("a", JobStage::Running),
            snapshot("z", JobStage::Running),
        ]);
        let new = roster(vec![
            snapshot("q", JobStage::Pending),
            snapshot("b", JobStage::Pending),
        ]);

        let diff = diff_rosters(&old, &new);
        let removed: Vec<&str> = diff.removed.iter().map(|r| r.id.as_str()).collect();
        let added: Vec<&str> = diff.added.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(removed, vec!["a", "m", "z"]);
        assert_eq!(added, vec!["b", "q"]);
    }

    #[test]
    fn test_empty_to_populated_is_all_added() {
        let new = roster(vec![
            snapshot("a", JobStage::Queued),
            snapshot("b", JobStage::Running),
        ]);
        let diff = diff_rosters(&HashMap::new(), &new);
        assert!(diff.changed.is_empty());
        assert!(diff.removed.is_empty());
        assert_eq!(diff.added.len(), 2);
    }
}
