//! Debounced persistence for in-flight module sessions.
//!
//! Every answer change produces a full [`ProgressPatch`], so only the latest
//! pending patch matters. The autosaver runs one worker task per open session
//! and funnels debounced and immediate saves through the same queue, which
//! keeps writes for a (learner, module) pair serialized.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use assess_core::model::{LearnerCode, MergeOutcome, ModuleId, ProgressPatch};
use storage::repository::ProgressRepository;

/// Quiet period a debounced save waits for further changes.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(1);

const QUEUE_DEPTH: usize = 32;

enum Command {
    Debounced(ProgressPatch),
    Immediate(ProgressPatch),
    Flush(oneshot::Sender<()>),
}

/// Background saver for one learner's open module session.
///
/// [`save_debounced`](Self::save_debounced) coalesces rapid changes into one
/// write after a quiet period; [`save_now`](Self::save_now) writes without
/// waiting. Failures are logged and dropped, the next change carries the full
/// state again anyway. [`close`](Self::close) discards a pending debounce but
/// lets a write that already started finish.
pub struct Autosaver {
    tx: mpsc::Sender<Command>,
    worker: JoinHandle<()>,
}

impl Autosaver {
    /// Spawns a saver with the default quiet period.
    #[must_use]
    pub fn spawn(
        progress: Arc<dyn ProgressRepository>,
        learner: LearnerCode,
        module: ModuleId,
    ) -> Self {
        Self::spawn_with_quiet_period(progress, learner, module, DEFAULT_QUIET_PERIOD)
    }

    /// Spawns a saver that waits `quiet` between a change and its write.
    #[must_use]
    pub fn spawn_with_quiet_period(
        progress: Arc<dyn ProgressRepository>,
        learner: LearnerCode,
        module: ModuleId,
        quiet: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let worker = tokio::spawn(run_worker(rx, progress, learner, module, quiet));
        Self { tx, worker }
    }

    /// Queues a patch to be written once changes go quiet.
    ///
    /// A newer debounced patch replaces the pending one; only the latest
    /// state reaches storage.
    pub async fn save_debounced(&self, patch: ProgressPatch) {
        self.send(Command::Debounced(patch)).await;
    }

    /// Writes a patch without waiting, superseding any pending debounce.
    pub async fn save_now(&self, patch: ProgressPatch) {
        self.send(Command::Immediate(patch)).await;
    }

    /// Forces a pending debounced patch out and waits for the write.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        self.send(Command::Flush(ack)).await;
        let _ = done.await;
    }

    /// Shuts the worker down. A patch still waiting on its quiet period is
    /// dropped; a write already dispatched runs to completion.
    pub async fn close(self) {
        drop(self.tx);
        if self.worker.await.is_err() {
            tracing::warn!("autosave worker ended abnormally");
        }
    }

    async fn send(&self, command: Command) {
        if self.tx.send(command).await.is_err() {
            tracing::warn!("autosave worker is gone, dropping save");
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Command>,
    progress: Arc<dyn ProgressRepository>,
    learner: LearnerCode,
    module: ModuleId,
    quiet: Duration,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Immediate(patch) => {
                write(progress.as_ref(), &learner, &module, &patch).await;
            }
            Command::Flush(ack) => {
                // nothing pending to force out
                let _ = ack.send(());
            }
            Command::Debounced(first) => {
                let mut pending = first;
                loop {
                    match tokio::time::timeout(quiet, rx.recv()).await {
                        // quiet period elapsed
                        Err(_) => {
                            write(progress.as_ref(), &learner, &module, &pending).await;
                            break;
                        }
                        // handle dropped while a patch was still waiting
                        Ok(None) => return,
                        Ok(Some(Command::Debounced(next))) => pending = next,
                        Ok(Some(Command::Immediate(patch))) => {
                            // the immediate patch carries the newer full state
                            write(progress.as_ref(), &learner, &module, &patch).await;
                            break;
                        }
                        Ok(Some(Command::Flush(ack))) => {
                            write(progress.as_ref(), &learner, &module, &pending).await;
                            let _ = ack.send(());
                            break;
                        }
                    }
                }
            }
        }
    }
}

async fn write(
    progress: &dyn ProgressRepository,
    learner: &LearnerCode,
    module: &ModuleId,
    patch: &ProgressPatch,
) {
    match progress.merge_module_progress(learner, module, patch).await {
        Ok(MergeOutcome::Applied) => {}
        Ok(MergeOutcome::Stale) => {
            tracing::debug!("autosave for {} superseded by a newer write", module);
        }
        Err(e) => {
            tracing::warn!("autosave for {} failed: {e}", module);
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use assess_core::model::ModuleProgress;
    use assess_core::time::fixed_now;
    use storage::repository::StorageError;

    #[derive(Default)]
    struct RecordingRepo {
        writes: Mutex<Vec<ProgressPatch>>,
    }

    #[async_trait]
    impl ProgressRepository for RecordingRepo {
        async fn module_progress(
            &self,
            _learner: &LearnerCode,
            _module: &ModuleId,
        ) -> Result<Option<ModuleProgress>, StorageError> {
            Ok(None)
        }

        async fn all_module_progress(
            &self,
            _learner: &LearnerCode,
        ) -> Result<BTreeMap<ModuleId, ModuleProgress>, StorageError> {
            Ok(BTreeMap::new())
        }

        async fn merge_module_progress(
            &self,
            _learner: &LearnerCode,
            _module: &ModuleId,
            patch: &ProgressPatch,
        ) -> Result<MergeOutcome, StorageError> {
            self.writes.lock().unwrap().push(patch.clone());
            Ok(MergeOutcome::Applied)
        }

        async fn reset_module_progress(
            &self,
            _learner: &LearnerCode,
            _module: &ModuleId,
            _at: DateTime<Utc>,
        ) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn saver(repo: &Arc<RecordingRepo>, quiet: Duration) -> Autosaver {
        let progress: Arc<dyn ProgressRepository> = repo.clone();
        Autosaver::spawn_with_quiet_period(
            progress,
            LearnerCode::new("ABC123").unwrap(),
            ModuleId::new("hygiene").unwrap(),
            quiet,
        )
    }

    fn patch(score: u32) -> ProgressPatch {
        ProgressPatch::new(fixed_now()).with_score(score)
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_changes_collapse_into_one_write() {
        let repo = Arc::new(RecordingRepo::default());
        let saver = saver(&repo, Duration::from_secs(1));

        saver.save_debounced(patch(10)).await;
        saver.save_debounced(patch(20)).await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        saver.close().await;

        assert_eq!(*repo.writes.lock().unwrap(), vec![patch(20)]);
    }

    #[tokio::test(start_paused = true)]
    async fn save_now_skips_the_quiet_period() {
        let repo = Arc::new(RecordingRepo::default());
        let saver = saver(&repo, Duration::from_secs(60));

        saver.save_now(patch(30)).await;
        saver.close().await;

        assert_eq!(*repo.writes.lock().unwrap(), vec![patch(30)]);
    }

    #[tokio::test(start_paused = true)]
    async fn save_now_supersedes_a_pending_debounce() {
        let repo = Arc::new(RecordingRepo::default());
        let saver = saver(&repo, Duration::from_secs(60));

        saver.save_debounced(patch(10)).await;
        saver.save_now(patch(40)).await;
        saver.close().await;

        assert_eq!(*repo.writes.lock().unwrap(), vec![patch(40)]);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_forces_a_pending_patch_out() {
        let repo = Arc::new(RecordingRepo::default());
        let saver = saver(&repo, Duration::from_secs(60));

        saver.save_debounced(patch(50)).await;
        saver.flush().await;

        assert_eq!(*repo.writes.lock().unwrap(), vec![patch(50)]);
        saver.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn close_discards_a_patch_still_waiting() {
        let repo = Arc::new(RecordingRepo::default());
        let saver = saver(&repo, Duration::from_secs(60));

        saver.save_debounced(patch(60)).await;
        saver.close().await;

        assert!(repo.writes.lock().unwrap().is_empty());
    }
}
