//! Bounded-concurrency fan-out of merge-tasks.
//!
//! One tokio task per descriptor, gated by a semaphore sized from the
//! configured job bound. Tasks are independent: no shared mutable
//! descriptor state, no shared logfile, no ordering between repositories.
//! Failures are captured values, never propagated panics, so one repo's
//! failure cannot abort the run.

use std::sync::Arc;

use futures::future::join_all;
use log::error;
use tokio::sync::Semaphore;

use crate::config::RunConfig;
use crate::descriptor::{FinishStatus, TaskDescriptor};
use crate::task::{self, TaskOutcome};

/// Final state of a whole run: every descriptor with its recorded outcome,
/// in input order.
#[derive(Debug)]
pub struct RunSummary {
    pub descriptors: Vec<TaskDescriptor>,
    pub outcomes: Vec<TaskOutcome>,
}

impl RunSummary {
    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    /// True iff every repository's task succeeded.
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Run all merge-tasks with bounded concurrency and collect one outcome per
/// descriptor.
pub async fn execute_all(descriptors: Vec<TaskDescriptor>, config: &Arc<RunConfig>) -> RunSummary {
    let semaphore = Arc::new(Semaphore::new(config.jobs.max(1)));
    let originals = descriptors.clone();

    let handles: Vec<_> = descriptors
        .into_iter()
        .map(|mut descriptor| {
            let semaphore = Arc::clone(&semaphore);
            let config = Arc::clone(config);
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = task::execute_merge(&mut descriptor, &config).await;
                (descriptor, outcome)
            })
        })
        .collect();

    let mut finished = Vec::with_capacity(originals.len());
    let mut outcomes = Vec::with_capacity(originals.len());
    for (index, joined) in join_all(handles).await.into_iter().enumerate() {
        match joined {
            Ok((descriptor, outcome)) => {
                finished.push(descriptor);
                outcomes.push(outcome);
            }
            Err(e) => {
                // A panicked task must not take the run down; report it as
                // a failed outcome for its repo.
                let mut descriptor = originals[index].clone();
                error!(
                    "Merge-task for '{}' aborted: {}",
                    descriptor.repo_local_name, e
                );
                descriptor.finish_status = FinishStatus::Failure;
                descriptor.finish_detail = format!("Merge-task aborted: {}", e);
                outcomes.push(TaskOutcome {
                    repo_local_name: descriptor.repo_local_name.clone(),
                    error: Some(descriptor.finish_detail.clone()),
                });
                finished.push(descriptor);
            }
        }
    }

    RunSummary {
        descriptors: finished,
        outcomes,
    }
}
