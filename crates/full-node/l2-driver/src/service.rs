use std::future::Future;
use std::sync::{Arc, OnceLock};

use l2_rollup_interface::services::{DerivationPipeline, Sequencer};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::Driver;

/// Tasks sharing one cancellation token.
///
/// The first task to fail cancels the token so that its siblings wind down,
/// and its error is the one [`TaskGroup::wait`] reports.
#[derive(Debug)]
pub struct TaskGroup {
    tasks: JoinSet<(usize, anyhow::Result<()>)>,
    cancel: CancellationToken,
    first_failure: Arc<OnceLock<usize>>,
    spawned: usize,
}

impl TaskGroup {
    /// Creates an empty group cancelled through `cancel`.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            cancel,
            first_failure: Arc::default(),
            spawned: 0,
        }
    }

    /// The token every task of the group should observe.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Spawns `task`; an error from it cancels the whole group.
    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = self.spawned;
        self.spawned += 1;
        let cancel = self.cancel.clone();
        let first_failure = self.first_failure.clone();

        self.tasks.spawn(async move {
            let result = task.await;
            if let Err(err) = &result {
                if first_failure.set(id).is_ok() {
                    error!(task = name, %err, "Task failed, cancelling sibling tasks");
                }
                cancel.cancel();
            }
            (id, result)
        });
    }

    /// Waits for every task to finish and returns the error of the task that failed first.
    pub async fn wait(&mut self) -> anyhow::Result<()> {
        let mut errors = Vec::new();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((id, Err(err))) => errors.push((Some(id), err)),
                Err(join_error) => {
                    error!(%join_error, "Task panicked");
                    self.cancel.cancel();
                    errors.push((None, join_error.into()));
                }
            }
        }

        if errors.is_empty() {
            return Ok(());
        }
        let first = self.first_failure.get().copied();
        let position = errors
            .iter()
            .position(|(id, _)| id.is_some() && *id == first)
            .unwrap_or(0);
        Err(errors.swap_remove(position).1)
    }
}

impl<P: DerivationPipeline, S: Sequencer> Driver<P, S> {
    /// Runs the driver as a task of `tasks`, cancelled with the rest of the group.
    pub fn start(mut self, tasks: &mut TaskGroup) {
        let cancel = tasks.cancellation_token().clone();
        tasks.spawn("driver", async move {
            self.run(&cancel).await?;
            Ok(())
        });
    }
}

#[derive(Debug, thiserror::Error)]
#[error("node service stopped")]
struct ServiceStopped;

/// Lifecycle of a running node: the driver and any sibling tasks.
#[derive(Debug)]
pub struct NodeService {
    tasks: TaskGroup,
}

impl NodeService {
    /// Creates a service whose tasks are cancelled through `cancel`.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            tasks: TaskGroup::new(cancel),
        }
    }

    /// Launches `driver` as a task of the service.
    pub fn start<P, S>(&mut self, driver: Driver<P, S>)
    where
        P: DerivationPipeline,
        S: Sequencer,
    {
        driver.start(&mut self.tasks);
    }

    /// Spawns an additional task sharing the service's cancellation.
    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tasks.spawn(name, task);
    }

    /// Forces the service down and waits for every task to finish.
    pub async fn stop(mut self) -> anyhow::Result<()> {
        info!("Stopping node service");
        self.tasks.spawn("stop", async { Err(ServiceStopped.into()) });
        self.wait().await
    }

    /// Waits until a task fails or the service is stopped.
    pub async fn wait(mut self) -> anyhow::Result<()> {
        match self.tasks.wait().await {
            Err(err) if err.is::<ServiceStopped>() => {
                info!("Node service stopped");
                Ok(())
            }
            result => result,
        }
    }
}
