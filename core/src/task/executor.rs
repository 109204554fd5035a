use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::{mpsc, oneshot, Semaphore};
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::error::TaskError;

use super::handle::TaskHandle;
use super::traits::{TaskContext, TaskHandler};
use super::types::{Queue, TaskKind, TaskOutput, TaskPayload, TaskRecord, TaskState};

/// Terminal records beyond this count are pruned on the next submit.
const REGISTRY_SOFT_LIMIT: usize = 10_000;

pub(crate) type Reply = oneshot::Sender<Result<TaskOutput, TaskError>>;

pub(crate) struct TaskEnvelope {
    id: Uuid,
    payload: TaskPayload,
    idempotency_key: Uuid,
    deliveries: u32,
    reply: Option<Reply>,
}

/// State shared by the executor, its dispatch loops and outstanding handles.
pub(crate) struct Shared {
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
    registry: Mutex<HashMap<Uuid, TaskRecord>>,
    max_deliveries: u32,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, TaskRecord>> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn insert(&self, id: Uuid, record: TaskRecord) {
        let mut registry = self.lock();
        if registry.len() >= REGISTRY_SOFT_LIMIT {
            registry.retain(|_, r| !r.state.is_terminal());
        }
        registry.insert(id, record);
    }

    fn update<F: FnOnce(&mut TaskRecord)>(&self, id: &Uuid, f: F) {
        if let Some(record) = self.lock().get_mut(id) {
            f(record);
        }
    }

    /// Terminal states are sticky: a task whose waiter already gave up stays
    /// `TimedOut` even if it completes later.
    fn finish(&self, id: &Uuid, state: TaskState) {
        self.update(id, |r| {
            if !r.state.is_terminal() {
                r.state = state;
            }
        });
    }

    pub(crate) fn mark_timed_out(&self, id: &Uuid) {
        self.finish(id, TaskState::TimedOut);
    }

    fn record(&self, id: &Uuid) -> Option<TaskRecord> {
        self.lock().get(id).cloned()
    }
}

/// Queued, at-least-once background task dispatch.
#[derive(Clone)]
pub struct TaskExecutor {
    shared: Arc<Shared>,
    queues: Arc<HashMap<Queue, mpsc::UnboundedSender<TaskEnvelope>>>,
}

pub struct TaskExecutorBuilder {
    cfg: ExecutorConfig,
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
}

impl TaskExecutorBuilder {
    pub fn new(cfg: ExecutorConfig) -> Self {
        Self {
            cfg,
            handlers: HashMap::new(),
        }
    }

    pub fn handler(mut self, kind: TaskKind, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Spawns one dispatch loop per queue. Must be called inside a tokio runtime.
    pub fn build(self) -> TaskExecutor {
        let shared = Arc::new(Shared {
            handlers: self.handlers,
            registry: Mutex::new(HashMap::new()),
            max_deliveries: self.cfg.max_deliveries.max(1),
        });

        let mut queues = HashMap::new();
        for queue in Queue::ALL {
            let (tx, rx) = mpsc::unbounded_channel();
            let workers = workers_for(&self.cfg, queue);
            tokio::spawn(dispatch_loop(
                queue,
                rx,
                tx.downgrade(),
                shared.clone(),
                workers,
            ));
            queues.insert(queue, tx);
        }

        TaskExecutor {
            shared,
            queues: Arc::new(queues),
        }
    }
}

fn workers_for(cfg: &ExecutorConfig, queue: Queue) -> usize {
    let n = match queue {
        Queue::Text => cfg.text_workers,
        Queue::Sandbox => cfg.sandbox_workers,
        Queue::Scheduler => cfg.scheduler_workers,
    };
    n.max(1)
}

impl TaskExecutor {
    pub fn builder(cfg: ExecutorConfig) -> TaskExecutorBuilder {
        TaskExecutorBuilder::new(cfg)
    }

    /// Enqueue a task and return immediately with a handle.
    pub fn submit(&self, payload: TaskPayload) -> Result<TaskHandle, TaskError> {
        let kind = payload.kind();
        let queue = kind.queue();
        let id = Uuid::new_v4();
        let idempotency_key = payload.idempotency_key();
        let (reply_tx, reply_rx) = oneshot::channel();

        let sender = self.queues.get(&queue).ok_or(TaskError::Closed)?;
        self.shared
            .insert(id, TaskRecord::new(kind, idempotency_key));

        let envelope = TaskEnvelope {
            id,
            payload,
            idempotency_key,
            deliveries: 0,
            reply: Some(reply_tx),
        };
        if sender.send(envelope).is_err() {
            self.shared.finish(&id, TaskState::Errored);
            return Err(TaskError::Closed);
        }

        tracing::debug!(task_id = %id, kind = %kind, queue = %queue, key = %idempotency_key, "task submitted");

        Ok(TaskHandle::new(
            id,
            kind,
            idempotency_key,
            reply_rx,
            self.shared.clone(),
        ))
    }

    /// Snapshot of a task's bookkeeping record.
    pub fn record(&self, id: &Uuid) -> Option<TaskRecord> {
        self.shared.record(id)
    }

    pub fn state(&self, id: &Uuid) -> Option<TaskState> {
        self.record(id).map(|r| r.state)
    }

    pub fn has_handler(&self, kind: TaskKind) -> bool {
        self.shared.handlers.contains_key(&kind)
    }
}

async fn dispatch_loop(
    queue: Queue,
    mut rx: mpsc::UnboundedReceiver<TaskEnvelope>,
    requeue: mpsc::WeakUnboundedSender<TaskEnvelope>,
    shared: Arc<Shared>,
    workers: usize,
) {
    let sem = Arc::new(Semaphore::new(workers));

    while let Some(envelope) = rx.recv().await {
        let Ok(permit) = sem.clone().acquire_owned().await else {
            break;
        };
        let shared = shared.clone();
        let requeue = requeue.clone();
        tokio::spawn(async move {
            let _permit = permit;
            run_envelope(queue, envelope, shared, requeue).await;
        });
    }

    tracing::debug!(queue = %queue, "task queue closed");
}

async fn run_envelope(
    queue: Queue,
    mut envelope: TaskEnvelope,
    shared: Arc<Shared>,
    requeue: mpsc::WeakUnboundedSender<TaskEnvelope>,
) {
    envelope.deliveries += 1;
    let id = envelope.id;
    let kind = envelope.payload.kind();
    let delivery = envelope.deliveries;

    shared.update(&id, |r| {
        r.deliveries = delivery;
        if !r.state.is_terminal() {
            r.state = TaskState::Running;
        }
    });

    let Some(handler) = shared.handlers.get(&kind).cloned() else {
        tracing::error!(task_id = %id, kind = %kind, "no handler registered");
        shared.finish(&id, TaskState::Errored);
        deliver(&id, envelope.reply.take(), Err(TaskError::NoHandler(kind)));
        return;
    };

    let ctx = TaskContext {
        task_id: id,
        idempotency_key: envelope.idempotency_key,
        delivery,
    };
    let payload = envelope.payload.clone();
    let started = Instant::now();

    tracing::debug!(task_id = %id, kind = %kind, queue = %queue, delivery, handler = handler.name(), "task started");

    // Run on its own task so a panicking handler looks like a lost worker
    // instead of taking the dispatch loop down.
    let joined = tokio::spawn(async move { handler.handle(payload, ctx).await }).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match joined {
        Ok(Ok(output)) => {
            tracing::debug!(task_id = %id, kind = %kind, duration_ms, "task completed");
            shared.finish(&id, TaskState::Completed);
            deliver(&id, envelope.reply.take(), Ok(output));
        }
        Ok(Err(err)) => {
            tracing::warn!(task_id = %id, kind = %kind, duration_ms, error = %err, "task failed");
            shared.finish(&id, TaskState::Errored);
            deliver(&id, envelope.reply.take(), Err(TaskError::Failed(err)));
        }
        Err(join_err) => {
            tracing::warn!(
                task_id = %id,
                kind = %kind,
                delivery,
                error = %join_err,
                "worker lost while running task"
            );

            if delivery < shared.max_deliveries {
                if let Some(tx) = requeue.upgrade() {
                    shared.update(&id, |r| {
                        if !r.state.is_terminal() {
                            r.state = TaskState::Queued;
                        }
                    });
                    match tx.send(envelope) {
                        Ok(()) => {
                            tracing::warn!(task_id = %id, kind = %kind, "task redelivered");
                            return;
                        }
                        Err(mpsc::error::SendError(returned)) => envelope = returned,
                    }
                }
            }

            shared.finish(&id, TaskState::Errored);
            deliver(
                &id,
                envelope.reply.take(),
                Err(TaskError::WorkerLost {
                    kind,
                    deliveries: delivery,
                }),
            );
        }
    }
}

fn deliver(id: &Uuid, reply: Option<Reply>, result: Result<TaskOutput, TaskError>) {
    let Some(reply) = reply else {
        return;
    };
    if reply.send(result).is_err() {
        tracing::warn!(task_id = %id, "waiter gone; late task result discarded");
    }
}
