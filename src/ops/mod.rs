//! FIFO queue of long-running, stateful background operations.
//!
//! Only the head of the queue makes progress. It is stepped once per tick
//! until it marks itself done, then dropped on the following tick.

pub mod expand_all;

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use tracing::debug;

use crate::tree::Model;

/// Identity of a queued operation, unique within its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// A queued operation: typed state plus a completion flag.
///
/// Values are replaced, never mutated: a step consumes the operation and
/// returns its successor.
#[derive(Debug, Clone)]
pub struct Operation<S> {
    id: OperationId,
    state: S,
    done: bool,
}

impl<S> Operation<S> {
    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn mark_done(self) -> Self {
        Self { done: true, ..self }
    }

    pub fn with_state(self, state: S) -> Self {
        Self { state, ..self }
    }
}

/// What a step sees: the latest snapshot, which it may replace, and the
/// tick's clock.
pub struct StepContext<'a, R> {
    model: &'a mut Model<R>,
    now: Instant,
    can_load: bool,
}

impl<'a, R> StepContext<'a, R> {
    pub fn new(model: &'a mut Model<R>, now: Instant, can_load: bool) -> Self {
        Self {
            model,
            now,
            can_load,
        }
    }

    pub fn model(&self) -> &Model<R> {
        &*self.model
    }

    /// Publish a new snapshot.
    pub fn commit(&mut self, model: Model<R>) {
        *self.model = model;
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// Whether a child fetcher is configured.
    pub fn can_load(&self) -> bool {
        self.can_load
    }
}

/// Step function of an operation with state `S`.
pub type StepFn<S, R> =
    Box<dyn FnMut(Operation<S>, &mut StepContext<'_, R>) -> Operation<S> + Send>;

trait PendingOperation<R>: Send {
    fn id(&self) -> OperationId;
    fn label(&self) -> &'static str;
    fn is_done(&self) -> bool;
    fn step(&mut self, ctx: &mut StepContext<'_, R>);
}

struct Queued<S, R> {
    id: OperationId,
    label: &'static str,
    op: Option<Operation<S>>,
    step: StepFn<S, R>,
}

impl<S: Send, R> PendingOperation<R> for Queued<S, R> {
    fn id(&self) -> OperationId {
        self.id
    }

    fn label(&self) -> &'static str {
        self.label
    }

    fn is_done(&self) -> bool {
        self.op.as_ref().is_some_and(Operation::is_done)
    }

    fn step(&mut self, ctx: &mut StepContext<'_, R>) {
        if let Some(op) = self.op.take() {
            self.op = Some((self.step)(op, ctx));
        }
    }
}

/// Outcome of advancing the queue by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueTick {
    Idle,
    Dequeued(OperationId),
    Stepped { id: OperationId, done: bool },
}

impl QueueTick {
    /// Whether the queue itself changed shape or completion state.
    pub fn changed(self) -> bool {
        matches!(
            self,
            QueueTick::Dequeued(_) | QueueTick::Stepped { done: true, .. }
        )
    }
}

/// FIFO queue of operations, with its own id counter.
pub struct OperationQueue<R> {
    queue: VecDeque<Box<dyn PendingOperation<R>>>,
    next_id: u64,
}

impl<R> Default for OperationQueue<R> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            next_id: 0,
        }
    }
}

impl<R> fmt::Debug for OperationQueue<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.queue.iter().map(|op| (op.id(), op.label(), op.is_done())))
            .finish()
    }
}

impl<R: 'static> OperationQueue<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new operation with a fresh id.
    pub fn enqueue<S, F>(&mut self, label: &'static str, state: S, step: F) -> OperationId
    where
        S: Send + 'static,
        F: FnMut(Operation<S>, &mut StepContext<'_, R>) -> Operation<S> + Send + 'static,
    {
        let id = OperationId(self.next_id);
        self.next_id += 1;
        self.queue.push_back(Box::new(Queued {
            id,
            label,
            op: Some(Operation {
                id,
                state,
                done: false,
            }),
            step: Box::new(step),
        }));
        debug!(%id, label, "operation enqueued");
        id
    }

    /// Drop the head if it is done, otherwise step it.
    pub fn advance(&mut self, ctx: &mut StepContext<'_, R>) -> QueueTick {
        let Some(head) = self.queue.front_mut() else {
            return QueueTick::Idle;
        };
        let id = head.id();
        if head.is_done() {
            self.queue.pop_front();
            debug!(%id, "operation dequeued");
            return QueueTick::Dequeued(id);
        }
        head.step(ctx);
        QueueTick::Stepped {
            id,
            done: head.is_done(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn head_id(&self) -> Option<OperationId> {
        self.queue.front().map(|op| op.id())
    }

    pub fn head_label(&self) -> Option<&'static str> {
        self.queue.front().map(|op| op.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::Person;

    fn countdown(op: Operation<u32>, _ctx: &mut StepContext<'_, Person>) -> Operation<u32> {
        match *op.state() {
            0 => op.mark_done(),
            n => op.with_state(n - 1),
        }
    }

    fn advance(queue: &mut OperationQueue<Person>, model: &mut Model<Person>) -> QueueTick {
        let mut ctx = StepContext::new(model, Instant::now(), false);
        queue.advance(&mut ctx)
    }

    #[test]
    fn ids_increase_per_queue() {
        let mut queue: OperationQueue<Person> = OperationQueue::new();
        let a = queue.enqueue("a", 0u32, countdown);
        let b = queue.enqueue("b", 0u32, countdown);
        assert!(b > a);

        let mut other: OperationQueue<Person> = OperationQueue::new();
        assert_eq!(other.enqueue("c", 0u32, countdown), a);
    }

    #[test]
    fn empty_queue_is_idle() {
        let mut queue: OperationQueue<Person> = OperationQueue::new();
        let mut model = Model::create();
        assert_eq!(advance(&mut queue, &mut model), QueueTick::Idle);
    }

    #[test]
    fn head_runs_to_completion_before_next_starts() {
        let mut queue: OperationQueue<Person> = OperationQueue::new();
        let mut model = Model::create();
        let first = queue.enqueue("first", 1u32, countdown);
        let second = queue.enqueue("second", 0u32, countdown);

        assert_eq!(
            advance(&mut queue, &mut model),
            QueueTick::Stepped { id: first, done: false }
        );
        assert_eq!(
            advance(&mut queue, &mut model),
            QueueTick::Stepped { id: first, done: true }
        );
        assert_eq!(queue.head_id(), Some(first));
        assert_eq!(advance(&mut queue, &mut model), QueueTick::Dequeued(first));
        assert_eq!(queue.head_label(), Some("second"));
        assert_eq!(
            advance(&mut queue, &mut model),
            QueueTick::Stepped { id: second, done: true }
        );
        assert_eq!(advance(&mut queue, &mut model), QueueTick::Dequeued(second));
        assert!(queue.is_empty());
    }

    #[test]
    fn steps_can_commit_snapshots() {
        let mut queue: OperationQueue<Person> = OperationQueue::new();
        let mut model = Model::create();
        queue.enqueue("add", (), |op, ctx: &mut StepContext<'_, Person>| {
            let next = ctx
                .model()
                .add_child(
                    &crate::tree::NodeKey::Root,
                    crate::source::testing::person("a", "A"),
                )
                .expect("root exists");
            ctx.commit(next);
            op.mark_done()
        });

        advance(&mut queue, &mut model);
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn only_done_and_dequeue_count_as_changes() {
        let id = OperationId(3);
        assert!(!QueueTick::Idle.changed());
        assert!(!QueueTick::Stepped { id, done: false }.changed());
        assert!(QueueTick::Stepped { id, done: true }.changed());
        assert!(QueueTick::Dequeued(id).changed());
        assert_eq!(id.to_string(), "op#3");
    }
}
