use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use crate::diff::{DiffCallback, EditScript, calculate_diff_until};
use crate::{DiffError, DiffOptions, ItemRef};

/// An immutable snapshot of an item sequence.
///
/// Diffs only ever read snapshots, so the live sequence can keep changing while a worker runs.
pub type ItemList<V> = Arc<Vec<ItemRef<V>>>;

/// Handle to a diff computation running on a worker thread.
///
/// Handles are ordered by generation: a newer request always supersedes an older one.
#[derive(Clone, Debug)]
pub struct DiffHandle {
    generation: u64,
    cancelled: Arc<AtomicBool>,
}

impl DiffHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the computation was cancelled or superseded. Its result will never be delivered.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

pub(crate) enum DiffOutcome<V> {
    /// Both snapshots are the same sequence.
    Unchanged,
    /// The diff was skipped or failed; the host must re-render everything from `items`.
    Invalidate(ItemList<V>),
    /// `script` transforms the current sequence into `items`.
    Ready {
        script: EditScript,
        items: ItemList<V>,
    },
    /// The diff runs on a worker; poll for the result.
    Pending(DiffHandle),
}

struct PendingDiff<V> {
    handle: DiffHandle,
    rx: Receiver<Result<EditScript, DiffError>>,
    items: ItemList<V>,
}

/// Runs diffs inline or on a worker thread, keeping at most one outstanding at a time.
pub(crate) struct DiffDispatcher<V> {
    options: DiffOptions,
    generation: u64,
    pending: Option<PendingDiff<V>>,
}

impl<V: 'static> DiffDispatcher<V> {
    pub(crate) fn new(options: DiffOptions) -> Self {
        Self {
            options,
            generation: 0,
            pending: None,
        }
    }

    pub(crate) fn options(&self) -> &DiffOptions {
        &self.options
    }

    pub(crate) fn set_detect_moves(&mut self, detect_moves: bool) {
        self.options.detect_moves = detect_moves;
    }

    pub(crate) fn pending_handle(&self) -> Option<&DiffHandle> {
        self.pending.as_ref().map(|p| &p.handle)
    }

    /// Starts diffing `old` against `new`, superseding any outstanding computation.
    pub(crate) fn submit(&mut self, old: &ItemList<V>, new: ItemList<V>) -> DiffOutcome<V> {
        self.cancel();
        if Arc::ptr_eq(old, &new) {
            return DiffOutcome::Unchanged;
        }
        if self.options.is_oversized(old.len(), new.len()) {
            rdebug!(
                old_len = old.len(),
                new_len = new.len(),
                max_len = self.options.max_len,
                "sequence too large to diff; invalidating"
            );
            return DiffOutcome::Invalidate(new);
        }

        self.generation += 1;
        let handle = DiffHandle {
            generation: self.generation,
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        let detect_moves = self.options.detect_moves;

        if !self.options.runs_in_background(old.len(), new.len()) {
            rtrace!(old_len = old.len(), new_len = new.len(), "diffing inline");
            return match compute(old, &new, detect_moves, &|| false) {
                Some(Ok(script)) => DiffOutcome::Ready { script, items: new },
                Some(Err(_err)) => {
                    rwarn!(error = %_err, "diff failed; invalidating");
                    DiffOutcome::Invalidate(new)
                }
                None => DiffOutcome::Invalidate(new),
            };
        }

        rdebug!(
            generation = handle.generation,
            old_len = old.len(),
            new_len = new.len(),
            "diffing on a worker"
        );
        let (tx, rx) = mpsc::channel();
        let worker_old = Arc::clone(old);
        let worker_new = Arc::clone(&new);
        let cancelled = Arc::clone(&handle.cancelled);
        let spawned = thread::Builder::new()
            .name("recycler-diff".into())
            .spawn(move || {
                let should_stop = || cancelled.load(Ordering::Acquire);
                if let Some(result) = compute(&worker_old, &worker_new, detect_moves, &should_stop)
                {
                    // The receiver is gone once the request was cancelled.
                    let _ = tx.send(result);
                }
            });
        if let Err(_err) = spawned {
            rwarn!(error = %_err, "failed to spawn diff worker; invalidating");
            return DiffOutcome::Invalidate(new);
        }

        self.pending = Some(PendingDiff {
            handle: handle.clone(),
            rx,
            items: new,
        });
        DiffOutcome::Pending(handle)
    }

    /// Takes the result of the outstanding diff if it is ready.
    pub(crate) fn poll(&mut self) -> Option<DiffOutcome<V>> {
        let pending = self.pending.as_ref()?;
        let result = match pending.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(DiffError::WorkerLost),
        };
        let pending = self.pending.take()?;
        Some(Self::finish(pending, result))
    }

    /// Blocks until the outstanding diff completes.
    pub(crate) fn wait(&mut self) -> Option<DiffOutcome<V>> {
        let pending = self.pending.take()?;
        let result = pending.rx.recv().unwrap_or(Err(DiffError::WorkerLost));
        Some(Self::finish(pending, result))
    }

    /// Cancels the outstanding diff, returning the snapshot it was diffing towards.
    pub(crate) fn cancel(&mut self) -> Option<ItemList<V>> {
        let pending = self.pending.take()?;
        pending.handle.cancel();
        rdebug!(generation = pending.handle.generation, "diff cancelled");
        Some(pending.items)
    }

    fn finish(
        pending: PendingDiff<V>,
        result: Result<EditScript, DiffError>,
    ) -> DiffOutcome<V> {
        match result {
            Ok(script) => {
                rdebug!(
                    generation = pending.handle.generation,
                    ops = script.len(),
                    "diff delivered"
                );
                DiffOutcome::Ready {
                    script,
                    items: pending.items,
                }
            }
            Err(_err) => {
                rwarn!(
                    generation = pending.handle.generation,
                    error = %_err,
                    "diff failed; invalidating"
                );
                DiffOutcome::Invalidate(pending.items)
            }
        }
    }
}

impl<V> Drop for DiffDispatcher<V> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.cancel();
        }
    }
}

/// Items are the same when they are of the same kind; content is compared with `PartialEq`.
struct ItemDiff<'a, V> {
    old: &'a [ItemRef<V>],
    new: &'a [ItemRef<V>],
}

impl<V: 'static> DiffCallback for ItemDiff<'_, V> {
    fn old_len(&self) -> usize {
        self.old.len()
    }

    fn new_len(&self) -> usize {
        self.new.len()
    }

    fn same_item(&self, old_index: usize, new_index: usize) -> bool {
        self.old[old_index].view_type() == self.new[new_index].view_type()
    }

    fn same_content(&self, old_index: usize, new_index: usize) -> bool {
        self.old[old_index].same_content(&self.new[new_index])
    }
}

fn compute<V: 'static>(
    old: &[ItemRef<V>],
    new: &[ItemRef<V>],
    detect_moves: bool,
    should_stop: &dyn Fn() -> bool,
) -> Option<Result<EditScript, DiffError>> {
    let cb = ItemDiff { old, new };
    match panic::catch_unwind(AssertUnwindSafe(|| {
        calculate_diff_until(&cb, detect_moves, should_stop)
    })) {
        Ok(script) => script.map(Ok),
        Err(payload) => Some(Err(DiffError::Panicked(panic_message(payload.as_ref())))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
