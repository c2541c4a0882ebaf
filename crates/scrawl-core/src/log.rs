//! Append-only operation log and the pure reduction fold.
//!
//! The raw queue is never mutated in place: edits are `Update` entries,
//! deletions are `Remove` entries, and undo/redo are themselves logged
//! operations. [`reduce`] turns the raw queue into the canonical visible
//! scene; it is deterministic, side-effect free, and re-run in full after
//! every mutation so the scene is always a pure function of the queue.

use crate::ops::{OpBody, OpId, Operation};
use std::collections::HashSet;

/// Reduce a raw queue into the canonical visible scene.
///
/// 1. Stable-sort by timestamp (arrival order breaks ties).
/// 2. Fold undo/redo: `Undo` moves the last visible entry to a side stack,
///    `Redo` moves it back, any other operation clears the side stack.
/// 3. Truncate history at `Clear` boundaries: everything before a `Clear`
///    found past index 0 is dropped, repeatedly; a leading `Clear` stays.
/// 4. Fold every surviving `Update` into its target (dangling ids no-op).
/// 5. Drop the `Update` entries themselves and every entry targeted by a
///    surviving `Remove`. The `Remove` entries stay as inert markers so a
///    later `Undo` on the raw queue can pop them and resurrect the target.
pub fn reduce(queue: &[Operation]) -> Vec<Operation> {
    let mut sorted = queue.to_vec();
    sorted.sort_by_key(|op| op.timestamp);

    let mut visible: Vec<Operation> = Vec::new();
    let mut undone: Vec<Operation> = Vec::new();
    for op in sorted {
        match op.body {
            OpBody::Undo => {
                if let Some(last) = visible.pop() {
                    undone.push(last);
                }
            }
            OpBody::Redo => {
                if let Some(last) = undone.pop() {
                    visible.push(last);
                }
            }
            _ => {
                undone.clear();
                visible.push(op);
            }
        }
    }

    // History truncation: a Clear wipes everything before it. Repeat until
    // the only Clear left (if any) sits at index 0.
    loop {
        let boundary = visible
            .iter()
            .skip(1)
            .position(|op| matches!(op.body, OpBody::Clear))
            .map(|i| i + 1);
        match boundary {
            Some(i) => {
                visible.drain(..i);
            }
            None => break,
        }
    }

    // Overlay resolution, in order. The update is cloned out first so the
    // target can be patched through a second mutable traversal.
    for idx in 0..visible.len() {
        if let OpBody::Update { target, patch } = &visible[idx].body {
            let (target, patch) = (*target, patch.clone());
            if let Some(hit) = visible.iter_mut().find(|op| op.id == target) {
                hit.apply_patch(&patch);
            }
        }
    }

    let remove_ids: HashSet<OpId> = visible
        .iter()
        .filter_map(|op| match &op.body {
            OpBody::Remove { target } => Some(*target),
            _ => None,
        })
        .collect();

    visible
        .into_iter()
        .filter(|op| !matches!(op.body, OpBody::Update { .. }) && !remove_ids.contains(&op.id))
        .collect()
}

/// The append-only raw queue plus its cached reduction.
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    raw: Vec<Operation>,
    visible: Vec<Operation>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ops(raw: Vec<Operation>) -> Self {
        let visible = reduce(&raw);
        Self { raw, visible }
    }

    /// The raw, append-only queue.
    pub fn raw(&self) -> &[Operation] {
        &self.raw
    }

    /// The canonical visible scene.
    pub fn visible(&self) -> &[Operation] {
        &self.visible
    }

    /// Append an operation and re-derive the visible scene.
    pub fn append(&mut self, op: Operation) {
        self.raw.push(op);
        self.visible = reduce(&self.raw);
    }

    /// Swap the most recently appended raw entry. Used to coalesce an
    /// in-progress continuous drag into a single pending `Update`.
    pub fn replace_last(&mut self, op: Operation) {
        match self.raw.last_mut() {
            Some(last) => *last = op,
            None => self.raw.push(op),
        }
        self.visible = reduce(&self.raw);
    }

    /// Substitute the whole raw queue (authoritative state from a peer).
    pub fn replace_all(&mut self, raw: Vec<Operation>) {
        self.raw = raw;
        self.visible = reduce(&self.raw);
    }

    /// Whether an `Undo` appended now would have any effect.
    pub fn can_undo(&self) -> bool {
        !self.visible.is_empty()
    }

    /// Whether a `Redo` appended now would have any effect: the trailing
    /// run of `Undo`/`Redo` entries must net to a positive undo count,
    /// since any other operation invalidates the redo stack.
    pub fn can_redo(&self) -> bool {
        let mut net = 0i64;
        for op in self.raw.iter().rev() {
            match op.body {
                OpBody::Undo => net += 1,
                OpBody::Redo => net -= 1,
                _ => break,
            }
        }
        net > 0
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}
