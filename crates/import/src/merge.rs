use serde::Serialize;

/// How much a merge changed the destination list. Ordered so a running
/// status can fold upwards with `max`: `None < Minor < Major`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationStatus {
    None,
    Minor,
    Major,
}

/// Injected element-level operations for a positional list merge.
///
/// `C` is caller context threaded through unchanged (e.g. a unit-of-work
/// handle the callbacks write through).
pub trait ListMergeOps<S, D, C> {
    /// Copy fields from a source entry onto the destination entry at the
    /// same position; report how much changed.
    fn copy_from(&mut self, src: &S, dest: &mut D, ctx: &mut C) -> ModificationStatus;

    /// The source has an entry at a position the destination lacks: append
    /// a destination counterpart.
    fn append(&mut self, dest: &mut Vec<D>, src: &S, ctx: &mut C);

    /// The destination has an entry at a position the source lacks: remove
    /// it. `index` is the current position in `dest`.
    fn remove(&mut self, dest: &mut Vec<D>, index: usize, ctx: &mut C);
}

/// Align two ordered lists position by position and reconcile the
/// destination towards the source through the injected operations.
///
/// Purely positional — no similarity matching; the caller must have ordered
/// both lists comparably beforehand. Appends and removals are `Major`;
/// per-position copies contribute whatever the callback reports. The walk
/// carries an explicit bound as an endless-loop guard because the callbacks
/// may change the destination length.
pub fn merge_by_position<S, D, C>(
    source: &[S],
    dest: &mut Vec<D>,
    ctx: &mut C,
    ops: &mut impl ListMergeOps<S, D, C>,
) -> ModificationStatus {
    let mut status = ModificationStatus::None;
    let mut i = 0usize;

    while i < source.len() || i < dest.len() {
        if i > source.len().max(dest.len()) {
            break;
        }
        if i < source.len() && i < dest.len() {
            let step = ops.copy_from(&source[i], &mut dest[i], ctx);
            status = status.max(step);
        } else if i < source.len() {
            ops.append(dest, &source[i], ctx);
            status = ModificationStatus::Major;
        } else {
            ops.remove(dest, i, ctx);
            status = ModificationStatus::Major;
        }
        i += 1;
    }

    status
}
