//! Minimal edit scripts between two sequences.
//!
//! The search is Myers' O((N+M)·D) algorithm in its linear-space form: each sub-range is split
//! at its middle snake, found by running the forward and backward passes towards each other.
//! Matches are then classified as unchanged/changed, optionally paired into moves, and finally
//! replayed from the end of the list to produce operations whose positions are valid at the
//! moment each one is applied.

/// Index-based view of two sequences being compared.
pub trait DiffCallback {
    fn old_len(&self) -> usize;

    fn new_len(&self) -> usize;

    /// Whether the two entries represent the same thing (possibly with different content).
    fn same_item(&self, old_index: usize, new_index: usize) -> bool;

    /// Whether the two entries render identically. Only asked when `same_item` holds.
    fn same_content(&self, old_index: usize, new_index: usize) -> bool;
}

/// One step of an [`EditScript`].
///
/// Positions refer to the list as it is right before the operation is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EditOp {
    /// Insert `new[new_index..new_index + count]` at `position`.
    Insert {
        position: usize,
        new_index: usize,
        count: usize,
    },
    /// Remove `count` entries starting at `position`.
    Remove { position: usize, count: usize },
    /// Remove the entry at `from`, then insert it at `to`.
    Move { from: usize, to: usize },
    /// Replace `count` entries at `position` with `new[new_index..new_index + count]`.
    Change {
        position: usize,
        new_index: usize,
        count: usize,
    },
}

/// An ordered list of [`EditOp`]s transforming an old sequence into a new one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EditScript {
    ops: Vec<EditOp>,
}

impl EditScript {
    pub fn ops(&self) -> &[EditOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, EditOp> {
        self.ops.iter()
    }

    /// Replays the script on `list`, taking inserted and changed entries from `new`.
    ///
    /// Applying a script to a copy of the old sequence it was computed from yields `new`
    /// (entries that matched without a content change keep their old value).
    pub fn apply<T: Clone>(&self, list: &mut Vec<T>, new: &[T]) {
        for op in &self.ops {
            match *op {
                EditOp::Insert {
                    position,
                    new_index,
                    count,
                } => {
                    list.splice(
                        position..position,
                        new[new_index..new_index + count].iter().cloned(),
                    );
                }
                EditOp::Remove { position, count } => {
                    list.drain(position..position + count);
                }
                EditOp::Move { from, to } => {
                    let value = list.remove(from);
                    list.insert(to, value);
                }
                EditOp::Change {
                    position,
                    new_index,
                    count,
                } => {
                    list[position..position + count]
                        .clone_from_slice(&new[new_index..new_index + count]);
                }
            }
        }
    }
}

impl<'a> IntoIterator for &'a EditScript {
    type Item = &'a EditOp;
    type IntoIter = core::slice::Iter<'a, EditOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

/// Computes the edit script between the two sequences described by `cb`.
///
/// With `detect_moves`, entries that were removed at one place and inserted at another are
/// reported as a single [`EditOp::Move`]; pairing them costs O(removed × inserted) extra
/// comparisons.
pub fn calculate_diff(cb: &impl DiffCallback, detect_moves: bool) -> EditScript {
    match calculate_diff_until(cb, detect_moves, &|| false) {
        Some(script) => script,
        None => EditScript::default(),
    }
}

/// Like [`calculate_diff`], but gives up (returning `None`) as soon as `should_stop` says so.
pub(crate) fn calculate_diff_until(
    cb: &impl DiffCallback,
    detect_moves: bool,
    should_stop: &dyn Fn() -> bool,
) -> Option<EditScript> {
    let old_len = cb.old_len();
    let new_len = cb.new_len();

    let mut diagonals = Vec::new();
    let mut stack = vec![Span {
        old_start: 0,
        old_end: old_len,
        new_start: 0,
        new_end: new_len,
    }];
    let max = (old_len + new_len).div_ceil(2);
    let mut forward = Centered::new(max);
    let mut backward = Centered::new(max);

    while let Some(span) = stack.pop() {
        if should_stop() {
            return None;
        }
        let Some(snake) = mid_point(span, cb, &mut forward, &mut backward) else {
            continue;
        };
        if snake.diagonal_size() > 0 {
            diagonals.push(snake.to_diagonal());
        }
        stack.push(Span {
            old_start: span.old_start,
            old_end: snake.start_x as usize,
            new_start: span.new_start,
            new_end: snake.start_y as usize,
        });
        stack.push(Span {
            old_start: snake.end_x as usize,
            old_end: span.old_end,
            new_start: snake.end_y as usize,
            new_end: span.new_end,
        });
    }
    diagonals.sort_by_key(|d| d.x);

    let mut matches = Matches::new(cb, diagonals);
    if detect_moves {
        if should_stop() {
            return None;
        }
        matches.find_moves(cb);
    }
    Some(matches.into_script())
}

/// Diffs two slices with caller-provided identity and content predicates.
pub fn diff_slices_by<T>(
    old: &[T],
    new: &[T],
    detect_moves: bool,
    same_item: impl Fn(&T, &T) -> bool,
    same_content: impl Fn(&T, &T) -> bool,
) -> EditScript {
    calculate_diff(
        &SliceDiff {
            old,
            new,
            same_item,
            same_content,
        },
        detect_moves,
    )
}

struct SliceDiff<'a, T, I, C> {
    old: &'a [T],
    new: &'a [T],
    same_item: I,
    same_content: C,
}

impl<T, I, C> DiffCallback for SliceDiff<'_, T, I, C>
where
    I: Fn(&T, &T) -> bool,
    C: Fn(&T, &T) -> bool,
{
    fn old_len(&self) -> usize {
        self.old.len()
    }

    fn new_len(&self) -> usize {
        self.new.len()
    }

    fn same_item(&self, old_index: usize, new_index: usize) -> bool {
        (self.same_item)(&self.old[old_index], &self.new[new_index])
    }

    fn same_content(&self, old_index: usize, new_index: usize) -> bool {
        (self.same_content)(&self.old[old_index], &self.new[new_index])
    }
}

#[derive(Clone, Copy, Debug)]
struct Span {
    old_start: usize,
    old_end: usize,
    new_start: usize,
    new_end: usize,
}

impl Span {
    fn old_len(&self) -> usize {
        self.old_end - self.old_start
    }

    fn new_len(&self) -> usize {
        self.new_end - self.new_start
    }
}

/// A run of matching entries starting at `(x, y)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Diagonal {
    x: usize,
    y: usize,
    size: usize,
}

impl Diagonal {
    fn end_x(&self) -> usize {
        self.x + self.size
    }

    fn end_y(&self) -> usize {
        self.y + self.size
    }
}

/// A diagonal plus at most one insertion or removal, as produced by the middle-snake search.
///
/// Forward snakes have the extra step before the diagonal, reverse snakes after it.
#[derive(Clone, Copy, Debug)]
struct Snake {
    start_x: isize,
    start_y: isize,
    end_x: isize,
    end_y: isize,
    reverse: bool,
}

impl Snake {
    fn has_addition_or_removal(&self) -> bool {
        self.end_y - self.start_y != self.end_x - self.start_x
    }

    fn is_addition(&self) -> bool {
        self.end_y - self.start_y > self.end_x - self.start_x
    }

    fn diagonal_size(&self) -> usize {
        (self.end_x - self.start_x).min(self.end_y - self.start_y) as usize
    }

    fn to_diagonal(&self) -> Diagonal {
        let (x, y) = (self.start_x as usize, self.start_y as usize);
        let size = self.diagonal_size();
        if !self.has_addition_or_removal() || self.reverse {
            Diagonal { x, y, size }
        } else if self.is_addition() {
            Diagonal { x, y: y + 1, size }
        } else {
            Diagonal { x: x + 1, y, size }
        }
    }
}

/// Furthest-reaching x per diagonal `k`, indexable with negative `k`.
struct Centered {
    data: Vec<isize>,
    mid: isize,
}

impl Centered {
    fn new(max: usize) -> Self {
        Self {
            data: vec![0; max * 2 + 1],
            mid: max as isize,
        }
    }

    fn get(&self, k: isize) -> isize {
        self.data[(k + self.mid) as usize]
    }

    fn set(&mut self, k: isize, value: isize) {
        self.data[(k + self.mid) as usize] = value;
    }
}

fn mid_point(
    span: Span,
    cb: &impl DiffCallback,
    forward: &mut Centered,
    backward: &mut Centered,
) -> Option<Snake> {
    if span.old_len() == 0 || span.new_len() == 0 {
        return None;
    }
    let max = (span.old_len() + span.new_len()).div_ceil(2) as isize;
    forward.set(1, span.old_start as isize);
    backward.set(1, span.old_end as isize);
    for d in 0..max {
        if let Some(snake) = forward_step(span, cb, forward, backward, d) {
            return Some(snake);
        }
        if let Some(snake) = backward_step(span, cb, forward, backward, d) {
            return Some(snake);
        }
    }
    None
}

fn forward_step(
    span: Span,
    cb: &impl DiffCallback,
    forward: &mut Centered,
    backward: &Centered,
    d: isize,
) -> Option<Snake> {
    let (old_start, old_end) = (span.old_start as isize, span.old_end as isize);
    let (new_start, new_end) = (span.new_start as isize, span.new_end as isize);
    let delta = span.old_len() as isize - span.new_len() as isize;
    let check_for_snake = delta.rem_euclid(2) == 1;

    let mut k = -d;
    while k <= d {
        // Either step down from diagonal k + 1 (insertion) or right from k - 1 (removal).
        let (start_x, mut x) = if k == -d || (k != d && forward.get(k + 1) > forward.get(k - 1))
        {
            let x = forward.get(k + 1);
            (x, x)
        } else {
            let start_x = forward.get(k - 1);
            (start_x, start_x + 1)
        };
        let mut y = new_start + (x - old_start) - k;
        let start_y = if d == 0 || x != start_x { y } else { y - 1 };
        while x < old_end && y < new_end && cb.same_item(x as usize, y as usize) {
            x += 1;
            y += 1;
        }
        forward.set(k, x);
        if check_for_snake {
            let backward_k = delta - k;
            if backward_k >= -d + 1 && backward_k <= d - 1 && backward.get(backward_k) <= x {
                return Some(Snake {
                    start_x,
                    start_y,
                    end_x: x,
                    end_y: y,
                    reverse: false,
                });
            }
        }
        k += 2;
    }
    None
}

fn backward_step(
    span: Span,
    cb: &impl DiffCallback,
    forward: &Centered,
    backward: &mut Centered,
    d: isize,
) -> Option<Snake> {
    let (old_start, old_end) = (span.old_start as isize, span.old_end as isize);
    let (new_start, new_end) = (span.new_start as isize, span.new_end as isize);
    let delta = span.old_len() as isize - span.new_len() as isize;
    let check_for_snake = delta.rem_euclid(2) == 0;

    let mut k = -d;
    while k <= d {
        // Mirror of the forward pass: x shrinks towards the start of the span.
        let (start_x, mut x) =
            if k == -d || (k != d && backward.get(k + 1) < backward.get(k - 1)) {
                let x = backward.get(k + 1);
                (x, x)
            } else {
                let start_x = backward.get(k - 1);
                (start_x, start_x - 1)
            };
        let mut y = new_end - ((old_end - x) - k);
        let start_y = if d == 0 || x != start_x { y } else { y + 1 };
        while x > old_start && y > new_start && cb.same_item((x - 1) as usize, (y - 1) as usize)
        {
            x -= 1;
            y -= 1;
        }
        backward.set(k, x);
        if check_for_snake {
            let forward_k = delta - k;
            if forward_k >= -d && forward_k <= d && forward.get(forward_k) >= x {
                return Some(Snake {
                    start_x: x,
                    start_y: y,
                    end_x: start_x,
                    end_y: start_y,
                    reverse: true,
                });
            }
        }
        k += 2;
    }
    None
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Unmatched,
    Matched {
        other: usize,
        changed: bool,
        moved: bool,
    },
}

struct Matches {
    diagonals: Vec<Diagonal>,
    old: Vec<Status>,
    new: Vec<Status>,
}

impl Matches {
    fn new(cb: &impl DiffCallback, mut diagonals: Vec<Diagonal>) -> Self {
        let old_len = cb.old_len();
        let new_len = cb.new_len();

        // Sentinels at both corners so the replay below never special-cases the edges.
        if diagonals.first().is_none_or(|d| d.x != 0 || d.y != 0) {
            diagonals.insert(0, Diagonal { x: 0, y: 0, size: 0 });
        }
        diagonals.push(Diagonal {
            x: old_len,
            y: new_len,
            size: 0,
        });

        let mut old = vec![Status::Unmatched; old_len];
        let mut new = vec![Status::Unmatched; new_len];
        for diagonal in &diagonals {
            for offset in 0..diagonal.size {
                let (x, y) = (diagonal.x + offset, diagonal.y + offset);
                let changed = !cb.same_content(x, y);
                old[x] = Status::Matched {
                    other: y,
                    changed,
                    moved: false,
                };
                new[y] = Status::Matched {
                    other: x,
                    changed,
                    moved: false,
                };
            }
        }
        Self {
            diagonals,
            old,
            new,
        }
    }

    /// Pairs every unmatched old entry with the first unmatched new entry it is the same item
    /// as.
    fn find_moves(&mut self, cb: &impl DiffCallback) {
        let mut x = 0;
        for i in 0..self.diagonals.len() {
            let diagonal = self.diagonals[i];
            while x < diagonal.x {
                if self.old[x] == Status::Unmatched {
                    self.find_matching_insertion(cb, x);
                }
                x += 1;
            }
            x = diagonal.end_x();
        }
    }

    fn find_matching_insertion(&mut self, cb: &impl DiffCallback, x: usize) {
        let mut y = 0;
        for diagonal in &self.diagonals {
            while y < diagonal.y {
                if self.new[y] == Status::Unmatched && cb.same_item(x, y) {
                    let changed = !cb.same_content(x, y);
                    self.old[x] = Status::Matched {
                        other: y,
                        changed,
                        moved: true,
                    };
                    self.new[y] = Status::Matched {
                        other: x,
                        changed,
                        moved: true,
                    };
                    return;
                }
                y += 1;
            }
            y = diagonal.end_y();
        }
    }

    /// Replays the alignment from the end of both lists.
    ///
    /// `current` mirrors the list being edited: `[0, x)` still holds untouched old entries, the
    /// tail holds placed new entries (ascending) interleaved with moved-away old entries whose
    /// destination has not been reached yet.
    fn into_script(self) -> EditScript {
        let mut out = Batcher::default();
        let mut current: Vec<Token> = (0..self.old.len()).map(Token::Old).collect();
        let mut x = self.old.len();
        let mut y = self.new.len();

        for diagonal in self.diagonals.iter().rev() {
            while x > diagonal.end_x() {
                x -= 1;
                match self.old[x] {
                    Status::Unmatched => {
                        current.remove(x);
                        out.push(EditOp::Remove {
                            position: x,
                            count: 1,
                        });
                    }
                    Status::Matched {
                        other, changed, ..
                    } => {
                        // Destination already passed: it is waiting for this entry.
                        if other >= y {
                            current.remove(x);
                            let to = insertion_point(&current, other);
                            current.insert(to, Token::New(other));
                            out.push(EditOp::Move { from: x, to });
                            if changed {
                                out.push(change_at(to, other));
                            }
                        }
                    }
                }
            }
            while y > diagonal.end_y() {
                y -= 1;
                match self.new[y] {
                    Status::Unmatched => {
                        current.insert(x, Token::New(y));
                        out.push(EditOp::Insert {
                            position: x,
                            new_index: y,
                            count: 1,
                        });
                    }
                    Status::Matched {
                        other, changed, ..
                    } => {
                        // Source already passed: it was left in the tail, fetch it.
                        if other >= x {
                            let Some(from) = current.iter().position(|t| *t == Token::Old(other))
                            else {
                                debug_assert!(false, "moved entry {other} missing from replay");
                                continue;
                            };
                            current.remove(from);
                            let to = insertion_point(&current, y);
                            current.insert(to, Token::New(y));
                            out.push(EditOp::Move { from, to });
                            if changed {
                                out.push(change_at(to, y));
                            }
                        }
                    }
                }
            }
            for offset in 0..diagonal.size {
                let (dx, dy) = (diagonal.x + offset, diagonal.y + offset);
                current[dx] = Token::New(dy);
                if let Status::Matched { changed: true, .. } = self.old[dx] {
                    out.push(change_at(dx, dy));
                }
            }
            x = diagonal.x;
            y = diagonal.y;
        }
        debug_assert!(
            current.iter().copied().eq((0..self.new.len()).map(Token::New)),
            "edit script replay did not converge"
        );
        EditScript { ops: out.ops }
    }
}

fn change_at(position: usize, new_index: usize) -> EditOp {
    EditOp::Change {
        position,
        new_index,
        count: 1,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token {
    Old(usize),
    New(usize),
}

/// Where new entry `y` goes: right before the first placed entry that follows it.
fn insertion_point(current: &[Token], y: usize) -> usize {
    current
        .iter()
        .position(|t| matches!(*t, Token::New(placed) if placed > y))
        .unwrap_or(current.len())
}

/// Coalesces adjacent single-entry operations into ranges.
#[derive(Default)]
struct Batcher {
    ops: Vec<EditOp>,
}

impl Batcher {
    fn push(&mut self, op: EditOp) {
        let Some(last) = self.ops.last_mut() else {
            self.ops.push(op);
            return;
        };
        match (last, op) {
            (
                EditOp::Remove { position, count },
                EditOp::Remove {
                    position: p,
                    count: c,
                },
            ) if p + c == *position => {
                *position = p;
                *count += c;
            }
            (
                EditOp::Insert {
                    position,
                    new_index,
                    count,
                },
                EditOp::Insert {
                    position: p,
                    new_index: j,
                    count: c,
                },
            ) if p == *position && j + c == *new_index => {
                *new_index = j;
                *count += c;
            }
            (
                EditOp::Change {
                    position,
                    new_index,
                    count,
                },
                EditOp::Change {
                    position: p,
                    new_index: j,
                    count: c,
                },
            ) if p == *position + *count && j == *new_index + *count => {
                *count += c;
            }
            (
                EditOp::Change {
                    position,
                    new_index,
                    count,
                },
                EditOp::Change {
                    position: p,
                    new_index: j,
                    count: c,
                },
            ) if p + c == *position && j + c == *new_index => {
                *position = p;
                *new_index = j;
                *count += c;
            }
            _ => self.ops.push(op),
        }
    }
}
