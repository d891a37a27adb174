use core::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Process-unique identity of an item, used by hosts to keep slot identity across moves.
///
/// Ids are negative and strictly decreasing in allocation order, starting at `-1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StableId(i64);

impl StableId {
    pub fn get(self) -> i64 {
        self.0
    }
}

/// Allocator for [`StableId`]s.
///
/// The counter is process-wide and never reset: it starts at zero when the process starts and
/// every allocation moves it one step down, so an id is never handed out twice.
#[derive(Clone, Copy, Debug, Default)]
pub struct StableIdAllocator;

static NEXT_STABLE_ID: AtomicI64 = AtomicI64::new(0);

impl StableIdAllocator {
    pub fn allocate() -> StableId {
        StableId(NEXT_STABLE_ID.fetch_sub(1, Ordering::Relaxed) - 1)
    }

    /// The most recently allocated id, or `None` before the first allocation.
    pub fn last() -> Option<StableId> {
        match NEXT_STABLE_ID.load(Ordering::Relaxed) {
            0 => None,
            v => Some(StableId(v)),
        }
    }
}

/// Identity of a [`crate::Slot`], unique for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotId(u64);

static NEXT_SLOT_ID: AtomicU64 = AtomicU64::new(1);

impl SlotId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub(crate) fn from_raw(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }
}
