/// Configuration for the diff engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiffOptions {
    /// Report relocated items as moves instead of a remove plus an insert.
    pub detect_moves: bool,

    /// Sequences longer than this are diffed on a worker thread.
    pub background_threshold: usize,

    /// Sequences longer than this are not diffed at all; the host gets a full invalidate.
    pub max_len: usize,
}

impl DiffOptions {
    pub const DEFAULT_BACKGROUND_THRESHOLD: usize = 500;
    pub const DEFAULT_MAX_LEN: usize = 1 << 26;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detect_moves(mut self, detect_moves: bool) -> Self {
        self.detect_moves = detect_moves;
        self
    }

    pub fn with_background_threshold(mut self, background_threshold: usize) -> Self {
        self.background_threshold = background_threshold;
        self
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub(crate) fn is_oversized(&self, old_len: usize, new_len: usize) -> bool {
        old_len > self.max_len || new_len > self.max_len
    }

    pub(crate) fn runs_in_background(&self, old_len: usize, new_len: usize) -> bool {
        old_len > self.background_threshold || new_len > self.background_threshold
    }
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            detect_moves: true,
            background_threshold: Self::DEFAULT_BACKGROUND_THRESHOLD,
            max_len: Self::DEFAULT_MAX_LEN,
        }
    }
}

/// Configuration for [`crate::Adapter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdapterOptions {
    pub diff: DiffOptions,
}

impl AdapterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_diff(mut self, diff: DiffOptions) -> Self {
        self.diff = diff;
        self
    }

    pub fn with_detect_moves(mut self, detect_moves: bool) -> Self {
        self.diff.detect_moves = detect_moves;
        self
    }
}
