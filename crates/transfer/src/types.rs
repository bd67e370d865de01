use std::ops::RangeInclusive;

/// Cursor and percent accounting of one streamed upload.
///
/// `step` is `total / 100` (at least 1). The reported percent is
/// `transferred / step`, capped at 100, and only moves forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferState {
    total: u64,
    transferred: u64,
    step: u64,
    percent: u64,
}

impl TransferState {
    /// Starts accounting at `offset` bytes already present remotely.
    pub fn new(total: u64, offset: u64) -> Self {
        let step = (total / 100).max(1);
        Self {
            total,
            transferred: offset,
            step,
            percent: (offset / step).min(100),
        }
    }

    /// Records `bytes` more sent. Returns every whole percent newly crossed.
    pub fn advance(&mut self, bytes: u64) -> RangeInclusive<u8> {
        self.transferred += bytes;
        let reached = (self.transferred / self.step).min(100);
        let crossed = (self.percent + 1) as u8..=reached as u8;
        self.percent = self.percent.max(reached);
        crossed
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Last whole percent reported.
    pub fn percent(&self) -> u8 {
        self.percent as u8
    }
}

/// Ordered fragment names plus the size they must add up to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSet {
    pub names: Vec<String>,
    pub expected_total: u64,
}

impl FragmentSet {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>, expected_total: u64) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            expected_total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}
