//! Step navigation for the active recipe

/// Current position within a recipe's steps
///
/// Every operation clamps into `0..len`; nothing is ever rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepNavigator {
    index: usize,
    len: usize,
}

impl StepNavigator {
    /// Start at the first of `len` steps
    #[must_use]
    pub const fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    /// Current step index
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Number of steps
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no steps at all
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// At the first step
    #[must_use]
    pub const fn is_first(&self) -> bool {
        self.index == 0
    }

    /// At the last step (or no steps)
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.index + 1 >= self.len
    }

    /// Go back one step; no-op at the first step
    pub const fn prev(&mut self) -> usize {
        self.index = self.index.saturating_sub(1);
        self.index
    }

    /// Advance one step; no-op at the last step
    pub const fn next(&mut self) -> usize {
        if !self.is_last() {
            self.index += 1;
        }
        self.index
    }

    /// Jump directly to `index`, clamped into range
    pub const fn jump_to(&mut self, index: usize) -> usize {
        self.index = if self.len == 0 {
            0
        } else if index >= self.len {
            self.len - 1
        } else {
            index
        };
        self.index
    }
}
