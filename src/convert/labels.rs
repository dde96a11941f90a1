//! Unique-label allocation for exported documents.
//!
//! Portable formats key entities by human-readable labels instead of
//! generated ids, so every node/person/api-key needs a label that is unique
//! within its namespace for the duration of one export pass.

use rustc_hash::FxHashSet;

/// Allocates collision-free labels within one namespace.
///
/// Collisions are resolved by appending `-a`..`-z`, then `-1`, `-2`, …
/// Allocation is deterministic given insertion order but deliberately *not*
/// idempotent across passes: exporting a document that already contains
/// suffixed labels can suffix them again (`"Start-a"` colliding yields
/// `"Start-a-a"`). Each export is a one-way snapshot; the allocator is
/// rebuilt per call and never reused across concurrent exports.
///
/// ```rust
/// use diaflow::convert::LabelAllocator;
///
/// let mut labels = LabelAllocator::new();
/// assert_eq!(labels.allocate("Start"), "Start");
/// assert_eq!(labels.allocate("Start"), "Start-a");
/// assert_eq!(labels.allocate("Start"), "Start-b");
/// ```
#[derive(Debug, Default)]
pub struct LabelAllocator {
    used: FxHashSet<String>,
}

impl LabelAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a unique label derived from `desired`.
    ///
    /// The input is trimmed and colons are replaced with dashes so the
    /// result can safely appear on the node side of a `label:handle`
    /// endpoint reference. An empty input becomes `"untitled"`.
    pub fn allocate(&mut self, desired: &str) -> String {
        let base = Self::sanitize(desired);
        if self.used.insert(base.clone()) {
            return base;
        }
        for letter in b'a'..=b'z' {
            let candidate = format!("{base}-{}", letter as char);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
        let mut n = 1u64;
        loop {
            let candidate = format!("{base}-{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    fn sanitize(desired: &str) -> String {
        let trimmed = desired.trim();
        if trimmed.is_empty() {
            return "untitled".to_string();
        }
        trimmed.replace(':', "-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_caller_keeps_the_plain_label() {
        let mut labels = LabelAllocator::new();
        assert_eq!(labels.allocate("Ask"), "Ask");
        assert_eq!(labels.allocate("Tell"), "Tell");
    }

    #[test]
    fn collisions_walk_the_alphabet_then_numbers() {
        let mut labels = LabelAllocator::new();
        assert_eq!(labels.allocate("N"), "N");
        for letter in b'a'..=b'z' {
            assert_eq!(labels.allocate("N"), format!("N-{}", letter as char));
        }
        assert_eq!(labels.allocate("N"), "N-1");
        assert_eq!(labels.allocate("N"), "N-2");
    }

    #[test]
    fn sanitizes_colons_and_blank_labels() {
        let mut labels = LabelAllocator::new();
        assert_eq!(labels.allocate("a:b"), "a-b");
        assert_eq!(labels.allocate("   "), "untitled");
        assert_eq!(labels.allocate(""), "untitled-a");
    }

    #[test]
    fn suffixed_input_can_be_suffixed_again() {
        // Documented snapshot semantics: not idempotent across passes.
        let mut labels = LabelAllocator::new();
        assert_eq!(labels.allocate("Start-a"), "Start-a");
        assert_eq!(labels.allocate("Start"), "Start");
        assert_eq!(labels.allocate("Start-a"), "Start-a-a");
    }
}
