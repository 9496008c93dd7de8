//! Monotonic index allocation
//!
//! Two independent allocators exist per run: one numbering output files,
//! seeded from whatever is already in the output directory, and one
//! numbering prompts for progress reporting, starting at zero.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe, strictly increasing counter
#[derive(Debug, Default)]
pub struct IndexAllocator {
    next: AtomicU64,
}

impl IndexAllocator {
    /// Allocator whose first `next()` returns `start`
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    /// Allocator seeded one past the largest leading integer among `names`
    pub fn from_existing<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        Self::starting_at(seed_from_names(names))
    }

    /// Take the next index. Never returns the same value twice.
    pub fn next(&self) -> u64 {
        // Uniqueness only needs the RMW to be atomic; no other memory is published through it.
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Value the next call to `next()` would return
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// Parse the leading decimal integer of a name, if any
pub fn leading_index(name: &str) -> Option<u64> {
    let digits_end = name
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(name.len());

    if digits_end == 0 {
        return None;
    }
    name[..digits_end].parse().ok()
}

/// `max + 1` over every parseable leading integer, or 0 when none parse
pub fn seed_from_names<I, N>(names: I) -> u64
where
    I: IntoIterator<Item = N>,
    N: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| leading_index(name.as_ref()))
        .max()
        .map(|max| max.saturating_add(1))
        .unwrap_or(0)
}
