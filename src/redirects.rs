// File: redirects.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use std::sync::atomic::{AtomicU32, Ordering};

/// Redirect budget shared by the whole task tree.
#[derive(Debug)]
pub struct RedirectCounter {
    remaining: AtomicU32,
}

impl RedirectCounter {
    pub fn new(budget: u32) -> Self {
        Self {
            remaining: AtomicU32::new(budget),
        }
    }

    pub fn can_follow_one_more_redirect(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::sync::Arc;

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(5)]
    fn test_budget_exhaustion(#[case] budget: u32) {
        let counter = RedirectCounter::new(budget);
        let granted = (0..=budget)
            .filter(|_| counter.can_follow_one_more_redirect())
            .count();
        assert_eq!(granted, budget as usize);
        assert!(!counter.can_follow_one_more_redirect());
        assert_eq!(counter.remaining(), 0);
    }

    #[test]
    fn test_concurrent_callers_never_exceed_budget() {
        let counter = Arc::new(RedirectCounter::new(10));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    (0..10)
                        .filter(|_| counter.can_follow_one_more_redirect())
                        .count()
                })
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 10);
    }
}
