//! Shared resource pool with admission control.
//!
//! The pool tracks usage across four dimensions (tokens, compute units,
//! memory, storage) against hard limits. Allocation is all-or-nothing and
//! the whole check-then-commit runs inside one critical section, so
//! concurrent requests can never jointly overshoot a limit.

use overmind_core::ResourceUsage;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Process-wide resource budget with admission control.
#[derive(Debug)]
pub struct ResourcePool {
    limits: ResourceUsage,
    usage: Mutex<ResourceUsage>,
}

impl ResourcePool {
    /// Create a pool with the given hard limits and zero usage.
    pub fn new(limits: ResourceUsage) -> Self {
        Self {
            limits,
            usage: Mutex::new(ResourceUsage::ZERO),
        }
    }

    /// Try to allocate the requirements.
    ///
    /// Returns `true` and commits all four dimensions together when every
    /// dimension fits under its limit; returns `false` and leaves usage
    /// completely unchanged otherwise. A `false` is an admission-control
    /// rejection, not an error to retry automatically.
    pub fn allocate(&self, requirements: &ResourceUsage) -> bool {
        let mut usage = match self.usage.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let candidate = usage.plus(requirements);
        if !candidate.within(&self.limits) {
            debug!(%requirements, usage = %*usage, limits = %self.limits, "allocation rejected");
            return false;
        }
        *usage = candidate;
        true
    }

    /// Release previously allocated requirements.
    ///
    /// Each dimension clamps at zero. A release exceeding current usage
    /// indicates an accounting bug in the caller; the clamp masks it, so it
    /// is logged instead of silently swallowed.
    pub fn release(&self, requirements: &ResourceUsage) {
        let mut usage = match self.usage.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !requirements.within(&usage) {
            warn!(%requirements, usage = %*usage, "release exceeds current usage, clamping");
        }
        *usage = usage.minus_clamped(requirements);
    }

    /// Snapshot of current usage.
    pub fn current_usage(&self) -> ResourceUsage {
        match self.usage.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// The pool's hard limits.
    pub fn limits(&self) -> ResourceUsage {
        self.limits
    }

    /// Headroom remaining in each dimension.
    pub fn available(&self) -> ResourceUsage {
        self.limits.minus_clamped(&self.current_usage())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(n: u64) -> ResourceUsage {
        ResourceUsage::new(n, 0, 0, 0)
    }

    #[test]
    fn test_allocate_within_limits() {
        let pool = ResourcePool::new(tokens(1000));
        assert!(pool.allocate(&tokens(600)));
        assert_eq!(pool.current_usage(), tokens(600));
    }

    #[test]
    fn test_rejected_allocation_leaves_usage_unchanged() {
        let pool = ResourcePool::new(tokens(1000));
        assert!(pool.allocate(&tokens(600)));
        // 600 + 500 > 1000
        assert!(!pool.allocate(&tokens(500)));
        assert_eq!(pool.current_usage(), tokens(600));
        pool.release(&tokens(600));
        assert_eq!(pool.current_usage(), ResourceUsage::ZERO);
    }

    #[test]
    fn test_all_or_nothing_across_dimensions() {
        let pool = ResourcePool::new(ResourceUsage::new(1000, 10, 0, 0));
        // Tokens fit but compute does not; nothing is committed.
        assert!(!pool.allocate(&ResourceUsage::new(100, 11, 0, 0)));
        assert_eq!(pool.current_usage(), ResourceUsage::ZERO);
    }

    #[test]
    fn test_release_clamps_at_zero() {
        let pool = ResourcePool::new(tokens(1000));
        assert!(pool.allocate(&tokens(100)));
        pool.release(&tokens(500));
        assert_eq!(pool.current_usage(), ResourceUsage::ZERO);
    }

    #[test]
    fn test_release_restores_baseline_exactly() {
        let pool = ResourcePool::new(ResourceUsage::new(1000, 10, 4096, 0));
        let req = ResourceUsage::new(250, 2, 1024, 0);
        assert!(pool.allocate(&req));
        assert!(pool.allocate(&req));
        pool.release(&req);
        assert_eq!(pool.current_usage(), req);
    }

    #[test]
    fn test_available_headroom() {
        let pool = ResourcePool::new(tokens(1000));
        assert!(pool.allocate(&tokens(300)));
        assert_eq!(pool.available(), tokens(700));
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            /// Usage never exceeds limits under any allocate/release sequence.
            #[test]
            fn prop_usage_never_exceeds_limits(
                ops in proptest::collection::vec((any::<bool>(), 0u64..500), 1..40)
            ) {
                let pool = ResourcePool::new(ResourceUsage::new(1000, 1000, 1000, 1000));
                for (is_alloc, amount) in ops {
                    let req = ResourceUsage::new(amount, amount / 2, amount / 4, 0);
                    if is_alloc {
                        pool.allocate(&req);
                    } else {
                        pool.release(&req);
                    }
                    prop_assert!(pool.current_usage().within(&pool.limits()));
                }
            }
        }
    }
}
