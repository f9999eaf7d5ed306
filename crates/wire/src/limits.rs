//! Defensive decode limits.
//!
//! Limits are passed explicitly at reader construction and apply to that
//! reader alone. There is deliberately no process-wide switch: two readers
//! in the same process can run with different ceilings, and behavior in
//! tests is fully determined by the constructor arguments.

/// Ceilings enforced while decoding.
///
/// Violations surface as `RecursionLimitExceeded` and `SizeLimitExceeded`
/// decode errors.
#[derive(Debug, Clone)]
pub struct DecodeLimits {
    /// Maximum nesting depth of messages and groups (default: 64).
    pub recursion_limit: u32,

    /// Maximum cumulative bytes a reader may consume before the counter
    /// is reset (default: 2 GiB).
    pub size_limit: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        DecodeLimits {
            recursion_limit: 64,
            size_limit: i32::MAX as usize,
        }
    }
}

impl DecodeLimits {
    /// Create limits with small values for testing.
    ///
    /// Useful for unit tests that exercise limit enforcement without
    /// building deeply nested or very large inputs.
    pub fn with_small_limits() -> Self {
        DecodeLimits {
            recursion_limit: 8,
            size_limit: 1024,
        }
    }

    /// Replace the recursion limit.
    pub fn with_recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Replace the size limit.
    pub fn with_size_limit(mut self, limit: usize) -> Self {
        self.size_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = DecodeLimits::default();
        assert_eq!(limits.recursion_limit, 64);
        assert_eq!(limits.size_limit, i32::MAX as usize);
    }

    #[test]
    fn test_small_limits() {
        let limits = DecodeLimits::with_small_limits();
        assert_eq!(limits.recursion_limit, 8);
        assert_eq!(limits.size_limit, 1024);
    }

    #[test]
    fn test_builder_style_overrides() {
        let limits = DecodeLimits::default()
            .with_recursion_limit(4)
            .with_size_limit(64);
        assert_eq!(limits.recursion_limit, 4);
        assert_eq!(limits.size_limit, 64);
    }
}
