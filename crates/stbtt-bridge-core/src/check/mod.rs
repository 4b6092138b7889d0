//! Assertion verdicts.
//!
//! `STBTT_assert(x)` receives a C truth value. Any non-zero value passes; zero
//! fails, and a failure ends the process at the ABI layer.

/// Outcome of evaluating an assertion expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertVerdict {
    Pass,
    Fail,
}

impl AssertVerdict {
    #[must_use]
    pub const fn from_expression(expression: i32) -> Self {
        if expression != 0 { Self::Pass } else { Self::Fail }
    }

    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_zero_fails() {
        assert_eq!(AssertVerdict::from_expression(0), AssertVerdict::Fail);
        assert!(AssertVerdict::from_expression(0).is_fatal());
        for value in [1, -1, 2, i32::MAX, i32::MIN] {
            assert_eq!(AssertVerdict::from_expression(value), AssertVerdict::Pass);
        }
    }
}
