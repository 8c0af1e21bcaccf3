/// Bounds how many times a request refreshes its token after the API rejects it with a 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_token_refreshes: u8,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_token_refreshes: 1,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_token_refreshes: u8) -> Self {
        Self {
            max_token_refreshes,
        }
    }

    /// A policy that returns the first 401 to the caller.
    pub fn never() -> Self {
        Self::new(0)
    }

    pub fn max_token_refreshes(&self) -> u8 {
        self.max_token_refreshes
    }

    /// `refreshes` is the number of token refreshes already done for the request.
    pub fn should_refresh(&self, refreshes: u8) -> bool {
        refreshes < self.max_token_refreshes
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::RetryPolicy;

    #[rstest]
    #[case(RetryPolicy::default(), 0, true)]
    #[case(RetryPolicy::default(), 1, false)]
    #[case(RetryPolicy::never(), 0, false)]
    #[case(RetryPolicy::new(3), 2, true)]
    #[case(RetryPolicy::new(3), 3, false)]
    fn should_refresh(#[case] policy: RetryPolicy, #[case] refreshes: u8, #[case] expected: bool) {
        assert_eq!(policy.should_refresh(refreshes), expected);
    }

    #[test]
    fn default_refreshes_once() {
        assert_eq!(RetryPolicy::default().max_token_refreshes(), 1);
    }
}
