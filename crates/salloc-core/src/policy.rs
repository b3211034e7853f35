//! Deterministic fault injection keyed by call-site identifier.
//!
//! A [`FailurePolicy`] arms at most one identifier. Calls carrying that
//! identifier succeed `success_budget` times, then fail on every later call
//! until the policy is replaced. Every other identifier (including all
//! negative ones) is exempt and never fails by policy.

/// Failure policy: which identifier is armed and how many calls it may win.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FailurePolicy {
    /// Identifier eligible for injected failure. `None` disables injection.
    pub armed_id: Option<i64>,
    /// Successful calls granted to `armed_id` before failures begin.
    /// Zero or negative means the first call fails.
    pub success_budget: i64,
}

impl FailurePolicy {
    /// Policy that never injects a failure.
    pub const DISARMED: Self = Self {
        armed_id: None,
        success_budget: 0,
    };

    /// Build a policy from the raw C-style pair. A negative `armed_id` disarms.
    #[must_use]
    pub const fn new(armed_id: i64, success_budget: i64) -> Self {
        Self {
            armed_id: if armed_id >= 0 { Some(armed_id) } else { None },
            success_budget,
        }
    }

    #[must_use]
    pub const fn is_armed(self) -> bool {
        self.armed_id.is_some()
    }

    /// True if `id` is subject to fault injection under this policy.
    #[must_use]
    pub const fn targets(self, id: i64) -> bool {
        match self.armed_id {
            Some(armed) => id >= 0 && id == armed,
            None => false,
        }
    }
}

/// Outcome of consulting the policy for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Identifier is not armed; the call proceeds and nothing is counted.
    Exempt,
    /// Armed identifier within budget; the call proceeds and was counted.
    Granted {
        /// Successful armed calls so far, this one included.
        successes: i64,
    },
    /// Armed identifier with the budget exhausted; the call must fail.
    Denied,
}

impl Admission {
    #[must_use]
    pub const fn proceeds(self) -> bool {
        !matches!(self, Self::Denied)
    }
}

/// Running evaluator for a [`FailurePolicy`].
#[derive(Debug, Default, Clone)]
pub struct FaultInjector {
    policy: FailurePolicy,
    successes: i64,
}

impl FaultInjector {
    #[must_use]
    pub const fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            successes: 0,
        }
    }

    /// Replace the policy and reset the success counter.
    pub fn configure(&mut self, policy: FailurePolicy) {
        self.policy = policy;
        self.successes = 0;
    }

    #[must_use]
    pub const fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Successful armed calls since the last `configure`.
    #[must_use]
    pub const fn successes(&self) -> i64 {
        self.successes
    }

    /// Decide whether a call carrying `id` may proceed.
    ///
    /// Only a granted armed call advances the counter; denied and exempt
    /// calls leave it untouched.
    pub fn admit(&mut self, id: i64) -> Admission {
        if !self.policy.targets(id) {
            return Admission::Exempt;
        }
        if self.successes >= self.policy.success_budget {
            return Admission::Denied;
        }
        self.successes += 1;
        Admission::Granted {
            successes: self.successes,
        }
    }
}
