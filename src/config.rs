//! Machine configuration.

/// How often a captured continuation may be resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumePolicy {
    /// A second resume of the same continuation is fatal.
    #[default]
    OneShot,
    /// A continuation may be resumed any number of times.
    MultiShot,
}

#[derive(Debug, Clone, Default)]
pub struct MachineConfig {
    pub resume_policy: ResumePolicy,
    /// Halt with `StepLimitExceeded` after this many steps.
    pub step_limit: Option<u64>,
}

impl MachineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resume_policy(mut self, policy: ResumePolicy) -> Self {
        self.resume_policy = policy;
        self
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = Some(limit);
        self
    }

    pub fn multi_shot(self) -> Self {
        self.with_resume_policy(ResumePolicy::MultiShot)
    }
}
