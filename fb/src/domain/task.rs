//! Daily task records

use serde::Deserialize;

/// One backend task and its reward status
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskRecord {
    /// Task identifier
    pub id: u32,

    /// The task's objective has been met
    pub completed: bool,

    /// Reward already claimed; claimed tasks are never claimed again
    pub reward_claimed: bool,

    /// Task offers the share-multiplier redemption path
    #[serde(default)]
    pub shareable: bool,
}

impl TaskRecord {
    /// True when a claim should be attempted
    pub fn claimable(&self) -> bool {
        self.completed && !self.reward_claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claimable() {
        let task = TaskRecord {
            id: 1,
            completed: true,
            reward_claimed: false,
            shareable: false,
        };
        assert!(task.claimable());

        let claimed = TaskRecord {
            reward_claimed: true,
            ..task.clone()
        };
        assert!(!claimed.claimable());

        let unfinished = TaskRecord {
            completed: false,
            ..task
        };
        assert!(!unfinished.claimable());
    }
}
