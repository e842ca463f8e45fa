//! Milestone gating.

use serde::Serialize;

use super::model::{Milestone, Milestones};

/// Which milestones the user may currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Access {
    pub visa: bool,
    pub flight: bool,
    pub house: bool,
    pub profile: bool,
    pub job: bool,
}

impl Access {
    pub fn get(&self, milestone: Milestone) -> bool {
        match milestone {
            Milestone::Visa => self.visa,
            Milestone::Flight => self.flight,
            Milestone::House => self.house,
            Milestone::Profile => self.profile,
            Milestone::Job => self.job,
        }
    }
}

/// Job matching opens once the profile summary exists; everything else is
/// always open, in any order.
pub fn accessible(completed: &Milestones) -> Access {
    Access {
        visa: true,
        flight: true,
        house: true,
        profile: true,
        job: completed.profile,
    }
}
