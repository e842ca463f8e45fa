//! Visa application: ticking progress, then the visa milestone.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;

use crate::config::SimulationConfig;
use crate::journey::{JourneyUpdate, Milestone};

use super::simulator::{Procedure, ProgressReporter};

pub struct VisaProcedure {
    tick: Duration,
    step: u8,
    settle: Duration,
}

impl VisaProcedure {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            tick: config.visa_tick,
            step: config.visa_step.max(1),
            settle: config.visa_settle,
        }
    }
}

#[async_trait]
impl Procedure for VisaProcedure {
    type Input = ();

    fn name(&self) -> &'static str {
        "visa"
    }

    async fn run(&self, _input: &(), progress: &ProgressReporter) -> JourneyUpdate {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        interval.tick().await;

        let mut percent: u8 = 0;
        while percent < 100 {
            interval.tick().await;
            percent = percent.saturating_add(self.step).min(100);
            progress.report(percent);
        }

        tokio::time::sleep(self.settle).await;
        JourneyUpdate::SetMilestone(Milestone::Visa, true)
    }
}
