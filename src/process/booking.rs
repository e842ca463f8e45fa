//! Flight / house booking: a fixed confirmation delay, then re-arm.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::SimulationConfig;
use crate::journey::{BookingKind, JourneyUpdate, OptionId};

use super::simulator::{Procedure, ProgressReporter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub kind: BookingKind,
    pub id: OptionId,
}

pub struct BookingProcedure {
    delay: Duration,
    rearm: Duration,
}

impl BookingProcedure {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            delay: config.booking_delay,
            rearm: config.booking_rearm,
        }
    }
}

#[async_trait]
impl Procedure for BookingProcedure {
    type Input = BookingRequest;

    fn name(&self) -> &'static str {
        "booking"
    }

    async fn run(&self, request: &BookingRequest, progress: &ProgressReporter) -> JourneyUpdate {
        tokio::time::sleep(self.delay).await;
        progress.report(100);
        JourneyUpdate::Book {
            kind: request.kind,
            id: request.id.clone(),
        }
    }

    fn rearm_after(&self) -> Option<Duration> {
        Some(self.rearm)
    }
}
