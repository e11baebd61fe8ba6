use std::time::{Duration, Instant};

use crate::nav::{GridPoint, Route};

/// Outcome of one animation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideStep {
    /// A marker should be shown at this waypoint.
    Emitted(GridPoint),
    /// Lingering after the last waypoint until the minimum runtime is met.
    Waiting,
    /// The route has been played out and the minimum runtime has elapsed.
    Exhausted,
}

/// Per-player playback cursor over a route.
#[derive(Debug, Clone)]
pub struct PathGuideSession {
    route: Route,
    cursor: usize,
    started_at: Instant,
    paused_until: Option<Instant>,
}

impl PathGuideSession {
    pub fn start(route: Route, now: Instant) -> Self {
        Self {
            route,
            cursor: 0,
            started_at: now,
            paused_until: None,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn is_paused(&self) -> bool {
        self.paused_until.is_some()
    }

    pub fn advance(&mut self, now: Instant, min_runtime: Duration) -> GuideStep {
        if let Some(until) = self.paused_until {
            if now < until {
                return GuideStep::Waiting;
            }
            self.paused_until = None;
        }

        if let Some(point) = self.route.get(self.cursor) {
            self.cursor += 1;
            return GuideStep::Emitted(point);
        }

        if now.saturating_duration_since(self.started_at) < min_runtime {
            self.paused_until = Some(self.started_at + min_runtime);
            return GuideStep::Waiting;
        }
        GuideStep::Exhausted
    }

    /// Replays the same route from the first waypoint.
    pub fn restart(&mut self) {
        self.cursor = 0;
        self.paused_until = None;
    }
}
