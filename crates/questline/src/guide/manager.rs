use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::nav::{
    straight_line_route, GridPathfinder, GridPoint, PathfinderConfig, Route, RouteKind,
    WalkabilityOracle,
};
use crate::progress::PlayerId;
use crate::zone::Zone;

use super::session::{GuideStep, PathGuideSession};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideConfig {
    pub tick_interval_ms: u64,
    /// A route shorter than this keeps lingering on its last waypoint.
    pub min_runtime_ms: u64,
    pub recompute_cooldown_ms: u64,
    pub straight_line_step: f64,
    pub max_route_len: usize,
    /// Quest slot during which players are guided.
    pub guided_quest: u8,
    pub target_zone: Option<Zone>,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            min_runtime_ms: 8_000,
            recompute_cooldown_ms: 2_000,
            straight_line_step: 1.0,
            max_route_len: 256,
            guided_quest: 1,
            target_zone: None,
        }
    }
}

impl GuideConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn min_runtime(&self) -> Duration {
        Duration::from_millis(self.min_runtime_ms)
    }

    pub fn recompute_cooldown(&self) -> Duration {
        Duration::from_millis(self.recompute_cooldown_ms)
    }
}

/// Shows a waypoint marker to one player. Failures are the emitter's problem.
pub trait MarkerEmitter {
    fn emit(&mut self, player: PlayerId, point: GridPoint);
}

/// What the guide needs to know about players each tick.
pub trait GuideAudience {
    /// Current feet position, `None` once the player is offline.
    fn position(&self, player: PlayerId) -> Option<GridPoint>;

    /// Whether the player is still on the guided quest stage.
    fn is_guided(&self, player: PlayerId) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuideTickReport {
    pub markers_emitted: usize,
    pub paused: usize,
    pub restarted: usize,
    pub recomputed: usize,
    pub torn_down: usize,
}

#[derive(Debug)]
struct GuideEntry {
    session: PathGuideSession,
    target: GridPoint,
    last_recompute: Instant,
}

/// Owns every active guide session, keyed by player.
#[derive(Debug)]
pub struct PathGuideManager {
    sessions: BTreeMap<PlayerId, GuideEntry>,
    guide: GuideConfig,
    pathfinding: PathfinderConfig,
}

impl PathGuideManager {
    pub fn new(guide: GuideConfig, pathfinding: PathfinderConfig) -> Self {
        Self {
            sessions: BTreeMap::new(),
            guide,
            pathfinding,
        }
    }

    pub fn config(&self) -> &GuideConfig {
        &self.guide
    }

    /// Computes a route and replaces any session the player already had.
    pub fn start_guide(
        &mut self,
        oracle: &impl WalkabilityOracle,
        player: PlayerId,
        from: GridPoint,
        target: GridPoint,
        now: Instant,
    ) -> RouteKind {
        let route = compute_route(oracle, &self.pathfinding, &self.guide, from, target);
        let kind = route.kind();
        info!(player = %player, ?kind, waypoints = route.len(), "guide_started");
        self.sessions.insert(
            player,
            GuideEntry {
                session: PathGuideSession::start(route, now),
                target,
                last_recompute: now,
            },
        );
        kind
    }

    pub fn stop_guide(&mut self, player: PlayerId) -> bool {
        let removed = self.sessions.remove(&player).is_some();
        if removed {
            debug!(player = %player, "guide_stopped");
        }
        removed
    }

    pub fn is_guiding(&self, player: PlayerId) -> bool {
        self.sessions.contains_key(&player)
    }

    pub fn session(&self, player: PlayerId) -> Option<&PathGuideSession> {
        self.sessions.get(&player).map(|entry| &entry.session)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Route from `from` to `to`, preferring A* and falling back to a
    /// terrain-snapped straight line when A* finds nothing.
    pub fn compute_route(
        &self,
        oracle: &impl WalkabilityOracle,
        from: GridPoint,
        to: GridPoint,
    ) -> Route {
        compute_route(oracle, &self.pathfinding, &self.guide, from, to)
    }

    /// Advances every session by one animation step.
    pub fn tick(
        &mut self,
        now: Instant,
        oracle: &impl WalkabilityOracle,
        audience: &impl GuideAudience,
        emitter: &mut impl MarkerEmitter,
    ) -> GuideTickReport {
        let mut report = GuideTickReport::default();
        let min_runtime = self.guide.min_runtime();
        let cooldown = self.guide.recompute_cooldown();
        let guide = &self.guide;
        let pathfinding = &self.pathfinding;

        self.sessions.retain(|player, entry| {
            let Some(position) = audience.position(*player) else {
                debug!(player = %player, "guide_player_offline");
                report.torn_down += 1;
                return false;
            };
            if !audience.is_guided(*player) {
                debug!(player = %player, "guide_stage_left");
                report.torn_down += 1;
                return false;
            }

            match entry.session.advance(now, min_runtime) {
                GuideStep::Emitted(point) => {
                    emitter.emit(*player, point);
                    report.markers_emitted += 1;
                }
                GuideStep::Waiting => report.paused += 1,
                GuideStep::Exhausted => {
                    if now.saturating_duration_since(entry.last_recompute) < cooldown {
                        entry.session.restart();
                        report.restarted += 1;
                    } else {
                        let route =
                            compute_route(oracle, pathfinding, guide, position, entry.target);
                        debug!(
                            player = %player,
                            kind = ?route.kind(),
                            waypoints = route.len(),
                            "guide_route_recomputed"
                        );
                        entry.session = PathGuideSession::start(route, now);
                        entry.last_recompute = now;
                        report.recomputed += 1;
                    }
                }
            }
            true
        });
        report
    }
}

fn compute_route(
    oracle: &impl WalkabilityOracle,
    pathfinding: &PathfinderConfig,
    guide: &GuideConfig,
    from: GridPoint,
    to: GridPoint,
) -> Route {
    let route = GridPathfinder::new(oracle, pathfinding).find_path(from, to, guide.max_route_len);
    if !route.is_empty() {
        return route;
    }
    let fallback = straight_line_route(
        oracle,
        from,
        to,
        guide.straight_line_step,
        pathfinding.vertical_probe_span,
    );
    if guide.max_route_len > 0 && fallback.len() > guide.max_route_len {
        let points = fallback.points()[..guide.max_route_len].to_vec();
        return Route::from_points(points, RouteKind::StraightLine);
    }
    fallback
}
