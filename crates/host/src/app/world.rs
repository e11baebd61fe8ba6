use std::collections::HashMap;

use questline::{
    BlockKind, BlockWalkability, Collaborators, Economy, GridPoint, GuideAudience, MarkerEmitter,
    PlayerId, QuestNotice, RewardSink, SkillProvider, VoxelGrid, Zone,
};
use tracing::{debug, info};

const WORLD_EDGE: i32 = 48;
const HOST_SKILL_LEVEL: u32 = 6;

pub(crate) const SPAWN: GridPoint = GridPoint { x: 2, y: 1, z: 2 };

/// Flat meadow with a ridge, a wall with a single gap and a lava strip
/// between spawn and the portal.
pub(crate) fn build_world() -> BlockWalkability<VoxelGrid> {
    let mut grid = VoxelGrid::with_floor(0, WORLD_EDGE, 0, WORLD_EDGE, 0);
    grid.fill(
        GridPoint::new(16, 1, 0),
        GridPoint::new(16, 4, WORLD_EDGE),
        BlockKind::Solid,
    );
    grid.fill(
        GridPoint::new(16, 1, 30),
        GridPoint::new(16, 4, 32),
        BlockKind::Air,
    );
    grid.fill(
        GridPoint::new(24, 1, 10),
        GridPoint::new(28, 1, 20),
        BlockKind::Solid,
    );
    grid.fill(
        GridPoint::new(30, 0, 0),
        GridPoint::new(32, 0, 24),
        BlockKind::Lava,
    );
    BlockWalkability::new(grid)
}

pub(crate) fn portal_zone() -> Zone {
    Zone::new(
        "spawn_portal",
        GridPoint::new(38, 1, 38),
        GridPoint::new(44, 4, 44),
    )
}

pub(crate) fn collaborators() -> Collaborators {
    Collaborators {
        economy: Box::new(LedgerEconomy::default()),
        skills: Box::new(FixedSkills {
            level: HOST_SKILL_LEVEL,
        }),
        rewards: Box::new(LoggingRewards),
    }
}

#[derive(Debug, Default)]
struct LedgerEconomy {
    balances: HashMap<PlayerId, i64>,
}

impl Economy for LedgerEconomy {
    fn deposit(&mut self, player: PlayerId, amount: i64) {
        let balance = self.balances.entry(player).or_default();
        *balance += amount;
        info!(player = %player, amount, balance = *balance, "coins_deposited");
    }

    fn withdraw(&mut self, player: PlayerId, amount: i64) -> bool {
        let balance = self.balances.entry(player).or_default();
        if *balance < amount {
            return false;
        }
        *balance -= amount;
        true
    }

    fn balance(&self, player: PlayerId) -> i64 {
        self.balances.get(&player).copied().unwrap_or(0)
    }
}

struct FixedSkills {
    level: u32,
}

impl SkillProvider for FixedSkills {
    fn skill_level(&self, _player: PlayerId, _skill: &str) -> Option<u32> {
        Some(self.level)
    }
}

struct LoggingRewards;

impl RewardSink for LoggingRewards {
    fn grant_item(&mut self, player: PlayerId, item: &str, amount: u32) {
        info!(player = %player, item, amount, "item_granted");
    }

    fn notify(&mut self, player: PlayerId, notice: QuestNotice) {
        info!(player = %player, ?notice, "quest_notice");
    }
}

/// The single scripted player: follows each marker as it appears.
#[derive(Debug)]
pub(crate) struct Walker {
    pub(crate) id: PlayerId,
    pub(crate) position: GridPoint,
    pub(crate) guided: bool,
}

impl GuideAudience for Walker {
    fn position(&self, player: PlayerId) -> Option<GridPoint> {
        (player == self.id).then_some(self.position)
    }

    fn is_guided(&self, player: PlayerId) -> bool {
        player == self.id && self.guided
    }
}

#[derive(Debug, Default)]
pub(crate) struct MarkerTrail {
    latest: HashMap<PlayerId, GridPoint>,
}

impl MarkerTrail {
    pub(crate) fn take(&mut self, player: PlayerId) -> Option<GridPoint> {
        self.latest.remove(&player)
    }
}

impl MarkerEmitter for MarkerTrail {
    fn emit(&mut self, player: PlayerId, point: GridPoint) {
        debug!(player = %player, x = point.x, y = point.y, z = point.z, "marker");
        self.latest.insert(player, point);
    }
}

#[cfg(test)]
mod tests {
    use questline::WalkabilityOracle;

    use super::*;

    #[test]
    fn spawn_and_portal_anchor_are_walkable() {
        let world = build_world();
        assert!(world.is_walkable(SPAWN));
        assert!(world.is_walkable(portal_zone().anchor()));
        assert!(!world.is_walkable(GridPoint::new(31, 1, 5)));
    }

    #[test]
    fn walker_only_answers_for_itself() {
        let walker = Walker {
            id: PlayerId::new_random(),
            position: SPAWN,
            guided: true,
        };
        assert_eq!(walker.position(walker.id), Some(SPAWN));
        assert_eq!(walker.position(PlayerId::new_random()), None);
        assert!(walker.is_guided(walker.id));
    }
}
