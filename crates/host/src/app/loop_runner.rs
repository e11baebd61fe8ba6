use std::sync::Arc;
use std::thread;
use std::time::Instant;

use questline::{PathGuideManager, PlayerId, PlayerRepository, QuestManager, QuestSlot};
use tracing::{info, warn};

use super::bootstrap::AppWiring;
use super::world::{self, MarkerTrail, Walker, SPAWN};
use super::HostError;

const TOKENS_PER_PURCHASE: i64 = 1;
const SHOP_SPEND: i64 = 40;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WalkthroughSummary {
    pub(crate) ticks: u32,
    pub(crate) markers_emitted: usize,
    pub(crate) recomputes: usize,
    pub(crate) chain_completed: bool,
    pub(crate) coins_granted: i64,
    pub(crate) players_flushed: usize,
}

/// Plays one new player through the whole chain: guided walk to the portal
/// on the fixed tick, then the remaining quests as scripted host events.
pub(crate) fn run_walkthrough(wiring: AppWiring) -> Result<WalkthroughSummary, HostError> {
    let AppWiring {
        paths,
        config,
        loop_config,
    } = wiring;
    let repository = Arc::new(PlayerRepository::open(&paths.data_dir, &config.storage));
    let catalog = config.catalog()?;
    let world = world::build_world();
    let mut quests = QuestManager::new(
        Arc::clone(&repository),
        catalog,
        &config.guide,
        world::collaborators(),
    );
    let mut guides = PathGuideManager::new(config.guide.clone(), config.pathfinding.clone());
    let mut summary = WalkthroughSummary::default();

    let player = PlayerId::new_random();
    quests.join(player, "walkthrough");
    quests.start_quests(player);

    let target = config
        .guide
        .target_zone
        .as_ref()
        .map(|zone| zone.anchor())
        .unwrap_or(SPAWN);
    let mut walker = Walker {
        id: player,
        position: SPAWN,
        guided: quests.is_in_guided_stage(player),
    };
    let mut trail = MarkerTrail::default();
    let kind = guides.start_guide(&world, player, walker.position, target, Instant::now());
    info!(player = %player, ?kind, "walkthrough_guide_started");

    while walker.guided && summary.ticks < loop_config.max_ticks {
        let tick_start = Instant::now();
        let report = guides.tick(tick_start, &world, &walker, &mut trail);
        summary.ticks += 1;
        summary.markers_emitted += report.markers_emitted;
        summary.recomputes += report.recomputed;

        if let Some(next) = trail.take(player) {
            walker.position = next;
            quests.on_player_moved(player, next);
        }
        walker.guided = quests.is_in_guided_stage(player);

        let elapsed = tick_start.elapsed();
        if elapsed < loop_config.tick_interval {
            thread::sleep(loop_config.tick_interval - elapsed);
        }
    }
    guides.stop_guide(player);
    if walker.guided {
        warn!(player = %player, ticks = summary.ticks, "guided_stage_not_finished");
    }

    play_remaining_quests(&mut quests, player);

    if let Some(data) = quests.player(player) {
        summary.chain_completed = data.is_completed();
        summary.coins_granted = data.coins_granted();
    }
    summary.players_flushed = repository.flush_all();
    quests.leave(player);
    Ok(summary)
}

fn play_remaining_quests(quests: &mut QuestManager, player: PlayerId) {
    while let Some(slot) = quests.player(player).and_then(|data| data.active_slot()) {
        let definition = quests.catalog().definition(slot).clone();
        if definition.skill_requirement.is_some() {
            quests.sync_skill_progress(player);
        }
        if let Some(target) = definition.token_target {
            let mut bought = 0;
            while bought < target {
                quests.record_token_purchase(player, TOKENS_PER_PURCHASE);
                bought += TOKENS_PER_PURCHASE;
            }
        }
        if !definition.item_rewards.is_empty() {
            quests.record_coin_spend(player, SHOP_SPEND);
        }
        if !quests.complete_quest(player, slot) {
            warn!(player = %player, quest = slot.number(), "scripted_quest_stuck");
            break;
        }
        if slot == QuestSlot::LAST {
            break;
        }
    }
}
