use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::guide::GuideConfig;
use crate::nav::GridPoint;
use crate::progress::{epoch_millis, PlayerData, PlayerId, QuestSlot, StepValue};
use crate::storage::PlayerRepository;
use crate::zone::{ZoneTracker, ZoneTransition};

use super::catalog::QuestCatalog;
use super::collaborators::{Collaborators, QuestNotice};

pub const REACHED_PORTAL_STEP: &str = "reached_portal";
pub const TOKENS_PURCHASED_COUNTER: &str = "tokens_purchased";
pub const TOKEN_TARGET_STEP: &str = "token_target_reached";
pub const SKILL_PROGRESS_KEY: &str = "skill_progress";
pub const SKILL_LEVEL_STEP: &str = "skill_level";

/// Drives every quest transition: guard, mutate, persist, then notify.
///
/// Illegal transitions (wrong slot, chain already complete, repeated step)
/// are ignored and reported as `false`.
pub struct QuestManager {
    repository: Arc<PlayerRepository>,
    catalog: QuestCatalog,
    collaborators: Collaborators,
    zones: ZoneTracker,
    guided_quest: QuestSlot,
    target_zone: Option<String>,
}

impl QuestManager {
    pub fn new(
        repository: Arc<PlayerRepository>,
        catalog: QuestCatalog,
        guide: &GuideConfig,
        collaborators: Collaborators,
    ) -> Self {
        let guided_quest = QuestSlot::new(guide.guided_quest).unwrap_or(QuestSlot::FIRST);
        let target_zone = guide.target_zone.as_ref().map(|zone| zone.name.clone());
        let zones = ZoneTracker::new(guide.target_zone.iter().cloned().collect());
        Self {
            repository,
            catalog,
            collaborators,
            zones,
            guided_quest,
            target_zone,
        }
    }

    pub fn repository(&self) -> &Arc<PlayerRepository> {
        &self.repository
    }

    pub fn catalog(&self) -> &QuestCatalog {
        &self.catalog
    }

    pub fn guided_quest(&self) -> QuestSlot {
        self.guided_quest
    }

    /// Loads (or creates) the player's progress when they connect.
    pub fn join(&mut self, player: PlayerId, name: &str) -> PlayerData {
        self.repository.get(player, name)
    }

    /// Final synchronous flush and cache eviction on disconnect.
    pub fn leave(&mut self, player: PlayerId) {
        self.zones.forget(player);
        if self.repository.unload(player).is_none() {
            debug!(player = %player, "leave_for_uncached_player");
        }
    }

    pub fn player(&self, player: PlayerId) -> Option<PlayerData> {
        self.repository.cached(player)
    }

    pub fn is_in_guided_stage(&self, player: PlayerId) -> bool {
        self.repository
            .cached(player)
            .is_some_and(|data| data.active_slot() == Some(self.guided_quest))
    }

    pub fn start_quests(&mut self, player: PlayerId) -> bool {
        let now = epoch_millis();
        if !self.repository.update(player, "", |data| data.start(now)) {
            debug!(player = %player, "start_quests_ignored");
            return false;
        }
        info!(player = %player, "quest_chain_started");
        self.persist_now(player);
        self.collaborators
            .rewards
            .notify(player, QuestNotice::ChainStarted);
        true
    }

    /// Marks `key` done on `quest`. Routine progress, saved in the background.
    pub fn complete_step(&mut self, player: PlayerId, quest: QuestSlot, key: &str) -> bool {
        let now = epoch_millis();
        if !self
            .repository
            .update(player, "", |data| data.complete_step(quest, key, now))
        {
            debug!(player = %player, quest = quest.number(), key, "complete_step_ignored");
            return false;
        }
        debug!(player = %player, quest = quest.number(), key, "quest_step_completed");
        self.repository.save(player);
        self.collaborators.rewards.notify(
            player,
            QuestNotice::StepCompleted {
                quest,
                key: key.to_string(),
            },
        );
        true
    }

    /// Completes `quest`, pays its rewards and moves the player on. Persisted
    /// synchronously.
    pub fn complete_quest(&mut self, player: PlayerId, quest: QuestSlot) -> bool {
        let now = epoch_millis();
        let definition = self.catalog.definition(quest).clone();
        let chain_completed = self.repository.update(player, "", |data| {
            if data.is_completed() || !data.mark_quest_completed(quest, now) {
                return None;
            }
            data.record_coin_grant(definition.coin_reward);
            data.advance(now);
            Some(data.is_completed())
        });
        let Some(chain_completed) = chain_completed else {
            debug!(player = %player, quest = quest.number(), "complete_quest_ignored");
            return false;
        };

        if definition.coin_reward > 0 {
            self.collaborators
                .economy
                .deposit(player, definition.coin_reward);
        }
        for reward in &definition.item_rewards {
            self.collaborators
                .rewards
                .grant_item(player, &reward.item, reward.amount);
        }
        info!(
            player = %player,
            quest = quest.number(),
            coins = definition.coin_reward,
            "quest_completed"
        );
        self.persist_now(player);

        self.collaborators.rewards.notify(
            player,
            QuestNotice::Completed {
                quest,
                coins: definition.coin_reward,
            },
        );
        if chain_completed {
            info!(player = %player, "quest_chain_completed");
            self.collaborators
                .rewards
                .notify(player, QuestNotice::ChainCompleted);
        }
        true
    }

    pub fn advance(&mut self, player: PlayerId) -> bool {
        let now = epoch_millis();
        if !self.repository.update(player, "", |data| data.advance(now)) {
            return false;
        }
        self.repository.save(player);
        true
    }

    /// Admin reset back to the creation state. With `reclaim`, unspent reward
    /// coins are withdrawn first, bounded by the current balance. Returns the
    /// amount reclaimed.
    pub fn reset_player(&mut self, player: PlayerId, reclaim: bool) -> i64 {
        let refundable = self.repository.get(player, "").refundable_coins();
        let mut reclaimed = 0;
        if reclaim && refundable > 0 {
            let amount = refundable.min(self.collaborators.economy.balance(player));
            if amount > 0 && self.collaborators.economy.withdraw(player, amount) {
                reclaimed = amount;
            } else if amount > 0 {
                warn!(player = %player, amount, "coin_reclaim_withdraw_refused");
            }
        }

        let now = epoch_millis();
        self.repository.update(player, "", |data| data.reset(now));
        self.zones.forget(player);
        info!(player = %player, reclaimed, "player_progress_reset");
        self.persist_now(player);
        self.collaborators
            .rewards
            .notify(player, QuestNotice::Reset { reclaimed });
        reclaimed
    }

    /// Admin jump to `quest`, bypassing step validation.
    pub fn set_quest(&mut self, player: PlayerId, quest: QuestSlot) {
        let now = epoch_millis();
        let step_counts = self.catalog.step_counts();
        self.repository.update(player, "", |data| {
            data.admin_set_quest(quest, &step_counts, now)
        });
        info!(player = %player, quest = quest.number(), "quest_set_by_admin");
        self.persist_now(player);
    }

    pub fn record_coin_spend(&mut self, player: PlayerId, amount: i64) {
        if amount <= 0 {
            return;
        }
        let now = epoch_millis();
        self.repository.update(player, "", |data| {
            data.record_coin_spend(amount);
            data.touch(now);
        });
        self.repository.save(player);
    }

    /// Adds to the token counter of the token quest while it is active and
    /// completes its step once the target is reached. The counter carries
    /// over between calls. Returns true when the step completed.
    pub fn record_token_purchase(&mut self, player: PlayerId, amount: i64) -> bool {
        let Some(slot) = self.catalog.token_slot() else {
            return false;
        };
        let target = self.catalog.definition(slot).token_target.unwrap_or(0);
        if amount <= 0 {
            return false;
        }
        let now = epoch_millis();
        let total = self.repository.update(player, "", |data| {
            if data.active_slot() != Some(slot) {
                return None;
            }
            let total = data
                .quest_mut(slot)
                .data_mut()
                .add_counter(TOKENS_PURCHASED_COUNTER, amount);
            data.touch(now);
            Some(total)
        });
        let Some(total) = total else {
            debug!(player = %player, amount, "token_purchase_outside_token_quest");
            return false;
        };
        debug!(player = %player, total, target, "token_purchase_recorded");
        if total >= target && self.complete_step(player, slot, TOKEN_TARGET_STEP) {
            return true;
        }
        self.repository.save(player);
        false
    }

    /// Refreshes the active quest's skill progress from the skill provider.
    /// Returns the stored percentage.
    pub fn sync_skill_progress(&mut self, player: PlayerId) -> Option<f64> {
        let slot = self.repository.get(player, "").active_slot()?;
        let requirement = self.catalog.definition(slot).skill_requirement.clone()?;
        let level = self
            .collaborators
            .skills
            .skill_level(player, &requirement.skill)?;
        let percent = if requirement.level == 0 {
            100.0
        } else {
            (f64::from(level) / f64::from(requirement.level) * 100.0).min(100.0)
        };

        let now = epoch_millis();
        self.repository.update(player, "", |data| {
            data.quest_mut(slot)
                .data_mut()
                .insert(SKILL_PROGRESS_KEY, StepValue::LevelProgress(percent));
            data.touch(now);
        });
        if level < requirement.level || !self.complete_step(player, slot, SKILL_LEVEL_STEP) {
            self.repository.save(player);
        }
        Some(percent)
    }

    /// Feeds a movement into zone tracking. Entering the target zone during
    /// the guided quest completes that quest.
    pub fn on_player_moved(&mut self, player: PlayerId, point: GridPoint) -> Vec<ZoneTransition> {
        let transitions = self.zones.update(player, point);
        let entered_target = transitions.iter().any(|transition| {
            matches!(transition, ZoneTransition::Entered(name)
                if Some(name) == self.target_zone.as_ref())
        });
        if entered_target && self.is_in_guided_stage(player) {
            let quest = self.guided_quest;
            self.complete_step(player, quest, REACHED_PORTAL_STEP);
            self.complete_quest(player, quest);
        }
        transitions
    }

    fn persist_now(&self, player: PlayerId) {
        match self.repository.force_save(player) {
            Some(report) if !report.is_fully_written() => {
                warn!(player = %player, ?report, "forced_save_incomplete");
            }
            Some(_) => {}
            None => warn!(player = %player, "forced_save_for_uncached_player"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;
    use crate::quest::{Economy, RewardSink, SkillProvider};
    use crate::storage::StorageConfig;
    use crate::zone::Zone;

    #[derive(Default)]
    struct Ledger {
        balances: HashMap<PlayerId, i64>,
        items: Vec<(String, u32)>,
        notices: Vec<QuestNotice>,
        skill: Option<u32>,
    }

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Ledger>>);

    impl Shared {
        fn with<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
            f(&mut self.0.lock().expect("ledger"))
        }
    }

    impl Economy for Shared {
        fn deposit(&mut self, player: PlayerId, amount: i64) {
            self.with(|ledger| *ledger.balances.entry(player).or_default() += amount);
        }

        fn withdraw(&mut self, player: PlayerId, amount: i64) -> bool {
            self.with(|ledger| {
                let balance = ledger.balances.entry(player).or_default();
                if *balance < amount {
                    return false;
                }
                *balance -= amount;
                true
            })
        }

        fn balance(&self, player: PlayerId) -> i64 {
            self.with(|ledger| ledger.balances.get(&player).copied().unwrap_or(0))
        }
    }

    impl SkillProvider for Shared {
        fn skill_level(&self, _player: PlayerId, _skill: &str) -> Option<u32> {
            self.with(|ledger| ledger.skill)
        }
    }

    impl RewardSink for Shared {
        fn grant_item(&mut self, _player: PlayerId, item: &str, amount: u32) {
            self.with(|ledger| ledger.items.push((item.to_string(), amount)));
        }

        fn notify(&mut self, _player: PlayerId, notice: QuestNotice) {
            self.with(|ledger| ledger.notices.push(notice));
        }
    }

    fn slot(number: u8) -> QuestSlot {
        QuestSlot::new(number).expect("slot")
    }

    fn manager(temp: &TempDir) -> (QuestManager, Shared) {
        let repository = Arc::new(PlayerRepository::open(
            temp.path(),
            &StorageConfig {
                background_saves: false,
                ..StorageConfig::default()
            },
        ));
        let shared = Shared::default();
        let guide = GuideConfig {
            target_zone: Some(Zone::new(
                "portal",
                GridPoint::new(20, 1, 20),
                GridPoint::new(22, 3, 22),
            )),
            ..GuideConfig::default()
        };
        let manager = QuestManager::new(
            repository,
            QuestCatalog::default(),
            &guide,
            Collaborators {
                economy: Box::new(shared.clone()),
                skills: Box::new(shared.clone()),
                rewards: Box::new(shared.clone()),
            },
        );
        (manager, shared)
    }

    #[test]
    fn completing_quest_pays_rewards_and_advances() {
        let temp = TempDir::new().expect("temp");
        let (mut manager, shared) = manager(&temp);
        let player = PlayerId::new_random();
        manager.join(player, "Sam");
        assert!(manager.start_quests(player));
        assert!(!manager.start_quests(player));

        manager.advance(player);
        assert!(manager.complete_quest(player, slot(2)));
        let data = manager.player(player).expect("cached");
        assert_eq!(data.current_quest(), 3);
        assert_eq!(data.coins_granted(), 150);
        assert_eq!(shared.with(|ledger| ledger.balances[&player]), 150);
        assert_eq!(
            shared.with(|ledger| ledger.items.clone()),
            vec![("bread".to_string(), 8)]
        );
    }

    #[test]
    fn out_of_turn_transitions_are_ignored() {
        let temp = TempDir::new().expect("temp");
        let (mut manager, _) = manager(&temp);
        let player = PlayerId::new_random();
        manager.join(player, "Sam");

        assert!(!manager.complete_quest(player, slot(1)));
        manager.start_quests(player);
        assert!(!manager.complete_step(player, slot(3), "anything"));
        assert!(manager.complete_step(player, slot(1), "opened_map"));
        assert!(!manager.complete_step(player, slot(1), "opened_map"));
        assert_eq!(manager.player(player).expect("cached").quest(slot(1)).step(), 1);
    }

    #[test]
    fn entering_portal_zone_completes_guided_quest_once() {
        let temp = TempDir::new().expect("temp");
        let (mut manager, shared) = manager(&temp);
        let player = PlayerId::new_random();
        manager.join(player, "Sam");
        manager.start_quests(player);
        assert!(manager.is_in_guided_stage(player));

        manager.on_player_moved(player, GridPoint::new(0, 1, 0));
        let transitions = manager.on_player_moved(player, GridPoint::new(21, 1, 21));
        assert_eq!(transitions, vec![ZoneTransition::Entered("portal".to_string())]);
        manager.on_player_moved(player, GridPoint::new(21, 2, 21));

        let data = manager.player(player).expect("cached");
        assert_eq!(data.current_quest(), 2);
        assert!(data.quest(slot(1)).data().flag(REACHED_PORTAL_STEP));
        assert!(!manager.is_in_guided_stage(player));
        let completions = shared.with(|ledger| {
            ledger
                .notices
                .iter()
                .filter(|notice| matches!(notice, QuestNotice::Completed { .. }))
                .count()
        });
        assert_eq!(completions, 1);
    }

    #[test]
    fn token_purchases_accumulate_until_target() {
        let temp = TempDir::new().expect("temp");
        let (mut manager, _) = manager(&temp);
        let player = PlayerId::new_random();
        manager.join(player, "Sam");
        manager.start_quests(player);
        assert!(!manager.record_token_purchase(player, 2));

        manager.set_quest(player, slot(4));
        assert!(!manager.record_token_purchase(player, 1));
        assert!(!manager.record_token_purchase(player, 1));
        assert!(manager.record_token_purchase(player, 1));

        let data = manager.player(player).expect("cached");
        let quest4 = data.quest(slot(4));
        assert_eq!(quest4.data().counter(TOKENS_PURCHASED_COUNTER), 3);
        assert!(quest4.data().flag(TOKEN_TARGET_STEP));
    }

    #[test]
    fn skill_progress_is_stored_and_completes_step() {
        let temp = TempDir::new().expect("temp");
        let (mut manager, shared) = manager(&temp);
        let player = PlayerId::new_random();
        manager.join(player, "Sam");
        manager.set_quest(player, slot(3));

        shared.with(|ledger| ledger.skill = Some(2));
        assert_eq!(manager.sync_skill_progress(player), Some(40.0));
        shared.with(|ledger| ledger.skill = Some(9));
        assert_eq!(manager.sync_skill_progress(player), Some(100.0));

        let data = manager.player(player).expect("cached");
        assert!(data.quest(slot(3)).data().flag(SKILL_LEVEL_STEP));
        assert_eq!(
            data.quest(slot(3)).data().level_progress(SKILL_PROGRESS_KEY),
            Some(100.0)
        );
    }

    fn reopened(temp: &TempDir) -> PlayerRepository {
        PlayerRepository::open(
            temp.path(),
            &StorageConfig {
                background_saves: false,
                ..StorageConfig::default()
            },
        )
    }

    #[test]
    fn token_purchases_after_target_reach_storage() {
        let temp = TempDir::new().expect("temp");
        let (mut manager, _) = manager(&temp);
        let player = PlayerId::new_random();
        manager.join(player, "Sam");
        manager.set_quest(player, slot(4));
        manager.record_token_purchase(player, 1);
        manager.record_token_purchase(player, 1);
        assert!(manager.record_token_purchase(player, 1));
        assert!(!manager.record_token_purchase(player, 2));

        let cached = manager.player(player).expect("cached");
        assert_eq!(
            cached.quest(slot(4)).data().counter(TOKENS_PURCHASED_COUNTER),
            5
        );
        let stored = reopened(&temp).get(player, "");
        assert_eq!(
            stored.quest(slot(4)).data().counter(TOKENS_PURCHASED_COUNTER),
            5
        );
    }

    #[test]
    fn skill_progress_after_step_flag_reaches_storage() {
        let temp = TempDir::new().expect("temp");
        let (mut manager, shared) = manager(&temp);
        let player = PlayerId::new_random();
        manager.join(player, "Sam");
        manager.set_quest(player, slot(3));

        shared.with(|ledger| ledger.skill = Some(9));
        assert_eq!(manager.sync_skill_progress(player), Some(100.0));
        shared.with(|ledger| ledger.skill = Some(1));
        assert_eq!(manager.sync_skill_progress(player), Some(20.0));

        let stored = reopened(&temp).get(player, "");
        let quest3 = stored.quest(slot(3));
        assert!(quest3.data().flag(SKILL_LEVEL_STEP));
        assert_eq!(quest3.data().level_progress(SKILL_PROGRESS_KEY), Some(20.0));
    }

    #[test]
    fn reset_reclaims_unspent_coins_within_balance() {
        let temp = TempDir::new().expect("temp");
        let (mut manager, shared) = manager(&temp);
        let player = PlayerId::new_random();
        manager.join(player, "Sam");
        manager.start_quests(player);
        manager.complete_quest(player, slot(1));
        manager.complete_quest(player, slot(2));
        manager.record_coin_spend(player, 50);
        assert_eq!(manager.player(player).expect("cached").refundable_coins(), 200);

        shared.with(|ledger| ledger.balances.insert(player, 120));
        assert_eq!(manager.reset_player(player, true), 120);
        assert_eq!(shared.with(|ledger| ledger.balances[&player]), 0);

        let data = manager.player(player).expect("cached");
        assert_eq!(data.current_quest(), 0);
        assert_eq!(data.coins_granted(), 0);
        assert!(!data.is_started());
    }

    #[test]
    fn completed_chain_rejects_further_changes() {
        let temp = TempDir::new().expect("temp");
        let (mut manager, shared) = manager(&temp);
        let player = PlayerId::new_random();
        manager.join(player, "Sam");
        manager.start_quests(player);
        for quest in QuestSlot::all() {
            assert!(manager.complete_quest(player, quest));
        }
        assert!(!manager.advance(player));
        assert!(!manager.complete_quest(player, slot(6)));
        assert!(!manager.start_quests(player));
        assert_eq!(manager.player(player).expect("cached").current_quest(), 6);
        assert_eq!(
            shared.with(|ledger| ledger.notices.last().cloned()),
            Some(QuestNotice::ChainCompleted)
        );
    }
}
