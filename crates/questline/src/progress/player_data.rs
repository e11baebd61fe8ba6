use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::quest_progress::QuestProgress;

pub const QUEST_COUNT: usize = 6;

/// Stable player identity supplied by the host session model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(raw).map(Self)
    }
}

/// One of the six quest slots, numbered 1..=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct QuestSlot(u8);

impl QuestSlot {
    pub const FIRST: Self = Self(1);
    pub const LAST: Self = Self(QUEST_COUNT as u8);

    pub fn new(number: u8) -> Option<Self> {
        (1..=QUEST_COUNT as u8).contains(&number).then_some(Self(number))
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (1..=QUEST_COUNT as u8).map(Self)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }
}

impl TryFrom<u8> for QuestSlot {
    type Error = String;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::new(number).ok_or_else(|| format!("quest slot {number} outside 1..={QUEST_COUNT}"))
    }
}

impl From<QuestSlot> for u8 {
    fn from(slot: QuestSlot) -> Self {
        slot.0
    }
}

impl fmt::Display for QuestSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A player's position in the quest chain.
///
/// `current_quest` is 0 before the chain is started and 1..=6 afterwards; it
/// stays on 6 once `completed` is set. Mutation goes through the quest
/// manager, which persists after every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    pub(crate) id: PlayerId,
    pub(crate) name: String,
    pub(crate) started: bool,
    pub(crate) current_quest: u8,
    pub(crate) completed: bool,
    pub(crate) quests: [QuestProgress; QUEST_COUNT],
    pub(crate) coins_granted: i64,
    pub(crate) coins_spent: i64,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl PlayerData {
    pub fn new(id: PlayerId, name: impl Into<String>, now: i64) -> Self {
        Self {
            id,
            name: name.into(),
            started: false,
            current_quest: 0,
            completed: false,
            quests: Default::default(),
            coins_granted: 0,
            coins_spent: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// 0 when not started, otherwise the active (or final) slot number.
    pub fn current_quest(&self) -> u8 {
        self.current_quest
    }

    pub fn current_slot(&self) -> Option<QuestSlot> {
        QuestSlot::new(self.current_quest)
    }

    /// The slot the player is working on, `None` before start and after the
    /// chain is complete.
    pub fn active_slot(&self) -> Option<QuestSlot> {
        if self.completed {
            return None;
        }
        self.current_slot()
    }

    pub fn quest(&self, slot: QuestSlot) -> &QuestProgress {
        &self.quests[slot.index()]
    }

    pub fn quests(&self) -> impl Iterator<Item = (QuestSlot, &QuestProgress)> {
        QuestSlot::all().zip(self.quests.iter())
    }

    pub fn coins_granted(&self) -> i64 {
        self.coins_granted
    }

    pub fn coins_spent(&self) -> i64 {
        self.coins_spent
    }

    /// Granted reward coins the player has not spent yet.
    pub fn refundable_coins(&self) -> i64 {
        (self.coins_granted - self.coins_spent).max(0)
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub(crate) fn quest_mut(&mut self, slot: QuestSlot) -> &mut QuestProgress {
        &mut self.quests[slot.index()]
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        if self.name != name {
            self.name = name.to_string();
        }
    }

    pub(crate) fn touch(&mut self, now: i64) {
        self.updated_at = now;
    }

    pub(crate) fn start(&mut self, now: i64) -> bool {
        if self.started || self.completed {
            return false;
        }
        self.started = true;
        self.current_quest = QuestSlot::FIRST.number();
        self.quest_mut(QuestSlot::FIRST).mark_started(now);
        self.touch(now);
        true
    }

    /// Moves to the next slot, or flags the chain complete from the last one.
    pub(crate) fn advance(&mut self, now: i64) -> bool {
        if !self.started || self.completed {
            return false;
        }
        let Some(current) = self.current_slot() else {
            return false;
        };
        match current.next() {
            Some(next) => {
                self.current_quest = next.number();
                self.quest_mut(next).mark_started(now);
            }
            None => self.completed = true,
        }
        self.touch(now);
        true
    }

    /// Sets `key` on the active slot and bumps its step counter. Out-of-turn
    /// and repeated calls change nothing.
    pub(crate) fn complete_step(&mut self, slot: QuestSlot, key: &str, now: i64) -> bool {
        if self.active_slot() != Some(slot) {
            return false;
        }
        let progress = self.quest_mut(slot);
        if progress.completed || progress.data.flag(key) {
            return false;
        }
        progress.data_mut().set_flag(key);
        progress.increment_step();
        self.touch(now);
        true
    }

    pub(crate) fn mark_quest_completed(&mut self, slot: QuestSlot, now: i64) -> bool {
        if self.active_slot() != Some(slot) {
            return false;
        }
        let progress = self.quest_mut(slot);
        if progress.completed {
            return false;
        }
        progress.mark_completed(now);
        self.touch(now);
        true
    }

    pub(crate) fn record_coin_grant(&mut self, amount: i64) {
        self.coins_granted = self.coins_granted.saturating_add(amount.max(0));
    }

    pub(crate) fn record_coin_spend(&mut self, amount: i64) {
        self.coins_spent = self.coins_spent.saturating_add(amount.max(0));
    }

    /// Back to the freshly created state, keeping identity and creation time.
    pub(crate) fn reset(&mut self, now: i64) {
        let created_at = self.created_at;
        *self = Self::new(self.id, std::mem::take(&mut self.name), created_at);
        self.touch(now);
    }

    /// Jumps straight to `target`: earlier slots become completed at their
    /// full step count, `target` and later slots are cleared, and `target` is
    /// started. Skips all step validation.
    pub(crate) fn admin_set_quest(
        &mut self,
        target: QuestSlot,
        step_counts: &[u32; QUEST_COUNT],
        now: i64,
    ) {
        for slot in QuestSlot::all() {
            let progress = self.quest_mut(slot);
            if slot < target {
                progress.mark_completed(now);
                progress.step = step_counts[slot.index()];
            } else {
                progress.clear();
            }
        }
        self.quest_mut(target).mark_started(now);
        self.started = true;
        self.completed = false;
        self.current_quest = target.number();
        self.touch(now);
    }
}
