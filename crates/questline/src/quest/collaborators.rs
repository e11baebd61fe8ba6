use crate::progress::{PlayerId, QuestSlot};

/// Player-facing events the orchestrator reports to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestNotice {
    ChainStarted,
    StepCompleted { quest: QuestSlot, key: String },
    Completed { quest: QuestSlot, coins: i64 },
    ChainCompleted,
    Reset { reclaimed: i64 },
}

pub trait Economy {
    fn deposit(&mut self, player: PlayerId, amount: i64);

    /// Returns false when the player cannot cover `amount`.
    fn withdraw(&mut self, player: PlayerId, amount: i64) -> bool;

    fn balance(&self, player: PlayerId) -> i64;
}

pub trait SkillProvider {
    /// `None` when the skill is unknown to the provider.
    fn skill_level(&self, player: PlayerId, skill: &str) -> Option<u32>;
}

pub trait RewardSink {
    fn grant_item(&mut self, player: PlayerId, item: &str, amount: u32);

    fn notify(&mut self, player: PlayerId, notice: QuestNotice);
}

/// Host services the orchestrator calls out to.
pub struct Collaborators {
    pub economy: Box<dyn Economy + Send>,
    pub skills: Box<dyn SkillProvider + Send>,
    pub rewards: Box<dyn RewardSink + Send>,
}

impl Collaborators {
    pub fn no_op() -> Self {
        Self {
            economy: Box::new(NoOpEconomy),
            skills: Box::new(NoOpSkills),
            rewards: Box::new(NoOpRewards),
        }
    }
}

struct NoOpEconomy;
struct NoOpSkills;
struct NoOpRewards;

impl Economy for NoOpEconomy {
    fn deposit(&mut self, _player: PlayerId, _amount: i64) {}

    fn withdraw(&mut self, _player: PlayerId, _amount: i64) -> bool {
        false
    }

    fn balance(&self, _player: PlayerId) -> i64 {
        0
    }
}

impl SkillProvider for NoOpSkills {
    fn skill_level(&self, _player: PlayerId, _skill: &str) -> Option<u32> {
        None
    }
}

impl RewardSink for NoOpRewards {
    fn grant_item(&mut self, _player: PlayerId, _item: &str, _amount: u32) {}

    fn notify(&mut self, _player: PlayerId, _notice: QuestNotice) {}
}
