mod catalog;
mod collaborators;
mod manager;

pub use catalog::{
    default_quest_definitions, ItemReward, QuestCatalog, QuestDefinition, SkillRequirement,
};
pub use collaborators::{Collaborators, Economy, QuestNotice, RewardSink, SkillProvider};
pub use manager::{
    QuestManager, REACHED_PORTAL_STEP, SKILL_LEVEL_STEP, SKILL_PROGRESS_KEY,
    TOKENS_PURCHASED_COUNTER, TOKEN_TARGET_STEP,
};
