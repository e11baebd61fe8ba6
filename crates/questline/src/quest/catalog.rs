use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::progress::{QuestSlot, QUEST_COUNT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReward {
    pub item: String,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRequirement {
    pub skill: String,
    pub level: u32,
}

/// Static description of one quest slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestDefinition {
    pub title: String,
    /// Number of sub-steps; also the step count an admin jump fills in.
    pub step_count: u32,
    pub coin_reward: i64,
    pub item_rewards: Vec<ItemReward>,
    pub skill_requirement: Option<SkillRequirement>,
    /// Spawner tokens to buy before the token step completes.
    pub token_target: Option<i64>,
}

impl Default for QuestDefinition {
    fn default() -> Self {
        Self {
            title: String::new(),
            step_count: 1,
            coin_reward: 0,
            item_rewards: Vec::new(),
            skill_requirement: None,
            token_target: None,
        }
    }
}

impl QuestDefinition {
    fn titled(title: &str, step_count: u32, coin_reward: i64) -> Self {
        Self {
            title: title.to_string(),
            step_count,
            coin_reward,
            ..Self::default()
        }
    }
}

pub fn default_quest_definitions() -> Vec<QuestDefinition> {
    vec![
        QuestDefinition::titled("Find the portal", 1, 100),
        QuestDefinition {
            item_rewards: vec![ItemReward {
                item: "bread".to_string(),
                amount: 8,
            }],
            ..QuestDefinition::titled("Visit the shop", 1, 150)
        },
        QuestDefinition {
            skill_requirement: Some(SkillRequirement {
                skill: "mining".to_string(),
                level: 5,
            }),
            ..QuestDefinition::titled("Train a skill", 1, 200)
        },
        QuestDefinition {
            token_target: Some(3),
            ..QuestDefinition::titled("Buy spawner tokens", 1, 250)
        },
        QuestDefinition::titled("Claim your land", 1, 300),
        QuestDefinition {
            item_rewards: vec![ItemReward {
                item: "diamond".to_string(),
                amount: 1,
            }],
            ..QuestDefinition::titled("Meet the community", 1, 500)
        },
    ]
}

/// Exactly one definition per quest slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestCatalog {
    definitions: Vec<QuestDefinition>,
}

impl Default for QuestCatalog {
    fn default() -> Self {
        Self {
            definitions: default_quest_definitions(),
        }
    }
}

impl QuestCatalog {
    pub fn new(definitions: Vec<QuestDefinition>) -> Result<Self, ConfigError> {
        if definitions.len() != QUEST_COUNT {
            return Err(ConfigError::QuestCount {
                expected: QUEST_COUNT,
                found: definitions.len(),
            });
        }
        for (slot, definition) in QuestSlot::all().zip(&definitions) {
            if definition.step_count == 0 {
                return Err(ConfigError::EmptyQuest {
                    quest: slot.number(),
                });
            }
        }
        Ok(Self { definitions })
    }

    pub fn definition(&self, slot: QuestSlot) -> &QuestDefinition {
        &self.definitions[slot.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestSlot, &QuestDefinition)> {
        QuestSlot::all().zip(self.definitions.iter())
    }

    pub fn step_counts(&self) -> [u32; QUEST_COUNT] {
        let mut counts = [0; QUEST_COUNT];
        for (count, definition) in counts.iter_mut().zip(&self.definitions) {
            *count = definition.step_count;
        }
        counts
    }

    /// The slot whose token purchases are tracked, if any.
    pub fn token_slot(&self) -> Option<QuestSlot> {
        self.iter()
            .find(|(_, definition)| definition.token_target.is_some())
            .map(|(slot, _)| slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_covers_every_slot() {
        let catalog = QuestCatalog::default();
        assert_eq!(catalog.iter().count(), QUEST_COUNT);
        assert_eq!(catalog.step_counts(), [1; QUEST_COUNT]);
        assert_eq!(catalog.token_slot(), QuestSlot::new(4));
        assert!(catalog
            .definition(QuestSlot::new(3).expect("slot"))
            .skill_requirement
            .is_some());
    }

    #[test]
    fn wrong_quest_count_is_rejected() {
        let mut definitions = default_quest_definitions();
        definitions.pop();
        assert!(matches!(
            QuestCatalog::new(definitions),
            Err(ConfigError::QuestCount { found: 5, .. })
        ));
    }

    #[test]
    fn zero_step_quest_is_rejected() {
        let mut definitions = default_quest_definitions();
        definitions[2].step_count = 0;
        assert!(matches!(
            QuestCatalog::new(definitions),
            Err(ConfigError::EmptyQuest { quest: 3 })
        ));
    }
}
