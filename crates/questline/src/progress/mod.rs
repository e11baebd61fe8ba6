use std::time::{SystemTime, UNIX_EPOCH};

mod player_data;
mod quest_progress;
mod step_data;

pub use player_data::{PlayerData, PlayerId, QuestSlot, QUEST_COUNT};
pub use quest_progress::QuestProgress;
pub use step_data::{StepData, StepValue};

/// Wall-clock time as epoch milliseconds, the unit every stored timestamp uses.
pub fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
