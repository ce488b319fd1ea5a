//! Editor - правка базы с валидацией и уведомлениями
//!
//! Every mutation validates its input first and only then touches the tree,
//! so a rejected call leaves the knowledge base exactly as it was.

use tracing::{debug, info};

use crate::classify::{SET_AMRAP, SET_EVERY_X_MIN, SET_ROUNDS, parse_weight};
use crate::error::{Error, Result};
use crate::model::{
    Block, Exercise, KnowledgeBase, NewBlock, NewExercise, NewTraining, NewWeek, Training, Week,
};

/// Emitted after every successful mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    WeekAdded { week_id: String },
    WeekUpdated { week_id: String },
    WeekDeleted { week_id: String },
    TrainingAdded { week_id: String, training_id: String },
    TrainingUpdated { training_id: String },
    TrainingDeleted { training_id: String },
    BlockAdded { training_id: String, block_id: String },
    BlockUpdated { block_id: String },
    BlockDeleted { block_id: String },
    ExerciseAdded { block_id: String, exercise_id: String },
    ExerciseUpdated { exercise_id: String },
    ExerciseDeleted { exercise_id: String },
}

pub trait ChangeListener {
    fn on_change(&mut self, event: &ChangeEvent);
}

impl<F> ChangeListener for F
where
    F: FnMut(&ChangeEvent),
{
    fn on_change(&mut self, event: &ChangeEvent) {
        self(event)
    }
}

/// Fields to change on a week; `None` leaves the field alone
#[derive(Debug, Clone, Default)]
pub struct WeekUpdate {
    pub date_range: Option<String>,
    pub description: Option<String>,
    pub intensity: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingUpdate {
    pub training_number: Option<u32>,
    pub intensity_percent: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BlockUpdate {
    pub block_number: Option<u32>,
    pub rounds: Option<u32>,
    pub rest_info: Option<String>,
    /// A blank value clears the set type
    pub set_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExerciseUpdate {
    pub name: Option<String>,
    pub repetitions: Option<String>,
    pub weight: Option<String>,
}

/// Canonical set type for user input: known keywords map to their
/// canonical name, anything else is kept as typed
pub fn normalize_set_type(set_type: &str) -> Option<String> {
    let trimmed = set_type.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();
    let canonical = if lower.contains("amrap") {
        SET_AMRAP
    } else if lower.contains("каждые") || lower.contains("every") {
        SET_EVERY_X_MIN
    } else if lower.contains("раунд") || lower.contains("round") {
        SET_ROUNDS
    } else {
        return Some(trimmed.to_string());
    };
    Some(canonical.to_string())
}

fn require_positive(value: Option<u32>, field: &str) -> Result<()> {
    match value {
        Some(0) => Err(Error::validation(format!("{field} must be a positive number"))),
        _ => Ok(()),
    }
}

fn require_text(value: &str, message: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(message));
    }
    Ok(trimmed.to_string())
}

/// Validated, observable access to a knowledge base
///
/// Listeners have their own lifetime so the knowledge base borrow ends at
/// the editor's last use, not when it is dropped.
pub struct Editor<'kb, 'l> {
    kb: &'kb mut KnowledgeBase,
    listeners: Vec<Box<dyn ChangeListener + 'l>>,
    unsaved: bool,
}

impl<'kb, 'l> Editor<'kb, 'l> {
    pub fn new(kb: &'kb mut KnowledgeBase) -> Self {
        Self {
            kb,
            listeners: Vec::new(),
            unsaved: false,
        }
    }

    pub fn subscribe(&mut self, listener: impl ChangeListener + 'l) {
        self.listeners.push(Box::new(listener));
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &*self.kb
    }

    /// True after any mutation since the last `mark_saved`
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    pub fn mark_saved(&mut self) {
        self.unsaved = false;
    }

    fn notify(&mut self, event: ChangeEvent) {
        self.unsaved = true;
        debug!(?event, "knowledge base changed");
        for listener in &mut self.listeners {
            listener.on_change(&event);
        }
    }

    // ---- add ----

    pub fn add_week(&mut self, data: NewWeek) -> Result<Week> {
        let date_range = require_text(&data.date_range, "Date range is required")?;
        let week = self
            .kb
            .add_week(NewWeek { date_range, ..data })?
            .clone();
        self.kb.update_metadata();

        info!(week_id = %week.id, "week added");
        self.notify(ChangeEvent::WeekAdded {
            week_id: week.id.clone(),
        });
        Ok(week)
    }

    pub fn add_training(&mut self, week_id: &str, data: NewTraining) -> Result<Training> {
        let existing = self
            .kb
            .get_week(week_id)
            .ok_or_else(|| Error::not_found("Week", week_id))?
            .trainings
            .len();
        require_positive(data.training_number, "Training number")?;

        let training_number = data.training_number.or(Some(existing as u32 + 1));
        let training = self
            .kb
            .add_training(week_id, NewTraining {
                training_number,
                ..data
            })?
            .clone();

        info!(training_id = %training.id, week_id, "training added");
        self.notify(ChangeEvent::TrainingAdded {
            week_id: week_id.to_string(),
            training_id: training.id.clone(),
        });
        Ok(training)
    }

    pub fn add_block(&mut self, training_id: &str, data: NewBlock) -> Result<Block> {
        let existing = self
            .kb
            .get_training(training_id)
            .ok_or_else(|| Error::not_found("Training", training_id))?
            .blocks
            .len();
        require_positive(data.block_number, "Block number")?;
        require_positive(data.rounds, "Rounds")?;

        let block_number = data.block_number.or(Some(existing as u32 + 1));
        let set_type = data.set_type.as_deref().and_then(normalize_set_type);
        let block = self
            .kb
            .add_block(training_id, NewBlock {
                block_number,
                set_type,
                ..data
            })?
            .clone();

        info!(block_id = %block.id, training_id, "block added");
        self.notify(ChangeEvent::BlockAdded {
            training_id: training_id.to_string(),
            block_id: block.id.clone(),
        });
        Ok(block)
    }

    pub fn add_exercise(&mut self, block_id: &str, data: NewExercise) -> Result<Exercise> {
        if self.kb.get_block(block_id).is_none() {
            return Err(Error::not_found("Block", block_id));
        }
        let name = require_text(&data.name, "Exercise name is required")?;

        let weight_type = parse_weight(&data.weight).kind;
        let exercise = self
            .kb
            .add_exercise(block_id, NewExercise {
                name,
                repetitions: data.repetitions.trim().to_string(),
                weight_type,
                ..data
            })?
            .clone();

        info!(exercise_id = %exercise.id, block_id, "exercise added");
        self.notify(ChangeEvent::ExerciseAdded {
            block_id: block_id.to_string(),
            exercise_id: exercise.id.clone(),
        });
        Ok(exercise)
    }

    // ---- update ----

    pub fn update_week(&mut self, week_id: &str, patch: WeekUpdate) -> Result<()> {
        let date_range = patch
            .date_range
            .as_deref()
            .map(|d| require_text(d, "Date range must be a non-empty string"))
            .transpose()?;
        let week = self
            .kb
            .week_mut(week_id)
            .ok_or_else(|| Error::not_found("Week", week_id))?;

        if let Some(date_range) = date_range {
            week.date_range = date_range;
        }
        if let Some(description) = patch.description {
            week.description = description;
        }
        if let Some(intensity) = patch.intensity {
            week.intensity = intensity;
        }
        self.kb.update_metadata();

        info!(week_id, "week updated");
        self.notify(ChangeEvent::WeekUpdated {
            week_id: week_id.to_string(),
        });
        Ok(())
    }

    pub fn update_training(&mut self, training_id: &str, patch: TrainingUpdate) -> Result<()> {
        require_positive(patch.training_number, "Training number")?;
        let training = self
            .kb
            .training_mut(training_id)
            .ok_or_else(|| Error::not_found("Training", training_id))?;

        if let Some(number) = patch.training_number {
            training.training_number = Some(number);
        }
        if let Some(intensity) = patch.intensity_percent {
            training.intensity_percent = intensity;
        }
        if let Some(date) = patch.date {
            training.date = date;
        }
        if let Some(description) = patch.description {
            training.description = description;
        }

        info!(training_id, "training updated");
        self.notify(ChangeEvent::TrainingUpdated {
            training_id: training_id.to_string(),
        });
        Ok(())
    }

    pub fn update_block(&mut self, block_id: &str, patch: BlockUpdate) -> Result<()> {
        require_positive(patch.rounds, "Rounds")?;
        require_positive(patch.block_number, "Block number")?;
        let block = self
            .kb
            .block_mut(block_id)
            .ok_or_else(|| Error::not_found("Block", block_id))?;

        if let Some(number) = patch.block_number {
            block.block_number = Some(number);
        }
        if let Some(rounds) = patch.rounds {
            block.rounds = Some(rounds);
        }
        if let Some(rest_info) = patch.rest_info {
            block.rest_info = rest_info;
        }
        if let Some(set_type) = patch.set_type {
            block.set_type = normalize_set_type(&set_type);
        }
        if let Some(description) = patch.description {
            block.description = description;
        }

        info!(block_id, "block updated");
        self.notify(ChangeEvent::BlockUpdated {
            block_id: block_id.to_string(),
        });
        Ok(())
    }

    pub fn update_exercise(&mut self, exercise_id: &str, patch: ExerciseUpdate) -> Result<()> {
        let name = patch
            .name
            .as_deref()
            .map(|n| require_text(n, "Exercise name must be a non-empty string"))
            .transpose()?;
        let exercise = self
            .kb
            .exercise_mut(exercise_id)
            .ok_or_else(|| Error::not_found("Exercise", exercise_id))?;

        let renamed = name.is_some();
        if let Some(name) = name {
            exercise.name = name;
        }
        if let Some(repetitions) = patch.repetitions {
            exercise.repetitions = repetitions.trim().to_string();
        }
        if let Some(weight) = patch.weight {
            exercise.weight_type = parse_weight(&weight).kind;
            exercise.weight = weight;
        }
        if renamed {
            self.kb.update_metadata();
        }

        info!(exercise_id, "exercise updated");
        self.notify(ChangeEvent::ExerciseUpdated {
            exercise_id: exercise_id.to_string(),
        });
        Ok(())
    }

    // ---- delete ----

    pub fn delete_week(&mut self, week_id: &str) -> Result<Week> {
        let week = self.kb.remove_week(week_id)?;
        info!(week_id, trainings = week.trainings.len(), "week deleted");
        self.notify(ChangeEvent::WeekDeleted {
            week_id: week_id.to_string(),
        });
        Ok(week)
    }

    pub fn delete_training(&mut self, training_id: &str) -> Result<Training> {
        let training = self.kb.remove_training(training_id)?;
        info!(training_id, blocks = training.blocks.len(), "training deleted");
        self.notify(ChangeEvent::TrainingDeleted {
            training_id: training_id.to_string(),
        });
        Ok(training)
    }

    pub fn delete_block(&mut self, block_id: &str) -> Result<Block> {
        let block = self.kb.remove_block(block_id)?;
        info!(block_id, exercises = block.exercises.len(), "block deleted");
        self.notify(ChangeEvent::BlockDeleted {
            block_id: block_id.to_string(),
        });
        Ok(block)
    }

    pub fn delete_exercise(&mut self, exercise_id: &str) -> Result<Exercise> {
        let exercise = self.kb.remove_exercise(exercise_id)?;
        info!(exercise_id, "exercise deleted");
        self.notify(ChangeEvent::ExerciseDeleted {
            exercise_id: exercise_id.to_string(),
        });
        Ok(exercise)
    }
}
