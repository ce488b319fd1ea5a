//! Knowledge base - дерево плана: неделя → тренировка → блок → упражнение
//!
//! The tree is the source of truth. Flat id indices and the metadata block
//! are caches derived from it and are rebuilt whenever the tree changes
//! shape (bulk load, deletion).

pub mod collate;

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Local;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::classify::WeightKind;
use crate::error::{Error, Result};

/// How many names `statistics()` reports as most frequent
const TOP_EXERCISES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Week {
    pub id: String,
    #[serde(default)]
    pub date_range: String,
    #[serde(default)]
    pub description: String,
    /// "высокая", "низкая", "тест" or free text
    #[serde(default)]
    pub intensity: String,
    #[serde(default)]
    pub trainings: Vec<Training>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Training {
    pub id: String,
    #[serde(default)]
    pub week_id: String,
    #[serde(default)]
    pub training_number: Option<u32>,
    /// e.g. "60-70%"
    #[serde(default)]
    pub intensity_percent: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub training_id: String,
    #[serde(default)]
    pub block_number: Option<u32>,
    /// `None` means a single pass
    #[serde(default)]
    pub rounds: Option<u32>,
    #[serde(default)]
    pub rest_info: String,
    #[serde(default)]
    pub set_type: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl Block {
    pub fn exercise_count(&self) -> usize {
        self.exercises.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    #[serde(default)]
    pub block_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub repetitions: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub weight_type: Option<WeightKind>,
}

impl Training {
    pub fn exercise_count(&self) -> usize {
        self.blocks.iter().map(Block::exercise_count).sum()
    }

    /// Exercise names in block order
    pub fn exercise_names(&self) -> impl Iterator<Item = &str> {
        self.blocks
            .iter()
            .flat_map(|b| b.exercises.iter())
            .map(|e| e.name.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewWeek {
    pub id: Option<String>,
    pub date_range: String,
    pub description: String,
    pub intensity: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewTraining {
    pub id: Option<String>,
    pub training_number: Option<u32>,
    pub intensity_percent: String,
    pub date: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewBlock {
    pub id: Option<String>,
    pub block_number: Option<u32>,
    pub rounds: Option<u32>,
    pub rest_info: String,
    pub set_type: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewExercise {
    pub id: Option<String>,
    pub name: String,
    pub repetitions: String,
    pub weight: String,
    pub weight_type: Option<WeightKind>,
}

/// Aggregates derived from the tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub total_weeks: usize,
    pub total_trainings: usize,
    pub total_exercises: usize,
    /// Unique (case-insensitive) names in Russian collation order
    pub all_exercise_names: Vec<String>,
    /// "first - last" week date range
    pub date_range: String,
    pub parsed_date: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            total_weeks: 0,
            total_trainings: 0,
            total_exercises: 0,
            all_exercise_names: Vec::new(),
            date_range: String::new(),
            parsed_date: Local::now().format("%Y-%m-%d").to_string(),
        }
    }
}

/// Serialized form: `{ weeks, metadata }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub weeks: Vec<Week>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    weeks: &'a [Week],
    metadata: &'a Metadata,
}

/// One occurrence of an exercise with its ancestors
#[derive(Debug, Clone, Copy)]
pub struct ExerciseHit<'a> {
    pub exercise: &'a Exercise,
    pub block: &'a Block,
    pub training: &'a Training,
    pub week: &'a Week,
}

#[derive(Debug, Clone, Copy)]
pub struct TrainingHit<'a> {
    pub training: &'a Training,
    pub week: &'a Week,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseFrequency {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_weeks: usize,
    pub total_trainings: usize,
    pub total_blocks: usize,
    pub total_exercises: usize,
    pub unique_exercises: usize,
    pub block_types: BTreeMap<String, usize>,
    pub top_exercises: Vec<ExerciseFrequency>,
}

/// Normalized training plan with O(1) id lookup
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    weeks: Vec<Week>,
    metadata: Metadata,
    week_index: HashMap<String, usize>,
    training_index: HashMap<String, (usize, usize)>,
    block_index: HashMap<String, (usize, usize, usize)>,
    /// Lowercased members of `metadata.all_exercise_names`
    name_keys: HashSet<String>,
}

/// First `{base}{n}` not yet taken, counting from `start`
fn next_free_id(base: &str, start: usize, taken: impl Fn(&str) -> bool) -> String {
    let mut n = start;
    loop {
        let id = format!("{base}{n}");
        if !taken(&id) {
            return id;
        }
        n += 1;
    }
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weeks(&self) -> &[Week] {
        &self.weeks
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn add_week(&mut self, data: NewWeek) -> Result<&Week> {
        let id = match data.id {
            Some(id) if self.week_index.contains_key(&id) => {
                return Err(Error::validation(format!("duplicate week id {id}")));
            }
            Some(id) => id,
            None => next_free_id("week_", self.weeks.len() + 1, |id| {
                self.week_index.contains_key(id)
            }),
        };

        let position = self.weeks.len();
        self.week_index.insert(id.clone(), position);
        self.weeks.push(Week {
            id,
            date_range: data.date_range,
            description: data.description,
            intensity: data.intensity,
            trainings: Vec::new(),
        });
        self.metadata.total_weeks = self.weeks.len();

        Ok(&self.weeks[position])
    }

    pub fn add_training(&mut self, week_id: &str, data: NewTraining) -> Result<&Training> {
        let wi = *self
            .week_index
            .get(week_id)
            .ok_or_else(|| Error::not_found("Week", week_id))?;

        let id = match data.id {
            Some(id) if self.training_index.contains_key(&id) => {
                return Err(Error::validation(format!("duplicate training id {id}")));
            }
            Some(id) => id,
            None => next_free_id(
                &format!("{week_id}_training_"),
                self.weeks[wi].trainings.len() + 1,
                |id| self.training_index.contains_key(id),
            ),
        };

        let week = &mut self.weeks[wi];
        let ti = week.trainings.len();
        week.trainings.push(Training {
            id: id.clone(),
            week_id: week_id.to_string(),
            training_number: data.training_number,
            intensity_percent: data.intensity_percent,
            date: data.date,
            description: data.description,
            blocks: Vec::new(),
        });
        self.training_index.insert(id, (wi, ti));
        self.metadata.total_trainings += 1;

        Ok(&self.weeks[wi].trainings[ti])
    }

    pub fn add_block(&mut self, training_id: &str, data: NewBlock) -> Result<&Block> {
        let (wi, ti) = *self
            .training_index
            .get(training_id)
            .ok_or_else(|| Error::not_found("Training", training_id))?;

        let id = match data.id {
            Some(id) if self.block_index.contains_key(&id) => {
                return Err(Error::validation(format!("duplicate block id {id}")));
            }
            Some(id) => id,
            None => next_free_id(
                &format!("{training_id}_block_"),
                self.weeks[wi].trainings[ti].blocks.len() + 1,
                |id| self.block_index.contains_key(id),
            ),
        };

        let training = &mut self.weeks[wi].trainings[ti];
        let bi = training.blocks.len();
        training.blocks.push(Block {
            id: id.clone(),
            training_id: training_id.to_string(),
            block_number: data.block_number,
            rounds: data.rounds,
            rest_info: data.rest_info,
            set_type: data.set_type,
            description: data.description,
            exercises: Vec::new(),
        });
        self.block_index.insert(id, (wi, ti, bi));

        Ok(&self.weeks[wi].trainings[ti].blocks[bi])
    }

    pub fn add_exercise(&mut self, block_id: &str, data: NewExercise) -> Result<&Exercise> {
        let (wi, ti, bi) = *self
            .block_index
            .get(block_id)
            .ok_or_else(|| Error::not_found("Block", block_id))?;

        let id = match data.id {
            Some(id) if self.find_exercise(&id).is_some() => {
                return Err(Error::validation(format!("duplicate exercise id {id}")));
            }
            Some(id) => id,
            // Exercise ids are looked up tree-wide, so uniqueness is too
            None => next_free_id(
                &format!("{block_id}_ex_"),
                self.weeks[wi].trainings[ti].blocks[bi].exercises.len() + 1,
                |id| self.find_exercise(id).is_some(),
            ),
        };

        self.register_name(&data.name);

        let block = &mut self.weeks[wi].trainings[ti].blocks[bi];
        let ei = block.exercises.len();
        block.exercises.push(Exercise {
            id,
            block_id: block_id.to_string(),
            name: data.name,
            repetitions: data.repetitions,
            weight: data.weight,
            weight_type: data.weight_type,
        });
        self.metadata.total_exercises += 1;

        Ok(&self.weeks[wi].trainings[ti].blocks[bi].exercises[ei])
    }

    /// Case-insensitive insert into the sorted name list
    fn register_name(&mut self, name: &str) {
        let trimmed = name.trim();
        if trimmed.is_empty() || !self.name_keys.insert(trimmed.to_lowercase()) {
            return;
        }
        let names = &mut self.metadata.all_exercise_names;
        let (Ok(pos) | Err(pos)) = names.binary_search_by(|n| collate::compare(n, trimmed));
        names.insert(pos, trimmed.to_string());
    }

    pub fn get_week(&self, week_id: &str) -> Option<&Week> {
        self.week_index.get(week_id).map(|&wi| &self.weeks[wi])
    }

    pub fn get_training(&self, training_id: &str) -> Option<&Training> {
        self.training_index
            .get(training_id)
            .map(|&(wi, ti)| &self.weeks[wi].trainings[ti])
    }

    pub fn get_block(&self, block_id: &str) -> Option<&Block> {
        self.block_index
            .get(block_id)
            .map(|&(wi, ti, bi)| &self.weeks[wi].trainings[ti].blocks[bi])
    }

    /// Week that owns a training
    pub fn week_of(&self, training_id: &str) -> Option<&Week> {
        self.training_index
            .get(training_id)
            .map(|&(wi, _)| &self.weeks[wi])
    }

    /// 1-based position of a week in plan order
    pub fn week_number(&self, week_id: &str) -> Option<usize> {
        self.week_index.get(week_id).map(|wi| wi + 1)
    }

    pub fn get_training_by_week_and_number(&self, week_id: &str, number: u32) -> Option<&Training> {
        self.get_week(week_id)?
            .trainings
            .iter()
            .find(|t| t.training_number == Some(number))
    }

    /// Linear scan, exercises are not indexed
    pub fn find_exercise(&self, exercise_id: &str) -> Option<ExerciseHit<'_>> {
        self.exercise_hits().find(|hit| hit.exercise.id == exercise_id)
    }

    /// Sorted copy of the unique exercise names
    pub fn get_all_exercise_names(&self) -> Vec<String> {
        let mut names = self.metadata.all_exercise_names.clone();
        collate::sort_names(&mut names);
        names
    }

    pub fn get_all_set_types(&self) -> Vec<String> {
        let set_types: HashSet<&str> = self
            .blocks()
            .filter_map(|b| b.set_type.as_deref())
            .filter(|s| !s.is_empty())
            .collect();
        let mut set_types: Vec<String> = set_types.into_iter().map(str::to_string).collect();
        set_types.sort();
        set_types
    }

    /// Week intensity labels and training percentages
    pub fn get_intensity_levels(&self) -> Vec<String> {
        let mut levels: HashSet<&str> = HashSet::new();
        for week in &self.weeks {
            if !week.intensity.is_empty() {
                levels.insert(&week.intensity);
            }
            for training in &week.trainings {
                if !training.intensity_percent.is_empty() {
                    levels.insert(&training.intensity_percent);
                }
            }
        }
        let mut levels: Vec<String> = levels.into_iter().map(str::to_string).collect();
        levels.sort();
        levels
    }

    fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.weeks
            .iter()
            .flat_map(|w| w.trainings.iter())
            .flat_map(|t| t.blocks.iter())
    }

    fn exercise_hits(&self) -> impl Iterator<Item = ExerciseHit<'_>> {
        self.weeks.iter().flat_map(|week| {
            week.trainings.iter().flat_map(move |training| {
                training.blocks.iter().flat_map(move |block| {
                    block.exercises.iter().map(move |exercise| ExerciseHit {
                        exercise,
                        block,
                        training,
                        week,
                    })
                })
            })
        })
    }

    /// Every exercise whose name contains the query, case-insensitive
    pub fn search_exercises(&self, query: &str) -> Vec<ExerciseHit<'_>> {
        let query = query.trim().to_lowercase();
        self.exercise_hits()
            .filter(|hit| hit.exercise.name.to_lowercase().contains(&query))
            .collect()
    }

    /// Trainings whose intensity percent contains the pattern
    pub fn filter_by_intensity(&self, pattern: &str) -> Vec<TrainingHit<'_>> {
        let pattern = pattern.to_lowercase();
        self.weeks
            .iter()
            .flat_map(|week| {
                week.trainings
                    .iter()
                    .map(move |training| TrainingHit { training, week })
            })
            .filter(|hit| hit.training.intensity_percent.to_lowercase().contains(&pattern))
            .collect()
    }

    pub fn statistics(&self) -> Statistics {
        let mut total_blocks = 0;
        let mut block_types: BTreeMap<String, usize> = BTreeMap::new();
        // Encounter order is kept so equal counts stay in plan order
        let mut frequency: Vec<ExerciseFrequency> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for training in self.weeks.iter().flat_map(|w| w.trainings.iter()) {
            total_blocks += training.blocks.len();
            for block in &training.blocks {
                if let Some(set_type) = block.set_type.as_deref().filter(|s| !s.is_empty()) {
                    *block_types.entry(set_type.to_string()).or_insert(0) += 1;
                }
                for exercise in &block.exercises {
                    let name = exercise.name.to_lowercase();
                    match positions.get(&name) {
                        Some(&i) => frequency[i].count += 1,
                        None => {
                            positions.insert(name.clone(), frequency.len());
                            frequency.push(ExerciseFrequency { name, count: 1 });
                        }
                    }
                }
            }
        }

        frequency.sort_by(|a, b| b.count.cmp(&a.count));
        frequency.truncate(TOP_EXERCISES);

        Statistics {
            total_weeks: self.metadata.total_weeks,
            total_trainings: self.metadata.total_trainings,
            total_blocks,
            total_exercises: self.metadata.total_exercises,
            unique_exercises: self.metadata.all_exercise_names.len(),
            block_types,
            top_exercises: frequency,
        }
    }

    /// Recompute every derived field from the tree
    pub fn update_metadata(&mut self) {
        self.metadata.total_weeks = self.weeks.len();
        self.metadata.total_trainings = self.weeks.iter().map(|w| w.trainings.len()).sum();
        self.metadata.total_exercises = self
            .weeks
            .iter()
            .flat_map(|w| w.trainings.iter())
            .map(Training::exercise_count)
            .sum();

        let dates: Vec<&str> = self
            .weeks
            .iter()
            .map(|w| w.date_range.as_str())
            .filter(|d| !d.is_empty())
            .collect();
        self.metadata.date_range = match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => format!("{first} - {last}"),
            _ => String::new(),
        };

        self.name_keys.clear();
        self.metadata.all_exercise_names.clear();
        let names: Vec<String> = self
            .exercise_hits()
            .map(|hit| hit.exercise.name.clone())
            .collect();
        for name in names {
            self.register_name(&name);
        }
    }

    fn rebuild_indices(&mut self) {
        self.week_index.clear();
        self.training_index.clear();
        self.block_index.clear();

        for (wi, week) in self.weeks.iter().enumerate() {
            self.week_index.insert(week.id.clone(), wi);
            for (ti, training) in week.trainings.iter().enumerate() {
                self.training_index.insert(training.id.clone(), (wi, ti));
                for (bi, block) in training.blocks.iter().enumerate() {
                    self.block_index.insert(block.id.clone(), (wi, ti, bi));
                }
            }
        }
    }

    pub(crate) fn week_mut(&mut self, week_id: &str) -> Option<&mut Week> {
        let wi = *self.week_index.get(week_id)?;
        Some(&mut self.weeks[wi])
    }

    pub(crate) fn training_mut(&mut self, training_id: &str) -> Option<&mut Training> {
        let (wi, ti) = *self.training_index.get(training_id)?;
        Some(&mut self.weeks[wi].trainings[ti])
    }

    pub(crate) fn block_mut(&mut self, block_id: &str) -> Option<&mut Block> {
        let (wi, ti, bi) = *self.block_index.get(block_id)?;
        Some(&mut self.weeks[wi].trainings[ti].blocks[bi])
    }

    pub(crate) fn exercise_mut(&mut self, exercise_id: &str) -> Option<&mut Exercise> {
        self.weeks
            .iter_mut()
            .flat_map(|w| w.trainings.iter_mut())
            .flat_map(|t| t.blocks.iter_mut())
            .flat_map(|b| b.exercises.iter_mut())
            .find(|e| e.id == exercise_id)
    }

    /// Remove a week and everything under it
    pub fn remove_week(&mut self, week_id: &str) -> Result<Week> {
        let wi = *self
            .week_index
            .get(week_id)
            .ok_or_else(|| Error::not_found("Week", week_id))?;
        let week = self.weeks.remove(wi);
        self.after_removal();
        Ok(week)
    }

    pub fn remove_training(&mut self, training_id: &str) -> Result<Training> {
        let (wi, ti) = *self
            .training_index
            .get(training_id)
            .ok_or_else(|| Error::not_found("Training", training_id))?;
        let training = self.weeks[wi].trainings.remove(ti);
        self.after_removal();
        Ok(training)
    }

    pub fn remove_block(&mut self, block_id: &str) -> Result<Block> {
        let (wi, ti, bi) = *self
            .block_index
            .get(block_id)
            .ok_or_else(|| Error::not_found("Block", block_id))?;
        let block = self.weeks[wi].trainings[ti].blocks.remove(bi);
        self.after_removal();
        Ok(block)
    }

    pub fn remove_exercise(&mut self, exercise_id: &str) -> Result<Exercise> {
        let exercises = self
            .weeks
            .iter_mut()
            .flat_map(|w| w.trainings.iter_mut())
            .flat_map(|t| t.blocks.iter_mut())
            .map(|b| &mut b.exercises)
            .find(|exercises| exercises.iter().any(|e| e.id == exercise_id))
            .ok_or_else(|| Error::not_found("Exercise", exercise_id))?;
        let pos = exercises
            .iter()
            .position(|e| e.id == exercise_id)
            .ok_or_else(|| Error::not_found("Exercise", exercise_id))?;
        let exercise = exercises.remove(pos);
        self.after_removal();
        Ok(exercise)
    }

    fn after_removal(&mut self) {
        self.rebuild_indices();
        self.update_metadata();
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let metadata = snapshot.metadata.unwrap_or_default();
        let mut kb = Self {
            weeks: snapshot.weeks,
            metadata,
            ..Self::default()
        };
        // Serialized indices and counters are never trusted
        kb.rebuild_indices();
        kb.update_metadata();
        kb
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            weeks: self.weeks.clone(),
            metadata: Some(self.metadata.clone()),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Serialize for KnowledgeBase {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        SnapshotRef {
            weeks: &self.weeks,
            metadata: &self.metadata,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KnowledgeBase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Snapshot::deserialize(deserializer).map(Self::from_snapshot)
    }
}
