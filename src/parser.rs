//! Row parser - разбор таблицы плана в базу знаний
//!
//! One forward pass over the grid. Column A carries weeks, B trainings, C
//! blocks or exercise names, D repetitions and E weight. The cursor record
//! remembers the current week/training/block between rows; nothing looks
//! ahead or back.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::classify::{
    is_block_row, is_training_row, is_week_row, parse_block_info, parse_training_info,
    parse_week_info, parse_weight,
};
use crate::model::{KnowledgeBase, NewBlock, NewExercise, NewTraining, NewWeek};

/// One spreadsheet row, columns A..E; `None` is an empty cell
pub type Row = Vec<Option<String>>;

const DEFAULT_WEEK_DESCRIPTION: &str = "Unnamed Week";

/// Ids of the entities new rows attach to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub week: Option<String>,
    pub training: Option<String>,
    pub block: Option<String>,
}

/// What a single row produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowEffect {
    pub week: bool,
    pub training: bool,
    pub block: bool,
    pub exercise: bool,
}

impl RowEffect {
    pub fn is_empty(&self) -> bool {
        !(self.week || self.training || self.block || self.exercise)
    }
}

/// Trimmed cell text, `None` for missing or blank cells
fn cell(row: &[Option<String>], column: usize) -> Option<&str> {
    row.get(column)
        .and_then(|c| c.as_deref())
        .map(str::trim)
        .filter(|c| !c.is_empty())
}

/// Parser state threaded through the rows
#[derive(Debug, Default)]
pub struct RowParser {
    kb: KnowledgeBase,
    cursor: Cursor,
    rows_seen: usize,
    rows_skipped: usize,
}

impl RowParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    /// Apply one data row (header already stripped)
    pub fn step(&mut self, row: &[Option<String>]) -> RowEffect {
        self.rows_seen += 1;
        let mut effect = RowEffect::default();

        if let Some(a) = cell(row, 0).filter(|a| is_week_row(a)) {
            effect.week = self.start_week(a);
        }

        // Same row may also carry a training header in column B
        if let Some(b) = cell(row, 1).filter(|b| is_training_row(b)) {
            effect.training = self.start_training(b);
        }

        if let Some(c) = cell(row, 2) {
            if is_block_row(c) {
                effect.block = self.start_block(c);
            } else if self.cursor.training.is_some() {
                effect.exercise = self.add_exercise(c, cell(row, 3), cell(row, 4));
            } else {
                debug!(row = self.rows_seen, "exercise row without training, skipped");
            }
        }

        if effect.is_empty() {
            self.rows_skipped += 1;
        }
        effect
    }

    fn start_week(&mut self, text: &str) -> bool {
        let info = parse_week_info(text);
        let week = NewWeek {
            date_range: info.date_range,
            description: info.description,
            intensity: info.intensity,
            ..NewWeek::default()
        };
        match self.kb.add_week(week) {
            Ok(week) => {
                self.cursor = Cursor {
                    week: Some(week.id.clone()),
                    ..Cursor::default()
                };
                true
            }
            Err(e) => {
                warn!(row = self.rows_seen, error = %e, "week row dropped");
                false
            }
        }
    }

    fn ensure_week(&mut self) -> Option<String> {
        if let Some(id) = &self.cursor.week {
            return Some(id.clone());
        }
        debug!(row = self.rows_seen, "training before any week, adding default week");
        let week = NewWeek {
            description: DEFAULT_WEEK_DESCRIPTION.to_string(),
            ..NewWeek::default()
        };
        let id = self.kb.add_week(week).ok()?.id.clone();
        self.cursor.week = Some(id.clone());
        Some(id)
    }

    fn start_training(&mut self, text: &str) -> bool {
        let Some(week_id) = self.ensure_week() else {
            return false;
        };
        let info = parse_training_info(text);
        let training = NewTraining {
            training_number: info.number,
            intensity_percent: info.intensity,
            description: info.description,
            ..NewTraining::default()
        };
        match self.kb.add_training(&week_id, training) {
            Ok(training) => {
                self.cursor.training = Some(training.id.clone());
                self.cursor.block = None;
                true
            }
            Err(e) => {
                warn!(row = self.rows_seen, error = %e, "training row dropped");
                false
            }
        }
    }

    fn start_block(&mut self, text: &str) -> bool {
        let Some(training_id) = self.cursor.training.clone() else {
            debug!(row = self.rows_seen, "block row without training, skipped");
            return false;
        };
        let info = parse_block_info(text);
        let block = NewBlock {
            block_number: info.block_num,
            rounds: info.rounds,
            rest_info: info.rest_info,
            set_type: info.set_type.map(str::to_string),
            description: info.description,
            ..NewBlock::default()
        };
        match self.kb.add_block(&training_id, block) {
            Ok(block) => {
                self.cursor.block = Some(block.id.clone());
                true
            }
            Err(e) => {
                warn!(row = self.rows_seen, error = %e, "block row dropped");
                false
            }
        }
    }

    fn ensure_block(&mut self, training_id: &str) -> Option<String> {
        if let Some(id) = &self.cursor.block {
            return Some(id.clone());
        }
        debug!(row = self.rows_seen, "exercise before any block, adding default block");
        let block = NewBlock {
            block_number: Some(1),
            ..NewBlock::default()
        };
        let id = self.kb.add_block(training_id, block).ok()?.id.clone();
        self.cursor.block = Some(id.clone());
        Some(id)
    }

    fn add_exercise(&mut self, name: &str, reps: Option<&str>, weight: Option<&str>) -> bool {
        let Some(training_id) = self.cursor.training.clone() else {
            return false;
        };
        let Some(block_id) = self.ensure_block(&training_id) else {
            return false;
        };
        let weight = weight.unwrap_or_default().to_string();
        let exercise = NewExercise {
            name: name.to_string(),
            repetitions: reps.unwrap_or_default().to_string(),
            weight_type: parse_weight(&weight).kind,
            weight,
            ..NewExercise::default()
        };
        match self.kb.add_exercise(&block_id, exercise) {
            Ok(_) => true,
            Err(e) => {
                warn!(row = self.rows_seen, error = %e, "exercise row dropped");
                false
            }
        }
    }

    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }

    /// Close the pass and recompute metadata
    pub fn finish(mut self) -> KnowledgeBase {
        self.kb.update_metadata();
        self.kb
    }
}

/// Parse a full sheet; row 0 is the header and is ignored
pub fn parse_rows(rows: &[Row]) -> KnowledgeBase {
    let started = Instant::now();
    let mut parser = RowParser::new();
    for row in rows.iter().skip(1) {
        parser.step(row);
    }

    let skipped = parser.rows_skipped();
    let kb = parser.finish();
    let meta = kb.metadata();
    info!(
        rows = rows.len(),
        skipped,
        weeks = meta.total_weeks,
        trainings = meta.total_trainings,
        exercises = meta.total_exercises,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "parsing completed"
    );
    kb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells
            .iter()
            .map(|c| if c.is_empty() { None } else { Some(c.to_string()) })
            .collect()
    }

    fn header() -> Row {
        row(&["Неделя", "Тренировка", "Упражнение", "Повторы", "Вес"])
    }

    #[test]
    fn test_week_training_block_exercises_nesting() {
        let rows = vec![
            header(),
            row(&["8-14.01\n1 неделя жесткого кача", "", "", "", ""]),
            row(&["", "1\n60-70%", "1\\1", "", ""]),
            row(&["", "", "подтягивания", "10", ""]),
            row(&["", "", "отжимания", "20", "вес тела"]),
        ];
        let kb = parse_rows(&rows);

        assert_eq!(kb.weeks().len(), 1);
        let week = &kb.weeks()[0];
        assert_eq!(week.date_range, "8-14.01");
        assert_eq!(week.intensity, "высокая");
        assert_eq!(week.trainings.len(), 1);

        let training = &week.trainings[0];
        assert_eq!(training.training_number, Some(1));
        assert_eq!(training.intensity_percent, "60-70%");
        assert_eq!(training.blocks.len(), 1);

        let block = &training.blocks[0];
        assert_eq!(block.block_number, Some(1));
        assert_eq!(block.exercises.len(), 2);
        assert_eq!(block.exercises[1].name, "отжимания");
        assert_eq!(
            block.exercises[1].weight_type,
            Some(crate::classify::WeightKind::Bodyweight)
        );
        assert_eq!(kb.metadata().total_exercises, 2);
    }

    #[test]
    fn test_week_and_training_on_same_row() {
        let rows = vec![
            header(),
            row(&["15-21.01", "1 60%", "", "", ""]),
            row(&["", "", "планка", "60 сек", ""]),
        ];
        let kb = parse_rows(&rows);
        assert_eq!(kb.metadata().total_weeks, 1);
        assert_eq!(kb.metadata().total_trainings, 1);
        // Default block for exercises without a block header
        let block = &kb.weeks()[0].trainings[0].blocks[0];
        assert_eq!(block.block_number, Some(1));
        assert_eq!(block.rounds, None);
        assert_eq!(block.set_type, None);
        assert_eq!(block.exercises[0].repetitions, "60 сек");
    }

    #[test]
    fn test_training_without_week_gets_default_week() {
        let rows = vec![header(), row(&["", "1", "", "", ""])];
        let kb = parse_rows(&rows);
        assert_eq!(kb.weeks().len(), 1);
        assert_eq!(kb.weeks()[0].description, "Unnamed Week");
        assert_eq!(kb.weeks()[0].date_range, "");
    }

    #[test]
    fn test_rows_without_training_are_skipped() {
        let rows = vec![
            header(),
            row(&["", "", "1\\1", "", ""]),
            row(&["", "", "подтягивания", "10", ""]),
            row(&["8-14.01", "", "", "", ""]),
            row(&["", "", "приседания", "10", ""]),
        ];
        let kb = parse_rows(&rows);
        assert_eq!(kb.metadata().total_weeks, 1);
        assert_eq!(kb.metadata().total_trainings, 0);
        assert_eq!(kb.metadata().total_exercises, 0);
    }

    #[test]
    fn test_new_week_resets_training_cursor() {
        let mut parser = RowParser::new();
        parser.step(&row(&["8-14.01", "1", "1\\1", "", ""]));
        assert!(parser.cursor().block.is_some());

        let effect = parser.step(&row(&["15-21.01", "", "", "", ""]));
        assert!(effect.week);
        assert_eq!(parser.cursor().week.as_deref(), Some("week_2"));
        assert_eq!(parser.cursor().training, None);
        assert_eq!(parser.cursor().block, None);
    }

    #[test]
    fn test_new_training_resets_block_cursor() {
        let mut parser = RowParser::new();
        parser.step(&row(&["8-14.01", "1", "2\\3", "", ""]));
        let effect = parser.step(&row(&["", "2", "", "", ""]));
        assert!(effect.training && !effect.block);
        assert_eq!(parser.cursor().block, None);
    }

    #[test]
    fn test_block_row_never_adds_exercise() {
        let mut parser = RowParser::new();
        parser.step(&row(&["8-14.01", "1", "", "", ""]));
        let effect = parser.step(&row(&["", "", "4\\AMRAP 12 мин", "10", "8 кг"]));
        assert!(effect.block);
        assert!(!effect.exercise);
        let kb = parser.finish();
        let block = &kb.weeks()[0].trainings[0].blocks[0];
        assert_eq!(block.set_type.as_deref(), Some("AMRAP"));
        assert!(block.exercises.is_empty());
    }

    #[test]
    fn test_garbage_rows_degrade_gracefully() {
        let rows = vec![
            header(),
            vec![],
            vec![None, None],
            row(&["???", "просто текст", "", "", ""]),
            vec![Some("   ".to_string()); 7],
            row(&["8-14.01", "отдых", "", "", ""]),
            row(&["", "", "бег", "", ""]),
        ];
        let mut parser = RowParser::new();
        for r in rows.iter().skip(1) {
            parser.step(r);
        }
        assert_eq!(parser.rows_skipped(), 4);
        let kb = parser.finish();
        assert_eq!(kb.metadata().total_trainings, 1);
        let exercise = &kb.weeks()[0].trainings[0].blocks[0].exercises[0];
        assert_eq!(exercise.name, "бег");
        assert_eq!(exercise.repetitions, "");
        assert_eq!(exercise.weight_type, None);
    }

    #[test]
    fn test_header_only_and_empty_input() {
        assert_eq!(parse_rows(&[]).metadata().total_weeks, 0);
        assert_eq!(parse_rows(&[header()]).metadata().total_weeks, 0);
    }

    #[test]
    fn test_names_and_date_range_after_finish() {
        let rows = vec![
            header(),
            row(&["8-14.01", "1", "", "", ""]),
            row(&["", "", "Приседания", "", ""]),
            row(&["22-28.01", "1", "", "", ""]),
            row(&["", "", "бурпи", "", ""]),
            row(&["", "", "приседания", "", ""]),
        ];
        let kb = parse_rows(&rows);
        assert_eq!(kb.metadata().date_range, "8-14.01 - 22-28.01");
        assert_eq!(kb.get_all_exercise_names(), vec!["бурпи", "Приседания"]);
    }
}
