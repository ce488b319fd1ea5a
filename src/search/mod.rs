//! Training search - поиск тренировок по упражнениям, интенсивности и типу сета
//!
//! Filters are conjunctive and applied in a fixed order (include, exclude,
//! intensity, set type), most restrictive first.

pub mod filters;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{KnowledgeBase, Training};
use filters::{
    IntensityFilter, fuzzy_match, matches_intensity, matches_set_type, normalize_text,
    training_exercises, training_has_all_exercises, training_has_any_exercise,
};

/// Searches slower than this are logged as slow
const SEARCH_BUDGET_MS: f64 = 100.0;
const PREVIEW_EXERCISES: usize = 3;

/// A training together with the week it belongs to
#[derive(Debug, Clone, Copy)]
pub struct TrainingContext<'a> {
    pub training: &'a Training,
    pub week_id: &'a str,
    /// 1-based week position
    pub week_number: usize,
    pub week_date_range: &'a str,
    pub week_description: &'a str,
    pub week_intensity: &'a str,
}

/// Anything that can hand out its trainings with week context
pub trait TrainingSource {
    /// All trainings in plan order
    fn trainings(&self) -> Vec<TrainingContext<'_>>;

    /// Sorted unique exercise names
    fn exercise_names(&self) -> Vec<String>;

    fn training_context(&self, training_id: &str) -> Option<TrainingContext<'_>> {
        self.trainings()
            .into_iter()
            .find(|ctx| ctx.training.id == training_id)
    }
}

impl TrainingSource for KnowledgeBase {
    fn trainings(&self) -> Vec<TrainingContext<'_>> {
        self.weeks()
            .iter()
            .enumerate()
            .flat_map(|(wi, week)| {
                week.trainings.iter().map(move |training| TrainingContext {
                    training,
                    week_id: &week.id,
                    week_number: wi + 1,
                    week_date_range: &week.date_range,
                    week_description: &week.description,
                    week_intensity: &week.intensity,
                })
            })
            .collect()
    }

    fn exercise_names(&self) -> Vec<String> {
        self.get_all_exercise_names()
    }

    fn training_context(&self, training_id: &str) -> Option<TrainingContext<'_>> {
        let training = self.get_training(training_id)?;
        let week = self.week_of(training_id)?;
        Some(TrainingContext {
            training,
            week_id: &week.id,
            week_number: self.week_number(&week.id)?,
            week_date_range: &week.date_range,
            week_description: &week.description,
            week_intensity: &week.intensity,
        })
    }
}

/// Search request; every field is optional and empty means unrestricted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    /// Training must contain all of these
    #[serde(default)]
    pub include: Vec<String>,
    /// Training must contain none of these
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub intensity: Option<IntensityFilter>,
    #[serde(default)]
    pub set_type: Option<String>,
}

impl SearchFilters {
    pub fn has_filters(&self) -> bool {
        !self.include.is_empty()
            || !self.exclude.is_empty()
            || self.intensity.as_ref().is_some_and(|i| !i.is_empty())
            || self.set_type.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

/// One matching training, ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub training_id: String,
    pub week_id: String,
    pub week_number: usize,
    pub week_date_range: String,
    pub week_description: String,
    pub training_number: Option<u32>,
    pub training_date: String,
    pub intensity: String,
    /// Exercises that satisfied the include filter, for highlighting
    pub matched_exercises: Vec<String>,
    pub total_blocks: usize,
    pub total_exercises: usize,
    pub summary: String,
    pub preview_text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total_results: usize,
    pub filters: SearchFilters,
    pub search_time_ms: f64,
    pub is_optimal: bool,
}

/// Runs searches over a borrowed training source
pub struct SearchIndex<'a, S: TrainingSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: TrainingSource + ?Sized> SearchIndex<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    pub fn search(&self, filters: &SearchFilters) -> SearchResponse {
        let started = Instant::now();
        let mut trainings = self.source.trainings();

        if !filters.include.is_empty() {
            trainings.retain(|ctx| training_has_all_exercises(ctx.training, &filters.include));
        }
        if !filters.exclude.is_empty() {
            trainings.retain(|ctx| !training_has_any_exercise(ctx.training, &filters.exclude));
        }
        if let Some(intensity) = &filters.intensity {
            trainings.retain(|ctx| matches_intensity(ctx, intensity));
        }
        if let Some(set_type) = &filters.set_type {
            trainings.retain(|ctx| matches_set_type(ctx.training, set_type));
        }

        trainings.sort_by_key(|ctx| (ctx.week_number, ctx.training.training_number));

        let results: Vec<SearchResult> = trainings
            .iter()
            .map(|ctx| build_result(ctx, filters))
            .collect();

        let search_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let is_optimal = search_time_ms < SEARCH_BUDGET_MS;
        if is_optimal {
            info!(results = results.len(), search_time_ms, "search completed");
        } else {
            warn!(results = results.len(), search_time_ms, "search exceeded time budget");
        }

        SearchResponse {
            total_results: results.len(),
            results,
            filters: filters.clone(),
            search_time_ms,
            is_optimal,
        }
    }

    /// Autocomplete over exercise names
    pub fn search_exercises(&self, query: &str) -> Vec<String> {
        let names = self.source.exercise_names();
        let query = normalize_text(query);
        if query.is_empty() {
            return names;
        }

        let mut matches: Vec<(String, String)> = names
            .into_iter()
            .map(|name| {
                let normalized = normalize_text(&name);
                (name, normalized)
            })
            .filter(|(_, normalized)| normalized.contains(&query) || fuzzy_match(&query, normalized))
            .collect();

        // Exact, then prefix, then shorter names first
        matches.sort_by_key(|(name, normalized)| {
            (
                *normalized != query,
                !normalized.starts_with(&query),
                name.chars().count(),
            )
        });

        matches.into_iter().map(|(name, _)| name).collect()
    }

    pub fn training_details(&self, training_id: &str, filters: &SearchFilters) -> Option<SearchResult> {
        self.source
            .training_context(training_id)
            .map(|ctx| build_result(&ctx, filters))
    }
}

fn build_result(ctx: &TrainingContext<'_>, filters: &SearchFilters) -> SearchResult {
    let training = ctx.training;

    let matched_exercises = if filters.include.is_empty() {
        Vec::new()
    } else {
        let exercises = training_exercises(training);
        filters
            .include
            .iter()
            .map(|wanted| normalize_text(wanted))
            .filter_map(|wanted| exercises.iter().find(|ex| ex.contains(&wanted)).cloned())
            .collect()
    };

    let total_blocks = training.blocks.len();
    let total_exercises = training.exercise_count();
    let preview_text = training
        .exercise_names()
        .take(PREVIEW_EXERCISES)
        .collect::<Vec<_>>()
        .join(", ");

    SearchResult {
        training_id: training.id.clone(),
        week_id: ctx.week_id.to_string(),
        week_number: ctx.week_number,
        week_date_range: ctx.week_date_range.to_string(),
        week_description: ctx.week_description.to_string(),
        training_number: training.training_number,
        training_date: training.date.clone(),
        intensity: training.intensity_percent.clone(),
        matched_exercises,
        total_blocks,
        total_exercises,
        summary: format!("{total_blocks} blocks, {total_exercises} exercises"),
        preview_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::IntensityLevel;
    use crate::model::{NewBlock, NewExercise, NewTraining, NewWeek};

    fn add_training(
        kb: &mut KnowledgeBase,
        week_id: &str,
        number: u32,
        intensity: &str,
        set_type: Option<&str>,
        names: &[&str],
    ) -> String {
        let training_id = kb
            .add_training(week_id, NewTraining {
                training_number: Some(number),
                intensity_percent: intensity.to_string(),
                ..NewTraining::default()
            })
            .unwrap()
            .id
            .clone();
        let block_id = kb
            .add_block(&training_id, NewBlock {
                block_number: Some(1),
                set_type: set_type.map(str::to_string),
                ..NewBlock::default()
            })
            .unwrap()
            .id
            .clone();
        for name in names {
            kb.add_exercise(&block_id, NewExercise {
                name: name.to_string(),
                ..NewExercise::default()
            })
            .unwrap();
        }
        training_id
    }

    fn add_week(kb: &mut KnowledgeBase, date_range: &str, description: &str) -> String {
        kb.add_week(NewWeek {
            date_range: date_range.to_string(),
            description: description.to_string(),
            ..NewWeek::default()
        })
        .unwrap()
        .id
        .clone()
    }

    /// Training 1: подтягивания + отжимания; training 2: приседания
    fn two_trainings() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        let week = add_week(&mut kb, "8-14.01", "1 неделя жесткого кача");
        add_training(&mut kb, &week, 1, "60-70%", Some("AMRAP"), &["подтягивания", "отжимания"]);
        add_training(&mut kb, &week, 2, "80-90%", None, &["приседания"]);
        kb.update_metadata();
        kb
    }

    fn filters() -> SearchFilters {
        SearchFilters::default()
    }

    fn ids(response: &SearchResponse) -> Vec<&str> {
        response.results.iter().map(|r| r.training_id.as_str()).collect()
    }

    #[test]
    fn test_search_without_filters_returns_all() {
        let kb = two_trainings();
        let response = SearchIndex::new(&kb).search(&filters());
        assert_eq!(response.total_results, 2);
        assert!(response.search_time_ms >= 0.0);
        assert!(!response.filters.has_filters());
    }

    #[test]
    fn test_search_include_all() {
        let kb = two_trainings();
        let response = SearchIndex::new(&kb).search(&SearchFilters {
            include: vec!["подтягивания".into(), "отжимания".into()],
            ..filters()
        });
        assert_eq!(ids(&response), vec!["week_1_training_1"]);
        assert_eq!(
            response.results[0].matched_exercises,
            vec!["подтягивания", "отжимания"]
        );
    }

    #[test]
    fn test_search_exclude() {
        let kb = two_trainings();
        let response = SearchIndex::new(&kb).search(&SearchFilters {
            exclude: vec!["приседания".into()],
            ..filters()
        });
        assert_eq!(ids(&response), vec!["week_1_training_1"]);
    }

    #[test]
    fn test_search_include_unknown_exercise() {
        let kb = two_trainings();
        let response = SearchIndex::new(&kb).search(&SearchFilters {
            include: vec!["нет такого упражнения".into()],
            ..filters()
        });
        assert_eq!(response.total_results, 0);
    }

    #[test]
    fn test_search_intensity_and_set_type() {
        let kb = two_trainings();
        let index = SearchIndex::new(&kb);

        let by_range = index.search(&SearchFilters {
            intensity: Some(IntensityFilter::range(85, 95)),
            ..filters()
        });
        assert_eq!(ids(&by_range), vec!["week_1_training_2"]);

        let by_set = index.search(&SearchFilters {
            set_type: Some("amrap".into()),
            ..filters()
        });
        assert_eq!(ids(&by_set), vec!["week_1_training_1"]);

        // Percent-only trainings never match a level filter
        let by_level = index.search(&SearchFilters {
            intensity: Some(IntensityFilter::level(IntensityLevel::High)),
            ..filters()
        });
        assert_eq!(by_level.total_results, 0);
    }

    #[test]
    fn test_search_level_from_week_description() {
        let mut kb = KnowledgeBase::new();
        let week = add_week(&mut kb, "15-21.01", "неделя на здоровье");
        add_training(&mut kb, &week, 1, "", None, &["плавание"]);
        let response = SearchIndex::new(&kb).search(&SearchFilters {
            intensity: Some(IntensityFilter::level(IntensityLevel::Low)),
            ..filters()
        });
        assert_eq!(response.total_results, 1);
    }

    #[test]
    fn test_results_sorted_by_week_then_training() {
        let mut kb = KnowledgeBase::new();
        let w1 = add_week(&mut kb, "8-14.01", "");
        let w2 = add_week(&mut kb, "15-21.01", "");
        add_training(&mut kb, &w2, 1, "", None, &["бег"]);
        add_training(&mut kb, &w1, 3, "", None, &["бег"]);
        add_training(&mut kb, &w1, 1, "", None, &["бег"]);
        let response = SearchIndex::new(&kb).search(&filters());
        let order: Vec<(usize, Option<u32>)> = response
            .results
            .iter()
            .map(|r| (r.week_number, r.training_number))
            .collect();
        assert_eq!(order, vec![(1, Some(1)), (1, Some(3)), (2, Some(1))]);
    }

    #[test]
    fn test_result_preview_and_counts() {
        let mut kb = KnowledgeBase::new();
        let week = add_week(&mut kb, "8-14.01", "");
        let id = add_training(&mut kb, &week, 1, "70%", None, &["а1", "б2", "в3", "г4"]);
        let result = SearchIndex::new(&kb).training_details(&id, &filters()).unwrap();
        assert_eq!(result.preview_text, "а1, б2, в3");
        assert_eq!(result.total_blocks, 1);
        assert_eq!(result.total_exercises, 4);
        assert_eq!(result.summary, "1 blocks, 4 exercises");
        assert_eq!(result.intensity, "70%");
        assert!(SearchIndex::new(&kb).training_details("nope", &filters()).is_none());
    }

    #[test]
    fn test_search_exercises_ranking() {
        let mut kb = KnowledgeBase::new();
        let week = add_week(&mut kb, "8-14.01", "");
        add_training(
            &mut kb,
            &week,
            1,
            "",
            None,
            &["жим гантелей лежа", "жим", "становая тяга", "армейский жим"],
        );
        kb.update_metadata();
        let index = SearchIndex::new(&kb);

        assert_eq!(
            index.search_exercises("жим"),
            vec!["жим", "жим гантелей лежа", "армейский жим"]
        );
        // Blank query lists everything in collation order
        assert_eq!(index.search_exercises("  ").len(), 4);
        assert_eq!(index.search_exercises("  ")[0], "армейский жим");
    }

    /// Records level and target of every event
    #[derive(Clone, Default)]
    struct EventLog(std::sync::Arc<std::sync::Mutex<Vec<(tracing::Level, String)>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventLog {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            let meta = event.metadata();
            self.0
                .lock()
                .unwrap()
                .push((*meta.level(), meta.target().to_string()));
        }
    }

    #[test]
    fn test_search_completion_is_logged_at_info() {
        use tracing_subscriber::layer::SubscriberExt;

        let kb = two_trainings();
        let log = EventLog::default();
        let subscriber = tracing_subscriber::registry().with(log.clone());
        let response = tracing::subscriber::with_default(subscriber, || {
            SearchIndex::new(&kb).search(&filters())
        });

        let expected = if response.is_optimal {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        };
        let events = log.0.lock().unwrap();
        assert!(events.contains(&(expected, "trenbase::search".to_string())));
    }

    #[test]
    fn test_filters_deserialize_from_json() {
        let json = r#"{"include":["подтягивания"],"intensity":{"min":60,"max":70},"setType":"AMRAP"}"#;
        let parsed: SearchFilters = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.include, vec!["подтягивания"]);
        assert_eq!(parsed.intensity, Some(IntensityFilter::range(60, 70)));
        assert_eq!(parsed.set_type.as_deref(), Some("AMRAP"));
        assert!(parsed.has_filters());
    }
}
