//! Filter predicates over a single training
//!
//! Every predicate prefers a false negative to a false positive: unknown
//! intensity, mismatched filter kinds and empty queries never match.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::TrainingContext;
use crate::classify::{IntensityLevel, SET_EVERY_X_MIN, SET_ROUNDS, SET_TIMED};
use crate::model::{Block, Training};

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+)\s*-\s*([0-9]+)\s*%?").expect("valid intensity range regex")
});
static SINGLE_PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)\s*%").expect("valid single percent regex"));
static MINUTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+\s*мин").expect("valid minutes regex"));

/// Free-text intensity words, first hit wins
const LEVEL_KEYWORDS: &[(&str, IntensityLevel)] = &[
    ("жесткий", IntensityLevel::High),
    ("кач", IntensityLevel::High),
    ("здоровье", IntensityLevel::Low),
    ("легкий", IntensityLevel::Low),
    ("средний", IntensityLevel::Medium),
    ("умеренный", IntensityLevel::Medium),
];

/// Queries this short only match whole tokens
const SHORT_QUERY_CHARS: usize = 2;

/// Lowercase, trim, collapse whitespace runs
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Substring match with a typo-tolerant fallback for longer queries
pub fn fuzzy_match(query: &str, text: &str) -> bool {
    let query = normalize_text(query);
    let text = normalize_text(text);

    if query.is_empty() || text.is_empty() {
        return false;
    }
    if text.contains(&query) {
        return true;
    }

    if query.chars().count() <= SHORT_QUERY_CHARS {
        return text == query
            || text.starts_with(&format!("{query} "))
            || text.ends_with(&format!(" {query}"));
    }

    // Every query char must appear in order, gaps allowed
    let mut rest = text.chars();
    query.chars().all(|q| rest.any(|t| t == q))
}

/// Normalized exercise names of a training in block order
pub fn training_exercises(training: &Training) -> Vec<String> {
    training
        .exercise_names()
        .map(normalize_text)
        .filter(|name| !name.is_empty())
        .collect()
}

pub fn training_has_exercise(training: &Training, name: &str) -> bool {
    let target = normalize_text(name);
    if target.is_empty() {
        return false;
    }
    training_exercises(training).iter().any(|exercise| {
        exercise.contains(&target) || target.contains(exercise.as_str()) || fuzzy_match(&target, exercise)
    })
}

/// Include filter: every name must be present; empty list passes
pub fn training_has_all_exercises<S: AsRef<str>>(training: &Training, names: &[S]) -> bool {
    names.iter().all(|n| training_has_exercise(training, n.as_ref()))
}

/// Exclude filter helper: any name present; empty list never matches
pub fn training_has_any_exercise<S: AsRef<str>>(training: &Training, names: &[S]) -> bool {
    names.iter().any(|n| training_has_exercise(training, n.as_ref()))
}

/// Resolved intensity of a training
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntensityValue {
    Range { min: u32, max: u32 },
    Level(IntensityLevel),
}

/// Requested intensity: a percentage range, a level, or both unset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntensityFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<IntensityLevel>,
}

impl IntensityFilter {
    pub fn range(min: u32, max: u32) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            level: None,
        }
    }

    pub fn level(level: IntensityLevel) -> Self {
        Self {
            level: Some(level),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.level.is_none()
    }
}

fn capture_u32(caps: &regex::Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

pub fn extract_intensity_value(text: &str) -> Option<IntensityValue> {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return None;
    }

    if let Some(caps) = RANGE_RE.captures(&normalized) {
        if let (Some(min), Some(max)) = (capture_u32(&caps, 1), capture_u32(&caps, 2)) {
            return Some(IntensityValue::Range { min, max });
        }
    }

    if let Some(value) = SINGLE_PERCENT_RE
        .captures(&normalized)
        .and_then(|caps| capture_u32(&caps, 1))
    {
        return Some(IntensityValue::Range {
            min: value,
            max: value,
        });
    }

    LEVEL_KEYWORDS
        .iter()
        .find(|(keyword, _)| normalized.contains(keyword))
        .map(|(_, level)| IntensityValue::Level(*level))
}

/// Training percent first, then the owning week's description
fn resolve_intensity(ctx: &TrainingContext<'_>) -> Option<IntensityValue> {
    Some(&ctx.training.intensity_percent)
        .filter(|s| !s.is_empty())
        .and_then(|s| extract_intensity_value(s))
        .or_else(|| {
            Some(ctx.week_description)
                .filter(|s| !s.is_empty())
                .and_then(extract_intensity_value)
        })
}

pub fn matches_intensity(ctx: &TrainingContext<'_>, filter: &IntensityFilter) -> bool {
    if filter.is_empty() {
        return true;
    }

    // Unknown intensity never satisfies a filter
    let Some(intensity) = resolve_intensity(ctx) else {
        return false;
    };

    if filter.min.is_some() || filter.max.is_some() {
        let IntensityValue::Range { min, max } = intensity else {
            return false;
        };
        let filter_min = filter.min.unwrap_or(0);
        let filter_max = filter.max.unwrap_or(100);
        // Ranges overlap, containment is not required
        return max >= filter_min && min <= filter_max;
    }

    match (filter.level, intensity) {
        (Some(wanted), IntensityValue::Level(level)) => wanted == level,
        _ => false,
    }
}

/// Set type of a block, explicit value first, then inferred from rest text
pub fn extract_set_type(block: &Block) -> Option<String> {
    if let Some(explicit) = block.set_type.as_deref().map(normalize_text) {
        if !explicit.is_empty() {
            return Some(explicit);
        }
    }

    let rest = normalize_text(&block.rest_info);
    if !rest.is_empty() {
        if rest.contains("amrap") {
            return Some("amrap".to_string());
        }
        if rest.contains("каждые") && rest.contains("минут") {
            return Some(SET_EVERY_X_MIN.to_string());
        }
        if rest.contains("раунд") {
            return Some(SET_ROUNDS.to_string());
        }
        if MINUTES_RE.is_match(&rest) {
            return Some(SET_TIMED.to_string());
        }
    }

    if block.rounds.is_some_and(|r| r > 1) {
        return Some(SET_ROUNDS.to_string());
    }

    None
}

/// Any block whose set type contains the filter, or is contained by it
pub fn matches_set_type(training: &Training, set_type: &str) -> bool {
    let wanted = normalize_text(set_type);
    if wanted.is_empty() {
        return true;
    }
    training.blocks.iter().any(|block| {
        extract_set_type(block)
            .is_some_and(|found| found.contains(&wanted) || wanted.contains(found.as_str()))
    })
}
