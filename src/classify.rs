//! Row classification - распознавание строк плана
//!
//! Stateless helpers that decide what a raw spreadsheet cell is (week header,
//! training header, block header or exercise) and pull structured fields out
//! of it. Keyword rules are ordered tables evaluated top to bottom: the first
//! matching rule wins, so the order of entries is part of the behavior.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const SET_AMRAP: &str = "AMRAP";
pub const SET_ROUNDS: &str = "rounds";
pub const SET_TIMED: &str = "timed";
pub const SET_EVERY_X_MINUTES: &str = "every_x_minutes";
/// Short form produced by the editor and by set-type inference
pub const SET_EVERY_X_MIN: &str = "every_x_min";

static DATE_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{1,2}-[0-9]{1,2}\.[0-9]{1,2}").expect("valid date range regex"));
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+(?:-[0-9]+)?%").expect("valid percent regex"));
static INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid integer regex"));
static BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\\").expect("valid block regex"));
static SPLIT_REPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+[/\\][0-9]+$").expect("valid split regex"));
static DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid digits regex"));
static DISTANCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+\s*(?:км|м)").expect("valid distance regex"));
static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)-([0-9]+)").expect("valid range regex"));
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").expect("valid number regex"));
static BARE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(?:\.[0-9]+)?$").expect("valid bare number regex"));
static BARE_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)-([0-9]+)$").expect("valid bare range regex"));

/// Week intensity keywords: тест > жесткий кач > легк
const WEEK_INTENSITY_RULES: &[(&[&str], &str)] = &[
    (&["тест"], "тест"),
    (&["жесткого кача", "жесткий кач"], "высокая"),
    (&["легк"], "низкая"),
];

/// Any of these in column B marks a training header
const TRAINING_KEYWORDS: &[&str] = &["отдых", "тест", "на здоровье", "бассейн"];

/// Set type for free-text block descriptions
const BLOCK_REST_RULES: &[(&[&str], &str)] = &[
    (&["каждые"], SET_EVERY_X_MINUTES),
    (&["мин"], SET_TIMED),
    (&["круг"], SET_ROUNDS),
];

/// Keyword overrides for intensity level, applied after the numeric guess
const LEVEL_RULES: &[(&[&str], IntensityLevel)] = &[
    (&["жесток"], IntensityLevel::High),
    (&["на здоровье", "легк"], IntensityLevel::Low),
    (&["отдых"], IntensityLevel::Rest),
];

/// Evaluate an ordered keyword table against already-lowercased text
fn first_rule<T: Copy>(text: &str, rules: &[(&[&str], T)]) -> Option<T> {
    rules
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| text.contains(k)))
        .map(|(_, result)| *result)
}

fn parse_int(digits: &str) -> Option<u32> {
    digits.parse().ok()
}

/// Leading integer, like `parseInt` on a cell value
fn leading_int(text: &str) -> Option<u32> {
    INTEGER_RE
        .find(text)
        .filter(|m| m.start() == 0)
        .and_then(|m| parse_int(m.as_str()))
}

fn first_int(text: &str) -> Option<u32> {
    INTEGER_RE.find(text).and_then(|m| parse_int(m.as_str()))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WeekInfo {
    pub date_range: String,
    pub description: String,
    pub intensity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrainingInfo {
    pub number: Option<u32>,
    pub intensity: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockInfo {
    pub block_num: Option<u32>,
    pub rounds: Option<u32>,
    pub rest_info: String,
    pub set_type: Option<&'static str>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepetitionKind {
    None,
    Max,
    Split,
    Fixed,
    Timed,
    Distance,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repetitions {
    pub value: String,
    pub kind: RepetitionKind,
    pub description: String,
}

/// Classification stored on every exercise as `weightType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightKind {
    Range,
    Fixed,
    Text,
    Bodyweight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightUnit {
    Kg,
    Bodyweight,
    #[default]
    Unspecified,
}

impl WeightUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightUnit::Kg => "kg",
            WeightUnit::Bodyweight => "bodyweight",
            WeightUnit::Unspecified => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Weight {
    pub value: String,
    pub unit: WeightUnit,
    /// `None` only for an empty cell
    pub kind: Option<WeightKind>,
    pub range: Option<WeightRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityLevel {
    High,
    Medium,
    Low,
    Rest,
}

impl IntensityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntensityLevel::High => "high",
            IntensityLevel::Medium => "medium",
            IntensityLevel::Low => "low",
            IntensityLevel::Rest => "rest",
        }
    }

    /// Level implied by a percentage of max effort
    pub fn from_percent(percent: u32) -> Self {
        match percent {
            p if p >= 80 => IntensityLevel::High,
            p if p >= 60 => IntensityLevel::Medium,
            _ => IntensityLevel::Low,
        }
    }
}

impl std::str::FromStr for IntensityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(IntensityLevel::High),
            "medium" => Ok(IntensityLevel::Medium),
            "low" => Ok(IntensityLevel::Low),
            "rest" => Ok(IntensityLevel::Rest),
            other => Err(format!("unknown intensity level: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Intensity {
    pub percent: String,
    pub level: Option<IntensityLevel>,
}

/// Column A: a day range such as "8-14.01" anywhere in the cell
pub fn is_week_row(text: &str) -> bool {
    DATE_RANGE_RE.is_match(text)
}

pub fn parse_week_info(text: &str) -> WeekInfo {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let date_range = DATE_RANGE_RE
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let description = lines.join(" ");
    let intensity = first_rule(&description.to_lowercase(), WEEK_INTENSITY_RULES)
        .unwrap_or_default()
        .to_string();

    WeekInfo {
        date_range,
        description,
        intensity,
    }
}

/// Column B: "1\n60-70%", "2 на здоровье", "отдых", "4"
pub fn is_training_row(text: &str) -> bool {
    let lower = text.to_lowercase();
    if TRAINING_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return true;
    }
    text.trim().starts_with(|c: char| c.is_ascii_digit())
}

pub fn parse_training_info(text: &str) -> TrainingInfo {
    TrainingInfo {
        number: leading_int(text.trim_start()),
        intensity: PERCENT_RE
            .find(text)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        description: text.trim().to_string(),
    }
}

/// Column C: "1\1", "2\4\каждые 2-3 минуты", "4\AMRAP 12 мин"
pub fn is_block_row(text: &str) -> bool {
    BLOCK_RE.is_match(text)
}

pub fn parse_block_info(text: &str) -> BlockInfo {
    let parts: Vec<&str> = text.split('\\').map(str::trim).collect();

    let mut info = BlockInfo {
        block_num: parts.first().and_then(|p| leading_int(p)),
        description: text.to_string(),
        ..BlockInfo::default()
    };

    let Some(second) = parts.get(1).copied() else {
        return info;
    };

    if second.contains("AMRAP") {
        info.set_type = Some(SET_AMRAP);
        info.rest_info = second.to_string();
    } else if second.contains("сделать") && second.contains("раунд") {
        info.set_type = Some(SET_ROUNDS);
        info.rounds = first_int(second);
        info.rest_info = second.to_string();
    } else if DIGITS_RE.is_match(second) {
        info.rounds = parse_int(second);
        if parts.len() > 2 {
            info.rest_info = parts[2..].join(" ");
            info.set_type = if info.rest_info.contains("каждые") {
                Some(SET_EVERY_X_MINUTES)
            } else if info.rest_info.contains("мин") {
                Some(SET_TIMED)
            } else {
                None
            };
        }
    } else {
        info.rest_info = parts[1..].join(" ");
        info.set_type = first_rule(second, BLOCK_REST_RULES);
    }

    info
}

pub fn parse_repetitions(text: &str) -> Repetitions {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Repetitions {
            value: String::new(),
            kind: RepetitionKind::None,
            description: String::new(),
        };
    }

    let (value, kind) = if trimmed.to_lowercase() == "макс" {
        ("max".to_string(), RepetitionKind::Max)
    } else if SPLIT_REPS_RE.is_match(trimmed) {
        (trimmed.to_string(), RepetitionKind::Split)
    } else if DIGITS_RE.is_match(trimmed) {
        (trimmed.to_string(), RepetitionKind::Fixed)
    } else if trimmed.contains("сек") || trimmed.contains("мин") {
        (trimmed.to_string(), RepetitionKind::Timed)
    } else if DISTANCE_RE.is_match(trimmed) {
        (trimmed.to_string(), RepetitionKind::Distance)
    } else {
        (trimmed.to_string(), RepetitionKind::Text)
    };

    Repetitions {
        value,
        kind,
        description: trimmed.to_string(),
    }
}

fn range_of(caps: &regex::Captures<'_>) -> Option<WeightRange> {
    Some(WeightRange {
        min: parse_int(caps.get(1)?.as_str())?,
        max: parse_int(caps.get(2)?.as_str())?,
    })
}

pub fn parse_weight(text: &str) -> Weight {
    let trimmed = text.trim();
    let value = trimmed.to_string();
    let weight = |unit, kind, range| Weight {
        value: value.clone(),
        unit,
        kind,
        range,
    };

    if trimmed.is_empty() {
        return weight(WeightUnit::Unspecified, None, None);
    }

    let lower = trimmed.to_lowercase();

    if lower.contains("кг") {
        if let Some(range) = RANGE_RE.captures(trimmed).and_then(|c| range_of(&c)) {
            return weight(WeightUnit::Kg, Some(WeightKind::Range), Some(range));
        }
        if NUMBER_RE.is_match(trimmed) {
            return weight(WeightUnit::Kg, Some(WeightKind::Fixed), None);
        }
        return weight(WeightUnit::Kg, Some(WeightKind::Text), None);
    }

    if lower.contains("вес тела") || lower.contains("собственный") {
        return weight(WeightUnit::Bodyweight, Some(WeightKind::Bodyweight), None);
    }

    // Bare number defaults to kilograms
    if BARE_NUMBER_RE.is_match(trimmed) {
        return weight(WeightUnit::Kg, Some(WeightKind::Fixed), None);
    }

    if let Some(range) = BARE_RANGE_RE.captures(trimmed).and_then(|c| range_of(&c)) {
        return weight(WeightUnit::Unspecified, Some(WeightKind::Range), Some(range));
    }

    weight(WeightUnit::Unspecified, Some(WeightKind::Text), None)
}

pub fn extract_intensity(text: &str) -> Intensity {
    let mut intensity = Intensity::default();
    if text.trim().is_empty() {
        return intensity;
    }

    if let Some(m) = PERCENT_RE.find(text) {
        intensity.percent = m.as_str().to_string();
        intensity.level = first_int(m.as_str()).map(IntensityLevel::from_percent);
    }

    if let Some(level) = first_rule(&text.to_lowercase(), LEVEL_RULES) {
        intensity.level = Some(level);
    }

    intensity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_week_row_date_range() {
        assert!(is_week_row("8-14.01"));
        assert!(is_week_row("15-21.01\n2 неделя жесткого кача"));
        assert!(!is_week_row("1 неделя"));
        assert!(!is_week_row("60-70%"));
    }

    #[test]
    fn test_parse_week_info_multiline() {
        let info = parse_week_info("8-14.01\n1 неделя жесткого кача\n\n");
        assert_eq!(info.date_range, "8-14.01");
        assert_eq!(info.description, "8-14.01 1 неделя жесткого кача");
        assert_eq!(info.intensity, "высокая");
    }

    #[test]
    fn test_parse_week_info_keyword_priority() {
        // "тест" побеждает "жесткий кач"
        let info = parse_week_info("1-7.02 тест после жесткий кач");
        assert_eq!(info.intensity, "тест");

        let info = parse_week_info("22-28.01 легкая неделя");
        assert_eq!(info.intensity, "низкая");

        let info = parse_week_info("29-04.02");
        assert_eq!(info.intensity, "");
    }

    #[test]
    fn test_is_training_row() {
        assert!(is_training_row("1\n60-70%"));
        assert!(is_training_row("Отдых"));
        assert!(is_training_row("2 на здоровье"));
        assert!(is_training_row("бассейн"));
        assert!(is_training_row("  3"));
        assert!(!is_training_row("подтягивания"));
    }

    #[test]
    fn test_parse_training_info() {
        let info = parse_training_info("1\n60-70%");
        assert_eq!(info.number, Some(1));
        assert_eq!(info.intensity, "60-70%");
        assert_eq!(info.description, "1\n60-70%");

        let info = parse_training_info("отдых");
        assert_eq!(info.number, None);
        assert_eq!(info.intensity, "");
    }

    #[test]
    fn test_is_block_row() {
        assert!(is_block_row("1\\1"));
        assert!(is_block_row("4\\AMRAP 12 мин"));
        assert!(!is_block_row("подтягивания"));
        assert!(!is_block_row("a\\1"));
    }

    #[test]
    fn test_parse_block_every_x_minutes() {
        let info = parse_block_info("2\\4\\каждые 2-3 минуты");
        assert_eq!(info.block_num, Some(2));
        assert_eq!(info.rounds, Some(4));
        assert_eq!(info.rest_info, "каждые 2-3 минуты");
        assert_eq!(info.set_type, Some(SET_EVERY_X_MINUTES));
    }

    #[test]
    fn test_parse_block_amrap() {
        let info = parse_block_info("4\\AMRAP 12 мин");
        assert_eq!(info.block_num, Some(4));
        assert_eq!(info.set_type, Some(SET_AMRAP));
        assert_eq!(info.rest_info, "AMRAP 12 мин");
        assert_eq!(info.rounds, None);
    }

    #[test]
    fn test_parse_block_rounds_phrase() {
        let info = parse_block_info("1\\сделать 3 раунда");
        assert_eq!(info.set_type, Some(SET_ROUNDS));
        assert_eq!(info.rounds, Some(3));
    }

    #[test]
    fn test_parse_block_simple_and_timed() {
        let info = parse_block_info("1\\1");
        assert_eq!(info.block_num, Some(1));
        assert_eq!(info.rounds, Some(1));
        assert_eq!(info.set_type, None);

        let info = parse_block_info("2\\10 мин");
        assert_eq!(info.set_type, Some(SET_TIMED));
        assert_eq!(info.rest_info, "10 мин");

        let info = parse_block_info("3\\3 круга");
        assert_eq!(info.set_type, Some(SET_ROUNDS));
    }

    #[test]
    fn test_parse_block_rounds_with_timed_rest() {
        let info = parse_block_info("3\\4\\отдых 2 мин");
        assert_eq!(info.block_num, Some(3));
        assert_eq!(info.rounds, Some(4));
        assert_eq!(info.rest_info, "отдых 2 мин");
        assert_eq!(info.set_type, Some(SET_TIMED));
    }

    #[test]
    fn test_parse_block_amrap_wins_over_rounds() {
        let info = parse_block_info("1\\AMRAP сделать 3 раунда");
        assert_eq!(info.set_type, Some(SET_AMRAP));
        assert_eq!(info.rounds, None);
    }

    #[test]
    fn test_parse_repetitions() {
        assert_eq!(parse_repetitions("10/10").kind, RepetitionKind::Split);
        assert_eq!(parse_repetitions("5\\5").kind, RepetitionKind::Split);
        assert_eq!(parse_repetitions("Макс").kind, RepetitionKind::Max);
        assert_eq!(parse_repetitions("15").kind, RepetitionKind::Fixed);
        assert_eq!(parse_repetitions("30 сек работы\\30 сек отдых").kind, RepetitionKind::Timed);
        assert_eq!(parse_repetitions("2 км").kind, RepetitionKind::Distance);
        assert_eq!(parse_repetitions("до отказа").kind, RepetitionKind::Text);
    }

    #[test]
    fn test_parse_repetitions_empty() {
        let reps = parse_repetitions("   ");
        assert_eq!(reps.kind, RepetitionKind::None);
        assert_eq!(reps.value, "");
    }

    #[test]
    fn test_parse_weight_kg_range() {
        let w = parse_weight("2-3 кг");
        assert_eq!(w.unit, WeightUnit::Kg);
        assert_eq!(w.kind, Some(WeightKind::Range));
        assert_eq!(w.range, Some(WeightRange { min: 2, max: 3 }));

        let w = parse_weight("36-61 кг");
        assert_eq!(w.range, Some(WeightRange { min: 36, max: 61 }));
    }

    #[test]
    fn test_parse_weight_variants() {
        let w = parse_weight("  10 кг  ");
        assert_eq!(w.unit, WeightUnit::Kg);
        assert_eq!(w.kind, Some(WeightKind::Fixed));

        assert_eq!(parse_weight("кг").kind, Some(WeightKind::Text));
        assert_eq!(parse_weight("вес тела").kind, Some(WeightKind::Bodyweight));
        assert_eq!(parse_weight("вес тела").unit, WeightUnit::Bodyweight);

        let bare = parse_weight("24");
        assert_eq!(bare.unit, WeightUnit::Kg);
        assert_eq!(bare.kind, Some(WeightKind::Fixed));

        let range = parse_weight("8-12");
        assert_eq!(range.unit, WeightUnit::Unspecified);
        assert_eq!(range.kind, Some(WeightKind::Range));

        assert_eq!(parse_weight("резина").kind, Some(WeightKind::Text));
        assert_eq!(parse_weight("").kind, None);
    }

    #[test]
    fn test_extract_intensity_numeric() {
        let i = extract_intensity("1\n85%");
        assert_eq!(i.percent, "85%");
        assert_eq!(i.level, Some(IntensityLevel::High));

        assert_eq!(extract_intensity("60-70%").level, Some(IntensityLevel::Medium));
        assert_eq!(extract_intensity("50%").level, Some(IntensityLevel::Low));
    }

    #[test]
    fn test_extract_intensity_keyword_overrides_number() {
        let i = extract_intensity("жесткой нагрузки 60-70%");
        assert_eq!(i.percent, "60-70%");
        assert_eq!(i.level, Some(IntensityLevel::High));
        // "жесткий" не содержит "жесток", уровень берётся из процента
        assert_eq!(extract_intensity("жесткий 60-70%").level, Some(IntensityLevel::Medium));

        assert_eq!(extract_intensity("90% на здоровье").level, Some(IntensityLevel::Low));
        assert_eq!(extract_intensity("отдых").level, Some(IntensityLevel::Rest));
        assert_eq!(extract_intensity(""), Intensity::default());
    }
}
