//! Scoring engine
//!
//! Turns the stored yes/no responses of a section into a normalized score on
//! the section's standard point scale, and aggregates the five fixed sections
//! into a store score.
//!
//! ## Normalization
//!
//! Each positive response (`hasIssues == "no"`) is worth 2 raw points. The raw
//! maximum is `total_questions * 2`, where `total_questions` depends on the
//! section and on whether the store answers extra foundation questions in it.
//! Raw points are rescaled by `standard_max / raw_max` so every store is
//! scored out of the same 46 points, regardless of how many questions it had.
//!
//! Rounding is to the nearest integer with ties to even.
//!
//! Scoring is total: unknown stores and sections, and sections with no data,
//! produce well-formed zero-valued scores instead of errors.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{AssessmentError, Result};
use crate::store::{ResponseStore, SectionResponses};

/// Raw points for each positive response
pub const POINTS_PER_PROCEDURE: u32 = 2;

/// Sum of all section standard maxima
pub const STANDARD_TOTAL_MAX_POINTS: u32 = 46;

/// Standard max for sections outside the fixed table
pub const DEFAULT_SECTION_MAX_POINTS: u32 = 10;

/// Question count for sections outside the fixed table, and for empty sections
pub const DEFAULT_TOTAL_QUESTIONS: u32 = 5;

/// Response field inspected by the scoring engine
pub const HAS_ISSUES_FIELD: &str = "hasIssues";

/// Stores answering foundation questions, and the sections they appear in
const STORE_FOUNDATIONS: &[(&str, &[Section])] = &[
    ("1660", &[Section::People]),
    ("2297", &[Section::Fulfillment]),
    ("3523", &[Section::Fulfillment]),
    ("2951", &[Section::People]),
    (
        "5686",
        &[Section::Availability, Section::Fulfillment, Section::Checkout],
    ),
];

// ============================================================================
// Sections
// ============================================================================

/// The five fixed assessment sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Availability,
    Checkout,
    Fulfillment,
    People,
    Culture,
}

impl Section {
    /// All sections in aggregation order
    pub const ALL: [Section; 5] = [
        Section::Availability,
        Section::Checkout,
        Section::Fulfillment,
        Section::People,
        Section::Culture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Availability => "availability",
            Section::Checkout => "checkout",
            Section::Fulfillment => "fulfillment",
            Section::People => "people",
            Section::Culture => "culture",
        }
    }

    /// Points a fully positive section is worth after normalization
    pub fn standard_max_points(&self) -> u32 {
        match self {
            Section::Availability | Section::Checkout | Section::People => 10,
            Section::Fulfillment | Section::Culture => 8,
        }
    }

    /// Expected question count, with or without foundation questions
    pub fn total_questions(&self, has_foundation: bool) -> u32 {
        match (self, has_foundation) {
            (Section::Availability, false) => 4,
            (Section::Availability, true) => 7,
            (Section::Checkout, false) => 5,
            (Section::Checkout, true) => 8,
            (Section::Fulfillment, false) => 4,
            (Section::Fulfillment, true) => 7,
            (Section::People, false) => 5,
            (Section::People, true) => 8,
            (Section::Culture, _) => 4,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = AssessmentError;

    fn from_str(s: &str) -> Result<Self> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| AssessmentError::InvalidIdentifier {
                field: "section",
                value: s.to_string(),
            })
    }
}

/// Whether a store answers foundation questions in a section
pub fn has_foundation_questions(store_id: &str, section: Section) -> bool {
    STORE_FOUNDATIONS
        .iter()
        .any(|(store, sections)| *store == store_id && sections.contains(&section))
}

fn standard_max_for(section: Option<Section>) -> u32 {
    section
        .map(|s| s.standard_max_points())
        .unwrap_or(DEFAULT_SECTION_MAX_POINTS)
}

// ============================================================================
// Color bands
// ============================================================================

/// Status band derived from a percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Yellow,
    Red,
}

impl Color {
    pub fn from_percentage(percentage: u32) -> Self {
        if percentage >= 80 {
            Color::Green
        } else if percentage >= 60 {
            Color::Yellow
        } else {
            Color::Red
        }
    }
}

fn round_half_even(value: f64) -> u32 {
    value.round_ties_even().max(0.0) as u32
}

/// `round(part / whole * 100)`, 0 when `whole` is 0
fn percentage_of(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    round_half_even(part as f64 / whole as f64 * 100.0)
}

// ============================================================================
// Section score
// ============================================================================

/// Normalized score of one section of one store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionScore {
    /// Normalized score on the section's standard scale
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_score: Option<u32>,
    /// Standard max points of the section
    pub max_score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_max_score: Option<u32>,
    pub percentage: u32,
    pub color: Color,
    /// Number of stored responses, positive or not
    pub questions_completed: u32,
    pub total_questions: u32,
    pub normalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SectionScore {
    /// Zero-valued score for a section with no data
    pub fn empty(section_id: &str) -> Self {
        Self {
            score: 0,
            raw_score: None,
            max_score: standard_max_for(section_id.parse().ok()),
            raw_max_score: None,
            percentage: 0,
            color: Color::Red,
            questions_completed: 0,
            total_questions: DEFAULT_TOTAL_QUESTIONS,
            normalized: true,
            normalization_factor: None,
            error: None,
        }
    }

    /// Zero-valued score reporting a scoring fault
    pub fn failed(section_id: &str, error: &AssessmentError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::empty(section_id)
        }
    }
}

/// Score one section, falling back to a zero score on a scoring fault
pub fn section_score(store: &ResponseStore, store_id: &str, section_id: &str) -> SectionScore {
    match try_section_score(store, store_id, section_id) {
        Ok(score) => score,
        Err(e) => {
            warn!(store = store_id, section = section_id, error = %e, "Error calculating section score");
            SectionScore::failed(section_id, &e)
        }
    }
}

/// Score one section, surfacing faults in the stored data
pub fn try_section_score(
    store: &ResponseStore,
    store_id: &str,
    section_id: &str,
) -> Result<SectionScore> {
    match store.get(store_id, section_id) {
        Some(responses) => score_responses(store_id, section_id, &responses),
        None => Ok(SectionScore::empty(section_id)),
    }
}

/// Score a set of responses as the given section of the given store
pub fn score_responses(
    store_id: &str,
    section_id: &str,
    responses: &SectionResponses,
) -> Result<SectionScore> {
    let section: Option<Section> = section_id.parse().ok();

    let positive = responses.values().filter(|r| is_positive(r)).count() as u32;
    let raw_score = positive * POINTS_PER_PROCEDURE;

    let has_foundation = section
        .map(|s| has_foundation_questions(store_id, s))
        .unwrap_or(false);
    let total_questions = section
        .map(|s| s.total_questions(has_foundation))
        .unwrap_or(DEFAULT_TOTAL_QUESTIONS);
    let raw_max_score = total_questions * POINTS_PER_PROCEDURE;
    let standard_max = standard_max_for(section);

    let normalization_factor = if raw_max_score > 0 {
        standard_max as f64 / raw_max_score as f64
    } else {
        1.0
    };
    let normalized_score = round_half_even(raw_score as f64 * normalization_factor);
    let percentage = percentage_of(normalized_score, standard_max);

    if normalization_factor != 1.0 {
        debug!(
            store = store_id,
            section = section_id,
            raw = %format!("{}/{}", raw_score, raw_max_score),
            normalized = %format!("{}/{}", normalized_score, standard_max),
            factor = normalization_factor,
            percentage,
            "Normalized section score"
        );
    }

    Ok(SectionScore {
        score: normalized_score,
        raw_score: Some(raw_score),
        max_score: standard_max,
        raw_max_score: Some(raw_max_score),
        percentage,
        color: Color::from_percentage(percentage),
        questions_completed: responses.len() as u32,
        total_questions,
        normalized: true,
        normalization_factor: Some(normalization_factor),
        error: None,
    })
}

/// A response counts when it is a record whose `hasIssues` is the string `"no"`.
/// Anything else (other answers, non-string values, non-records) does not.
fn is_positive(response: &Value) -> bool {
    matches!(
        response.get(HAS_ISSUES_FIELD),
        Some(Value::String(answer)) if answer == "no"
    )
}

// ============================================================================
// Store score
// ============================================================================

/// Per-section breakdown of a store score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionScores {
    pub availability: SectionScore,
    pub checkout: SectionScore,
    pub fulfillment: SectionScore,
    pub people: SectionScore,
    pub culture: SectionScore,
}

impl SectionScores {
    pub fn get(&self, section: Section) -> &SectionScore {
        match section {
            Section::Availability => &self.availability,
            Section::Checkout => &self.checkout,
            Section::Fulfillment => &self.fulfillment,
            Section::People => &self.people,
            Section::Culture => &self.culture,
        }
    }
}

/// Aggregate score of a store over the five fixed sections
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreScore {
    pub overall_score: u32,
    /// Always [`STANDARD_TOTAL_MAX_POINTS`]
    pub overall_max_score: u32,
    pub overall_percentage: u32,
    pub overall_color: Color,
    /// Sections with at least one stored response
    pub sections_completed: u32,
    pub total_sections: u32,
    pub section_scores: SectionScores,
    pub normalized: bool,
}

/// Score a store across all five sections
pub fn store_score(store: &ResponseStore, store_id: &str) -> StoreScore {
    let scores = Section::ALL.map(|section| section_score(store, store_id, section.as_str()));

    let mut total_score = 0;
    let mut total_max = 0;
    let mut sections_completed = 0;
    for score in &scores {
        total_score += score.score;
        total_max += score.max_score;
        if score.questions_completed > 0 {
            sections_completed += 1;
        }
    }

    if total_max != STANDARD_TOTAL_MAX_POINTS {
        warn!(
            store = store_id,
            total_max,
            standard = STANDARD_TOTAL_MAX_POINTS,
            "Total max score doesn't match standard, adjusting"
        );
        total_max = STANDARD_TOTAL_MAX_POINTS;
    }

    let overall_percentage = percentage_of(total_score, total_max);
    let [availability, checkout, fulfillment, people, culture] = scores;

    StoreScore {
        overall_score: total_score,
        overall_max_score: total_max,
        overall_percentage,
        overall_color: Color::from_percentage(overall_percentage),
        sections_completed,
        total_sections: Section::ALL.len() as u32,
        section_scores: SectionScores {
            availability,
            checkout,
            fulfillment,
            people,
            culture,
        },
        normalized: true,
    }
}
