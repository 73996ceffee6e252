//! Question records produced by the extraction client.
//!
//! [`ExtractedQuestion`] is what one model response turns into; the
//! run driver annotates it with placement data into a [`QuestionRecord`]
//! before handing it to persistence.

use crate::config::{MarkingScheme, QuestionPlacement};
use crate::diagram::model::{DiagramDocument, DIAGRAM_MARKER};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One answer option: a markup string, or a diagram the model emitted as a
/// JSON object instead of embedding it in a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionOption {
    Markup(String),
    Diagram(DiagramDocument),
}

impl QuestionOption {
    /// Normalise one raw option value. `null` yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(QuestionOption::Markup(s)),
            Value::Object(ref map)
                if map.get("type").and_then(Value::as_str) == Some(DIAGRAM_MARKER) =>
            {
                match DiagramDocument::from_value(value.clone()) {
                    Ok(doc) => Some(QuestionOption::Diagram(doc)),
                    Err(_) => Some(QuestionOption::Markup(value.to_string())),
                }
            }
            // Numbers, booleans, arrays and foreign objects keep their JSON text.
            other => Some(QuestionOption::Markup(other.to_string())),
        }
    }

    /// The option as markup text; diagrams are re-serialised to their JSON.
    pub fn as_markup(&self) -> String {
        match self {
            QuestionOption::Markup(s) => s.clone(),
            QuestionOption::Diagram(doc) => serde_json::to_string(doc).unwrap_or_default(),
        }
    }
}

/// A question as returned by the model, with marking stamped from config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedQuestion {
    pub question_type: String,
    pub question_statement: String,
    #[serde(default)]
    pub options: Option<Vec<QuestionOption>>,
    pub correct_marks: f64,
    pub incorrect_marks: f64,
    pub skipped_marks: f64,
    pub partial_marks: f64,
    pub time_minutes: f64,
}

/// The subset of a model item this crate trusts.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawQuestion {
    pub question_statement: String,
    #[serde(default)]
    pub options: Option<Vec<Value>>,
}

impl ExtractedQuestion {
    /// Build from a raw model item. Marks and timing come from `marking`,
    /// never from the model.
    pub(crate) fn from_raw(raw: RawQuestion, marking: &MarkingScheme) -> Self {
        Self {
            question_type: marking.question_type.clone(),
            question_statement: raw.question_statement,
            options: raw
                .options
                .map(|opts| opts.into_iter().filter_map(QuestionOption::from_value).collect()),
            correct_marks: marking.correct_marks,
            incorrect_marks: marking.incorrect_marks,
            skipped_marks: marking.skipped_marks,
            partial_marks: marking.partial_marks,
            time_minutes: marking.time_minutes,
        }
    }

    pub fn option_count(&self) -> usize {
        self.options.as_ref().map_or(0, Vec::len)
    }
}

/// A question ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    #[serde(flatten)]
    pub question: ExtractedQuestion,
    pub course_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
    pub year: i32,
    #[serde(default)]
    pub categorized: bool,
}

impl QuestionRecord {
    pub fn new(question: ExtractedQuestion, placement: &QuestionPlacement, year: i32) -> Self {
        Self {
            question,
            course_id: placement.course_id.clone(),
            slot: placement.slot.clone(),
            part: placement.part.clone(),
            year,
            categorized: false,
        }
    }
}
