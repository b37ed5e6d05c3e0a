use serde::{Deserialize, Serialize};

use super::{EventType, Stage};

/// Journey definition stored in the "drivemaster_journeys" collection.
/// Authored out-of-band and never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Journey {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub stage: Stage,
    /// Order defines progression.
    pub events: Vec<JourneyEvent>,
    pub route: RouteInfo,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteInfo {
    pub route_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JourneyEvent {
    pub event_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visual_ref: Option<String>,
    /// Candidate questions; empty means "any active question of the stage".
    #[serde(default)]
    pub question_ids: Vec<String>,
}

/// Multiple-choice question stored in the "drivemaster_questions" collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    pub options: Vec<AnswerOption>,
    #[serde(default)]
    pub explanation: String,
    pub stage: Stage,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

impl Question {
    /// The single option flagged correct. `None` when the question is
    /// malformed (no option, or more than one option, carries the flag).
    pub fn correct_option(&self) -> Option<&AnswerOption> {
        let mut correct = self.options.iter().filter(|option| option.is_correct);
        match (correct.next(), correct.next()) {
            (Some(option), None) => Some(option),
            _ => None,
        }
    }
}

/// Question as presented to a player: correctness flags stripped.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub id: String,
    pub text: String,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            text: question.text.clone(),
            options: question
                .options
                .iter()
                .map(|option| OptionView {
                    id: option.id.clone(),
                    text: option.text.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JourneySummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub stage: Stage,
    pub event_count: usize,
    pub route_id: String,
}

impl From<&Journey> for JourneySummary {
    fn from(journey: &Journey) -> Self {
        Self {
            id: journey.id.clone(),
            title: journey.title.clone(),
            description: journey.description.clone(),
            stage: journey.stage,
            event_count: journey.events.len(),
            route_id: journey.route.route_id.clone(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str, is_correct: bool) -> AnswerOption {
        AnswerOption {
            id: id.to_string(),
            text: format!("Option {}", id),
            is_correct,
        }
    }

    fn question(options: Vec<AnswerOption>) -> Question {
        Question {
            id: "q1".to_string(),
            text: "What does a red octagon mean?".to_string(),
            options,
            explanation: "Stop completely.".to_string(),
            stage: Stage::Beginner,
            is_active: true,
        }
    }

    #[test]
    fn correct_option_requires_exactly_one_flag() {
        let single = question(vec![option("a", false), option("b", true)]);
        assert_eq!(single.correct_option().map(|o| o.id.as_str()), Some("b"));

        let none = question(vec![option("a", false), option("b", false)]);
        assert!(none.correct_option().is_none());

        let double = question(vec![option("a", true), option("b", true)]);
        assert!(double.correct_option().is_none());
    }

    #[test]
    fn question_view_hides_correctness() {
        let q = question(vec![option("a", false), option("b", true)]);
        let json = serde_json::to_value(QuestionView::from(&q)).unwrap();
        assert!(json["options"][1].get("is_correct").is_none());
        assert_eq!(json["options"][1]["id"], "b");
    }

    #[test]
    fn journey_defaults_to_published() {
        let journey: Journey = serde_json::from_value(serde_json::json!({
            "_id": "j1",
            "title": "School run",
            "stage": "beginner",
            "events": [],
            "route": { "route_id": "r1" }
        }))
        .unwrap();
        assert!(journey.is_published);
        assert_eq!(journey.route.name, "");
    }
}
