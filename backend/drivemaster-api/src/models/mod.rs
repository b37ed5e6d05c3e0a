use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub mod content;
pub mod game;
pub mod mastery;
pub mod profile;

/// Difficulty tier gating journey availability. The declaration order is the
/// progression order.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Beginner,
    Intermediate,
    Advanced,
    K53,
}

impl Stage {
    pub const ORDER: [Stage; 4] = [
        Stage::Beginner,
        Stage::Intermediate,
        Stage::Advanced,
        Stage::K53,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Beginner => "beginner",
            Stage::Intermediate => "intermediate",
            Stage::Advanced => "advanced",
            Stage::K53 => "k53",
        }
    }

    /// The stage unlocked by mastering this one, `None` for the last stage.
    pub fn next(&self) -> Option<Stage> {
        let index = Self::ORDER.iter().position(|stage| stage == self)?;
        Self::ORDER.get(index + 1).copied()
    }

    /// Id of the badge awarded when this stage is mastered.
    pub fn master_badge_id(&self) -> String {
        format!("{}-master", self.as_str())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "beginner" => Ok(Stage::Beginner),
            "intermediate" => Ok(Stage::Intermediate),
            "advanced" => Ok(Stage::Advanced),
            "k53" => Ok(Stage::K53),
            _ => Err(format!("Invalid stage: {}", value)),
        }
    }
}

/// Kind of traffic scenario an event presents.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    StopSign,
    TrafficLight,
    Pedestrian,
    Merge,
    Parking,
    Roundabout,
    Intersection,
    Highway,
    SchoolZone,
    Emergency,
    #[serde(other)]
    Other,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::StopSign => "stop-sign",
            EventType::TrafficLight => "traffic-light",
            EventType::Pedestrian => "pedestrian",
            EventType::Merge => "merge",
            EventType::Parking => "parking",
            EventType::Roundabout => "roundabout",
            EventType::Intersection => "intersection",
            EventType::Highway => "highway",
            EventType::SchoolZone => "school-zone",
            EventType::Emergency => "emergency",
            EventType::Other => "other",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `100 * part / whole`, multiplied first so whole percentages come out
/// exact; 0 when `whole` is 0.
pub fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * f64::from(part) / f64::from(whole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_progression() {
        assert_eq!(Stage::Beginner.next(), Some(Stage::Intermediate));
        assert_eq!(Stage::Advanced.next(), Some(Stage::K53));
        assert_eq!(Stage::K53.next(), None);
        assert!(Stage::Beginner < Stage::K53);
    }

    #[test]
    fn percentages_of_whole_numbers_are_exact() {
        assert_eq!(percentage(57, 100), 57.0);
        assert_eq!(percentage(29, 50), 58.0);
        assert_eq!(percentage(1, 3), 100.0 / 3.0);
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn stage_parses_case_insensitively() {
        assert_eq!("Beginner".parse::<Stage>(), Ok(Stage::Beginner));
        assert_eq!("k53".parse::<Stage>(), Ok(Stage::K53));
        assert!("expert".parse::<Stage>().is_err());
    }

    #[test]
    fn unknown_event_type_falls_back_to_other() {
        let parsed: EventType = serde_json::from_str("\"level-crossing\"").unwrap();
        assert_eq!(parsed, EventType::Other);
        let parsed: EventType = serde_json::from_str("\"stop-sign\"").unwrap();
        assert_eq!(parsed, EventType::StopSign);
    }

    #[test]
    fn master_badge_id_uses_stage_name() {
        assert_eq!(Stage::Intermediate.master_badge_id(), "intermediate-master");
    }
}
