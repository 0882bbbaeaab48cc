//! Project Document: the typed form of an imported project definition.

use serde::{Deserialize, Serialize};

/// Difficulty level of a project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Beginner, Level::Intermediate, Level::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "BEGINNER",
            Level::Intermediate => "INTERMEDIATE",
            Level::Advanced => "ADVANCED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == s)
    }
}

/// How much hand-holding a project gives the student.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Guidance {
    FullyGuided,
    SemiGuided,
    Unguided,
}

impl Guidance {
    pub const ALL: [Guidance; 3] = [
        Guidance::FullyGuided,
        Guidance::SemiGuided,
        Guidance::Unguided,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Guidance::FullyGuided => "FULLY_GUIDED",
            Guidance::SemiGuided => "SEMI_GUIDED",
            Guidance::Unguided => "UNGUIDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|guidance| guidance.as_str() == s)
    }
}

/// Kind of artifact a student hands in.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubmissionType {
    LINK,
    FILE,
    TEXT,
}

impl SubmissionType {
    pub const ALL: [SubmissionType; 3] = [
        SubmissionType::LINK,
        SubmissionType::FILE,
        SubmissionType::TEXT,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionType::LINK => "LINK",
            SubmissionType::FILE => "FILE",
            SubmissionType::TEXT => "TEXT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

/// Inclusive school-class range a project targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassRange {
    pub min: i64,
    pub max: i64,
}

impl Default for ClassRange {
    fn default() -> Self {
        Self { min: 1, max: 12 }
    }
}

/// A fully typed project definition, ready for mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    pub slug: String,
    pub title: String,
    pub short_desc: String,
    pub long_desc: String,
    pub class_range: ClassRange,
    pub level: Level,
    pub guidance: Guidance,
    pub subjects: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hrs: Option<i64>,
    pub steps: Vec<StepDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission: Option<SubmissionDocument>,
}

/// One guided step of a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDocument {
    pub order: i64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub checklist: Vec<ChecklistItemDocument>,
    #[serde(default)]
    pub resources: Vec<ResourceDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistItemDocument {
    pub order: i64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceDocument {
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// What a student must submit when finishing the project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDocument {
    #[serde(rename = "type")]
    pub kind: SubmissionType,
    pub instruction: String,
    #[serde(default)]
    pub allowed_types: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip_through_strings() {
        for level in Level::ALL {
            assert_eq!(Level::parse(level.as_str()), Some(level));
        }
        for guidance in Guidance::ALL {
            assert_eq!(Guidance::parse(guidance.as_str()), Some(guidance));
        }
        assert_eq!(Level::parse("beginner"), None);
        assert_eq!(SubmissionType::parse("LINK"), Some(SubmissionType::LINK));
    }

    #[test]
    fn test_document_serializes_in_import_format() {
        let doc = ProjectDocument {
            slug: "solar-oven".to_string(),
            title: "Solar Oven".to_string(),
            short_desc: "Build a solar oven".to_string(),
            long_desc: "Build a solar oven from a pizza box".to_string(),
            class_range: ClassRange { min: 5, max: 8 },
            level: Level::Beginner,
            guidance: Guidance::SemiGuided,
            subjects: vec!["Physics".to_string()],
            tags: vec![],
            tools: vec![],
            prerequisites: vec![],
            duration_hrs: None,
            steps: vec![],
            submission: Some(SubmissionDocument {
                kind: SubmissionType::FILE,
                instruction: "Upload a photo".to_string(),
                allowed_types: vec!["image/png".to_string()],
            }),
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["shortDesc"], "Build a solar oven");
        assert_eq!(value["classRange"]["min"], 5);
        assert_eq!(value["guidance"], "SEMI_GUIDED");
        assert_eq!(value["submission"]["type"], "FILE");
        assert_eq!(value["submission"]["allowedTypes"][0], "image/png");
        assert!(value.get("durationHrs").is_none());
    }
}
