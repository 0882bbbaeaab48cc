//! Translation of a valid project document into an ordered write plan.
//!
//! Planning is pure: it decides which rows must exist and how they link, and
//! leaves execution to [`crate::db::Repository::apply_plan`], which runs the
//! whole plan inside one transaction.

use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;

use crate::models::{LookupKind, ProjectDocument};

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("project must reference at least one subject")]
    NoSubjects,
    #[error("project must have at least one step")]
    NoSteps,
    #[error("failed to serialize {field}: {source}")]
    Serialize {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Handle linking child rows to a step created earlier in the same plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepKey(pub usize);

/// Scalar columns of the `projects` row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRow {
    pub slug: String,
    pub title: String,
    pub short_desc: String,
    pub long_desc: String,
    pub class_min: i64,
    pub class_max: i64,
    pub level: String,
    pub guidance: String,
    pub prerequisites_json: String,
    pub duration_hrs: Option<i64>,
    /// The document exactly as received, kept for audit
    pub source_json: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteCommand {
    /// Fetch-or-create the named subject/tag and link it to the project.
    LinkLookup { kind: LookupKind, name: String },
    CreateTool {
        name: String,
        position: i64,
    },
    CreateStep {
        key: StepKey,
        order: i64,
        title: String,
        description: String,
        position: i64,
    },
    CreateChecklistItem {
        step: StepKey,
        order: i64,
        text: String,
        position: i64,
    },
    CreateResource {
        step: StepKey,
        title: String,
        url: String,
        kind: String,
        position: i64,
    },
    CreateSubmission {
        kind: String,
        instruction: String,
        allowed_types_json: String,
    },
}

/// Everything needed to persist one project, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    pub project: ProjectRow,
    pub commands: Vec<WriteCommand>,
}

/// Build the write plan for `doc`. `source` is the raw input the document
/// was derived from.
pub fn plan(doc: &ProjectDocument, source: &Value) -> Result<WritePlan, MappingError> {
    let subjects = unique_names(&doc.subjects);
    if subjects.is_empty() {
        return Err(MappingError::NoSubjects);
    }
    if doc.steps.is_empty() {
        return Err(MappingError::NoSteps);
    }

    let project = ProjectRow {
        slug: doc.slug.clone(),
        title: doc.title.clone(),
        short_desc: doc.short_desc.clone(),
        long_desc: doc.long_desc.clone(),
        class_min: doc.class_range.min,
        class_max: doc.class_range.max,
        level: doc.level.as_str().to_string(),
        guidance: doc.guidance.as_str().to_string(),
        prerequisites_json: to_json("prerequisites", &doc.prerequisites)?,
        duration_hrs: doc.duration_hrs,
        source_json: to_json("source", source)?,
    };

    let mut commands = Vec::new();

    for name in subjects {
        commands.push(WriteCommand::LinkLookup {
            kind: LookupKind::Subject,
            name,
        });
    }
    for name in unique_names(&doc.tags) {
        commands.push(WriteCommand::LinkLookup {
            kind: LookupKind::Tag,
            name,
        });
    }

    let tools = doc
        .tools
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty());
    for (position, name) in (1..).zip(tools) {
        commands.push(WriteCommand::CreateTool {
            name: name.to_string(),
            position,
        });
    }

    for (idx, step) in doc.steps.iter().enumerate() {
        let key = StepKey(idx);
        let position = idx as i64 + 1;
        commands.push(WriteCommand::CreateStep {
            key,
            order: order_or(step.order, position),
            title: step.title.clone(),
            description: step.description.clone(),
            position,
        });

        for (position, item) in (1..).zip(&step.checklist) {
            commands.push(WriteCommand::CreateChecklistItem {
                step: key,
                order: order_or(item.order, position),
                text: item.text.clone(),
                position,
            });
        }

        for (position, resource) in (1..).zip(&step.resources) {
            let kind = match resource.kind.trim() {
                "" => "link",
                kind => kind,
            };
            commands.push(WriteCommand::CreateResource {
                step: key,
                title: resource.title.clone(),
                url: resource.url.clone(),
                kind: kind.to_string(),
                position,
            });
        }
    }

    if let Some(submission) = &doc.submission {
        commands.push(WriteCommand::CreateSubmission {
            kind: submission.kind.as_str().to_string(),
            instruction: submission.instruction.clone(),
            allowed_types_json: to_json("allowedTypes", &submission.allowed_types)?,
        });
    }

    Ok(WritePlan { project, commands })
}

/// Trimmed, non-blank names with duplicates removed; first occurrence wins.
fn unique_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty() && seen.insert(n.to_string()))
        .map(str::to_string)
        .collect()
}

fn order_or(order: i64, position: i64) -> i64 {
    if order > 0 {
        order
    } else {
        position
    }
}

fn to_json<T: serde::Serialize + ?Sized>(
    field: &'static str,
    value: &T,
) -> Result<String, MappingError> {
    serde_json::to_string(value).map_err(|source| MappingError::Serialize { field, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ChecklistItemDocument, ClassRange, Guidance, Level, ResourceDocument, StepDocument,
        SubmissionDocument, SubmissionType,
    };
    use serde_json::json;

    fn step_count(plan: &WritePlan) -> usize {
        plan.commands
            .iter()
            .filter(|c| matches!(c, WriteCommand::CreateStep { .. }))
            .count()
    }

    fn doc() -> ProjectDocument {
        ProjectDocument {
            slug: "solar-oven".to_string(),
            title: "Solar Oven".to_string(),
            short_desc: "Cook with sunlight".to_string(),
            long_desc: "Build a box oven that reaches 90 degrees".to_string(),
            class_range: ClassRange { min: 5, max: 9 },
            level: Level::Advanced,
            guidance: Guidance::Unguided,
            subjects: vec!["Physics".into(), " Physics ".into(), "Energy".into()],
            tags: vec!["outdoor".into(), "".into()],
            tools: vec!["foil".into(), "  ".into(), "foil".into()],
            prerequisites: vec!["Heat transfer".into()],
            duration_hrs: Some(6),
            steps: vec![
                StepDocument {
                    order: 0,
                    title: "Box".into(),
                    description: "Cut the box".into(),
                    checklist: vec![ChecklistItemDocument {
                        order: 3,
                        text: "Measure".into(),
                    }],
                    resources: vec![ResourceDocument {
                        title: "Guide".into(),
                        url: "https://example.org/oven".into(),
                        kind: " ".into(),
                    }],
                },
                StepDocument {
                    order: 2,
                    title: "Test".into(),
                    description: "Measure temperature".into(),
                    checklist: vec![],
                    resources: vec![],
                },
            ],
            submission: Some(SubmissionDocument {
                kind: SubmissionType::FILE,
                instruction: "Upload a photo".into(),
                allowed_types: vec!["jpg".into()],
            }),
        }
    }

    #[test]
    fn test_plan_orders_commands() {
        let source = json!({ "slug": "solar-oven" });
        let plan = plan(&doc(), &source).unwrap();

        assert_eq!(plan.project.level, "ADVANCED");
        assert_eq!(plan.project.guidance, "UNGUIDED");
        assert_eq!(plan.project.prerequisites_json, r#"["Heat transfer"]"#);
        assert_eq!(plan.project.source_json, r#"{"slug":"solar-oven"}"#);
        assert_eq!(step_count(&plan), 2);

        let expected = vec![
            WriteCommand::LinkLookup {
                kind: LookupKind::Subject,
                name: "Physics".into(),
            },
            WriteCommand::LinkLookup {
                kind: LookupKind::Subject,
                name: "Energy".into(),
            },
            WriteCommand::LinkLookup {
                kind: LookupKind::Tag,
                name: "outdoor".into(),
            },
            WriteCommand::CreateTool {
                name: "foil".into(),
                position: 1,
            },
            WriteCommand::CreateTool {
                name: "foil".into(),
                position: 2,
            },
            WriteCommand::CreateStep {
                key: StepKey(0),
                order: 1,
                title: "Box".into(),
                description: "Cut the box".into(),
                position: 1,
            },
            WriteCommand::CreateChecklistItem {
                step: StepKey(0),
                order: 3,
                text: "Measure".into(),
                position: 1,
            },
            WriteCommand::CreateResource {
                step: StepKey(0),
                title: "Guide".into(),
                url: "https://example.org/oven".into(),
                kind: "link".into(),
                position: 1,
            },
            WriteCommand::CreateStep {
                key: StepKey(1),
                order: 2,
                title: "Test".into(),
                description: "Measure temperature".into(),
                position: 2,
            },
            WriteCommand::CreateSubmission {
                kind: "FILE".into(),
                instruction: "Upload a photo".into(),
                allowed_types_json: r#"["jpg"]"#.into(),
            },
        ];
        assert_eq!(plan.commands, expected);
    }

    #[test]
    fn test_blank_subjects_are_rejected() {
        let mut doc = doc();
        doc.subjects = vec!["  ".into()];
        assert!(matches!(
            plan(&doc, &Value::Null),
            Err(MappingError::NoSubjects)
        ));
    }

    #[test]
    fn test_missing_steps_are_rejected() {
        let mut doc = doc();
        doc.steps.clear();
        assert!(matches!(plan(&doc, &Value::Null), Err(MappingError::NoSteps)));
    }
}
