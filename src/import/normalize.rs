//! Lenient repair of partially invalid project documents.
//!
//! `normalize_document` never fails: whatever it is given, it returns a
//! structurally complete [`ProjectDocument`] together with one warning per
//! repaired field. Rules run in a fixed order; the slug is derived from the
//! raw title before the title itself is repaired.

use rand::Rng;
use serde_json::{Map, Value};

use super::validate::{
    as_integer, is_absolute_url, present, CLASS_MAX, CLASS_MIN, DESC_MIN_LEN, SLUG_MIN_LEN,
    TITLE_MIN_LEN,
};
use crate::models::{
    ChecklistItemDocument, ClassRange, Guidance, Level, ProjectDocument, ResourceDocument,
    StepDocument, SubmissionDocument, SubmissionType,
};

pub const UNTITLED: &str = "Untitled Project";
pub const SHORT_DESC_PLACEHOLDER: &str = "No short description provided.";
pub const LONG_DESC_PLACEHOLDER: &str = "No long description provided yet.";
pub const DEFAULT_SUBJECT: &str = "General";
pub const STEP_DESC_PLACEHOLDER: &str = "TBD";

const SLUG_SUFFIX_LEN: usize = 4;
const SLUG_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A repaired document and what was changed to get there.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub document: ProjectDocument,
    pub warnings: Vec<String>,
}

/// Repair `input` using the thread-local RNG for slug suffixes.
pub fn normalize_document(input: &Value) -> Normalized {
    normalize_document_with(input, &mut rand::rng())
}

/// Repair `input`, drawing slug suffixes from `rng`.
pub fn normalize_document_with<R: Rng + ?Sized>(input: &Value, rng: &mut R) -> Normalized {
    let empty = Map::new();
    let obj = input.as_object().unwrap_or(&empty);
    let mut warnings = Vec::new();

    let slug = match str_field(obj, "slug") {
        Some(slug) if slug.chars().count() >= SLUG_MIN_LEN => slug.to_string(),
        _ => {
            warnings.push("slug was missing/invalid and was autogenerated".to_string());
            generate_slug(str_field(obj, "title").unwrap_or("Project"), rng)
        }
    };

    let title = match str_field(obj, "title") {
        Some(title) if title.chars().count() >= TITLE_MIN_LEN => title.to_string(),
        _ => {
            warnings.push(format!(
                "title was missing/invalid and set to \"{}\"",
                UNTITLED
            ));
            UNTITLED.to_string()
        }
    };

    let short_desc = text_or_placeholder(obj, "shortDesc", SHORT_DESC_PLACEHOLDER, &mut warnings);
    let long_desc = text_or_placeholder(obj, "longDesc", LONG_DESC_PLACEHOLDER, &mut warnings);
    let class_range = class_range(obj, &mut warnings);

    let level = str_field(obj, "level")
        .and_then(Level::parse)
        .unwrap_or_else(|| {
            warnings.push("level was missing/invalid and set to BEGINNER".to_string());
            Level::Beginner
        });
    let guidance = str_field(obj, "guidance")
        .and_then(Guidance::parse)
        .unwrap_or_else(|| {
            warnings.push("guidance was missing/invalid and set to FULLY_GUIDED".to_string());
            Guidance::FullyGuided
        });

    let mut subjects: Vec<String> = strings(obj, "subjects")
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect();
    if subjects.is_empty() {
        warnings.push(format!(
            "subjects were missing/invalid and set to [\"{}\"]",
            DEFAULT_SUBJECT
        ));
        subjects.push(DEFAULT_SUBJECT.to_string());
    }

    let duration_hrs = present(obj, "durationHrs")
        .and_then(as_integer)
        .filter(|hours| *hours > 0);

    let steps = steps(obj, &mut warnings);
    let submission = submission(obj, &mut warnings);

    Normalized {
        document: ProjectDocument {
            slug,
            title,
            short_desc,
            long_desc,
            class_range,
            level,
            guidance,
            subjects,
            tags: strings(obj, "tags"),
            tools: strings(obj, "tools"),
            prerequisites: strings(obj, "prerequisites"),
            duration_hrs,
            steps,
            submission,
        },
        warnings,
    }
}

/// Lower-case `text` and join its ASCII alphanumeric runs with single hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_was_separator = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_was_separator = false;
        } else if !last_was_separator && !slug.is_empty() {
            slug.push('-');
            last_was_separator = true;
        }
    }

    if slug.ends_with('-') {
        slug.pop();
    }

    slug
}

/// Slug from `title` plus a random base-36 suffix.
pub fn generate_slug<R: Rng + ?Sized>(title: &str, rng: &mut R) -> String {
    let mut base = slugify(title);
    if base.is_empty() {
        base = "project".to_string();
    }

    let suffix: String = (0..SLUG_SUFFIX_LEN)
        .map(|_| {
            let i = rng.random_range(0..SLUG_SUFFIX_ALPHABET.len());
            SLUG_SUFFIX_ALPHABET[i] as char
        })
        .collect();

    format!("{}-{}", base, suffix)
}

fn str_field<'v>(obj: &'v Map<String, Value>, key: &str) -> Option<&'v str> {
    obj.get(key).and_then(Value::as_str)
}

fn text_or_placeholder(
    obj: &Map<String, Value>,
    key: &str,
    placeholder: &str,
    warnings: &mut Vec<String>,
) -> String {
    match str_field(obj, key) {
        Some(text) if text.chars().count() >= DESC_MIN_LEN => text.to_string(),
        _ => {
            warnings.push(format!("{} was missing/invalid and set to a placeholder", key));
            placeholder.to_string()
        }
    }
}

/// String entries of an array field; anything else yields an empty list.
fn strings(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn class_range(obj: &Map<String, Value>, warnings: &mut Vec<String>) -> ClassRange {
    let range = obj.get("classRange").and_then(Value::as_object);
    let bound = |key: &str| range.and_then(|r| r.get(key)).and_then(as_integer);

    let (Some(min), Some(max)) = (bound("min"), bound("max")) else {
        warnings.push(format!(
            "classRange was missing/invalid and set to {{ min: {}, max: {} }}",
            CLASS_MIN, CLASS_MAX
        ));
        return ClassRange::default();
    };

    let clamped = ClassRange {
        min: min.clamp(CLASS_MIN, CLASS_MAX),
        // a zero max means "no upper bound given"
        max: if max == 0 {
            CLASS_MAX
        } else {
            max.clamp(CLASS_MIN, CLASS_MAX)
        },
    };
    if clamped.min != min || clamped.max != max {
        warnings.push(format!(
            "classRange {{ min: {}, max: {} }} was clamped to {{ min: {}, max: {} }}",
            min, max, clamped.min, clamped.max
        ));
    }
    clamped
}

fn steps(obj: &Map<String, Value>, warnings: &mut Vec<String>) -> Vec<StepDocument> {
    let items = obj
        .get("steps")
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty());

    let Some(items) = items else {
        warnings.push("steps were missing/invalid and a default step was added".to_string());
        return vec![StepDocument {
            order: 1,
            title: "Step 1".to_string(),
            description: STEP_DESC_PLACEHOLDER.to_string(),
            checklist: Vec::new(),
            resources: Vec::new(),
        }];
    };

    let empty = Map::new();
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let step = item.as_object().unwrap_or(&empty);
            let position = idx as i64 + 1;
            StepDocument {
                order: step.get("order").and_then(as_integer).unwrap_or(position),
                title: non_empty_str(step, "title")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Step {}", position)),
                description: non_empty_str(step, "description")
                    .unwrap_or(STEP_DESC_PLACEHOLDER)
                    .to_string(),
                checklist: checklist(step, idx, warnings),
                resources: resources(step, idx, warnings),
            }
        })
        .collect()
}

fn non_empty_str<'v>(obj: &'v Map<String, Value>, key: &str) -> Option<&'v str> {
    str_field(obj, key).filter(|s| !s.is_empty())
}

fn checklist(
    step: &Map<String, Value>,
    step_idx: usize,
    warnings: &mut Vec<String>,
) -> Vec<ChecklistItemDocument> {
    let Some(items) = step.get("checklist").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let text = item.get("text").and_then(Value::as_str);
        match text {
            Some(text) => out.push(ChecklistItemDocument {
                order: item
                    .get("order")
                    .and_then(as_integer)
                    .unwrap_or(idx as i64 + 1),
                text: text.to_string(),
            }),
            None => warnings.push(format!(
                "steps.{}.checklist.{} had no text and was dropped",
                step_idx, idx
            )),
        }
    }
    out
}

fn resources(
    step: &Map<String, Value>,
    step_idx: usize,
    warnings: &mut Vec<String>,
) -> Vec<ResourceDocument> {
    let Some(items) = step.get("resources").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let url = item
            .get("url")
            .and_then(Value::as_str)
            .filter(|url| is_absolute_url(url));
        let Some(url) = url else {
            warnings.push(format!(
                "steps.{}.resources.{} had no valid url and was dropped",
                step_idx, idx
            ));
            continue;
        };

        let title = item
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(url);
        let kind = item
            .get("type")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("link");

        out.push(ResourceDocument {
            title: title.to_string(),
            url: url.to_string(),
            kind: kind.to_string(),
        });
    }
    out
}

fn submission(
    obj: &Map<String, Value>,
    warnings: &mut Vec<String>,
) -> Option<SubmissionDocument> {
    let raw = present(obj, "submission")?;

    let kind = raw
        .get("type")
        .and_then(Value::as_str)
        .and_then(SubmissionType::parse);
    let Some(kind) = kind else {
        warnings.push("submission had no valid type and was dropped".to_string());
        return None;
    };

    let empty = Map::new();
    let sub = raw.as_object().unwrap_or(&empty);
    Some(SubmissionDocument {
        kind,
        instruction: str_field(sub, "instruction").unwrap_or_default().to_string(),
        allowed_types: strings(sub, "allowedTypes"),
    })
}
