//! Strict schema validation of untyped project documents.
//!
//! The validator walks the whole document once and records every violated
//! rule instead of stopping at the first one, so a batch report can show
//! everything that is wrong with an item. Only the literal bounds are
//! checked: `classRange.min >= 1` and `classRange.max <= 12`, with no ordering
//! between them.

use serde_json::{Map, Value};
use url::Url;

use crate::models::{
    ChecklistItemDocument, ClassRange, FieldError, Guidance, Level, ProjectDocument,
    ResourceDocument, StepDocument, SubmissionDocument, SubmissionType,
};

pub const SLUG_MIN_LEN: usize = 3;
pub const TITLE_MIN_LEN: usize = 3;
pub const DESC_MIN_LEN: usize = 10;
pub const CLASS_MIN: i64 = 1;
pub const CLASS_MAX: i64 = 12;

/// Field error codes.
pub mod issue {
    pub const REQUIRED: &str = "required";
    pub const INVALID_TYPE: &str = "invalid_type";
    pub const TOO_SMALL: &str = "too_small";
    pub const TOO_BIG: &str = "too_big";
    pub const INVALID_ENUM_VALUE: &str = "invalid_enum_value";
    pub const INVALID_STRING: &str = "invalid_string";
}

/// Validate an untyped document, returning the typed document or every
/// violation found.
pub fn validate_document(input: &Value) -> Result<ProjectDocument, Vec<FieldError>> {
    let mut validator = Validator::default();
    let document = validator.project(input);

    match document {
        Some(document) if validator.errors.is_empty() => Ok(document),
        _ => Err(validator.errors),
    }
}

#[derive(Default)]
struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    fn push(&mut self, path: &str, message: impl Into<String>, code: &str) {
        self.errors.push(FieldError::new(path, message, code));
    }

    fn project(&mut self, input: &Value) -> Option<ProjectDocument> {
        let Some(obj) = input.as_object() else {
            self.push(
                "",
                format!("Expected object, received {}", type_name(input)),
                issue::INVALID_TYPE,
            );
            return None;
        };

        let slug = self.string_field(obj, "", "slug", SLUG_MIN_LEN);
        let title = self.string_field(obj, "", "title", TITLE_MIN_LEN);
        let short_desc = self.string_field(obj, "", "shortDesc", DESC_MIN_LEN);
        let long_desc = self.string_field(obj, "", "longDesc", DESC_MIN_LEN);
        let class_range = self.class_range(obj);
        let level = self.enum_field(
            obj,
            "",
            "level",
            Level::parse,
            &Level::ALL.map(|l| l.as_str()),
        );
        let guidance = self.enum_field(
            obj,
            "",
            "guidance",
            Guidance::parse,
            &Guidance::ALL.map(|g| g.as_str()),
        );
        let subjects = self.string_array(obj, "", "subjects", true);
        let tags = self.string_array(obj, "", "tags", false);
        let tools = self.string_array(obj, "", "tools", false);
        let prerequisites = self.string_array(obj, "", "prerequisites", false);
        let duration_hrs = self.duration(obj);
        let steps = self.steps(obj);
        let submission = self.submission(obj);

        Some(ProjectDocument {
            slug: slug?,
            title: title?,
            short_desc: short_desc?,
            long_desc: long_desc?,
            class_range: class_range?,
            level: level?,
            guidance: guidance?,
            subjects: subjects?,
            tags: tags?,
            tools: tools?,
            prerequisites: prerequisites?,
            duration_hrs: duration_hrs?,
            steps: steps?,
            submission: submission?,
        })
    }

    /// Required string with a minimum length in characters.
    fn string_field(
        &mut self,
        obj: &Map<String, Value>,
        parent: &str,
        key: &str,
        min_len: usize,
    ) -> Option<String> {
        let path = join(parent, key);
        let Some(value) = present(obj, key) else {
            self.push(&path, "Required", issue::REQUIRED);
            return None;
        };
        let Some(s) = value.as_str() else {
            self.push(
                &path,
                format!("Expected string, received {}", type_name(value)),
                issue::INVALID_TYPE,
            );
            return None;
        };
        if s.chars().count() < min_len {
            self.push(
                &path,
                format!("String must contain at least {} character(s)", min_len),
                issue::TOO_SMALL,
            );
            return None;
        }
        Some(s.to_string())
    }

    /// Required integer, optionally bounded.
    fn integer_field(
        &mut self,
        obj: &Map<String, Value>,
        parent: &str,
        key: &str,
        min: Option<i64>,
        max: Option<i64>,
    ) -> Option<i64> {
        let path = join(parent, key);
        let Some(value) = present(obj, key) else {
            self.push(&path, "Required", issue::REQUIRED);
            return None;
        };
        self.integer_value(value, &path, min, max)
    }

    fn integer_value(
        &mut self,
        value: &Value,
        path: &str,
        min: Option<i64>,
        max: Option<i64>,
    ) -> Option<i64> {
        if !value.is_number() {
            self.push(
                path,
                format!("Expected number, received {}", type_name(value)),
                issue::INVALID_TYPE,
            );
            return None;
        }
        let Some(n) = as_integer(value) else {
            self.push(path, "Expected integer, received float", issue::INVALID_TYPE);
            return None;
        };
        if let Some(min) = min {
            if n < min {
                self.push(
                    path,
                    format!("Number must be greater than or equal to {}", min),
                    issue::TOO_SMALL,
                );
                return None;
            }
        }
        if let Some(max) = max {
            if n > max {
                self.push(
                    path,
                    format!("Number must be less than or equal to {}", max),
                    issue::TOO_BIG,
                );
                return None;
            }
        }
        Some(n)
    }

    fn enum_field<T>(
        &mut self,
        obj: &Map<String, Value>,
        parent: &str,
        key: &str,
        parse: fn(&str) -> Option<T>,
        allowed: &[&str],
    ) -> Option<T> {
        let path = join(parent, key);
        let Some(value) = present(obj, key) else {
            self.push(&path, "Required", issue::REQUIRED);
            return None;
        };
        let parsed = value.as_str().and_then(parse);
        if parsed.is_none() {
            let expected = allowed
                .iter()
                .map(|v| format!("'{}'", v))
                .collect::<Vec<_>>()
                .join(" | ");
            self.push(
                &path,
                format!("Invalid enum value. Expected {}, received {}", expected, value),
                issue::INVALID_ENUM_VALUE,
            );
        }
        parsed
    }

    /// Array of strings. Optional arrays default to empty.
    fn string_array(
        &mut self,
        obj: &Map<String, Value>,
        parent: &str,
        key: &str,
        non_empty: bool,
    ) -> Option<Vec<String>> {
        let path = join(parent, key);
        let Some(value) = present(obj, key) else {
            if non_empty {
                self.push(&path, "Required", issue::REQUIRED);
                return None;
            }
            return Some(Vec::new());
        };
        let Some(items) = value.as_array() else {
            self.push(
                &path,
                format!("Expected array, received {}", type_name(value)),
                issue::INVALID_TYPE,
            );
            return None;
        };
        if non_empty && items.is_empty() {
            self.push(&path, "Array must contain at least 1 element(s)", issue::TOO_SMALL);
            return None;
        }

        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => out.push(s.to_string()),
                None => {
                    ok = false;
                    self.push(
                        &join_index(&path, i),
                        format!("Expected string, received {}", type_name(item)),
                        issue::INVALID_TYPE,
                    );
                }
            }
        }
        ok.then_some(out)
    }

    fn class_range(&mut self, obj: &Map<String, Value>) -> Option<ClassRange> {
        let Some(range) = self.object_field(obj, "", "classRange", true)? else {
            return None;
        };
        let min = self.integer_field(range, "classRange", "min", Some(CLASS_MIN), None);
        let max = self.integer_field(range, "classRange", "max", None, Some(CLASS_MAX));
        Some(ClassRange {
            min: min?,
            max: max?,
        })
    }

    /// `Some(None)` when an optional object is absent, `None` on error.
    fn object_field<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        parent: &str,
        key: &str,
        required: bool,
    ) -> Option<Option<&'v Map<String, Value>>> {
        let path = join(parent, key);
        let Some(value) = present(obj, key) else {
            if required {
                self.push(&path, "Required", issue::REQUIRED);
                return None;
            }
            return Some(None);
        };
        match value.as_object() {
            Some(inner) => Some(Some(inner)),
            None => {
                self.push(
                    &path,
                    format!("Expected object, received {}", type_name(value)),
                    issue::INVALID_TYPE,
                );
                None
            }
        }
    }

    fn duration(&mut self, obj: &Map<String, Value>) -> Option<Option<i64>> {
        match present(obj, "durationHrs") {
            None => Some(None),
            Some(value) => self
                .integer_value(value, "durationHrs", Some(1), None)
                .map(Some),
        }
    }

    fn steps(&mut self, obj: &Map<String, Value>) -> Option<Vec<StepDocument>> {
        let Some(value) = present(obj, "steps") else {
            self.push("steps", "Required", issue::REQUIRED);
            return None;
        };
        let Some(items) = value.as_array() else {
            self.push(
                "steps",
                format!("Expected array, received {}", type_name(value)),
                issue::INVALID_TYPE,
            );
            return None;
        };
        if items.is_empty() {
            self.push("steps", "Array must contain at least 1 element(s)", issue::TOO_SMALL);
            return None;
        }

        let steps: Vec<Option<StepDocument>> = items
            .iter()
            .enumerate()
            .map(|(i, item)| self.step(item, &join_index("steps", i)))
            .collect();
        steps.into_iter().collect()
    }

    fn step(&mut self, value: &Value, path: &str) -> Option<StepDocument> {
        let Some(obj) = value.as_object() else {
            self.push(
                path,
                format!("Expected object, received {}", type_name(value)),
                issue::INVALID_TYPE,
            );
            return None;
        };

        let order = self.integer_field(obj, path, "order", Some(1), None);
        let title = self.string_field(obj, path, "title", 0);
        let description = self.string_field(obj, path, "description", 0);
        let checklist = self.object_list(obj, path, "checklist", Self::checklist_item);
        let resources = self.object_list(obj, path, "resources", Self::resource);

        Some(StepDocument {
            order: order?,
            title: title?,
            description: description?,
            checklist: checklist?,
            resources: resources?,
        })
    }

    /// Optional array of objects, each checked by `item`.
    fn object_list<T>(
        &mut self,
        obj: &Map<String, Value>,
        parent: &str,
        key: &str,
        item: fn(&mut Self, &Map<String, Value>, &str) -> Option<T>,
    ) -> Option<Vec<T>> {
        let path = join(parent, key);
        let Some(value) = present(obj, key) else {
            return Some(Vec::new());
        };
        let Some(entries) = value.as_array() else {
            self.push(
                &path,
                format!("Expected array, received {}", type_name(value)),
                issue::INVALID_TYPE,
            );
            return None;
        };

        let mut out = Vec::with_capacity(entries.len());
        let mut ok = true;
        for (i, entry) in entries.iter().enumerate() {
            let entry_path = join_index(&path, i);
            match entry.as_object() {
                Some(entry_obj) => match item(self, entry_obj, &entry_path) {
                    Some(parsed) => out.push(parsed),
                    None => ok = false,
                },
                None => {
                    ok = false;
                    self.push(
                        &entry_path,
                        format!("Expected object, received {}", type_name(entry)),
                        issue::INVALID_TYPE,
                    );
                }
            }
        }
        ok.then_some(out)
    }

    fn checklist_item(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
    ) -> Option<ChecklistItemDocument> {
        let order = self.integer_field(obj, path, "order", None, None);
        let text = self.string_field(obj, path, "text", 0);
        Some(ChecklistItemDocument {
            order: order?,
            text: text?,
        })
    }

    fn resource(&mut self, obj: &Map<String, Value>, path: &str) -> Option<ResourceDocument> {
        let title = self.string_field(obj, path, "title", 0);
        let url = self.string_field(obj, path, "url", 0).and_then(|url| {
            if is_absolute_url(&url) {
                Some(url)
            } else {
                self.push(&join(path, "url"), "Invalid url", issue::INVALID_STRING);
                None
            }
        });
        let kind = self.string_field(obj, path, "type", 0);
        Some(ResourceDocument {
            title: title?,
            url: url?,
            kind: kind?,
        })
    }

    fn submission(&mut self, obj: &Map<String, Value>) -> Option<Option<SubmissionDocument>> {
        let Some(sub) = self.object_field(obj, "", "submission", false)? else {
            return Some(None);
        };

        let kind = self.enum_field(
            sub,
            "submission",
            "type",
            SubmissionType::parse,
            &SubmissionType::ALL.map(|k| k.as_str()),
        );
        let instruction = self.string_field(sub, "submission", "instruction", 0);
        let allowed_types = self.string_array(sub, "submission", "allowedTypes", false);

        Some(Some(SubmissionDocument {
            kind: kind?,
            instruction: instruction?,
            allowed_types: allowed_types?,
        }))
    }
}

/// A key counts as present unless it is missing or explicitly `null`.
pub(crate) fn present<'v>(obj: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
    obj.get(key).filter(|v| !v.is_null())
}

/// Integer view of a JSON number; floats with no fractional part qualify.
pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

pub(crate) fn is_absolute_url(raw: &str) -> bool {
    Url::parse(raw).is_ok()
}

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn join_index(parent: &str, index: usize) -> String {
    format!("{}.{}", parent, index)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_doc() -> Value {
        json!({
            "slug": "water-filter",
            "title": "Build a Water Filter",
            "shortDesc": "Filter muddy water with sand",
            "longDesc": "Students build a layered sand and gravel filter.",
            "classRange": { "min": 4, "max": 8 },
            "level": "BEGINNER",
            "guidance": "FULLY_GUIDED",
            "subjects": ["Science", "Environment"],
            "steps": [
                {
                    "order": 1,
                    "title": "Collect materials",
                    "description": "Bottle, sand, gravel, cotton",
                    "checklist": [{ "order": 1, "text": "Cut the bottle" }],
                    "resources": [{ "title": "Guide", "url": "https://example.org/guide", "type": "link" }]
                }
            ],
            "submission": { "type": "LINK", "instruction": "Share a video" }
        })
    }

    fn paths(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn test_valid_document_parses_with_defaults() {
        let doc = validate_document(&valid_doc()).unwrap();
        assert_eq!(doc.slug, "water-filter");
        assert_eq!(doc.class_range, ClassRange { min: 4, max: 8 });
        assert_eq!(doc.level, Level::Beginner);
        assert!(doc.tags.is_empty());
        assert!(doc.tools.is_empty());
        assert!(doc.prerequisites.is_empty());
        assert_eq!(doc.steps[0].checklist[0].text, "Cut the bottle");
        let submission = doc.submission.unwrap();
        assert_eq!(submission.kind, SubmissionType::LINK);
        assert!(submission.allowed_types.is_empty());
    }

    #[test]
    fn test_validation_is_idempotent() {
        let input = valid_doc();
        assert_eq!(validate_document(&input), validate_document(&input));

        let mut broken = valid_doc();
        broken["level"] = json!("EXPERT");
        assert_eq!(validate_document(&broken), validate_document(&broken));
    }

    #[test]
    fn test_collects_every_violation() {
        let mut input = valid_doc();
        input["slug"] = json!("a");
        input["title"] = json!("b");
        input["subjects"] = json!([]);

        let errors = validate_document(&input).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(paths(&errors), vec!["slug", "title", "subjects"]);
        assert!(errors.iter().all(|e| e.code == issue::TOO_SMALL));
    }

    #[test]
    fn test_class_range_only_checks_literal_bounds() {
        // min > max is accepted: no ordering check between the bounds
        let mut input = valid_doc();
        input["classRange"] = json!({ "min": 11, "max": 3 });
        assert!(validate_document(&input).is_ok());

        // min above 12 and max below 1 are accepted too
        input["classRange"] = json!({ "min": 15, "max": 0 });
        assert!(validate_document(&input).is_ok());

        input["classRange"] = json!({ "min": 0, "max": 13 });
        let errors = validate_document(&input).unwrap_err();
        assert_eq!(paths(&errors), vec!["classRange.min", "classRange.max"]);
        assert_eq!(errors[0].code, issue::TOO_SMALL);
        assert_eq!(errors[1].code, issue::TOO_BIG);
    }

    #[test]
    fn test_integers_reject_fractions_but_accept_whole_floats() {
        let mut input = valid_doc();
        input["classRange"] = json!({ "min": 2.0, "max": 6.5 });
        let errors = validate_document(&input).unwrap_err();
        assert_eq!(paths(&errors), vec!["classRange.max"]);
        assert_eq!(errors[0].message, "Expected integer, received float");
    }

    #[test]
    fn test_enums_are_closed_sets() {
        let mut input = valid_doc();
        input["level"] = json!("beginner");
        input["guidance"] = json!(3);
        let errors = validate_document(&input).unwrap_err();
        assert_eq!(paths(&errors), vec!["level", "guidance"]);
        assert!(errors[0].message.contains("'BEGINNER' | 'INTERMEDIATE' | 'ADVANCED'"));
        assert!(errors.iter().all(|e| e.code == issue::INVALID_ENUM_VALUE));
    }

    #[test]
    fn test_nested_step_errors_use_dotted_paths() {
        let mut input = valid_doc();
        input["steps"] = json!([
            {
                "order": 0,
                "title": "First",
                "description": "Desc",
                "checklist": [{ "order": "one", "text": "x" }],
                "resources": [{ "title": "Bad", "url": "not a url", "type": "link" }]
            },
            "not-a-step"
        ]);

        let errors = validate_document(&input).unwrap_err();
        assert_eq!(
            paths(&errors),
            vec![
                "steps.0.order",
                "steps.0.checklist.0.order",
                "steps.0.resources.0.url",
                "steps.1",
            ]
        );
        assert_eq!(errors[2].code, issue::INVALID_STRING);
    }

    #[test]
    fn test_relative_resource_url_is_rejected() {
        let mut input = valid_doc();
        input["steps"][0]["resources"][0]["url"] = json!("/docs/guide");
        let errors = validate_document(&input).unwrap_err();
        assert_eq!(paths(&errors), vec!["steps.0.resources.0.url"]);
    }

    #[test]
    fn test_missing_fields_are_required() {
        let errors = validate_document(&json!({})).unwrap_err();
        let got = paths(&errors);
        for field in [
            "slug",
            "title",
            "shortDesc",
            "longDesc",
            "classRange",
            "level",
            "guidance",
            "subjects",
            "steps",
        ] {
            assert!(got.contains(&field), "missing error for {}", field);
        }
        assert_eq!(errors.len(), 9);
        assert!(errors.iter().all(|e| e.code == issue::REQUIRED));
    }

    #[test]
    fn test_non_object_input() {
        let errors = validate_document(&json!([1, 2])).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "");
        assert_eq!(errors[0].message, "Expected object, received array");
    }

    #[test]
    fn test_optional_fields_accept_null_and_validate_when_present() {
        let mut input = valid_doc();
        input["tags"] = Value::Null;
        input["submission"] = Value::Null;
        input["durationHrs"] = Value::Null;
        let doc = validate_document(&input).unwrap();
        assert!(doc.submission.is_none());
        assert!(doc.duration_hrs.is_none());

        input["tags"] = json!(["ok", 5]);
        input["durationHrs"] = json!(0);
        input["submission"] = json!({ "type": "EMAIL", "instruction": "x" });
        let errors = validate_document(&input).unwrap_err();
        assert_eq!(paths(&errors), vec!["tags.1", "durationHrs", "submission.type"]);
    }
}
