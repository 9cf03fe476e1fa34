use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};
use std::collections::HashSet;

use super::conditions::{as_bool, as_number, is_blank};
use super::Answers;
use crate::domain::{FieldType, FormField, FormTemplate};
use crate::error::{AppError, FieldErrors, Result};

pub(crate) static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"));
static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 \-]{6,18}[0-9]$").expect("valid phone pattern"));

/// Validate answers for the visible fields and return them normalized.
///
/// Answers to hidden or unknown keys are dropped; every failure is collected
/// so the client sees all problems at once.
pub fn validate_answers(
    template: &FormTemplate,
    visible: &[String],
    answers: &Answers,
) -> Result<Answers> {
    let visible: HashSet<&str> = visible.iter().map(String::as_str).collect();
    let mut accepted = Answers::new();
    let mut errors = FieldErrors::new();

    for field in template.fields.iter().filter(|f| visible.contains(f.key.as_str())) {
        match answers.get(&field.key).filter(|v| !is_blank(v)) {
            None => {
                if field.is_required {
                    errors
                        .entry(field.key.clone())
                        .or_default()
                        .push(format!("{} is required.", field.label));
                }
            }
            Some(value) => match normalize(field, value) {
                Ok(normalized) => {
                    accepted.insert(field.key.clone(), normalized);
                }
                Err(message) => errors.entry(field.key.clone()).or_default().push(message),
            },
        }
    }

    if errors.is_empty() {
        Ok(accepted)
    } else {
        Err(AppError::Validation { errors })
    }
}

fn normalize(field: &FormField, value: &Value) -> std::result::Result<Value, String> {
    let label = &field.label;
    match field.field_type {
        FieldType::Text | FieldType::Textarea => value
            .as_str()
            .map(|s| Value::String(s.trim().to_string()))
            .ok_or_else(|| format!("The {label} must be a string.")),
        FieldType::Email => value
            .as_str()
            .map(str::trim)
            .filter(|s| EMAIL.is_match(s))
            .map(|s| Value::String(s.to_lowercase()))
            .ok_or_else(|| format!("The {label} must be a valid email address.")),
        FieldType::Phone => value
            .as_str()
            .map(str::trim)
            .filter(|s| PHONE.is_match(s))
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| format!("The {label} must be a valid phone number.")),
        FieldType::Date => value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| format!("The {label} is not a valid date.")),
        FieldType::Number => {
            let n = as_number(value).ok_or_else(|| format!("The {label} must be a number."))?;
            check_bounds(field, n)?;
            Number::from_f64(n)
                .map(Value::Number)
                .ok_or_else(|| format!("The {label} must be a number."))
        }
        FieldType::Scale => {
            let n = as_number(value)
                .filter(|n| n.fract() == 0.0)
                .ok_or_else(|| format!("The {label} must be an integer."))?;
            check_bounds(field, n)?;
            Ok(Value::from(n as i64))
        }
        FieldType::YesNo => as_bool(value)
            .map(Value::Bool)
            .ok_or_else(|| format!("The {label} field must be yes or no.")),
        FieldType::Select | FieldType::Radio => value
            .as_str()
            .and_then(|v| field.option(v))
            .map(|o| Value::String(o.value.clone()))
            .ok_or_else(|| format!("The selected {label} is invalid.")),
        FieldType::Checkbox => {
            let selected: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                single => vec![single],
            };
            let mut values = Vec::with_capacity(selected.len());
            for item in selected {
                let option = item
                    .as_str()
                    .and_then(|v| field.option(v))
                    .ok_or_else(|| format!("The selected {label} is invalid."))?;
                if !values.contains(&option.value) {
                    values.push(option.value.clone());
                }
            }
            Ok(Value::from(values))
        }
    }
}

fn check_bounds(field: &FormField, n: f64) -> std::result::Result<(), String> {
    let label = &field.label;
    match (field.min_value, field.max_value) {
        (Some(min), Some(max)) if n < min || n > max => {
            Err(format!("The {label} must be between {min} and {max}."))
        }
        (Some(min), None) if n < min => Err(format!("The {label} must be at least {min}.")),
        (None, Some(max)) if n > max => Err(format!("The {label} may not be greater than {max}.")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{field, template, with_options};
    use serde_json::json;

    fn errors_of(result: Result<Answers>) -> FieldErrors {
        match result {
            Err(AppError::Validation { errors }) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn required_visible_fields_must_be_answered() {
        let mut name = field("full_name", FieldType::Text);
        name.is_required = true;
        name.label = "Full name".into();
        let t = template(vec![name]);

        let mut answers = Answers::new();
        answers.insert("full_name".into(), json!("   "));
        let errors = errors_of(validate_answers(&t, &["full_name".into()], &answers));
        assert_eq!(errors["full_name"], vec!["Full name is required."]);

        // hidden required fields are not enforced
        assert!(validate_answers(&t, &[], &answers).unwrap().is_empty());
    }

    #[test]
    fn normalizes_values_and_drops_unknown_keys() {
        let mut scale = field("distress", FieldType::Scale);
        scale.min_value = Some(0.0);
        scale.max_value = Some(10.0);
        let t = template(vec![
            field("email", FieldType::Email),
            field("consent", FieldType::YesNo),
            scale,
            with_options(field("symptoms", FieldType::Checkbox), &[("panic", 4), ("insomnia", 2)]),
        ]);
        let visible: Vec<String> = t.fields.iter().map(|f| f.key.clone()).collect();

        let mut answers = Answers::new();
        answers.insert("email".into(), json!(" Amina@Example.org "));
        answers.insert("consent".into(), json!("yes"));
        answers.insert("distress".into(), json!("7"));
        answers.insert("symptoms".into(), json!(["panic", "panic"]));
        answers.insert("injected".into(), json!("ignored"));

        let accepted = validate_answers(&t, &visible, &answers).unwrap();
        assert_eq!(accepted["email"], json!("amina@example.org"));
        assert_eq!(accepted["consent"], json!(true));
        assert_eq!(accepted["distress"], json!(7));
        assert_eq!(accepted["symptoms"], json!(["panic"]));
        assert!(!accepted.contains_key("injected"));
    }

    #[test]
    fn collects_every_failure() {
        let mut scale = field("distress", FieldType::Scale);
        scale.min_value = Some(0.0);
        scale.max_value = Some(10.0);
        let t = template(vec![
            field("email", FieldType::Email),
            field("dob", FieldType::Date),
            scale,
            with_options(field("mood", FieldType::Select), &[("good", 0)]),
        ]);
        let visible: Vec<String> = t.fields.iter().map(|f| f.key.clone()).collect();

        let mut answers = Answers::new();
        answers.insert("email".into(), json!("not-an-email"));
        answers.insert("dob".into(), json!("31/12/1990"));
        answers.insert("distress".into(), json!(11));
        answers.insert("mood".into(), json!("ecstatic"));

        let errors = errors_of(validate_answers(&t, &visible, &answers));
        assert_eq!(errors.len(), 4);
        assert!(errors["distress"][0].contains("between 0 and 10"));
        assert!(errors["mood"][0].contains("invalid"));
    }

    #[test]
    fn number_answers_are_parsed_and_bounded() {
        let mut days = field("days_low", FieldType::Number);
        days.label = "Days low".into();
        days.min_value = Some(0.0);
        days.max_value = Some(31.0);
        let mut income = field("income", FieldType::Number);
        income.min_value = Some(0.0);
        let open = field("weight", FieldType::Number);
        let t = template(vec![days, income, open]);
        let visible: Vec<String> = t.fields.iter().map(|f| f.key.clone()).collect();

        let mut answers = Answers::new();
        answers.insert("days_low".into(), json!(" 2.5 "));
        answers.insert("income".into(), json!(1200));
        answers.insert("weight".into(), json!("1e19"));
        let accepted = validate_answers(&t, &visible, &answers).unwrap();
        assert_eq!(accepted["days_low"], json!(2.5));
        assert_eq!(accepted["income"], json!(1200.0));
        assert_eq!(accepted["weight"], json!(1e19));

        answers.insert("days_low".into(), json!(40));
        answers.insert("income".into(), json!(-1));
        answers.insert("weight".into(), json!("heavy"));
        let errors = errors_of(validate_answers(&t, &visible, &answers));
        assert_eq!(errors["days_low"], vec!["The Days low must be between 0 and 31."]);
        assert_eq!(errors["income"], vec!["The income must be at least 0."]);
        assert_eq!(errors["weight"], vec!["The weight must be a number."]);

        answers.insert("weight".into(), json!("inf"));
        answers.remove("days_low");
        answers.remove("income");
        let errors = errors_of(validate_answers(&t, &visible, &answers));
        assert_eq!(errors["weight"], vec!["The weight must be a number."]);
    }
}
