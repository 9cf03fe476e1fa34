//! Conditional visibility of form fields.
//!
//! A field is shown when its rules hold against the answers of the fields it
//! references. Referenced fields that are themselves hidden count as
//! unanswered, so visibility is resolved recursively with memoisation.

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::Answers;
use crate::domain::{ConditionOperator, ConditionRule, FormField, FormTemplate, MatchMode};
use crate::error::{AppError, FieldErrors, Result};

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done(bool),
}

/// Keys of the fields that are visible for `answers`, in template order.
pub fn visible_keys(template: &FormTemplate, answers: &Answers) -> Vec<String> {
    let by_key: HashMap<&str, &FormField> =
        template.fields.iter().map(|f| (f.key.as_str(), f)).collect();
    let mut marks: HashMap<String, Mark> = HashMap::new();

    template
        .fields
        .iter()
        .filter(|f| is_visible(&f.key, &by_key, answers, &mut marks))
        .map(|f| f.key.clone())
        .collect()
}

fn is_visible(
    key: &str,
    by_key: &HashMap<&str, &FormField>,
    answers: &Answers,
    marks: &mut HashMap<String, Mark>,
) -> bool {
    match marks.get(key) {
        Some(Mark::Done(v)) => return *v,
        // a dependency cycle slipped past definition checks; hide the field
        Some(Mark::Visiting) => return false,
        None => {}
    }
    let Some(field) = by_key.get(key) else {
        return false;
    };
    let Some(conditions) = field.conditions.as_ref().filter(|c| !c.rules.is_empty()) else {
        marks.insert(key.to_string(), Mark::Done(true));
        return true;
    };

    marks.insert(key.to_string(), Mark::Visiting);
    let mut results = Vec::with_capacity(conditions.rules.len());
    for rule in &conditions.rules {
        let answer = if is_visible(&rule.field, by_key, answers, marks) {
            answers.get(&rule.field).filter(|v| !is_blank(v))
        } else {
            None
        };
        results.push(rule_holds(rule, answer));
    }
    let visible = match conditions.match_mode {
        MatchMode::All => results.iter().all(|r| *r),
        MatchMode::Any => results.iter().any(|r| *r),
    };
    marks.insert(key.to_string(), Mark::Done(visible));
    visible
}

/// Evaluate one rule; `None` means the referenced field has no answer.
pub fn rule_holds(rule: &ConditionRule, answer: Option<&Value>) -> bool {
    let Some(answer) = answer else {
        return rule.operator == ConditionOperator::NotEquals;
    };
    match rule.operator {
        ConditionOperator::Equals => matches_value(answer, &rule.value),
        ConditionOperator::NotEquals => !matches_value(answer, &rule.value),
        ConditionOperator::Contains => contains(answer, &rule.value),
        ConditionOperator::GreaterThan => compare(answer, &rule.value).map_or(false, |o| o.is_gt()),
        ConditionOperator::LessThan => compare(answer, &rule.value).map_or(false, |o| o.is_lt()),
        ConditionOperator::In => match &rule.value {
            Value::Array(candidates) => candidates.iter().any(|c| matches_value(answer, c)),
            other => matches_value(answer, other),
        },
    }
}

pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Loose equality; a multi-select answer matches when any selection does.
fn matches_value(answer: &Value, expected: &Value) -> bool {
    match answer {
        Value::Array(items) => items.iter().any(|i| loose_eq(i, expected)),
        single => loose_eq(single, expected),
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (as_bool(a), as_bool(b)) {
        return x == y;
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.trim().eq_ignore_ascii_case(y.trim()),
        _ => a == b,
    }
}

fn contains(answer: &Value, needle: &Value) -> bool {
    match (answer, needle) {
        (Value::Array(items), n) => items.iter().any(|i| loose_eq(i, n)),
        (Value::String(hay), Value::String(n)) => {
            hay.to_lowercase().contains(&n.trim().to_lowercase())
        }
        _ => false,
    }
}

fn compare(answer: &Value, expected: &Value) -> Option<std::cmp::Ordering> {
    as_number(answer)?.partial_cmp(&as_number(expected)?)
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "ya" => Some(true),
            "no" | "false" | "tidak" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Check that every field's conditions reference existing keys and that the
/// dependency graph has no cycles.
pub fn check_dependencies(fields: &[FormField]) -> Result<()> {
    let keys: HashSet<&str> = fields.iter().map(|f| f.key.as_str()).collect();
    let mut errors = FieldErrors::new();

    for field in fields {
        let Some(conditions) = &field.conditions else {
            continue;
        };
        for referenced in conditions.referenced_keys() {
            if referenced == field.key {
                errors
                    .entry(field.key.clone())
                    .or_default()
                    .push("A field cannot depend on itself.".to_string());
            } else if !keys.contains(referenced) {
                errors
                    .entry(field.key.clone())
                    .or_default()
                    .push(format!("Condition references unknown field '{referenced}'."));
            }
        }
    }
    if !errors.is_empty() {
        return Err(AppError::Validation { errors });
    }

    if let Some(key) = find_cycle(fields) {
        return Err(AppError::field(
            key,
            "Conditional logic forms a cycle between fields.",
        ));
    }
    Ok(())
}

fn find_cycle(fields: &[FormField]) -> Option<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Grey,
        Black,
    }

    fn visit<'a>(
        key: &'a str,
        deps: &HashMap<&'a str, Vec<&'a str>>,
        colors: &mut HashMap<&'a str, Color>,
    ) -> Option<String> {
        colors.insert(key, Color::Grey);
        for &next in deps.get(key).into_iter().flatten() {
            match colors.get(next).copied().unwrap_or(Color::White) {
                Color::Grey => return Some(next.to_string()),
                Color::White => {
                    if let Some(found) = visit(next, deps, colors) {
                        return Some(found);
                    }
                }
                Color::Black => {}
            }
        }
        colors.insert(key, Color::Black);
        None
    }

    let deps: HashMap<&str, Vec<&str>> = fields
        .iter()
        .map(|f| {
            let refs = f
                .conditions
                .iter()
                .flat_map(|c| c.referenced_keys())
                .collect();
            (f.key.as_str(), refs)
        })
        .collect();
    let mut colors: HashMap<&str, Color> = HashMap::new();

    for field in fields {
        if colors.get(field.key.as_str()).copied().unwrap_or(Color::White) == Color::White {
            if let Some(found) = visit(&field.key, &deps, &mut colors) {
                return Some(found);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{field, template, with_conditions};
    use crate::domain::{Conditions, FieldType};
    use serde_json::json;

    fn rule(field: &str, operator: ConditionOperator, value: Value) -> ConditionRule {
        ConditionRule {
            field: field.into(),
            operator,
            value,
        }
    }

    #[test]
    fn unanswered_reference_only_satisfies_not_equals() {
        let r = rule("mood", ConditionOperator::Equals, json!("low"));
        assert!(!rule_holds(&r, None));
        let r = rule("mood", ConditionOperator::NotEquals, json!("low"));
        assert!(rule_holds(&r, None));
    }

    #[test]
    fn operators_compare_loosely() {
        let gt = rule("age", ConditionOperator::GreaterThan, json!(17));
        assert!(rule_holds(&gt, Some(&json!("18"))));
        assert!(!rule_holds(&gt, Some(&json!(17))));

        let eq = rule("consent", ConditionOperator::Equals, json!(true));
        assert!(rule_holds(&eq, Some(&json!("yes"))));

        let contains = rule("symptoms", ConditionOperator::Contains, json!("insomnia"));
        assert!(rule_holds(&contains, Some(&json!(["anxiety", "insomnia"]))));
        assert!(!rule_holds(&contains, Some(&json!(["anxiety"]))));

        let within = rule("mood", ConditionOperator::In, json!(["low", "very_low"]));
        assert!(rule_holds(&within, Some(&json!("Very_Low"))));
        assert!(!rule_holds(&within, Some(&json!("good"))));
    }

    #[test]
    fn hidden_parent_hides_children() {
        let t = template(vec![
            field("has_thoughts", FieldType::YesNo),
            with_conditions(
                field("frequency", FieldType::Scale),
                Conditions {
                    match_mode: MatchMode::All,
                    rules: vec![rule("has_thoughts", ConditionOperator::Equals, json!(true))],
                },
            ),
            with_conditions(
                field("plan", FieldType::YesNo),
                Conditions {
                    match_mode: MatchMode::All,
                    rules: vec![rule("frequency", ConditionOperator::GreaterThan, json!(2))],
                },
            ),
        ]);

        let mut answers = Answers::new();
        answers.insert("has_thoughts".into(), json!(false));
        answers.insert("frequency".into(), json!(5));
        assert_eq!(visible_keys(&t, &answers), vec!["has_thoughts"]);

        answers.insert("has_thoughts".into(), json!(true));
        assert_eq!(visible_keys(&t, &answers), vec!["has_thoughts", "frequency", "plan"]);
    }

    #[test]
    fn any_mode_needs_one_rule() {
        let t = template(vec![
            field("a", FieldType::Text),
            field("b", FieldType::Text),
            with_conditions(
                field("c", FieldType::Text),
                Conditions {
                    match_mode: MatchMode::Any,
                    rules: vec![
                        rule("a", ConditionOperator::Equals, json!("x")),
                        rule("b", ConditionOperator::Equals, json!("y")),
                    ],
                },
            ),
        ]);
        let mut answers = Answers::new();
        answers.insert("b".into(), json!("y"));
        assert!(visible_keys(&t, &answers).contains(&"c".to_string()));
    }

    #[test]
    fn rejects_unknown_references_and_cycles() {
        let unknown = vec![with_conditions(
            field("a", FieldType::Text),
            Conditions {
                match_mode: MatchMode::All,
                rules: vec![rule("ghost", ConditionOperator::Equals, json!("x"))],
            },
        )];
        assert!(matches!(check_dependencies(&unknown), Err(AppError::Validation { .. })));

        let cyclic = vec![
            with_conditions(
                field("a", FieldType::Text),
                Conditions {
                    match_mode: MatchMode::All,
                    rules: vec![rule("b", ConditionOperator::Equals, json!("x"))],
                },
            ),
            with_conditions(
                field("b", FieldType::Text),
                Conditions {
                    match_mode: MatchMode::All,
                    rules: vec![rule("a", ConditionOperator::Equals, json!("y"))],
                },
            ),
        ];
        assert!(check_dependencies(&cyclic).is_err());

        // cycles are hidden rather than looping if they reach evaluation
        let t = template(cyclic);
        assert!(visible_keys(&t, &Answers::new()).is_empty());
    }
}
