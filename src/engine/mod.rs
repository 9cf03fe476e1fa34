//! Dynamic form engine: conditional visibility, answer validation and the
//! weighted-sum risk score.

pub mod conditions;
pub mod scoring;
pub mod validation;

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::RiskThresholds;
use crate::domain::{FormTemplate, RiskLevel, Urgency};
use crate::error::Result;

pub use conditions::{check_dependencies, visible_keys};
pub use scoring::{classify, score_answer, total_score, Classification};
pub use validation::validate_answers;

/// Raw answers keyed by field key
pub type Answers = BTreeMap<String, Value>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredAnswer {
    pub field_id: Uuid,
    pub field_key: String,
    pub field_label: String,
    pub value: Value,
    pub risk_score: i64,
}

/// Outcome of running a set of answers through a template
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Evaluation {
    pub visible_fields: Vec<String>,
    pub answers: Vec<ScoredAnswer>,
    pub total_risk_score: i64,
    pub risk_level: RiskLevel,
    pub urgency: Urgency,
    pub is_critical: bool,
    pub needs_expert: bool,
    /// Keys of critical-indicator fields that scored above zero
    pub critical_indicators: Vec<String>,
}

/// Resolve visibility, validate, score and classify in one pass.
pub fn evaluate(
    template: &FormTemplate,
    answers: &Answers,
    thresholds: &RiskThresholds,
) -> Result<Evaluation> {
    let visible_fields = visible_keys(template, answers);
    let accepted = validate_answers(template, &visible_fields, answers)?;

    let mut scored = Vec::with_capacity(accepted.len());
    let mut critical_indicators = Vec::new();
    for field in &template.fields {
        let Some(value) = accepted.get(&field.key) else {
            continue;
        };
        let risk_score = score_answer(field, value);
        if field.is_critical_indicator && risk_score > 0 {
            critical_indicators.push(field.key.clone());
        }
        scored.push(ScoredAnswer {
            field_id: field.id,
            field_key: field.key.clone(),
            field_label: field.label.clone(),
            value: value.clone(),
            risk_score,
        });
    }

    let total_risk_score = total_score(scored.iter().map(|a| a.risk_score));
    let class = classify(total_risk_score, !critical_indicators.is_empty(), thresholds);

    Ok(Evaluation {
        visible_fields,
        answers: scored,
        total_risk_score,
        risk_level: class.risk_level,
        urgency: class.urgency,
        is_critical: class.is_critical,
        needs_expert: class.needs_expert,
        critical_indicators,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::domain::{
        Conditions, FieldType, FormField, FormFieldOption, FormTemplate, TemplateCategory,
    };

    pub fn field(key: &str, field_type: FieldType) -> FormField {
        FormField {
            id: Uuid::new_v4(),
            template_id: Uuid::nil(),
            key: key.to_string(),
            label: key.to_string(),
            field_type,
            help_text: None,
            is_required: false,
            is_core: false,
            is_critical_indicator: false,
            risk_weight: 0,
            min_value: None,
            max_value: None,
            conditions: None,
            sort_order: 0,
            options: Vec::new(),
        }
    }

    pub fn with_options(mut f: FormField, options: &[(&str, i64)]) -> FormField {
        f.options = options
            .iter()
            .enumerate()
            .map(|(i, (value, score))| FormFieldOption {
                id: Uuid::new_v4(),
                field_id: f.id,
                value: value.to_string(),
                label: value.to_string(),
                risk_score: *score,
                sort_order: i as i64 + 1,
            })
            .collect();
        f
    }

    pub fn with_conditions(mut f: FormField, conditions: Conditions) -> FormField {
        f.conditions = Some(conditions);
        f
    }

    pub fn template(fields: Vec<FormField>) -> FormTemplate {
        let now = Utc::now();
        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(i, mut f)| {
                f.sort_order = i as i64 + 1;
                f
            })
            .collect();
        FormTemplate {
            id: Uuid::new_v4(),
            slug: "screening".into(),
            name: "Screening".into(),
            description: None,
            category: TemplateCategory::Screening,
            version: 1,
            is_active: true,
            created_at: now,
            updated_at: now,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::domain::{ConditionOperator, ConditionRule, Conditions, FieldType, MatchMode};
    use serde_json::json;

    fn screening() -> FormTemplate {
        let mut self_harm = field("self_harm", FieldType::YesNo);
        self_harm.risk_weight = 10;
        self_harm.is_critical_indicator = true;

        let mut distress = field("distress", FieldType::Scale);
        distress.risk_weight = 2;
        distress.min_value = Some(0.0);
        distress.max_value = Some(10.0);
        distress.is_required = true;

        let mut plan = field("plan_details", FieldType::Textarea);
        plan.is_required = true;

        template(vec![
            with_options(field("mood", FieldType::Radio), &[("good", 0), ("low", 4), ("hopeless", 9)]),
            distress,
            self_harm,
            with_conditions(
                plan,
                Conditions {
                    match_mode: MatchMode::All,
                    rules: vec![ConditionRule {
                        field: "self_harm".into(),
                        operator: ConditionOperator::Equals,
                        value: json!(true),
                    }],
                },
            ),
        ])
    }

    #[test]
    fn sums_visible_answers() {
        let t = screening();
        let mut answers = Answers::new();
        answers.insert("mood".into(), json!("low"));
        answers.insert("distress".into(), json!(5));
        answers.insert("self_harm".into(), json!(false));
        // hidden: neither required nor scored
        answers.insert("plan_details".into(), json!("ignored"));

        let eval = evaluate(&t, &answers, &RiskThresholds::default()).unwrap();
        assert_eq!(eval.total_risk_score, 14);
        assert_eq!(eval.risk_level, RiskLevel::Moderate);
        assert_eq!(eval.urgency, Urgency::Soon);
        assert!(!eval.is_critical);
        assert!(!eval.visible_fields.contains(&"plan_details".to_string()));
        assert_eq!(eval.answers.len(), 3);
    }

    #[test]
    fn critical_indicator_escalates_and_reveals_follow_up() {
        let t = screening();
        let mut answers = Answers::new();
        answers.insert("mood".into(), json!("good"));
        answers.insert("distress".into(), json!(1));
        answers.insert("self_harm".into(), json!(true));

        // follow-up became visible and is required
        assert!(evaluate(&t, &answers, &RiskThresholds::default()).is_err());

        answers.insert("plan_details".into(), json!("no plan"));
        let eval = evaluate(&t, &answers, &RiskThresholds::default()).unwrap();
        assert_eq!(eval.total_risk_score, 12);
        assert!(eval.is_critical);
        assert!(eval.needs_expert);
        assert_eq!(eval.urgency, Urgency::Immediate);
        assert_eq!(eval.critical_indicators, vec!["self_harm"]);
    }

    #[test]
    fn oversized_number_answer_stays_critical() {
        let mut income = field("income", FieldType::Number);
        income.risk_weight = 1;
        let mut days = field("days_low", FieldType::Number);
        days.risk_weight = 1;
        let t = template(vec![income, days]);

        let mut answers = Answers::new();
        answers.insert("income".into(), json!("1e19"));
        answers.insert("days_low".into(), json!(5));

        let eval = evaluate(&t, &answers, &RiskThresholds::default()).unwrap();
        assert_eq!(eval.total_risk_score, i64::MAX);
        assert_eq!(eval.risk_level, RiskLevel::Critical);
        assert!(eval.is_critical);
    }
}
