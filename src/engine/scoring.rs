use serde::Serialize;
use serde_json::Value;

use super::conditions::{as_bool, as_number};
use crate::config::RiskThresholds;
use crate::domain::{FieldType, FormField, RiskLevel, Urgency};

/// Risk contribution of one (already validated) answer.
///
/// Scores saturate at the `i64` range; an unbounded `number` answer can be
/// arbitrarily large.
pub fn score_answer(field: &FormField, value: &Value) -> i64 {
    match field.field_type {
        FieldType::Select | FieldType::Radio => value
            .as_str()
            .and_then(|v| field.option(v))
            .map_or(0, |o| o.risk_score),
        FieldType::Checkbox => value
            .as_array()
            .map(|selected| {
                selected
                    .iter()
                    .filter_map(|v| v.as_str())
                    .filter_map(|v| field.option(v))
                    .fold(0i64, |acc, o| acc.saturating_add(o.risk_score))
            })
            .unwrap_or(0),
        FieldType::YesNo => {
            if as_bool(value).unwrap_or(false) {
                field.risk_weight
            } else {
                0
            }
        }
        FieldType::Scale | FieldType::Number => as_number(value)
            .map(|n| weighted(n, field.risk_weight))
            .unwrap_or(0),
        FieldType::Text
        | FieldType::Textarea
        | FieldType::Email
        | FieldType::Phone
        | FieldType::Date => 0,
    }
}

fn weighted(n: f64, weight: i64) -> i64 {
    let product = (n * weight as f64).round();
    if product.is_nan() {
        0
    } else {
        // float-to-int `as` saturates at the bounds
        product as i64
    }
}

/// Sum of answer scores, saturating instead of wrapping.
pub fn total_score(scores: impl IntoIterator<Item = i64>) -> i64 {
    scores.into_iter().fold(0i64, i64::saturating_add)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub risk_level: RiskLevel,
    pub urgency: Urgency,
    pub is_critical: bool,
    pub needs_expert: bool,
}

pub fn risk_level(total: i64, thresholds: &RiskThresholds) -> RiskLevel {
    if total >= thresholds.critical {
        RiskLevel::Critical
    } else if total >= thresholds.high {
        RiskLevel::High
    } else if total >= thresholds.moderate {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

/// Map a total onto level, urgency and routing flags.
///
/// A positively scored critical-indicator answer makes the submission critical
/// regardless of the total.
pub fn classify(total: i64, indicator_hit: bool, thresholds: &RiskThresholds) -> Classification {
    let risk_level = risk_level(total, thresholds);
    let is_critical = risk_level == RiskLevel::Critical || indicator_hit;
    let urgency = if is_critical {
        Urgency::Immediate
    } else {
        Urgency::from(risk_level)
    };
    Classification {
        risk_level,
        urgency,
        is_critical,
        needs_expert: is_critical || total >= thresholds.expert,
    }
}
