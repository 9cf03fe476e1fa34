use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::text_enum;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Screening,
    Intake,
    Assessment,
}

text_enum!(TemplateCategory {
    Screening => "screening",
    Intake => "intake",
    Assessment => "assessment",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Textarea,
    Email,
    Phone,
    Number,
    Date,
    Select,
    Radio,
    Checkbox,
    YesNo,
    Scale,
}

text_enum!(FieldType {
    Text => "text",
    Textarea => "textarea",
    Email => "email",
    Phone => "phone",
    Number => "number",
    Date => "date",
    Select => "select",
    Radio => "radio",
    Checkbox => "checkbox",
    YesNo => "yes_no",
    Scale => "scale",
});

impl FieldType {
    /// Types whose answers must be one (or several) of the field's options
    pub fn has_options(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio | FieldType::Checkbox)
    }

    /// Types scored as `value * risk_weight`
    pub fn is_weighted(&self) -> bool {
        matches!(self, FieldType::YesNo | FieldType::Scale | FieldType::Number)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    In,
}

/// One comparison against another field's answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionRule {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: serde_json::Value,
}

/// Visibility rules for a field; a field with no conditions is always shown
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conditions {
    #[serde(rename = "match", default)]
    pub match_mode: MatchMode,
    pub rules: Vec<ConditionRule>,
}

impl Conditions {
    pub fn referenced_keys(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.field.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormFieldOption {
    pub id: Uuid,
    pub field_id: Uuid,
    pub value: String,
    pub label: String,
    pub risk_score: i64,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormField {
    pub id: Uuid,
    pub template_id: Uuid,
    pub key: String,
    pub label: String,
    pub field_type: FieldType,
    pub help_text: Option<String>,
    pub is_required: bool,
    /// Core fields are part of every intake and cannot be edited or removed
    pub is_core: bool,
    pub is_critical_indicator: bool,
    pub risk_weight: i64,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub conditions: Option<Conditions>,
    pub sort_order: i64,
    pub options: Vec<FormFieldOption>,
}

impl FormField {
    pub fn option(&self, value: &str) -> Option<&FormFieldOption> {
        self.options.iter().find(|o| o.value == value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormTemplate {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub category: TemplateCategory,
    pub version: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Ordered by `sort_order`
    pub fields: Vec<FormField>,
}

impl FormTemplate {
    pub fn field_by_key(&self, key: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn field(&self, id: Uuid) -> Option<&FormField> {
        self.fields.iter().find(|f| f.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conditions_default_to_all() {
        let conditions: Conditions = serde_json::from_value(json!({
            "rules": [{ "field": "mood", "operator": "equals", "value": "low" }]
        }))
        .unwrap();
        assert_eq!(conditions.match_mode, MatchMode::All);
        assert_eq!(conditions.referenced_keys().collect::<Vec<_>>(), vec!["mood"]);
    }

    #[test]
    fn field_type_round_trips_through_text() {
        for t in [FieldType::YesNo, FieldType::Checkbox, FieldType::Scale] {
            assert_eq!(t.as_str().parse::<FieldType>().unwrap(), t);
        }
        assert!("slider".parse::<FieldType>().is_err());
    }
}
