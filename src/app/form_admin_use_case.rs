use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{
    Conditions, FieldType, FormField, FormFieldOption, FormTemplate, TemplateCategory,
};
use crate::engine::check_dependencies;
use crate::error::{AppError, FieldErrors, Result};
use crate::storage::{forms, Database};

static SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug pattern"));
static FIELD_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").expect("valid key pattern"));

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateInput {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub category: TemplateCategory,
    #[serde(default)]
    pub fields: Vec<FieldInput>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<TemplateCategory>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldInput {
    pub key: String,
    pub label: String,
    pub field_type: FieldType,
    pub help_text: Option<String>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_core: bool,
    #[serde(default)]
    pub is_critical_indicator: bool,
    #[serde(default)]
    pub risk_weight: i64,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub conditions: Option<Conditions>,
    #[serde(default)]
    pub options: Vec<OptionInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptionInput {
    pub value: String,
    pub label: String,
    #[serde(default)]
    pub risk_score: i64,
}

/// Template and field administration
pub struct FormAdminUseCase {
    db: Arc<Database>,
}

impl FormAdminUseCase {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub fn create_template(&self, input: TemplateInput) -> Result<FormTemplate> {
        let mut errors = FieldErrors::new();
        if !SLUG.is_match(&input.slug) {
            push(&mut errors, "slug", "The slug may only contain lowercase letters, numbers and dashes.");
        }
        if input.name.trim().is_empty() {
            push(&mut errors, "name", "The name field is required.");
        }
        if !errors.is_empty() {
            return Err(AppError::Validation { errors });
        }

        let now = Utc::now();
        let template_id = Uuid::new_v4();
        let mut fields = Vec::with_capacity(input.fields.len());
        for (i, field_input) in input.fields.into_iter().enumerate() {
            validate_field_input(&field_input).map_err(|e| prefix_errors(e, &format!("fields.{i}")))?;
            fields.push(build_field(template_id, Uuid::new_v4(), field_input, i as i64 + 1, None));
        }
        ensure_unique_keys(&fields)?;
        check_dependencies(&fields)?;

        let template = FormTemplate {
            id: template_id,
            slug: input.slug,
            name: input.name.trim().to_string(),
            description: input.description,
            category: input.category,
            version: 1,
            is_active: true,
            created_at: now,
            updated_at: now,
            fields,
        };

        self.db.transaction(|c| {
            if forms::latest_version(c, &template.slug)?.is_some() {
                return Err(AppError::field("slug", "The slug has already been taken."));
            }
            forms::insert_template(c, &template)
        })?;
        info!(template_id = %template.id, "Created form template");
        Ok(template)
    }

    pub fn update_template(&self, id: Uuid, update: TemplateUpdate) -> Result<FormTemplate> {
        let mut template = self.db.get_template(id)?;
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(AppError::field("name", "The name field is required."));
            }
            template.name = name.trim().to_string();
        }
        if update.description.is_some() {
            template.description = update.description;
        }
        if let Some(category) = update.category {
            template.category = category;
        }
        let activating = update.is_active == Some(true) && !template.is_active;
        if let Some(active) = update.is_active {
            template.is_active = active;
        }
        template.updated_at = Utc::now();

        self.db.transaction(|c| {
            forms::update_template(c, &template)?;
            if activating {
                forms::deactivate_other_versions(c, &template.slug, template.id)?;
            }
            Ok(())
        })?;
        info!(template_id = %id, "Updated form template");
        Ok(template)
    }

    /// Fails when the template already has submissions.
    #[instrument(skip(self))]
    pub fn delete_template(&self, id: Uuid) -> Result<()> {
        self.db.transaction(|c| {
            if forms::find_template(c, id)?.is_none() {
                return Err(AppError::not_found("Form template"));
            }
            if forms::count_submissions(c, id)? > 0 {
                return Err(AppError::rule(
                    "Cannot delete a form template that already has submissions.",
                ));
            }
            forms::delete_template(c, id)
        })?;
        info!(template_id = %id, "Deleted form template");
        Ok(())
    }

    /// Copy a template into the next version and make the copy the active one.
    #[instrument(skip(self))]
    pub fn new_version(&self, id: Uuid) -> Result<FormTemplate> {
        let template = self.db.transaction(|c| {
            let source = forms::find_template(c, id)?
                .ok_or_else(|| AppError::not_found("Form template"))?;
            let version = forms::latest_version(c, &source.slug)?.unwrap_or(source.version) + 1;
            let copy = copy_as_version(&source, version);
            forms::insert_template(c, &copy)?;
            forms::deactivate_other_versions(c, &copy.slug, copy.id)?;
            Ok(copy)
        })?;
        info!(template_id = %template.id, version = template.version, "Created template version");
        Ok(template)
    }

    pub fn add_field(&self, template_id: Uuid, input: FieldInput) -> Result<FormField> {
        validate_field_input(&input)?;
        let field = self.db.transaction(|c| {
            let template = forms::find_template(c, template_id)?
                .ok_or_else(|| AppError::not_found("Form template"))?;
            let next_order = template.fields.iter().map(|f| f.sort_order).max().unwrap_or(0) + 1;
            let field = build_field(template_id, Uuid::new_v4(), input, next_order, None);

            let mut all = template.fields;
            all.push(field.clone());
            ensure_unique_keys(&all)?;
            check_dependencies(&all)?;

            forms::insert_field(c, &field)?;
            Ok(field)
        })?;
        info!(template_id = %template_id, field = %field.key, "Added form field");
        Ok(field)
    }

    /// Core fields are immutable.
    pub fn update_field(&self, template_id: Uuid, field_id: Uuid, input: FieldInput) -> Result<FormField> {
        validate_field_input(&input)?;
        let field = self.db.transaction(|c| {
            let template = forms::find_template(c, template_id)?
                .ok_or_else(|| AppError::not_found("Form template"))?;
            let existing = template
                .field(field_id)
                .ok_or_else(|| AppError::not_found("Form field"))?;
            if existing.is_core {
                return Err(AppError::forbidden("Core fields cannot be edited."));
            }
            let field = build_field(template_id, field_id, input, existing.sort_order, Some(false));

            let all: Vec<FormField> = template
                .fields
                .iter()
                .map(|f| if f.id == field_id { field.clone() } else { f.clone() })
                .collect();
            ensure_unique_keys(&all)?;
            check_dependencies(&all)?;

            forms::update_field(c, &field)?;
            Ok(field)
        })?;
        info!(template_id = %template_id, field = %field.key, "Updated form field");
        Ok(field)
    }

    /// Core fields and fields other conditions depend on cannot be deleted.
    pub fn delete_field(&self, template_id: Uuid, field_id: Uuid) -> Result<()> {
        self.db.transaction(|c| {
            let template = forms::find_template(c, template_id)?
                .ok_or_else(|| AppError::not_found("Form template"))?;
            let field = template
                .field(field_id)
                .ok_or_else(|| AppError::not_found("Form field"))?;
            if field.is_core {
                return Err(AppError::forbidden("Core fields cannot be deleted."));
            }
            let dependants: Vec<&str> = template
                .fields
                .iter()
                .filter(|f| {
                    f.conditions
                        .as_ref()
                        .map_or(false, |cond| cond.referenced_keys().any(|k| k == field.key))
                })
                .map(|f| f.key.as_str())
                .collect();
            if !dependants.is_empty() {
                return Err(AppError::rule(format!(
                    "Field '{}' is used by the conditional logic of: {}.",
                    field.key,
                    dependants.join(", ")
                )));
            }

            forms::delete_field(c, field_id)?;
            let remaining = template.fields.iter().filter(|f| f.id != field_id);
            for (i, f) in remaining.enumerate() {
                forms::set_field_order(c, f.id, i as i64 + 1)?;
            }
            Ok(())
        })?;
        info!(template_id = %template_id, field_id = %field_id, "Deleted form field");
        Ok(())
    }

    /// Persist `ordered_ids` as the field order (1-based).
    pub fn reorder_fields(&self, template_id: Uuid, ordered_ids: &[Uuid]) -> Result<FormTemplate> {
        self.db.transaction(|c| {
            let template = forms::find_template(c, template_id)?
                .ok_or_else(|| AppError::not_found("Form template"))?;
            let current: HashSet<Uuid> = template.fields.iter().map(|f| f.id).collect();
            let requested: HashSet<Uuid> = ordered_ids.iter().copied().collect();
            if requested.len() != ordered_ids.len() || requested != current {
                return Err(AppError::field(
                    "field_ids",
                    "The field list must contain every field of the template exactly once.",
                ));
            }
            for (i, id) in ordered_ids.iter().enumerate() {
                forms::set_field_order(c, *id, i as i64 + 1)?;
            }
            Ok(())
        })?;
        info!(template_id = %template_id, "Reordered form fields");
        self.db.get_template(template_id)
    }
}

fn push(errors: &mut FieldErrors, key: &str, message: &str) {
    errors.entry(key.to_string()).or_default().push(message.to_string());
}

fn prefix_errors(err: AppError, prefix: &str) -> AppError {
    match err {
        AppError::Validation { errors } => AppError::Validation {
            errors: errors
                .into_iter()
                .map(|(k, v)| (format!("{prefix}.{k}"), v))
                .collect(),
        },
        other => other,
    }
}

fn validate_field_input(input: &FieldInput) -> Result<()> {
    let mut errors = FieldErrors::new();
    if !FIELD_KEY.is_match(&input.key) {
        push(&mut errors, "key", "The key must start with a letter and contain only lowercase letters, digits and underscores.");
    }
    if input.label.trim().is_empty() {
        push(&mut errors, "label", "The label field is required.");
    }
    if input.risk_weight < 0 {
        push(&mut errors, "risk_weight", "The risk weight cannot be negative.");
    }
    if let (Some(min), Some(max)) = (input.min_value, input.max_value) {
        if min > max {
            push(&mut errors, "min_value", "The minimum cannot exceed the maximum.");
        }
    }
    if input.field_type == FieldType::Scale && (input.min_value.is_none() || input.max_value.is_none()) {
        push(&mut errors, "max_value", "Scale fields need both a minimum and a maximum.");
    }

    if input.field_type.has_options() {
        if input.options.is_empty() {
            push(&mut errors, "options", "Choice fields need at least one option.");
        }
        let mut seen = HashSet::new();
        for option in &input.options {
            if option.value.trim().is_empty() || option.label.trim().is_empty() {
                push(&mut errors, "options", "Every option needs a value and a label.");
            } else if !seen.insert(option.value.as_str()) {
                push(&mut errors, "options", &format!("Duplicate option value '{}'.", option.value));
            }
            if option.risk_score < 0 {
                push(&mut errors, "options", "Option risk scores cannot be negative.");
            }
        }
    } else if !input.options.is_empty() {
        push(&mut errors, "options", "Only select, radio and checkbox fields take options.");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation { errors })
    }
}

fn ensure_unique_keys(fields: &[FormField]) -> Result<()> {
    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.key.as_str()) {
            return Err(AppError::field(
                "key",
                format!("The key '{}' is already used in this form.", field.key),
            ));
        }
    }
    Ok(())
}

/// `core_override` replaces the input's core flag (updates never promote a field to core).
fn build_field(
    template_id: Uuid,
    field_id: Uuid,
    input: FieldInput,
    sort_order: i64,
    core_override: Option<bool>,
) -> FormField {
    let options = input
        .options
        .into_iter()
        .enumerate()
        .map(|(i, o)| FormFieldOption {
            id: Uuid::new_v4(),
            field_id,
            value: o.value.trim().to_string(),
            label: o.label.trim().to_string(),
            risk_score: o.risk_score,
            sort_order: i as i64 + 1,
        })
        .collect();
    FormField {
        id: field_id,
        template_id,
        key: input.key,
        label: input.label.trim().to_string(),
        field_type: input.field_type,
        help_text: input.help_text,
        is_required: input.is_required,
        is_core: core_override.unwrap_or(input.is_core),
        is_critical_indicator: input.is_critical_indicator,
        risk_weight: input.risk_weight,
        min_value: input.min_value,
        max_value: input.max_value,
        conditions: input.conditions.filter(|c| !c.rules.is_empty()),
        sort_order,
        options,
    }
}

fn copy_as_version(source: &FormTemplate, version: i64) -> FormTemplate {
    let now = Utc::now();
    let template_id = Uuid::new_v4();
    let fields = source
        .fields
        .iter()
        .map(|f| {
            let field_id = Uuid::new_v4();
            FormField {
                id: field_id,
                template_id,
                options: f
                    .options
                    .iter()
                    .map(|o| FormFieldOption {
                        id: Uuid::new_v4(),
                        field_id,
                        ..o.clone()
                    })
                    .collect(),
                ..f.clone()
            }
        })
        .collect();
    FormTemplate {
        id: template_id,
        version,
        is_active: true,
        created_at: now,
        updated_at: now,
        fields,
        ..source.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConditionOperator, ConditionRule, MatchMode};
    use serde_json::json;

    fn use_case() -> FormAdminUseCase {
        FormAdminUseCase::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn text(key: &str) -> FieldInput {
        FieldInput {
            key: key.into(),
            label: key.into(),
            field_type: FieldType::Text,
            help_text: None,
            is_required: false,
            is_core: false,
            is_critical_indicator: false,
            risk_weight: 0,
            min_value: None,
            max_value: None,
            conditions: None,
            options: vec![],
        }
    }

    fn input(fields: Vec<FieldInput>) -> TemplateInput {
        TemplateInput {
            slug: "initial-screening".into(),
            name: "Initial screening".into(),
            description: None,
            category: TemplateCategory::Screening,
            fields,
        }
    }

    #[test]
    fn core_fields_cannot_be_edited_or_deleted() {
        let uc = use_case();
        let mut name = text("full_name");
        name.is_core = true;
        let t = uc.create_template(input(vec![name, text("notes")])).unwrap();
        let core_id = t.fields[0].id;

        let err = uc.update_field(t.id, core_id, text("full_name")).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = uc.delete_field(t.id, core_id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        uc.delete_field(t.id, t.fields[1].id).unwrap();
        assert_eq!(uc.db.get_template(t.id).unwrap().fields.len(), 1);
    }

    #[test]
    fn reorder_persists_positions() {
        let uc = use_case();
        let t = uc.create_template(input(vec![text("a"), text("b"), text("c")])).unwrap();
        let ids: Vec<Uuid> = t.fields.iter().rev().map(|f| f.id).collect();

        let reordered = uc.reorder_fields(t.id, &ids).unwrap();
        let keys: Vec<&str> = reordered.fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["c", "b", "a"]);
        let orders: Vec<i64> = reordered.fields.iter().map(|f| f.sort_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);

        // missing one id
        assert!(uc.reorder_fields(t.id, &ids[..2]).is_err());
        // duplicated id
        assert!(uc.reorder_fields(t.id, &[ids[0], ids[0], ids[1]]).is_err());
    }

    #[test]
    fn choice_fields_need_options_and_conditions_need_targets() {
        let uc = use_case();
        let t = uc.create_template(input(vec![text("a")])).unwrap();

        let mut select = text("mood");
        select.field_type = FieldType::Select;
        assert!(matches!(uc.add_field(t.id, select), Err(AppError::Validation { .. })));

        let mut dependent = text("follow_up");
        dependent.conditions = Some(Conditions {
            match_mode: MatchMode::All,
            rules: vec![ConditionRule {
                field: "missing".into(),
                operator: ConditionOperator::Equals,
                value: json!("x"),
            }],
        });
        assert!(uc.add_field(t.id, dependent).is_err());
    }

    #[test]
    fn referenced_fields_cannot_be_deleted() {
        let uc = use_case();
        let mut dependent = text("follow_up");
        dependent.conditions = Some(Conditions {
            match_mode: MatchMode::All,
            rules: vec![ConditionRule {
                field: "a".into(),
                operator: ConditionOperator::Equals,
                value: json!("x"),
            }],
        });
        let t = uc.create_template(input(vec![text("a"), dependent])).unwrap();
        let err = uc.delete_field(t.id, t.fields[0].id).unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[test]
    fn new_version_copies_fields_and_takes_over() {
        let uc = use_case();
        let mut mood = text("mood");
        mood.field_type = FieldType::Radio;
        mood.options = vec![
            OptionInput { value: "good".into(), label: "Good".into(), risk_score: 0 },
            OptionInput { value: "low".into(), label: "Low".into(), risk_score: 5 },
        ];
        let v1 = uc.create_template(input(vec![mood])).unwrap();
        let v2 = uc.new_version(v1.id).unwrap();

        assert_eq!(v2.version, 2);
        assert_eq!(v2.fields[0].options.len(), 2);
        assert_ne!(v2.fields[0].id, v1.fields[0].id);
        assert!(!uc.db.get_template(v1.id).unwrap().is_active);
        assert_eq!(uc.db.get_active_template("initial-screening").unwrap().id, v2.id);
    }

    #[test]
    fn slug_must_be_unique() {
        let uc = use_case();
        uc.create_template(input(vec![])).unwrap();
        let err = uc.create_template(input(vec![])).unwrap_err();
        match err {
            AppError::Validation { errors } => assert!(errors.contains_key("slug")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
