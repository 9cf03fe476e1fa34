//! Bootstrap data: the default screening questionnaire and a first admin.

use serde_json::json;
use tracing::info;

use crate::app::form_admin_use_case::{FieldInput, FormAdminUseCase, OptionInput, TemplateInput};
use crate::app::user_use_case::{UserInput, UserUseCase};
use crate::domain::{
    ConditionOperator, ConditionRule, Conditions, FieldType, FormTemplate, MatchMode, Role,
    TemplateCategory, User,
};
use crate::error::{AppError, Result};

pub const SCREENING_SLUG: &str = "initial-screening";

fn field(key: &str, label: &str, field_type: FieldType) -> FieldInput {
    FieldInput {
        key: key.to_string(),
        label: label.to_string(),
        field_type,
        help_text: None,
        is_required: false,
        is_core: false,
        is_critical_indicator: false,
        risk_weight: 0,
        min_value: None,
        max_value: None,
        conditions: None,
        options: Vec::new(),
    }
}

fn options(pairs: &[(&str, &str, i64)]) -> Vec<OptionInput> {
    pairs
        .iter()
        .map(|(value, label, risk_score)| OptionInput {
            value: value.to_string(),
            label: label.to_string(),
            risk_score: *risk_score,
        })
        .collect()
}

fn shown_when_yes(key: &str) -> Option<Conditions> {
    Some(Conditions {
        match_mode: MatchMode::All,
        rules: vec![ConditionRule {
            field: key.to_string(),
            operator: ConditionOperator::Equals,
            value: json!(true),
        }],
    })
}

pub fn screening_template() -> TemplateInput {
    let mut full_name = field("full_name", "Full name", FieldType::Text);
    full_name.is_required = true;
    full_name.is_core = true;

    let mut email = field("email", "Email", FieldType::Email);
    email.is_required = true;
    email.is_core = true;

    let mut phone = field("phone", "Phone number", FieldType::Phone);
    phone.is_core = true;

    let mut mood = field("mood", "How would you describe your mood over the last two weeks?", FieldType::Radio);
    mood.is_required = true;
    mood.options = options(&[
        ("good", "Mostly good", 0),
        ("low", "Often low", 4),
        ("very_low", "Low most days", 8),
        ("hopeless", "Hopeless", 12),
    ]);

    let mut distress = field("distress", "Distress level", FieldType::Scale);
    distress.is_required = true;
    distress.help_text = Some("0 means no distress, 10 the worst you can imagine".to_string());
    distress.min_value = Some(0.0);
    distress.max_value = Some(10.0);
    distress.risk_weight = 1;

    let mut symptoms = field("symptoms", "Which of these have you experienced?", FieldType::Checkbox);
    symptoms.options = options(&[
        ("insomnia", "Trouble sleeping", 2),
        ("appetite", "Change in appetite", 1),
        ("panic", "Panic attacks", 3),
        ("withdrawal", "Withdrawing from family or prayer", 2),
        ("whispers", "Hearing or seeing disturbing things", 4),
    ]);

    let mut self_harm = field("self_harm_thoughts", "Have you had thoughts of harming yourself?", FieldType::YesNo);
    self_harm.is_required = true;
    self_harm.risk_weight = 10;

    let mut plan = field("self_harm_plan", "Do you have a plan to act on those thoughts?", FieldType::YesNo);
    plan.is_required = true;
    plan.is_critical_indicator = true;
    plan.risk_weight = 20;
    plan.conditions = shown_when_yes("self_harm_thoughts");

    let mut support = field("support_contact", "Someone we can contact for support", FieldType::Text);
    support.conditions = shown_when_yes("self_harm_thoughts");

    let notes = field("notes", "Anything else you would like us to know", FieldType::Textarea);

    TemplateInput {
        slug: SCREENING_SLUG.to_string(),
        name: "Initial screening".to_string(),
        description: Some("First assessment before a consultation is scheduled".to_string()),
        category: TemplateCategory::Screening,
        fields: vec![full_name, email, phone, mood, distress, symptoms, self_harm, plan, support, notes],
    }
}

/// Create the default screening template unless the slug already exists.
pub fn seed_templates(forms: &FormAdminUseCase) -> Result<Option<FormTemplate>> {
    match forms.create_template(screening_template()) {
        Ok(template) => {
            info!(slug = SCREENING_SLUG, "Seeded screening template");
            Ok(Some(template))
        }
        Err(AppError::Validation { errors }) if errors.contains_key("slug") => {
            info!(slug = SCREENING_SLUG, "Screening template already present");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Create an admin account for `email` unless one already exists.
pub fn seed_admin(users: &UserUseCase, name: &str, email: &str) -> Result<User> {
    if let Some(existing) = users.find_by_email(email)? {
        info!(user_id = %existing.id, "Admin account already present");
        return Ok(existing);
    }
    let admin = users.create(UserInput {
        name: name.to_string(),
        email: email.to_string(),
        role: Role::Admin,
        specialization: None,
        is_active: true,
    })?;
    info!(user_id = %admin.id, "Seeded admin account");
    Ok(admin)
}
