use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::auth::{Admin, Payload};
use super::AppState;
use crate::app::content_use_case::{ContentInput, ContentUpdate};
use crate::app::form_admin_use_case::{FieldInput, TemplateInput, TemplateUpdate};
use crate::app::user_use_case::{UserInput, UserUpdate};
use crate::domain::{
    AlertStatus, ConsultationTicket, ContentItem, ContentKind, CrisisAlert, FormField,
    FormSubmission, FormTemplate, RiskLevel, Role, TemplateCategory, TicketStatus, User,
};
use crate::envelope::ApiResponse;
use crate::error::Result;
use crate::storage::{SubmissionFilter, TicketFilter};

type ApiResult<T> = Result<Json<ApiResponse<T>>>;
type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>)>;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        // form templates
        .route("/forms", get(list_forms).post(create_form))
        .route("/forms/:id", get(show_form).patch(update_form).delete(delete_form))
        .route("/forms/:id/versions", post(new_version))
        .route("/forms/:id/activate", post(activate_form))
        .route("/forms/:id/deactivate", post(deactivate_form))
        .route("/forms/:id/fields", post(add_field))
        .route("/forms/:id/fields/:field_id", put(update_field).delete(delete_field))
        .route("/forms/:id/reorder", post(reorder_fields))
        // intake review
        .route("/submissions", get(list_submissions))
        .route("/submissions/:id", get(show_submission))
        .route("/crisis-alerts", get(list_alerts))
        .route("/crisis-alerts/:id", get(show_alert))
        .route("/crisis-alerts/:id/acknowledge", post(acknowledge_alert))
        .route("/crisis-alerts/:id/resolve", post(resolve_alert))
        // consultations
        .route("/tickets", get(list_tickets))
        .route("/tickets/:id/assign", post(assign_ticket))
        // accounts and content
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(show_user).patch(update_user).delete(delete_user))
        .route("/content", get(list_content).post(create_content))
        .route("/content/:id", get(show_content).patch(update_content).delete(delete_content))
}

#[derive(Deserialize)]
struct FormQuery {
    category: Option<TemplateCategory>,
    active: Option<bool>,
}

async fn list_forms(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Query(q): Query<FormQuery>,
) -> ApiResult<Vec<FormTemplate>> {
    let templates = state.db.list_templates(q.category, q.active)?;
    Ok(Json(ApiResponse::ok("Form templates retrieved.", templates)))
}

async fn create_form(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Payload(input): Payload<TemplateInput>,
) -> Created<FormTemplate> {
    let template = state.forms.create_template(input)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Form template created.", template))))
}

async fn show_form(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path(id): Path<Uuid>,
) -> ApiResult<FormTemplate> {
    Ok(Json(ApiResponse::ok("Form template retrieved.", state.db.get_template(id)?)))
}

async fn update_form(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path(id): Path<Uuid>,
    Payload(update): Payload<TemplateUpdate>,
) -> ApiResult<FormTemplate> {
    let template = state.forms.update_template(id, update)?;
    Ok(Json(ApiResponse::ok("Form template updated.", template)))
}

async fn delete_form(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    state.forms.delete_template(id)?;
    Ok(Json(ApiResponse::done("Form template deleted.")))
}

async fn new_version(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path(id): Path<Uuid>,
) -> Created<FormTemplate> {
    let template = state.forms.new_version(id)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("New form version created.", template))))
}

async fn activate_form(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path(id): Path<Uuid>,
) -> ApiResult<FormTemplate> {
    let update = TemplateUpdate {
        is_active: Some(true),
        ..TemplateUpdate::default()
    };
    Ok(Json(ApiResponse::ok("Form template activated.", state.forms.update_template(id, update)?)))
}

async fn deactivate_form(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path(id): Path<Uuid>,
) -> ApiResult<FormTemplate> {
    let update = TemplateUpdate {
        is_active: Some(false),
        ..TemplateUpdate::default()
    };
    Ok(Json(ApiResponse::ok("Form template deactivated.", state.forms.update_template(id, update)?)))
}

async fn add_field(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path(id): Path<Uuid>,
    Payload(input): Payload<FieldInput>,
) -> Created<FormField> {
    let field = state.forms.add_field(id, input)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Field added.", field))))
}

async fn update_field(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path((id, field_id)): Path<(Uuid, Uuid)>,
    Payload(input): Payload<FieldInput>,
) -> ApiResult<FormField> {
    let field = state.forms.update_field(id, field_id, input)?;
    Ok(Json(ApiResponse::ok("Field updated.", field)))
}

async fn delete_field(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path((id, field_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<()>>> {
    state.forms.delete_field(id, field_id)?;
    Ok(Json(ApiResponse::done("Field deleted.")))
}

#[derive(Deserialize)]
struct ReorderBody {
    field_ids: Vec<Uuid>,
}

async fn reorder_fields(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path(id): Path<Uuid>,
    Payload(body): Payload<ReorderBody>,
) -> ApiResult<FormTemplate> {
    let template = state.forms.reorder_fields(id, &body.field_ids)?;
    Ok(Json(ApiResponse::ok("Fields reordered.", template)))
}

#[derive(Deserialize)]
struct SubmissionQuery {
    template_id: Option<Uuid>,
    risk_level: Option<RiskLevel>,
    #[serde(default)]
    critical: bool,
}

async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Query(q): Query<SubmissionQuery>,
) -> ApiResult<Vec<FormSubmission>> {
    let filter = SubmissionFilter {
        template_id: q.template_id,
        user_id: None,
        risk_level: q.risk_level,
        critical_only: q.critical,
    };
    Ok(Json(ApiResponse::ok("Submissions retrieved.", state.intake.list_submissions(&filter)?)))
}

async fn show_submission(
    State(state): State<Arc<AppState>>,
    Admin(admin): Admin,
    Path(id): Path<Uuid>,
) -> ApiResult<FormSubmission> {
    Ok(Json(ApiResponse::ok("Submission retrieved.", state.intake.get_submission(&admin, id)?)))
}

#[derive(Deserialize)]
struct AlertQuery {
    status: Option<AlertStatus>,
}

async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Query(q): Query<AlertQuery>,
) -> ApiResult<Vec<CrisisAlert>> {
    Ok(Json(ApiResponse::ok("Crisis alerts retrieved.", state.crisis.list(q.status)?)))
}

async fn show_alert(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path(id): Path<Uuid>,
) -> ApiResult<CrisisAlert> {
    Ok(Json(ApiResponse::ok("Crisis alert retrieved.", state.crisis.get(id)?)))
}

async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Admin(admin): Admin,
    Path(id): Path<Uuid>,
) -> ApiResult<CrisisAlert> {
    Ok(Json(ApiResponse::ok("Crisis alert acknowledged.", state.crisis.acknowledge(&admin, id)?)))
}

#[derive(Deserialize)]
struct ResolveBody {
    #[serde(default)]
    resolution_notes: String,
}

async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Admin(admin): Admin,
    Path(id): Path<Uuid>,
    Payload(body): Payload<ResolveBody>,
) -> ApiResult<CrisisAlert> {
    let alert = state.crisis.resolve(&admin, id, &body.resolution_notes)?;
    Ok(Json(ApiResponse::ok("Crisis alert resolved.", alert)))
}

#[derive(Deserialize)]
struct TicketQuery {
    status: Option<TicketStatus>,
    consultant_id: Option<Uuid>,
    client_id: Option<Uuid>,
}

async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Query(q): Query<TicketQuery>,
) -> ApiResult<Vec<ConsultationTicket>> {
    let filter = TicketFilter {
        client_id: q.client_id,
        consultant_id: q.consultant_id,
        status: q.status,
    };
    Ok(Json(ApiResponse::ok("Tickets retrieved.", state.tickets.list(&filter)?)))
}

#[derive(Deserialize)]
struct AssignBody {
    consultant_id: Uuid,
}

async fn assign_ticket(
    State(state): State<Arc<AppState>>,
    Admin(admin): Admin,
    Path(id): Path<Uuid>,
    Payload(body): Payload<AssignBody>,
) -> ApiResult<ConsultationTicket> {
    let ticket = state.tickets.assign(&admin, id, body.consultant_id)?;
    Ok(Json(ApiResponse::ok("Ticket assigned.", ticket)))
}

#[derive(Deserialize)]
struct UserQuery {
    role: Option<Role>,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Query(q): Query<UserQuery>,
) -> ApiResult<Vec<User>> {
    Ok(Json(ApiResponse::ok("Users retrieved.", state.users.list(q.role)?)))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Payload(input): Payload<UserInput>,
) -> Created<User> {
    let user = state.users.create(input)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("User created.", user))))
}

async fn show_user(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path(id): Path<Uuid>,
) -> ApiResult<User> {
    Ok(Json(ApiResponse::ok("User retrieved.", state.users.get(id)?)))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path(id): Path<Uuid>,
    Payload(update): Payload<UserUpdate>,
) -> ApiResult<User> {
    Ok(Json(ApiResponse::ok("User updated.", state.users.update(id, update)?)))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Admin(admin): Admin,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    state.users.delete(&admin, id)?;
    Ok(Json(ApiResponse::done("User deleted.")))
}

#[derive(Deserialize)]
struct ContentQuery {
    kind: Option<ContentKind>,
}

async fn list_content(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Query(q): Query<ContentQuery>,
) -> ApiResult<Vec<ContentItem>> {
    let items = state.content.list(q.kind)?;
    Ok(Json(ApiResponse::ok("Content retrieved.", items)))
}

async fn create_content(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Payload(input): Payload<ContentInput>,
) -> Created<ContentItem> {
    let item = state.content.create(input)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Content created.", item))))
}

async fn show_content(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path(id): Path<Uuid>,
) -> ApiResult<ContentItem> {
    Ok(Json(ApiResponse::ok("Content retrieved.", state.content.get(id)?)))
}

async fn update_content(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path(id): Path<Uuid>,
    Payload(update): Payload<ContentUpdate>,
) -> ApiResult<ContentItem> {
    Ok(Json(ApiResponse::ok("Content updated.", state.content.update(id, update)?)))
}

async fn delete_content(
    State(state): State<Arc<AppState>>,
    Admin(_): Admin,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    state.content.delete(id)?;
    Ok(Json(ApiResponse::done("Content deleted.")))
}
