use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::auth::{Actor, MaybeActor, Payload};
use super::AppState;
use crate::app::intake_use_case::IntakeOutcome;
use crate::app::payment_use_case::{CheckoutInput, GatewayNotification};
use crate::app::ticket_use_case::TicketInput;
use crate::domain::{
    Conditions, ConsultationTicket, ContentItem, ContentKind, FieldType, FormField,
    FormSubmission, FormTemplate, RiskLevel, TicketStatus, Transaction, Urgency,
};
use crate::engine::{Answers, Evaluation};
use crate::envelope::ApiResponse;
use crate::error::{AppError, Result};
use crate::observability;

type ApiResult<T> = Result<Json<ApiResponse<T>>>;
type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>)>;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/forms/:slug", get(show_form))
        .route("/forms/:slug/evaluate", post(evaluate))
        .route("/forms/:slug/submissions", post(submit))
        .route("/submissions", get(my_submissions))
        .route("/submissions/:id", get(show_submission))
        .route("/tickets", get(my_tickets).post(open_ticket))
        .route("/tickets/:id", get(show_ticket))
        .route("/tickets/:id/status", patch(change_ticket_status))
        .route("/tickets/:id/payments", get(ticket_payments).post(checkout))
        .route("/payments/notify", post(payment_notification))
        .route("/content/:kind", get(published_content))
}

pub(super) async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "consult_intake",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub(super) async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        observability::render(),
    )
}

#[derive(Serialize)]
struct PublicOption {
    value: String,
    label: String,
}

/// Field as shown to respondents; scoring data stays server-side
#[derive(Serialize)]
struct PublicField {
    key: String,
    label: String,
    field_type: FieldType,
    help_text: Option<String>,
    is_required: bool,
    min_value: Option<f64>,
    max_value: Option<f64>,
    conditions: Option<Conditions>,
    options: Vec<PublicOption>,
}

#[derive(Serialize)]
struct PublicForm {
    slug: String,
    name: String,
    description: Option<String>,
    version: i64,
    fields: Vec<PublicField>,
}

impl From<FormTemplate> for PublicForm {
    fn from(t: FormTemplate) -> Self {
        Self {
            slug: t.slug,
            name: t.name,
            description: t.description,
            version: t.version,
            fields: t.fields.into_iter().map(PublicField::from).collect(),
        }
    }
}

impl From<FormField> for PublicField {
    fn from(f: FormField) -> Self {
        Self {
            key: f.key,
            label: f.label,
            field_type: f.field_type,
            help_text: f.help_text,
            is_required: f.is_required,
            min_value: f.min_value,
            max_value: f.max_value,
            conditions: f.conditions,
            options: f
                .options
                .into_iter()
                .map(|o| PublicOption {
                    value: o.value,
                    label: o.label,
                })
                .collect(),
        }
    }
}

async fn show_form(State(state): State<Arc<AppState>>, Path(slug): Path<String>) -> ApiResult<PublicForm> {
    let template = state.db.get_active_template(&slug)?;
    Ok(Json(ApiResponse::ok("Form retrieved.", template.into())))
}

#[derive(Deserialize)]
struct AnswersBody {
    #[serde(default)]
    answers: Answers,
    captcha_token: Option<String>,
}

async fn evaluate(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Payload(body): Payload<AnswersBody>,
) -> ApiResult<Evaluation> {
    let evaluation = state.intake.evaluate(&slug, &body.answers)?;
    Ok(Json(ApiResponse::ok("Answers evaluated.", evaluation)))
}

#[derive(Serialize)]
struct SubmissionReceipt {
    submission_id: Uuid,
    total_risk_score: i64,
    risk_level: RiskLevel,
    urgency: Urgency,
    is_critical: bool,
    needs_expert: bool,
    crisis_alert_raised: bool,
}

impl From<IntakeOutcome> for SubmissionReceipt {
    fn from(outcome: IntakeOutcome) -> Self {
        let s = outcome.submission;
        Self {
            submission_id: s.id,
            total_risk_score: s.total_risk_score,
            risk_level: s.risk_level,
            urgency: s.urgency,
            is_critical: s.is_critical,
            needs_expert: s.needs_expert,
            crisis_alert_raised: outcome.crisis_alert.is_some(),
        }
    }
}

async fn submit(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    MaybeActor(actor): MaybeActor,
    Payload(body): Payload<AnswersBody>,
) -> Created<SubmissionReceipt> {
    let outcome = state
        .intake
        .submit(&slug, actor.as_ref(), &body.answers, body.captcha_token.as_deref())
        .await?;
    let message = if outcome.crisis_alert.is_some() {
        "Your answers have been received. Our team has been alerted and will reach out to you as soon as possible."
    } else {
        "Your answers have been received."
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(message, outcome.into()))))
}

async fn my_submissions(State(state): State<Arc<AppState>>, Actor(user): Actor) -> ApiResult<Vec<FormSubmission>> {
    let submissions = state.intake.list_own_submissions(&user)?;
    Ok(Json(ApiResponse::ok("Submissions retrieved.", submissions)))
}

async fn show_submission(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<FormSubmission> {
    let submission = state.intake.get_submission(&user, id)?;
    Ok(Json(ApiResponse::ok("Submission retrieved.", submission)))
}

#[derive(Deserialize)]
struct StatusQuery {
    status: Option<TicketStatus>,
}

async fn my_tickets(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Vec<ConsultationTicket>> {
    let tickets = state.tickets.list_for(&user, query.status)?;
    Ok(Json(ApiResponse::ok("Tickets retrieved.", tickets)))
}

async fn open_ticket(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Payload(input): Payload<TicketInput>,
) -> Created<ConsultationTicket> {
    let ticket = state.tickets.open(&user, input)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Ticket created.", ticket))))
}

async fn show_ticket(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<ConsultationTicket> {
    let ticket = state.tickets.get(&user, id)?;
    Ok(Json(ApiResponse::ok("Ticket retrieved.", ticket)))
}

#[derive(Deserialize)]
struct StatusBody {
    status: TicketStatus,
}

async fn change_ticket_status(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
    Payload(body): Payload<StatusBody>,
) -> ApiResult<ConsultationTicket> {
    let ticket = state.tickets.change_status(&user, id, body.status)?;
    Ok(Json(ApiResponse::ok("Ticket status updated.", ticket)))
}

async fn ticket_payments(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Transaction>> {
    let transactions = state.payments.list_for_ticket(&user, id)?;
    Ok(Json(ApiResponse::ok("Transactions retrieved.", transactions)))
}

async fn checkout(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Path(id): Path<Uuid>,
    Payload(input): Payload<CheckoutInput>,
) -> Created<Transaction> {
    let transaction = state.payments.checkout(&user, id, input)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Transaction created.", transaction))))
}

async fn payment_notification(
    State(state): State<Arc<AppState>>,
    Payload(notification): Payload<GatewayNotification>,
) -> ApiResult<Transaction> {
    let transaction = state.payments.handle_notification(&notification)?;
    Ok(Json(ApiResponse::ok("Notification processed.", transaction)))
}

async fn published_content(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> ApiResult<Vec<ContentItem>> {
    let kind: ContentKind = kind.parse().map_err(|_| AppError::not_found("Content type"))?;
    let items = state.content.published(kind)?;
    Ok(Json(ApiResponse::ok("Content retrieved.", items)))
}
