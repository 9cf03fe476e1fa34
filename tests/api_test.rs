use anyhow::Result;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use consult_intake::app::user_use_case::UserInput;
use consult_intake::config::Config;
use consult_intake::domain::payments::gateway_signature;
use consult_intake::domain::Role;
use consult_intake::server::{create_router, AppState};
use consult_intake::storage::Database;

const SERVER_KEY: &str = "test-server-key";

struct TestApp {
    router: Router,
    admin: Uuid,
    client: Uuid,
}

impl TestApp {
    fn new() -> Result<Self> {
        let mut config = Config::default();
        config.payment.server_key = SERVER_KEY.to_string();
        let db = Arc::new(Database::open_in_memory()?);
        let state = Arc::new(AppState::new(&config, db)?);

        let admin = state.users.create(user("admin@example.org", Role::Admin))?.id;
        let client = state.users.create(user("client@example.org", Role::Client))?.id;
        Ok(Self {
            router: create_router(state, &[]),
            admin,
            client,
        })
    }

    async fn send(&self, method: Method, uri: &str, actor: Option<Uuid>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            request = request.header("x-user-id", actor.to_string());
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create_screening(&self) -> Value {
        let (status, body) = self
            .send(Method::POST, "/admin/forms", Some(self.admin), Some(screening()))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }
}

fn user(email: &str, role: Role) -> UserInput {
    UserInput {
        name: email.split('@').next().unwrap_or("user").to_string(),
        email: email.to_string(),
        role,
        specialization: None,
        is_active: true,
    }
}

fn screening() -> Value {
    json!({
        "slug": "screening",
        "name": "Screening",
        "category": "screening",
        "fields": [
            { "key": "full_name", "label": "Full name", "field_type": "text", "is_required": true, "is_core": true },
            { "key": "mood", "label": "Mood", "field_type": "radio", "is_required": true,
              "options": [
                  { "value": "good", "label": "Good", "risk_score": 0 },
                  { "value": "low", "label": "Low", "risk_score": 6 }
              ] },
            { "key": "self_harm", "label": "Thoughts of self-harm", "field_type": "yes_no",
              "is_required": true, "is_critical_indicator": true, "risk_weight": 10 },
            { "key": "plan", "label": "Plan details", "field_type": "textarea", "is_required": true,
              "conditions": { "match": "all", "rules": [ { "field": "self_harm", "operator": "equals", "value": true } ] } }
        ]
    })
}

#[tokio::test]
async fn health_and_metrics_are_public() {
    let app = TestApp::new().unwrap();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = app.send(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_require_an_admin() {
    let app = TestApp::new().unwrap();
    let (status, body) = app.send(Method::GET, "/admin/forms", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app.send(Method::GET, "/admin/forms", Some(app.client), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send(Method::GET, "/admin/forms", Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.send(Method::GET, "/admin/forms", Some(app.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn hidden_fields_are_neither_required_nor_scored() {
    let app = TestApp::new().unwrap();
    app.create_screening().await;

    let answers = json!({ "answers": {
        "full_name": "Aisyah", "mood": "low", "self_harm": "no", "plan": "should be dropped"
    }});
    let (status, body) = app
        .send(Method::POST, "/api/v1/forms/screening/evaluate", None, Some(answers))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["total_risk_score"], 6);
    assert_eq!(body["data"]["visible_fields"], json!(["full_name", "mood", "self_harm"]));

    // once visible, the follow-up becomes required
    let answers = json!({ "answers": { "full_name": "Aisyah", "mood": "low", "self_harm": "yes" }});
    let (status, body) = app
        .send(Method::POST, "/api/v1/forms/screening/evaluate", None, Some(answers))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["plan"], json!(["Plan details is required."]));
}

#[tokio::test]
async fn critical_submission_flows_through_the_alert_workflow() {
    let app = TestApp::new().unwrap();
    app.create_screening().await;

    let answers = json!({ "answers": {
        "full_name": "Aisyah", "mood": "good", "self_harm": true, "plan": "I have thought about it"
    }});
    let (status, body) = app
        .send(Method::POST, "/api/v1/forms/screening/submissions", Some(app.client), Some(answers))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["is_critical"], true);
    assert_eq!(body["data"]["urgency"], "immediate");
    assert_eq!(body["data"]["crisis_alert_raised"], true);

    let (_, alerts) = app
        .send(Method::GET, "/admin/crisis-alerts?status=pending", Some(app.admin), None)
        .await;
    let alerts = alerts["data"].as_array().unwrap().clone();
    assert_eq!(alerts.len(), 1);
    let alert_id = alerts[0]["id"].as_str().unwrap().to_string();

    let ack = format!("/admin/crisis-alerts/{alert_id}/acknowledge");
    let resolve = format!("/admin/crisis-alerts/{alert_id}/resolve");

    let (status, body) = app.send(Method::POST, &ack, Some(app.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "acknowledged");

    let (status, _) = app.send(Method::POST, &ack, Some(app.admin), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = app
        .send(Method::POST, &resolve, Some(app.admin), Some(json!({ "resolution_notes": "" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["resolution_notes"].is_array());

    let (status, body) = app
        .send(Method::POST, &resolve, Some(app.admin), Some(json!({ "resolution_notes": "Referred to practitioner" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "resolved");
}

#[tokio::test]
async fn template_with_submissions_cannot_be_deleted() {
    let app = TestApp::new().unwrap();
    let template = app.create_screening().await;
    let uri = format!("/admin/forms/{}", template["id"].as_str().unwrap());

    let answers = json!({ "answers": { "full_name": "Aisyah", "mood": "good", "self_harm": false }});
    let (status, _) = app
        .send(Method::POST, "/api/v1/forms/screening/submissions", None, Some(answers))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.send(Method::DELETE, &uri, Some(app.admin), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);

    let (status, _) = app.send(Method::GET, &uri, Some(app.admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn fields_can_be_reordered_but_core_fields_are_locked() {
    let app = TestApp::new().unwrap();
    let template = app.create_screening().await;
    let id = template["id"].as_str().unwrap();
    let ids: Vec<String> = template["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap().to_string())
        .collect();

    let reversed: Vec<&String> = ids.iter().rev().collect();
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/admin/forms/{id}/reorder"),
            Some(app.admin),
            Some(json!({ "field_ids": reversed })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (_, stored) = app.send(Method::GET, &format!("/admin/forms/{id}"), Some(app.admin), None).await;
    let keys: Vec<&str> = stored["data"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["plan", "self_harm", "mood", "full_name"]);
    assert_eq!(stored["data"]["fields"][0]["sort_order"], 1);

    let core_uri = format!("/admin/forms/{id}/fields/{}", ids[0]);
    let edit = json!({ "key": "full_name", "label": "Name", "field_type": "text" });
    let (status, _) = app.send(Method::PUT, &core_uri, Some(app.admin), Some(edit)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(Method::DELETE, &core_uri, Some(app.admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn payment_notifications_are_signed_and_paid_is_final() {
    let app = TestApp::new().unwrap();
    let (status, ticket) = app
        .send(Method::POST, "/api/v1/tickets", Some(app.client), Some(json!({ "subject": "First session" })))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{ticket}");
    let ticket_id = ticket["data"]["id"].as_str().unwrap().to_string();

    let (status, tx) = app
        .send(
            Method::POST,
            &format!("/api/v1/tickets/{ticket_id}/payments"),
            Some(app.client),
            Some(json!({ "amount": 250000 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{tx}");
    let order_id = tx["data"]["order_id"].as_str().unwrap().to_string();

    let notify = |status: &str, signature: String| {
        json!({
            "order_id": order_id,
            "status_code": "200",
            "gross_amount": "250000.00",
            "transaction_status": status,
            "signature_key": signature,
        })
    };
    let valid = gateway_signature(&order_id, "200", "250000.00", SERVER_KEY);

    let (status, _) = app
        .send(Method::POST, "/api/v1/payments/notify", None, Some(notify("settlement", "0".repeat(128))))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::POST, "/api/v1/payments/notify", None, Some(notify("settlement", valid.clone())))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "paid");

    let (_, body) = app
        .send(Method::POST, "/api/v1/payments/notify", None, Some(notify("expire", valid)))
        .await;
    assert_eq!(body["data"]["status"], "paid");

    let (_, ticket) = app
        .send(Method::GET, &format!("/api/v1/tickets/{ticket_id}"), Some(app.client), None)
        .await;
    assert_eq!(ticket["data"]["is_paid"], true);
}

#[tokio::test]
async fn malformed_json_uses_the_envelope() {
    let app = TestApp::new().unwrap();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/tickets")
        .header("x-user-id", app.client.to_string())
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["errors"]["body"].is_array());
}
