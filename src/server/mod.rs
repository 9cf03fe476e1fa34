//! HTTP surface: public/client API under `/api/v1`, admin API under `/admin`.

mod admin;
pub mod auth;
mod public;

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::content_use_case::ContentUseCase;
use crate::app::crisis_use_case::CrisisUseCase;
use crate::app::form_admin_use_case::FormAdminUseCase;
use crate::app::intake_use_case::IntakeUseCase;
use crate::app::payment_use_case::PaymentUseCase;
use crate::app::ports::{CaptchaVerifier, CrisisNotifier};
use crate::app::ticket_use_case::TicketUseCase;
use crate::app::user_use_case::UserUseCase;
use crate::config::Config;
use crate::error::Result;
use crate::infra::{captcha, notifier};
use crate::storage::Database;

pub struct AppState {
    pub db: Arc<Database>,
    pub users: UserUseCase,
    pub forms: FormAdminUseCase,
    pub intake: IntakeUseCase,
    pub crisis: CrisisUseCase,
    pub tickets: TicketUseCase,
    pub payments: PaymentUseCase,
    pub content: ContentUseCase,
}

impl AppState {
    /// Wire use cases with the adapters selected by `config`.
    pub fn new(config: &Config, db: Arc<Database>) -> Result<Self> {
        Ok(Self::with_ports(
            config,
            db,
            captcha::from_config(&config.recaptcha)?,
            notifier::from_config(&config.notifications)?,
        ))
    }

    pub fn with_ports(
        config: &Config,
        db: Arc<Database>,
        captcha: Arc<dyn CaptchaVerifier>,
        notifier: Arc<dyn CrisisNotifier>,
    ) -> Self {
        Self {
            users: UserUseCase::new(db.clone()),
            forms: FormAdminUseCase::new(db.clone()),
            intake: IntakeUseCase::new(db.clone(), captcha, notifier, config.risk),
            crisis: CrisisUseCase::new(db.clone()),
            tickets: TicketUseCase::new(db.clone()),
            payments: PaymentUseCase::new(db.clone(), config.payment.clone()),
            content: ContentUseCase::new(db.clone()),
            db,
        }
    }
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static(auth::USER_HEADER),
        ]);
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Build the router with every route.
pub fn create_router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(public::health))
        .route("/metrics", get(public::metrics))
        .nest("/api/v1", public::routes())
        .nest("/admin", admin::routes())
        .layer(cors(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the process is stopped.
pub async fn start_server(config: &Config, db: Arc<Database>) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config, db)?);
    let app = create_router(state, &config.server.allowed_origins);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on http://{}", addr);
    info!("Health check: http://localhost:{}/health", config.server.port);

    axum::serve(listener, app).await?;
    Ok(())
}
