use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::services::{
    ActivityCoordinator, ActivityLifecycle, MockPushService, NotificationDispatcher, PushService,
    TokenProvider,
};
use domain::stores::{AlertStore, DeviceTokenStore, UserStore};
use shared::jwt::TokenSigner;

use crate::config::Config;
use crate::error::ApiError;
use crate::middleware::require_session;
use crate::routes::{activities, alerts, auth, devices, health};
use crate::services::{HttpPushService, SignerIdentityBackend};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ActivityCoordinator>,
    pub token_provider: Arc<TokenProvider>,
    pub alerts: Arc<dyn AlertStore>,
    pub users: Arc<dyn UserStore>,
    pub device_tokens: Arc<dyn DeviceTokenStore>,
    pub signer: Arc<TokenSigner>,
    pub pool: Option<PgPool>,
    pub config: Arc<Config>,
}

/// Wires PostgreSQL stores and the push transport into an [`AppState`].
pub fn build_state(config: Config, pool: PgPool) -> anyhow::Result<AppState> {
    let signer = Arc::new(build_signer(&config)?);

    let activities = Arc::new(persistence::repositories::PgActivityStore::new(pool.clone()));
    let participations = Arc::new(persistence::repositories::PgParticipationStore::new(
        pool.clone(),
    ));
    let alert_store: Arc<dyn AlertStore> =
        Arc::new(persistence::repositories::PgAlertStore::new(pool.clone()));
    let device_tokens: Arc<dyn DeviceTokenStore> = Arc::new(
        persistence::repositories::PgDeviceTokenStore::new(pool.clone()),
    );
    let users: Arc<dyn UserStore> =
        Arc::new(persistence::repositories::PgUserStore::new(pool.clone()));

    let push: Arc<dyn PushService> = if config.push.enabled {
        Arc::new(
            HttpPushService::new(config.push.clone())
                .map_err(|e| anyhow::anyhow!("push transport: {}", e))?,
        )
    } else {
        tracing::info!("Push delivery disabled, using mock transport");
        Arc::new(MockPushService::new())
    };

    let lifecycle = ActivityLifecycle::new(activities, participations);
    let dispatcher = NotificationDispatcher::new(alert_store.clone(), device_tokens.clone(), push);
    let coordinator = Arc::new(ActivityCoordinator::new(
        lifecycle,
        dispatcher,
        alert_store.clone(),
    ));

    let backend = Arc::new(SignerIdentityBackend::new(signer.clone()));
    let token_provider = Arc::new(TokenProvider::new(backend));

    Ok(AppState {
        coordinator,
        token_provider,
        alerts: alert_store,
        users,
        device_tokens,
        signer,
        pool: Some(pool),
        config: Arc::new(config),
    })
}

fn build_signer(config: &Config) -> Result<TokenSigner, anyhow::Error> {
    let auth = &config.auth;
    if !auth.private_key.is_empty() && !auth.public_key.is_empty() {
        TokenSigner::from_rsa_pem(&auth.private_key, &auth.public_key, auth.token_expiry_secs)
            .map_err(|e| anyhow::anyhow!("session signer: {}", e))
    } else {
        tracing::warn!("No RSA key pair configured, signing session tokens with HS256 secret");
        Ok(TokenSigner::from_secret(
            &auth.secret,
            auth.token_expiry_secs,
        ))
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Protected routes (require a session token)
    let protected_routes = Router::new()
        // Session
        .route("/api/v1/auth/refresh", post(auth::refresh_session))
        // Activity lifecycle
        .route("/api/v1/activities", post(activities::create_activity))
        .route(
            "/api/v1/activities/:activity_id",
            patch(activities::update_activity),
        )
        .route(
            "/api/v1/activities/:activity_id",
            delete(activities::cancel_activity),
        )
        .route(
            "/api/v1/activities/:activity_id/status",
            post(activities::set_status),
        )
        // Participation workflow
        .route(
            "/api/v1/activities/:activity_id/join",
            post(activities::request_join),
        )
        .route(
            "/api/v1/activities/:activity_id/join",
            delete(activities::cancel_request),
        )
        .route(
            "/api/v1/activities/:activity_id/leave",
            post(activities::leave),
        )
        .route(
            "/api/v1/activities/:activity_id/participants/:user_id/decision",
            post(activities::decide),
        )
        .route(
            "/api/v1/activities/:activity_id/participants/:user_id",
            delete(activities::remove_participant),
        )
        // Alert feed
        .route("/api/v1/user/alerts", get(alerts::list_alerts))
        .route("/api/v1/user/alerts", delete(alerts::delete_all_alerts))
        .route("/api/v1/user/alerts/count", get(alerts::unread_count))
        .route("/api/v1/user/alerts/read-all", post(alerts::mark_all_read))
        .route("/api/v1/user/alerts/:alert_id/read", post(alerts::mark_read))
        .route(
            "/api/v1/user/alerts/:alert_id",
            delete(alerts::delete_alert),
        )
        // Device registration
        .route("/api/v1/devices/push-token", post(devices::register_push_token))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/live", get(health::live))
        .route("/api/health/ready", get(health::ready))
        .route("/api/v1/auth/session", post(auth::create_session));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(cors)
        .with_state(state)
}

/// Resolves the session's user profile for use as the acting user.
pub(crate) async fn current_user(
    state: &AppState,
    session: &domain::models::Session,
) -> Result<domain::models::User, ApiError> {
    state.users.get(session.user_id).await.map_err(|e| match e {
        domain::error::StateError::NotFound(_) => {
            ApiError::Unauthorized("unknown session user".into())
        }
        other => other.into(),
    })
}
