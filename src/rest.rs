//! REST API for Hoteluxe using Axum.
//!
//! Business endpoints always answer 200 with `{success, message?, ...}`.
//! Session checks and webhooks answer with real status codes.
//! - public: liveness, availability, room listing
//! - user: booking, my bookings, checkout, hotel registration, profile
//! - owner: dashboard, room management

mod bookings;
mod catalog;
mod users;
mod webhooks;

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::auth::{bearer_token, SessionKeys};
use crate::booking::BookingService;
use crate::config::Config;
use crate::error::AppError;
use crate::mailer::{MailError, Mailer, SmtpMailer};
use crate::media::{CloudinaryHost, MediaHost};
use crate::models::{Role, User};
use crate::payment::{PaymentGateway, StripeGateway};
use crate::storage::{Database, Storage};
use crate::users::resolve_session_user;
use crate::webhook::{SignatureError, StripeVerifier, SvixVerifier, WebhookVerifier};

pub use webhooks::WebhookError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("mail transport: {0}")]
    Mail(#[from] MailError),
    #[error("identity webhook secret: {0}")]
    WebhookSecret(#[from] SignatureError),
}

/// Shared app state for REST handlers (Arc-wrapped for concurrency)
pub struct AppState {
    pub db: Arc<Database>,
    pub bookings: BookingService,
    pub sessions: Option<SessionKeys>,
    pub media: Option<Arc<dyn MediaHost>>,
    pub payments: Option<Arc<dyn PaymentGateway>>,
    pub identity_webhook: Option<Arc<dyn WebhookVerifier>>,
    pub payment_webhook: Option<Arc<dyn WebhookVerifier>>,
    /// ISO code sent to the payment gateway, e.g. `usd`.
    pub payment_currency: String,
    /// Show infrastructure error text to clients (non-production only).
    pub expose_errors: bool,
}

impl AppState {
    /// Wire up every integration the configuration enables.
    pub fn from_config(config: &Config, db: Arc<Database>) -> Result<Self, StartupError> {
        let http = reqwest::Client::new();

        let mailer: Option<Arc<dyn Mailer>> = match &config.mail {
            Some(settings) => Some(Arc::new(SmtpMailer::new(settings)?)),
            None => {
                warn!("SMTP not configured, booking confirmations disabled");
                None
            }
        };
        let media: Option<Arc<dyn MediaHost>> = match &config.media {
            Some(settings) => Some(Arc::new(CloudinaryHost::new(http.clone(), settings.clone()))),
            None => {
                warn!("media host not configured, room image uploads disabled");
                None
            }
        };
        let payments: Option<Arc<dyn PaymentGateway>> = config
            .payment
            .secret_key
            .as_ref()
            .map(|key| Arc::new(StripeGateway::new(http.clone(), key.clone())) as Arc<dyn PaymentGateway>);
        let payment_webhook = config
            .payment
            .webhook_secret
            .as_ref()
            .map(|secret| Arc::new(StripeVerifier::new(secret.clone())) as Arc<dyn WebhookVerifier>);
        let identity_webhook = match &config.identity.webhook_secret {
            Some(secret) => Some(Arc::new(SvixVerifier::new(secret)?) as Arc<dyn WebhookVerifier>),
            None => None,
        };
        let sessions = config.identity.secret_key.as_deref().map(SessionKeys::new);
        if sessions.is_none() {
            warn!("CLERK_SECRET_KEY not set, every authenticated route will answer 401");
        }

        Ok(Self {
            bookings: BookingService::new(db.clone(), mailer, config.currency.clone()),
            db,
            sessions,
            media,
            payments,
            identity_webhook,
            payment_webhook,
            payment_currency: config.payment.currency_code.clone(),
            expose_errors: !config.environment.is_production(),
        })
    }

    /// Turn a business error into the `{success: false}` body, logging
    /// infrastructure failures.
    pub(crate) fn reject(&self, err: AppError) -> Rejection {
        if err.is_client_facing() {
            debug!(error = %err, "request rejected");
        } else {
            error!(error = %err, "request failed");
        }
        Rejection(err.public_message(self.expose_errors))
    }

    pub(crate) async fn storage(&self) -> Result<&Storage, Rejection> {
        self.db.storage().await.map_err(|e| self.reject(e.into()))
    }

    /// Unwrap a JSON body, reporting bad input as a validation failure.
    pub(crate) fn body<T>(&self, payload: Result<Json<T>, JsonRejection>) -> Result<T, Rejection> {
        payload
            .map(|Json(body)| body)
            .map_err(|rejection| self.reject(AppError::validation(rejection.body_text())))
    }
}

/// Generic REST response (JSON)
#[derive(Serialize)]
pub struct RestResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

/// Payload for message-only responses.
#[derive(Serialize)]
pub struct Empty {}

impl<T: Serialize> RestResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data,
        })
    }
}

impl RestResponse<Empty> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Self::with_message(message, Empty {})
    }
}

/// Business failure, still HTTP 200.
#[derive(Debug)]
pub struct Rejection(pub String);

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        Json(json!({ "success": false, "message": self.0 })).into_response()
    }
}

pub type RestResult<T> = Result<Json<RestResponse<T>>, Rejection>;

/// The authenticated caller, placed in request extensions by the auth layer.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

fn auth_failure(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, Response> {
    let unauthorized = || auth_failure(StatusCode::UNAUTHORIZED, "not authenticated");
    let keys = state.sessions.as_ref().ok_or_else(unauthorized)?;
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(unauthorized)?;
    let claims = keys.validate(token).map_err(|e| {
        debug!(error = %e, "session token rejected");
        unauthorized()
    })?;

    let storage = state.db.storage().await.map_err(|e| {
        error!(error = %e, "store unavailable during authentication");
        auth_failure(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong, please try again later")
    })?;
    resolve_session_user(storage, &claims).map_err(|e| {
        error!(error = %e, user = %claims.sub, "could not resolve session user");
        auth_failure(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong, please try again later")
    })
}

async fn require_user(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    match authenticate(&state, req.headers()).await {
        Ok(user) => {
            req.extensions_mut().insert(CurrentUser(user));
            next.run(req).await
        }
        Err(response) => response,
    }
}

async fn require_owner(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    match authenticate(&state, req.headers()).await {
        Ok(user) if user.role == Role::HotelOwner => {
            req.extensions_mut().insert(CurrentUser(user));
            next.run(req).await
        }
        Ok(user) => {
            debug!(user = %user.id, "owner route refused");
            auth_failure(StatusCode::FORBIDDEN, "not authorized")
        }
        Err(response) => response,
    }
}

async fn health_handler() -> &'static str {
    "API is working"
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.and_then(|o| HeaderValue::from_str(o).ok()) {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(Any),
    }
}

/// Request body cap for room creation, which carries image files.
pub const ROOM_UPLOAD_LIMIT: usize = 25 * 1024 * 1024;

/// Create the Axum router with every API endpoint.
pub fn create_router(state: Arc<AppState>, cors_origin: Option<&str>) -> Router {
    let user_routes = Router::new()
        .route("/api/bookings/book", post(bookings::book_handler))
        .route("/api/bookings/user", get(bookings::user_bookings_handler))
        .route("/api/bookings/stripe-payment", post(bookings::checkout_handler))
        .route("/api/hotels", post(catalog::register_hotel_handler))
        .route("/api/user", get(users::profile_handler))
        .route("/api/user/store-recent-search", post(users::recent_search_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    let owner_routes = Router::new()
        .route("/api/bookings/hotel", get(bookings::dashboard_handler))
        .route(
            "/api/rooms",
            post(catalog::create_room_handler).layer(DefaultBodyLimit::max(ROOM_UPLOAD_LIMIT)),
        )
        .route("/api/rooms/owner", get(catalog::owner_rooms_handler))
        .route("/api/rooms/toggle-availability", post(catalog::toggle_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_owner));

    Router::new()
        .route("/", get(health_handler))
        .route("/api/index", get(health_handler))
        .route("/api/bookings/check-availability", post(bookings::availability_handler))
        .route("/api/rooms", get(catalog::list_rooms_handler))
        .route("/api/clerk", post(webhooks::identity_handler))
        .route("/api/stripe", post(webhooks::payment_handler))
        .merge(user_routes)
        .merge(owner_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin))
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn liveness_answers_plain_text() {
        let response = create_router(state(), None)
            .oneshot(HttpRequest::builder().uri("/api/index").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"API is working");
    }

    #[tokio::test]
    async fn user_routes_need_a_valid_session() {
        let state = state();
        let (status, body) = send(&state, get_request("/api/bookings/user", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"success": false, "message": "not authenticated"}));

        let forged = HttpRequest::builder()
            .uri("/api/user")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&state, forged).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn owner_routes_refuse_plain_users() {
        let state = state();
        let (status, _) = send(&state, get_request("/api/bookings/hotel", Some("guest"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // the public listing shares its path with the owner-only create
        let (status, body) = send(&state, get_request("/api/rooms", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn bad_json_is_a_business_failure() {
        let state = state();
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/api/bookings/check-availability")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }

    #[test]
    fn responses_flatten_their_payload() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Availability {
            is_available: bool,
        }
        let Json(body) = RestResponse::ok(Availability { is_available: true });
        assert_eq!(serde_json::to_value(body).unwrap(), json!({"success": true, "isAvailable": true}));

        let Json(body) = RestResponse::message("New City added");
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({"success": true, "message": "New City added"})
        );
    }
}
