//! # API REST
//!
//! REST API implementation for the clinic backend.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, claim headers, CORS, status mapping)
//!
//! Business rules live in `clinic-core`; handlers only translate requests into service calls
//! and [`ClinicError`]s into `{"message": ...}` responses.

#![warn(rust_2018_idioms)]

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::auth::{validate_api_key, ROLE_CLAIM, SUB_CLAIM};
use api_shared::{
    require_role, AuthError, Claims, ComplaintEntry, ComplaintListRes, ConfirmationRequest,
    CreateAppointmentReq, CreateAppointmentRes, DoctorListRes, DoctorListing, DoctorProfileView,
    DoctorSearchParams, ErrorRes, HealthRes, HealthService, PostConfirmationEvent,
};
use clinic_core::repositories::complaint_catalog;
use clinic_core::{
    AppointmentService, ClinicError, CoreConfig, DirectoryService, RegistrationService, Stores,
};
use clinic_types::Role;

/// Header carrying the caller's subject identifier, set by the gateway.
pub const SUB_HEADER: &str = "x-claim-sub";
/// Header carrying the caller's role claim, set by the gateway.
pub const ROLE_HEADER: &str = "x-claim-role";
/// Header carrying the gateway API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    appointments: AppointmentService,
    registrations: RegistrationService,
    directory: DirectoryService,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>, stores: Stores) -> Self {
        Self {
            appointments: AppointmentService::new(cfg.clone(), stores.clone()),
            registrations: RegistrationService::new(cfg.clone(), stores.clone()),
            directory: DirectoryService::new(stores),
            cfg,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        create_appointment,
        post_confirmation,
        list_doctors,
        list_complaints,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        CreateAppointmentReq,
        CreateAppointmentRes,
        PostConfirmationEvent,
        ConfirmationRequest,
        DoctorListRes,
        DoctorListing,
        DoctorProfileView,
        ComplaintListRes,
        ComplaintEntry,
    ))
)]
pub struct ApiDoc;

/// Build the REST router.
///
/// `/health` and the Swagger UI are open; every other route checks the gateway API key when
/// one is configured.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/appointments", post(create_appointment))
        .route("/auth/post-confirmation", post(post_confirmation))
        .route("/doctors", get(list_doctors))
        .route("/complaints", get(list_complaints))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error response for every handler.
///
/// Client errors carry the error text; server errors are logged and answered with a generic
/// message.
#[derive(Debug)]
pub struct ApiError(ClinicError);

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        Self(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(ClinicError::Auth(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
            "internal server error".to_string()
        } else {
            tracing::debug!(status = status.as_u16(), "request rejected: {}", self.0);
            self.0.to_string()
        };
        (status, Json(ErrorRes { message })).into_response()
    }
}

/// Claims forwarded by the gateway in the `x-claim-*` headers.
pub fn claims_from_headers(headers: &HeaderMap) -> Claims {
    let mut claims = Claims::new();
    for (header, claim) in [(SUB_HEADER, SUB_CLAIM), (ROLE_HEADER, ROLE_CLAIM)] {
        if let Some(value) = headers.get(header).and_then(|v| v.to_str().ok()) {
            claims.insert(claim, value);
        }
    }
    claims
}

async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    validate_api_key(provided, state.cfg.api_key())?;
    Ok(next.run(req).await)
}

/// Parse a JSON request body; an empty body reads as `{}`.
fn parse_body<T: serde::de::DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("rejecting request body: {}", e);
        ApiError(ClinicError::validation("invalid request body"))
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/appointments",
    request_body = CreateAppointmentReq,
    responses(
        (status = 201, description = "Appointment booked", body = CreateAppointmentRes),
        (status = 400, description = "Invalid request", body = ErrorRes),
        (status = 401, description = "Missing identity", body = ErrorRes),
        (status = 403, description = "Caller is not a patient", body = ErrorRes),
        (status = 404, description = "Doctor not found", body = ErrorRes),
        (status = 409, description = "Slot already booked", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Book an appointment for the calling patient
///
/// # Errors
/// Returns the status mapped from the booking failure; see the response list.
#[axum::debug_handler]
async fn create_appointment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateAppointmentRes>), ApiError> {
    let claims = claims_from_headers(&headers);
    require_role(&claims, &[Role::Patient])?;
    let req: CreateAppointmentReq = parse_body(&body)?;

    let res = state.appointments.create(&claims, req)?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    post,
    path = "/auth/post-confirmation",
    request_body = PostConfirmationEvent,
    responses(
        (status = 200, description = "User provisioned; the event is echoed back", body = PostConfirmationEvent),
        (status = 400, description = "Missing attributes or unknown role", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Provision a user from an identity-provider confirmation event
///
/// The identity provider expects its event back unchanged, so the raw body is echoed.
#[axum::debug_handler]
async fn post_confirmation(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let raw: serde_json::Value = parse_body::<Option<serde_json::Value>>(&body)?
        .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
    let event: PostConfirmationEvent = serde_json::from_value(raw.clone())
        .map_err(|_| ApiError(ClinicError::validation("invalid request body")))?;

    state.registrations.confirm(&event)?;
    Ok(Json(raw))
}

#[utoipa::path(
    get,
    path = "/doctors",
    params(
        ("specialty" = Option<String>, Query, description = "Exact specialty"),
        ("city" = Option<String>, Query, description = "Exact city"),
        ("language" = Option<String>, Query, description = "Spoken language")
    ),
    responses(
        (status = 200, description = "Matching doctors", body = DoctorListRes),
        (status = 401, description = "Missing identity", body = ErrorRes),
        (status = 403, description = "Role not allowed", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Search the doctor directory
#[axum::debug_handler]
async fn list_doctors(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DoctorSearchParams>, QueryRejection>,
) -> Result<Json<DoctorListRes>, ApiError> {
    let Query(params) = query.map_err(|rejection| {
        tracing::debug!("rejecting doctor search query: {}", rejection);
        ClinicError::validation("invalid query parameters")
    })?;
    let claims = claims_from_headers(&headers);
    let items = state.directory.search(&claims, &params)?;
    Ok(Json(DoctorListRes { items }))
}

#[utoipa::path(
    get,
    path = "/complaints",
    responses(
        (status = 200, description = "Bookable complaints with their specialty", body = ComplaintListRes)
    )
)]
#[axum::debug_handler]
async fn list_complaints(State(state): State<AppState>) -> Json<ComplaintListRes> {
    Json(ComplaintListRes {
        items: complaint_catalog(state.cfg.allow_lists()),
    })
}
