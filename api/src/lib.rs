use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json as JsonResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use application::{
    ApplicationError, AuthResponse, AuthService, ContactRequest, ContactService, ListingService,
    MessageResponse, SearchService, StatsService, Storage,
};
use domain::{Credentials, DomainError, FieldError};

pub mod config;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    auth_service: Arc<AuthService>,
    listing_service: Arc<ListingService>,
    search_service: Arc<SearchService>,
    contact_service: Arc<ContactService>,
    stats_service: Arc<StatsService>,
}

impl AppState {
    /// Wires every service to the given storage backend.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            auth_service: Arc::new(AuthService::new(storage.clone())),
            listing_service: Arc::new(ListingService::new(storage.clone())),
            search_service: Arc::new(SearchService::new(storage.clone())),
            contact_service: Arc::new(ContactService::new()),
            stats_service: Arc::new(StatsService::new(storage)),
        }
    }
}

// --- API Router Definition ---

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Auth Endpoints
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/signup", post(signup_handler))
        // Listing Endpoints
        .route(
            "/api/listings",
            get(list_listings_handler).post(create_listing_handler),
        )
        .route("/api/listings/search/:query", get(search_listings_handler))
        .route(
            "/api/listings/:id",
            get(get_listing_handler)
                .put(update_listing_handler)
                .delete(delete_listing_handler),
        )
        .route("/api/contact", post(contact_handler))
        .route("/api/stats", get(get_stats_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// --- API Handlers ---

async fn health_check() -> impl IntoResponse {
    info!("Health check endpoint called");
    (StatusCode::OK, "OK")
}

// --- Auth Handlers ---

/// Handler for logging in (POST /api/auth/login).
async fn login_handler(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    let credentials = match payload {
        Ok(Json(credentials)) => credentials,
        Err(rejection) => return map_rejection_to_response(rejection),
    };
    match state.auth_service.login(credentials).await {
        Ok(user) => (StatusCode::OK, JsonResponse(AuthResponse { user })).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for creating an account (POST /api/auth/signup).
async fn signup_handler(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    let credentials = match payload {
        Ok(Json(credentials)) => credentials,
        Err(rejection) => return map_rejection_to_response(rejection),
    };
    match state.auth_service.signup(credentials).await {
        Ok(user) => (StatusCode::CREATED, JsonResponse(AuthResponse { user })).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

// --- Listing Handlers ---

/// Handler for listing the catalog (GET /api/listings).
async fn list_listings_handler(State(state): State<AppState>) -> Response {
    info!("Received request to list listings");
    match state.listing_service.list_listings().await {
        Ok(listings) => (StatusCode::OK, JsonResponse(listings)).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for a single listing (GET /api/listings/:id).
async fn get_listing_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    info!(listing_id = %id, "Received request to get listing");
    match state.listing_service.get_listing(&id).await {
        Ok(listing) => (StatusCode::OK, JsonResponse(listing)).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for free-text search (GET /api/listings/search/:query).
///
/// A query that is empty after trimming is answered with 400.
async fn search_listings_handler(
    State(state): State<AppState>,
    Path(query): Path<String>,
) -> Response {
    info!(query = %query, "Received search request");
    match state.search_service.search_listings(&query).await {
        Ok(listings) => (StatusCode::OK, JsonResponse(listings)).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for creating a listing (POST /api/listings).
///
/// The body is taken as raw JSON so the schema check can report every field error.
async fn create_listing_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return map_rejection_to_response(rejection),
    };
    match state.listing_service.create_listing(payload).await {
        Ok(listing) => {
            info!(listing_id = %listing.id, "Listing created via handler");
            (StatusCode::CREATED, JsonResponse(listing)).into_response()
        }
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for a partial update (PUT /api/listings/:id).
async fn update_listing_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return map_rejection_to_response(rejection),
    };
    match state.listing_service.update_listing(&id, payload).await {
        Ok(listing) => (StatusCode::OK, JsonResponse(listing)).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for deleting a listing (DELETE /api/listings/:id).
async fn delete_listing_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.listing_service.delete_listing(&id).await {
        Ok(()) => (
            StatusCode::OK,
            JsonResponse(MessageResponse::new("Listing deleted successfully")),
        )
            .into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

// --- Contact & Stats Handlers ---

/// Handler for the contact form (POST /api/contact).
async fn contact_handler(
    State(state): State<AppState>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return map_rejection_to_response(rejection),
    };
    match state.contact_service.submit(request) {
        Ok(()) => (
            StatusCode::OK,
            JsonResponse(MessageResponse::new("Contact form submitted successfully")),
        )
            .into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

async fn get_stats_handler(State(state): State<AppState>) -> Response {
    info!("Received request to get statistics");
    match state.stats_service.get_stats().await {
        Ok(stats_response) => (StatusCode::OK, JsonResponse(stats_response)).into_response(),
        Err(e) => {
            error!("Failed to get statistics via handler: {}", e);
            map_application_error_to_response(e)
        }
    }
}

// --- Error Mapping ---

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        message: message.into(),
        errors: None,
    };
    (status, JsonResponse(body)).into_response()
}

/// Any body the JSON extractor refuses (bad syntax, wrong shape, missing content type) is a 400.
fn map_rejection_to_response(rejection: JsonRejection) -> Response {
    warn!("Rejected request body: {}", rejection.body_text());
    error_response(StatusCode::BAD_REQUEST, rejection.body_text())
}

/// Maps ApplicationError to an HTTP status code and a `{message}` body.
fn map_application_error_to_response(err: ApplicationError) -> Response {
    match err {
        ApplicationError::InvalidInput(msg) => error_response(StatusCode::BAD_REQUEST, msg),
        ApplicationError::DomainError(DomainError::Validation(validation)) => {
            warn!("Listing validation failed: {}", validation);
            let body = ErrorBody {
                message: "Invalid listing data".to_string(),
                errors: Some(validation.errors),
            };
            (StatusCode::BAD_REQUEST, JsonResponse(body)).into_response()
        }
        ApplicationError::DomainError(DomainError::MissingField(field)) => {
            warn!(field = %field, "Credentials missing a field");
            error_response(StatusCode::BAD_REQUEST, "Username and password required")
        }
        ApplicationError::DomainError(domain_err) => {
            warn!("Domain validation failed: {}", domain_err);
            error_response(StatusCode::BAD_REQUEST, domain_err.to_string())
        }
        ApplicationError::InvalidCredentials => {
            error_response(StatusCode::UNAUTHORIZED, "Invalid credentials")
        }
        ApplicationError::NotFound(_) => error_response(StatusCode::NOT_FOUND, "Listing not found"),
        ApplicationError::UsernameTaken(_) => {
            error_response(StatusCode::CONFLICT, "Username already exists")
        }
        ApplicationError::InfrastructureError(msg) => {
            error!("Underlying infrastructure error: {}", msg);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_errors_hide_their_cause() {
        let response = map_application_error_to_response(ApplicationError::InfrastructureError(
            "connection refused to 10.0.0.3".to_string(),
        ));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_statuses_follow_error_kind() {
        let cases = [
            (ApplicationError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ApplicationError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ApplicationError::NotFound("id".into()), StatusCode::NOT_FOUND),
            (ApplicationError::UsernameTaken("admin".into()), StatusCode::CONFLICT),
            (
                ApplicationError::DomainError(DomainError::MissingField("username".into())),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(map_application_error_to_response(err).status(), status);
        }
    }
}
