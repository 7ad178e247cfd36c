use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::{
    dto::contact::ContactRequest,
    error::AppResult,
    extract::ValidatedJson,
    response::{Ack, ApiResponse},
    services::contact_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(submit_contact))
}

#[utoipa::path(
    post,
    path = "/api/contact",
    request_body = ContactRequest,
    responses(
        (status = 201, description = "Message received", body = ApiResponse<Ack>),
        (status = 400, description = "Validation failed")
    ),
    tag = "Contact"
)]
pub async fn submit_contact(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ContactRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Ack>>)> {
    let resp = contact_service::submit(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
