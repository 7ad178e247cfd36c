use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::discounts::{DiscountQuote, ValidateDiscountRequest},
    error::AppResult,
    extract::ValidatedJson,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::discount_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/validate", post(validate_discount))
}

#[utoipa::path(
    post,
    path = "/api/discounts/validate",
    request_body = ValidateDiscountRequest,
    responses(
        (status = 200, description = "Amount the code would take off", body = ApiResponse<DiscountQuote>),
        (status = 400, description = "Unknown code or not eligible"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Discounts"
)]
pub async fn validate_discount(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(payload): ValidatedJson<ValidateDiscountRequest>,
) -> AppResult<Json<ApiResponse<DiscountQuote>>> {
    let resp = discount_service::validate(&state, &user, payload).await?;
    Ok(Json(resp))
}
