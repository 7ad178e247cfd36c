#![allow(dead_code)]

use std::sync::OnceLock;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use baby_kingdom_api::{
    app::build_router,
    config::AppConfig,
    db::sync_schema,
    entity::{
        discounts::{self, CustomerEligibility, DiscountStatus, DiscountType},
        products,
        users::{self, AuthProvider, UserRole},
    },
    middleware::auth::AuthUser,
    services::auth_service::{hash_password, issue_token},
    state::AppState,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "password123";

static PASSWORD_HASH: OnceLock<String> = OnceLock::new();

fn password_hash() -> String {
    PASSWORD_HASH
        .get_or_init(|| hash_password(PASSWORD).expect("hash"))
        .clone()
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        jwt_expires_days: 1,
        google_client_id: None,
        frontend_url: "http://localhost:5173".into(),
        upload_dir: "uploads".into(),
        max_connections: 1,
    }
}

pub async fn test_state() -> AppState {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let orm = Database::connect(options)
        .await
        .expect("sqlite connection");
    sync_schema(&orm).await.expect("schema");
    AppState::new(orm, test_config())
}

pub async fn create_user(state: &AppState, role: UserRole, email: &str) -> users::Model {
    let now = Utc::now().fixed_offset();
    users::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(email.split('@').next().unwrap_or("user").to_string()),
        email: Set(email.to_string()),
        username: Set(None),
        password_hash: Set(Some(password_hash())),
        role: Set(role),
        phone: Set(None),
        street: Set(None),
        city: Set(None),
        state: Set(None),
        postal_code: Set(None),
        country: Set(None),
        avatar: Set(None),
        is_active: Set(true),
        email_verified: Set(true),
        verification_token: Set(None),
        verification_token_expires: Set(None),
        reset_password_token: Set(None),
        reset_password_expires: Set(None),
        google_id: Set(None),
        auth_provider: Set(AuthProvider::Local),
        last_login: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.orm)
    .await
    .expect("insert user")
}

pub struct NewProduct<'a> {
    pub name: &'a str,
    pub category: &'a str,
    pub age_group: Option<&'a str>,
    pub price: i64,
    pub stock: i32,
    pub min_stock: i32,
    pub is_active: bool,
    /// Backdates `created_at` so "newest first" ordering is deterministic.
    pub minutes_ago: i64,
}

impl Default for NewProduct<'_> {
    fn default() -> Self {
        Self {
            name: "Soft Teether",
            category: "Toys",
            age_group: None,
            price: 1000,
            stock: 10,
            min_stock: 5,
            is_active: true,
            minutes_ago: 0,
        }
    }
}

pub async fn create_product(state: &AppState, new: NewProduct<'_>) -> products::Model {
    let created = (Utc::now() - Duration::minutes(new.minutes_ago)).fixed_offset();
    products::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(new.name.to_string()),
        description: Set(None),
        category: Set(new.category.to_string()),
        age_group: Set(new.age_group.map(str::to_string)),
        brand: Set(None),
        price: Set(new.price),
        original_price: Set(None),
        stock: Set(new.stock),
        min_stock: Set(new.min_stock),
        max_stock: Set(100),
        sku: Set(None),
        images: Set(serde_json::json!([])),
        is_active: Set(new.is_active),
        is_featured: Set(false),
        supplier_id: Set(None),
        warehouse_id: Set(None),
        created_at: Set(created),
        updated_at: Set(created),
    }
    .insert(&state.orm)
    .await
    .expect("insert product")
}

pub async fn create_discount(
    state: &AppState,
    code: &str,
    discount_type: DiscountType,
    value: i64,
) -> discounts::Model {
    let now = Utc::now();
    discounts::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code.to_string()),
        description: Set(None),
        discount_type: Set(discount_type),
        value: Set(value),
        usage_limit: Set(None),
        used_count: Set(0),
        min_order_value: Set(0),
        max_discount_amount: Set(None),
        start_date: Set((now - Duration::days(1)).fixed_offset()),
        end_date: Set((now + Duration::days(30)).fixed_offset()),
        status: Set(DiscountStatus::Active),
        applicable_categories: Set(serde_json::json!([])),
        customer_type: Set(CustomerEligibility::All),
        created_by: Set(None),
        created_at: Set(now.fixed_offset()),
        updated_at: Set(now.fixed_offset()),
    }
    .insert(&state.orm)
    .await
    .expect("insert discount")
}

pub fn auth_user(user: &users::Model) -> AuthUser {
    AuthUser {
        user_id: user.id,
        role: user.role,
    }
}

pub fn bearer(state: &AppState, user: &users::Model) -> String {
    issue_token(&state.config, user).expect("token")
}

/// Run one request through the full router and decode the JSON body.
pub async fn send(
    state: &AppState,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = build_router(state.clone())
        .oneshot(request)
        .await
        .expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub fn checkout_body(lines: &[(Uuid, i32)], discount_code: Option<&str>) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(id, quantity)| serde_json::json!({ "product_id": id, "quantity": quantity }))
        .collect();
    serde_json::json!({
        "items": items,
        "shipping_address": {
            "name": "Jamie Parent",
            "phone": "0123456789",
            "street": "1 Nursery Lane",
            "city": "Springfield",
            "country": "US"
        },
        "payment_method": "card",
        "discount_code": discount_code,
    })
}
