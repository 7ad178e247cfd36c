use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entity::{
    orders::{OrderStatus, PaymentStatus},
    suppliers::PartnerStatus,
    users::UserRole,
};
use crate::models::{Order, Supplier, User, Warehouse};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InventoryAdjustRequest {
    pub delta: i32,
    #[validate(length(max = 200))]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub items: Vec<User>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_customers: u64,
    pub total_products: u64,
    pub total_orders: u64,
    pub pending_orders: u64,
    pub low_stock_products: u64,
    /// Sum of totals over orders that were not cancelled
    pub revenue: i64,
    pub recent_orders: Vec<Order>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSupplierRequest {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub contact_person: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: Option<PartnerStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSupplierRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub contact_person: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: Option<PartnerStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SupplierList {
    pub items: Vec<Supplier>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateWarehouseRequest {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 30, message = "Code is required"))]
    pub code: String,
    pub address: Option<String>,
    #[validate(range(min = 0))]
    pub capacity: Option<i32>,
    pub manager: Option<String>,
    pub status: Option<PartnerStatus>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateWarehouseRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub code: Option<String>,
    pub address: Option<String>,
    #[validate(range(min = 0))]
    pub capacity: Option<i32>,
    pub manager: Option<String>,
    pub status: Option<PartnerStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WarehouseList {
    pub items: Vec<Warehouse>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePaymentRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateShippingRequest {
    #[validate(length(min = 1, max = 100))]
    pub tracking_number: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub carrier: Option<String>,
    /// Only `Shipped` or `Delivered`
    pub status: Option<OrderStatus>,
}
