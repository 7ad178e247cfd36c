use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    contacts::{self, ContactStatus},
    discounts::{self, CustomerEligibility, DiscountStatus, DiscountType},
    order_items,
    orders::{self, OrderStatus, PaymentMethod, PaymentStatus},
    products::{self, StockStatus},
    suppliers::{self, PartnerStatus},
    users::{self, AuthProvider, UserRole},
    warehouses,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Public view of a user; password hash and tokens never leave the service.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub username: Option<String>,
    pub role: UserRole,
    pub phone: Option<String>,
    pub address: Address,
    pub avatar: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub auth_provider: AuthProvider,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            username: model.username,
            role: model.role,
            phone: model.phone,
            address: Address {
                street: model.street,
                city: model.city,
                state: model.state,
                postal_code: model.postal_code,
                country: model.country,
            },
            avatar: model.avatar,
            is_active: model.is_active,
            email_verified: model.email_verified,
            auth_provider: model.auth_provider,
            last_login: model.last_login.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub age_group: Option<String>,
    pub brand: Option<String>,
    pub price: i64,
    pub original_price: Option<i64>,
    /// Percent saved against `original_price`, for display.
    pub discount_percent: Option<i64>,
    pub stock: i32,
    pub min_stock: i32,
    pub max_stock: i32,
    pub stock_status: StockStatus,
    pub sku: Option<String>,
    pub images: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub supplier_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<products::Model> for Product {
    fn from(model: products::Model) -> Self {
        let discount_percent = model
            .original_price
            .filter(|original| *original > model.price && *original > 0)
            .map(|original| (original - model.price) * 100 / original);
        let stock_status = model.stock_status();
        let images = model.image_list();
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            category: model.category,
            age_group: model.age_group,
            brand: model.brand,
            price: model.price,
            original_price: model.original_price,
            discount_percent,
            stock: model.stock,
            min_stock: model.min_stock,
            max_stock: model.max_stock,
            stock_status,
            sku: model.sku,
            images,
            is_active: model.is_active,
            is_featured: model.is_featured,
            supplier_id: model.supplier_id,
            warehouse_id: model.warehouse_id,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub tax: i64,
    pub discount_code: Option<String>,
    pub discount_amount: i64,
    pub total: i64,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            order_number: model.order_number,
            shipping_address: ShippingAddress {
                name: model.shipping_name,
                phone: model.shipping_phone,
                street: model.shipping_street,
                city: model.shipping_city,
                state: model.shipping_state,
                postal_code: model.shipping_postal_code,
                country: model.shipping_country,
            },
            payment_method: model.payment_method,
            payment_status: model.payment_status,
            status: model.status,
            subtotal: model.subtotal,
            shipping_cost: model.shipping_cost,
            tax: model.tax,
            discount_code: model.discount_code,
            discount_amount: model.discount_amount,
            total: model.total,
            notes: model.notes,
            tracking_number: model.tracking_number,
            carrier: model.carrier,
            delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
            cancelled_at: model.cancelled_at.map(|dt| dt.with_timezone(&Utc)),
            cancel_reason: model.cancel_reason,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
    pub image: Option<String>,
    pub line_total: i64,
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        Self {
            line_total: model.price.saturating_mul(i64::from(model.quantity)),
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            name: model.name,
            price: model.price,
            quantity: model.quantity,
            image: model.image,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Discount {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub value: i64,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub min_order_value: i64,
    pub max_discount_amount: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: DiscountStatus,
    pub applicable_categories: Vec<String>,
    pub customer_type: CustomerEligibility,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<discounts::Model> for Discount {
    fn from(model: discounts::Model) -> Self {
        let applicable_categories = model.categories();
        Self {
            id: model.id,
            code: model.code,
            description: model.description,
            discount_type: model.discount_type,
            value: model.value,
            usage_limit: model.usage_limit,
            used_count: model.used_count,
            min_order_value: model.min_order_value,
            max_discount_amount: model.max_discount_amount,
            start_date: model.start_date.with_timezone(&Utc),
            end_date: model.end_date.with_timezone(&Utc),
            status: model.status,
            applicable_categories,
            customer_type: model.customer_type,
            created_by: model.created_by,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: PartnerStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<suppliers::Model> for Supplier {
    fn from(model: suppliers::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            contact_person: model.contact_person,
            email: model.email,
            phone: model.phone,
            address: model.address,
            status: model.status,
            notes: model.notes,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Warehouse {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub address: Option<String>,
    pub capacity: Option<i32>,
    pub manager: Option<String>,
    pub status: PartnerStatus,
    pub created_at: DateTime<Utc>,
}

impl From<warehouses::Model> for Warehouse {
    fn from(model: warehouses::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            code: model.code,
            address: model.address,
            capacity: model.capacity,
            manager: model.manager,
            status: model.status,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub status: ContactStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<contacts::Model> for Contact {
    fn from(model: contacts::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            phone: model.phone,
            subject: model.subject,
            message: model.message,
            status: model.status,
            admin_notes: model.admin_notes,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}
