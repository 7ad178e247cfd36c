use utoipa::{
    Modify, OpenApi,
    openapi::{
        self, OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{
            CreateSupplierRequest, CreateWarehouseRequest, DashboardStats, InventoryAdjustRequest,
            SupplierList, UpdateOrderStatusRequest, UpdatePaymentRequest, UpdateShippingRequest,
            UpdateSupplierRequest, UpdateUserRequest, UpdateWarehouseRequest, UserList,
            WarehouseList,
        },
        auth::{
            AuthResponse, ChangePasswordRequest, EmailRequest, GoogleLoginRequest, LoginRequest,
            RegisterRequest, ResetPasswordRequest, UpdateProfileRequest,
        },
        contact::{ContactList, ContactRequest, UpdateContactRequest},
        discounts::{
            CreateDiscountRequest, DiscountList, DiscountQuote, UpdateDiscountRequest,
            ValidateDiscountRequest,
        },
        orders::{
            CancelOrderRequest, CheckoutRequest, OrderLineRequest, OrderList, OrderWithItems,
            ShippingAddressRequest,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
    },
    error::FieldError,
    models::{
        Address, Contact, Discount, Order, OrderItem, Product, ShippingAddress, Supplier, User,
        Warehouse,
    },
    pricing::OrderTotals,
    response::{Ack, ApiResponse, Meta},
    routes::{admin, auth, contact, discounts, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::google_login,
        auth::me,
        auth::update_profile,
        auth::change_password,
        auth::verify_email,
        auth::resend_verification,
        auth::forgot_password,
        auth::reset_password,
        products::list_products,
        products::featured_products,
        products::get_product,
        products::related_products,
        products::create_product,
        products::update_product,
        products::delete_product,
        orders::checkout,
        orders::my_orders,
        orders::get_order,
        orders::cancel_order,
        discounts::validate_discount,
        contact::submit_contact,
        admin::dashboard,
        admin::list_users,
        admin::get_user,
        admin::update_user,
        admin::delete_user,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_inventory,
        admin::list_low_stock,
        admin::adjust_inventory,
        admin::list_suppliers,
        admin::create_supplier,
        admin::get_supplier,
        admin::update_supplier,
        admin::delete_supplier,
        admin::list_warehouses,
        admin::create_warehouse,
        admin::get_warehouse,
        admin::update_warehouse,
        admin::delete_warehouse,
        admin::list_discounts,
        admin::create_discount,
        admin::get_discount,
        admin::update_discount,
        admin::delete_discount,
        admin::list_payments,
        admin::update_payment,
        admin::list_shipping,
        admin::update_shipping,
        admin::list_contacts,
        admin::update_contact,
        admin::delete_contact
    ),
    components(
        schemas(
            Address,
            User,
            Product,
            ShippingAddress,
            Order,
            OrderItem,
            Discount,
            Supplier,
            Warehouse,
            Contact,
            OrderTotals,
            FieldError,
            Ack,
            Meta,
            RegisterRequest,
            LoginRequest,
            GoogleLoginRequest,
            AuthResponse,
            UpdateProfileRequest,
            ChangePasswordRequest,
            EmailRequest,
            ResetPasswordRequest,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            OrderLineRequest,
            ShippingAddressRequest,
            CheckoutRequest,
            CancelOrderRequest,
            OrderWithItems,
            OrderList,
            CreateDiscountRequest,
            UpdateDiscountRequest,
            ValidateDiscountRequest,
            DiscountQuote,
            DiscountList,
            ContactRequest,
            UpdateContactRequest,
            ContactList,
            DashboardStats,
            UpdateOrderStatusRequest,
            InventoryAdjustRequest,
            UpdateUserRequest,
            UserList,
            CreateSupplierRequest,
            UpdateSupplierRequest,
            SupplierList,
            CreateWarehouseRequest,
            UpdateWarehouseRequest,
            WarehouseList,
            UpdatePaymentRequest,
            UpdateShippingRequest,
            params::SortOrder,
            params::ProductSortBy,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<AuthResponse>,
            ApiResponse<User>,
            ApiResponse<Ack>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and account endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Orders", description = "Checkout and order endpoints"),
        (name = "Discounts", description = "Discount code endpoints"),
        (name = "Contact", description = "Contact form endpoint"),
        (name = "Admin", description = "Back-office endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
