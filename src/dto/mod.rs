pub mod admin;
pub mod auth;
pub mod contact;
pub mod discounts;
pub mod orders;
pub mod products;
