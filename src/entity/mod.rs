pub mod audit_logs;
pub mod contacts;
pub mod discounts;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod suppliers;
pub mod users;
pub mod warehouses;

pub use audit_logs::Entity as AuditLogs;
pub use contacts::Entity as Contacts;
pub use discounts::Entity as Discounts;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use suppliers::Entity as Suppliers;
pub use users::Entity as Users;
pub use warehouses::Entity as Warehouses;
