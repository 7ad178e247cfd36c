use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub age_group: Option<String>,
    pub brand: Option<String>,
    pub price: i64,
    pub original_price: Option<i64>,
    pub stock: i32,
    pub min_stock: i32,
    pub max_stock: i32,
    #[sea_orm(unique)]
    pub sku: Option<String>,
    /// JSON array of image paths or URLs.
    pub images: Json,
    pub is_active: bool,
    pub is_featured: bool,
    pub supplier_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::suppliers::Entity",
        from = "Column::SupplierId",
        to = "super::suppliers::Column::Id"
    )]
    Suppliers,
    #[sea_orm(
        belongs_to = "super::warehouses::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouses::Column::Id"
    )]
    Warehouses,
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
}

impl Related<super::suppliers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Suppliers.def()
    }
}

impl Related<super::warehouses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouses.def()
    }
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Admin-facing stock signal; never triggers reordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    InStock,
    Overstock,
}

impl Model {
    pub fn image_list(&self) -> Vec<String> {
        serde_json::from_value(self.images.clone()).unwrap_or_default()
    }

    pub fn first_image(&self) -> Option<String> {
        self.image_list().into_iter().next()
    }

    pub fn stock_status(&self) -> StockStatus {
        if self.stock <= 0 {
            StockStatus::OutOfStock
        } else if self.stock <= self.min_stock {
            StockStatus::LowStock
        } else if self.stock > self.max_stock {
            StockStatus::Overstock
        } else {
            StockStatus::InStock
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(stock: i32) -> Model {
        let now = Utc::now().fixed_offset();
        Model {
            id: Uuid::new_v4(),
            name: "Soft Blanket".into(),
            description: None,
            category: "Bedding".into(),
            age_group: None,
            brand: None,
            price: 1200,
            original_price: None,
            stock,
            min_stock: 5,
            max_stock: 100,
            sku: None,
            images: serde_json::json!(["uploads/blanket.jpg", "uploads/blanket-2.jpg"]),
            is_active: true,
            is_featured: false,
            supplier_id: None,
            warehouse_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stock_status_thresholds() {
        assert_eq!(product(0).stock_status(), StockStatus::OutOfStock);
        assert_eq!(product(5).stock_status(), StockStatus::LowStock);
        assert_eq!(product(6).stock_status(), StockStatus::InStock);
        assert_eq!(product(100).stock_status(), StockStatus::InStock);
        assert_eq!(product(101).stock_status(), StockStatus::Overstock);
    }

    #[test]
    fn first_image_reads_json_array() {
        assert_eq!(product(1).first_image().as_deref(), Some("uploads/blanket.jpg"));

        let mut broken = product(1);
        broken.images = serde_json::json!({ "not": "an array" });
        assert!(broken.image_list().is_empty());
    }
}
