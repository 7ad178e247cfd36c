use anyhow::Result;
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Schema, SqlxPostgresConnector};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

use crate::entity::{
    AuditLogs, Contacts, Discounts, OrderItems, Orders, Products, Suppliers, Users, Warehouses,
};

pub type DbPool = sqlx::PgPool;
pub type OrmConn = DatabaseConnection;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Apply the SQL migrations in `migrations/`.
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Wrap an existing Postgres pool so SeaORM and raw sqlx share connections.
pub fn create_orm_conn(pool: DbPool) -> OrmConn {
    SqlxPostgresConnector::from_sqlx_postgres_pool(pool)
}

/// Create every table straight from the entity definitions.
///
/// Used against SQLite where the Postgres migrations do not apply. Parents are
/// created before the tables that reference them.
pub async fn sync_schema(conn: &OrmConn) -> Result<()> {
    create_table(conn, Users).await?;
    create_table(conn, Suppliers).await?;
    create_table(conn, Warehouses).await?;
    create_table(conn, Products).await?;
    create_table(conn, Orders).await?;
    create_table(conn, OrderItems).await?;
    create_table(conn, Discounts).await?;
    create_table(conn, Contacts).await?;
    create_table(conn, AuditLogs).await?;
    Ok(())
}

async fn create_table<E: EntityTrait>(conn: &OrmConn, entity: E) -> Result<()> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    conn.execute(backend.build(&stmt)).await?;
    Ok(())
}
