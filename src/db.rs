use rocket_db_pools::{sqlx, Database};

#[derive(Database)]
#[database("leads_db")]
pub struct LeadsDb(sqlx::PgPool);

#[derive(Database)]
#[database("bulk_write_db")]
pub struct BulkWriteDb(sqlx::PgPool);
