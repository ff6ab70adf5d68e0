/// Database plumbing
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health check
/// - `migrations`: Embedded schema migrations
///
/// Entity queries live next to the entities in [`crate::models`]; the
/// transactional gateway built on them is [`crate::store::postgres::PgStore`].
///
/// # Example
///
/// ```no_run
/// use tenantry_shared::db::migrations::run_migrations;
/// use tenantry_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///     run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
