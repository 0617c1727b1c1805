#[macro_use]
extern crate rocket;

pub mod auth;
pub mod db;
pub mod error;
pub mod export;
pub mod ingest;
pub mod models;
pub mod query;
pub mod request_logger;
pub mod routes;
pub mod select;
pub mod titles;

use crate::auth::AuthState;
use crate::db::{BulkWriteDb, LeadsDb};
use crate::export::{
    mailer::{HttpMailer, RecordingMailer},
    storage::{HttpObjectStore, MemoryObjectStore},
    ExportConfig, ExportEngine, Mailer, ObjectStore,
};
use crate::ingest::BulkLoader;
use crate::request_logger::RequestLogger;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::sqlx;
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{make_rapidoc, GeneralConfig, HideShowConfig, RapiDocConfig},
    settings::UrlObject,
    swagger_ui::{make_swagger_ui, SwaggerUIConfig},
};
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Delete]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(LeadsDb::init())
        .attach(BulkWriteDb::init())
        .attach(cors)
        // Run database migrations on startup
        .attach(AdHoc::try_on_ignite("Run Migrations", |rocket| async move {
            match LeadsDb::fetch(&rocket) {
                Some(db) => {
                    let pool = (**db).clone();
                    match sqlx::migrate!("./migrations").run(&pool).await {
                        Ok(_) => {
                            log::info!("database migrations successful");
                            Ok(rocket)
                        }
                        Err(e) => {
                            log::error!("database migrations failed: {}", e);
                            Err(rocket)
                        }
                    }
                }
                None => {
                    log::error!("database pool not available for migrations");
                    Err(rocket)
                }
            }
        }))
        // Clone pools out of the rocket_db_pools fairings and wire up the
        // core engines as managed state.
        .attach(AdHoc::try_on_ignite("Manage Core State", |rocket| async move {
            let leads_pool = match LeadsDb::fetch(&rocket) {
                Some(db) => (**db).clone(),
                None => {
                    log::error!("leads pool not available");
                    return Err(rocket);
                }
            };
            let bulk_pool = match BulkWriteDb::fetch(&rocket) {
                Some(db) => (**db).clone(),
                None => {
                    log::error!("bulk-write pool not available");
                    return Err(rocket);
                }
            };

            let auth_state = match AuthState::from_env() {
                Ok(state) => state,
                Err(e) => {
                    log::error!("auth configuration failed: {}", e);
                    return Err(rocket);
                }
            };

            let store: Arc<dyn ObjectStore> = match HttpObjectStore::from_env() {
                Some(store) => Arc::new(store),
                None => {
                    log::warn!(
                        "LEADSTORE_STORAGE_URL not set; export artifacts will be kept in memory"
                    );
                    Arc::new(MemoryObjectStore::new())
                }
            };
            let mailer: Arc<dyn Mailer> = match HttpMailer::from_env() {
                Some(mailer) => Arc::new(mailer),
                None => {
                    log::warn!("LEADSTORE_MAIL_URL not set; export mail will only be recorded");
                    Arc::new(RecordingMailer::new())
                }
            };

            let engine = ExportEngine::new(
                leads_pool.clone(),
                store,
                mailer,
                ExportConfig::from_env(),
            );
            let loader = BulkLoader::new(bulk_pool);

            Ok(rocket
                .manage(leads_pool)
                .manage(auth_state)
                .manage(engine)
                .manage(loader))
        }))
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Health routes
                routes::health::health_check,
                // Bulk ingestion routes
                routes::ingest::bulk_ingest_leads,
                routes::ingest::bulk_ingest_companies,
                routes::ingest::bulk_delete_leads,
                // Listing routes
                routes::listings::query_leads,
                routes::listings::query_companies,
                // Export routes
                routes::exports::export_leads,
                routes::exports::export_companies,
                routes::exports::list_export_records,
                // Selection routes
                routes::select::select_lead_ids,
                // Saved mark routes
                routes::saved::save_mark,
                routes::saved::unsave_mark,
                routes::saved::list_saved,
            ],
        )
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Leadstore API", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::sqlx::{self, PgPool};

    use crate::auth::{AuthState, JwtService, Role};

    pub use database::{TestDatabase, TestDatabaseError};

    /// Shared secret for token issuance in tests.
    pub const TEST_JWT_SECRET: &str = "test-secret-key-for-integration-tests";

    /// Auth state wired to the test secret.
    pub fn test_auth_state() -> AuthState {
        AuthState::new(JwtService::new(
            TEST_JWT_SECRET,
            "leadstore".to_string(),
            "leadstore-api".to_string(),
            900,
        ))
    }

    /// Convenience helpers for seeding users and entity rows in tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        /// Insert a user row, returning the new user id.
        pub async fn insert_user(
            &self,
            email: &str,
            role: Role,
            credits: i32,
        ) -> Result<i32, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO users (email, role, credits) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(email)
            .bind(role.as_str())
            .bind(credits)
            .fetch_one(self.pool)
            .await
        }

        /// Issue a bearer token for a previously inserted user.
        pub fn bearer_token(&self, user_id: i32, email: &str, role: Role) -> String {
            test_auth_state()
                .jwt_service
                .issue_access_token(user_id, email, role.as_str())
                .expect("token issuance")
                .token
        }

        /// Current credit balance for a user.
        pub async fn credits(&self, user_id: i32) -> Result<i32, sqlx::Error> {
            sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_one(self.pool)
                .await
        }
    }

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            core::error::TestcontainersError, runners::AsyncRunner, ContainerAsync, ImageExt,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database factory for integration tests.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// Provision a fresh database by launching a disposable Postgres
            /// container and running migrations against it.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default()
                    .with_tag("16-alpine")
                    .start()
                    .await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                let base_options: PgConnectOptions =
                    admin_url.parse().map_err(TestDatabaseError::Sqlx)?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                let new_db_name = format!("leadstore_{}", Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql)
                    .execute(&admin_pool)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.clone().database(&new_db_name))
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name: new_db_name,
                    container: Some(container),
                })
            }

            /// Connection pool for use in tests and Rocket state.
            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            /// Convenience method returning a clone of the pooled handle.
            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database_with_fallback(self.admin_options.clone(), &self.database_name)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database_with_fallback(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_force = format!("DROP DATABASE \"{}\" WITH (FORCE)", database_name);
            match sqlx::query(&drop_force).execute(&admin_pool).await {
                Ok(_) => Ok(()),
                Err(err) if force_drop_unsupported(&err) => {
                    let drop_sql = format!("DROP DATABASE \"{}\"", database_name);
                    sqlx::query(&drop_sql).execute(&admin_pool).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }

        fn force_drop_unsupported(err: &sqlx::Error) -> bool {
            matches!(
                err,
                sqlx::Error::Database(db_err)
                    if db_err
                        .code()
                        .map(|code| code == "42601" || code == "0A000")
                        .unwrap_or(false)
            )
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ =
                                drop_database_with_fallback(admin_options.clone(), &db_name).await;
                        });
                    } else {
                        std::thread::spawn(move || {
                            if let Ok(rt) = tokio::runtime::Runtime::new() {
                                rt.block_on(async move {
                                    pool.close().await;
                                    let _ = drop_database_with_fallback(
                                        admin_options.clone(),
                                        &db_name,
                                    )
                                    .await;
                                });
                            }
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pg_pool: Option<PgPool>,
        with_auth: bool,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                pg_pool: None,
                with_auth: false,
            }
        }

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

        /// Manage a `PgPool` instance for tests that exercise database-backed
        /// routes and guards.
        pub fn manage_pg_pool(mut self, pool: PgPool) -> Self {
            self.pg_pool = Some(pool);
            self
        }

        /// Manage the test auth state so guarded routes can resolve tokens.
        pub fn with_test_auth(mut self) -> Self {
            self.with_auth = true;
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(pool) = self.pg_pool {
                rocket = rocket.manage(pool);
            }

            if self.with_auth {
                rocket = rocket.manage(test_auth_state());
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
