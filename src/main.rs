use anyhow::Result;
use axum::Router;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use pharmarium_orderservice::{app_state::AppState, bootstrap, config, db, routes, swagger};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let db_pool = db::create_pool(&config.database.url).await?;
    let state = AppState { db_pool };

    let routes = routes::customers::carts::routes_with_openapi(state.clone())
        .merge(routes::customers::orders::routes_with_openapi(state.clone()))
        .merge(routes::staff::orders::routes_with_openapi(state.clone()))
        .merge(routes::staff::transactions::routes_with_openapi(
            state.clone(),
        ))
        .merge(routes::staff::inbox::routes_with_openapi(state.clone()));

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("Pharmarium OrderService API")
        .version("1.0.0")
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi)?;

    let app = Router::new()
        .merge(routes)
        .with_state(state)
        .merge(swagger_ui);

    bootstrap::serve("OrderService", app, &config).await?;
    Ok(())
}
