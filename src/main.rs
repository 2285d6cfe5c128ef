// Schedule Board Server - kanban schedule positioning and audit log

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use schedule_board::{
    app_state::AppState, config::Config, schedule_interface::create_schedule_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;

    let schedule_router = create_schedule_router(app_state.schedule_service.clone());

    // Build main application router
    let app = Router::new()
        .nest("/api/v1", schedule_router)
        .layer(CorsLayer::permissive());

    // Start server
    let addr = config.server_address();
    info!("Schedule board server starting on http://{}", addr);
    info!("  POST   /api/v1/schedules                                       - Create schedule");
    info!("  PUT    /api/v1/schedules/{{id}}/actors/{{actor_id}}            - Update schedule");
    info!("  PUT    /api/v1/schedules/{{id}}/actors/{{actor_id}}/position   - Move schedule");
    info!("  DELETE /api/v1/schedules/{{id}}/actors/{{actor_id}}            - Delete schedule");
    info!("  GET    /api/v1/board-columns/{{id}}/schedules                  - Column order");
    info!("  GET    /api/v1/schedules/{{id}}/logs                           - Audit log");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
