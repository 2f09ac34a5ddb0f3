//! Back-office de Damaris Spa.
//!
//! Servidor HTML con sesiones por cookie sobre una base SQLite:
//! - actividades diarias del personal con pagos, vales e insumos
//! - inventario de insumos, compras a proveedores y consumo interno
//! - articulos y ventas de ropa
//! - cierre de caja diario con arqueo por denominaciones
//! - facturas PDF y reportes de ganancias, personal y clientes
//!
//! Variables de entorno (o `.env`): `PORT`, `DATABASE_PATH`, `UTC_OFFSET_HOURS`,
//! `SESSION_HOURS`, `FONTS_DIR`, `COOKIE_SECURE` y los datos `NEGOCIO_*`.
//! El nivel de logs se controla con `RUST_LOG`.

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod printing;
pub mod utils;
pub mod web;

use config::Config;
use db::Database;
use error::ErrorArranque;
use web::sesion::Sesiones;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    pub sesiones: Arc<Sesiones>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let sesiones = Sesiones::new(config.session_hours);
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            sesiones: Arc::new(sesiones),
        }
    }
}

/// Rutas de la aplicacion mas los archivos estaticos de `public/`
pub fn crear_app(state: AppState) -> Router {
    web::crear_router(state)
        .nest_service("/public", ServeDir::new("public"))
        .layer(TraceLayer::new_for_http())
}

pub async fn start_server() -> Result<(), ErrorArranque> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load()?;
    info!(path = %config.database_path.display(), "Opening database...");
    let db = Database::new(&config.database_path, config.utc_offset_hours)?;

    let address = format!("0.0.0.0:{}", config.port);
    let app = crear_app(AppState::new(db, config));

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!(error = %e, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut senal) => {
                senal.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
