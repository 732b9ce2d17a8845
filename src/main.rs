use std::sync::Arc;

use access_gate::authz::{Bindings, InMemoryRoleStore, RoleStore, SqliteRoleStore};
use access_gate::config::{AppConfig, StoreBackend};
use access_gate::events::{init_audit_bus, start_audit_listener};
use access_gate::{create_app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let config = AppConfig::from_env()?;
    let (audit, audit_rx) = init_audit_bus();

    let store: Arc<dyn RoleStore> = match &config.store {
        StoreBackend::Memory { bindings_file } => {
            let bindings = match bindings_file {
                Some(path) => Bindings::from_json_file(path)?,
                None => {
                    tracing::warn!("no BINDINGS_FILE configured; every caller will be rejected until roles are assigned");
                    Bindings::default()
                }
            };
            tracing::info!(
                users = bindings.users.len(),
                roles = bindings.roles.len(),
                "using in-memory access store"
            );
            // Nothing persists decisions in this mode; the log line is the audit trail.
            drop(audit_rx);
            Arc::new(InMemoryRoleStore::from_bindings(bindings))
        }
        StoreBackend::Sqlite { database_url } => {
            let pool = db::init(database_url).await?;
            tracing::info!("using sqlite access store");
            tokio::spawn(start_audit_listener(audit_rx, pool.clone()));
            Arc::new(SqliteRoleStore::new(pool))
        }
    };

    let port = config.port;
    let mount_path = config.mount_path.clone();
    let app = create_app(AppState::new(store, audit, config))?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(mount_path = %mount_path, "Access Control Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
