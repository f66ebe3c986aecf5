mod app_state;
mod auth;
mod handlers;
mod routes;

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use pushbridge_apns::ApnsConnection;
use pushbridge_c2dm::C2dmConnection;
use pushbridge_common::PushProvider;
use pushbridge_config::load_config;
use pushbridge_dispatcher::{failure_channel, spawn_failure_logger, Dispatcher};
use pushbridge_mpns::MpnsConnection;
use pushbridge_queue::create_queue;
use pushbridge_registry::create_registry;

use app_state::AppState;
use auth::ConfigCredentialStore;
use routes::routes;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    pushbridge_common::logging::init();

    let config = Arc::new(load_config().expect("failed to load configuration"));
    let registry = create_registry();
    let queue = create_queue(config.queue.path.as_deref().map(Path::new))
        .expect("failed to open the delivery queue");

    let (failure_tx, failure_rx) = failure_channel();
    let mut providers: Vec<Arc<dyn PushProvider>> = Vec::new();

    if config.use_apns {
        match &config.apns {
            Some(apns) => {
                let conn = ApnsConnection::from_config(apns, failure_tx.clone())
                    .expect("failed to initialize the APNS connection");
                providers.push(Arc::new(conn));
                info!("APNS connection enabled");
            }
            None => warn!("use_apns is set but the [apns] section is missing"),
        }
    }
    if config.use_mpns {
        match &config.mpns {
            Some(mpns) => {
                providers.push(Arc::new(MpnsConnection::new(
                    mpns,
                    registry.clone(),
                    failure_tx.clone(),
                )));
                info!("MPNS connection enabled");
            }
            None => warn!("use_mpns is set but the [mpns] section is missing"),
        }
    }
    if config.use_c2dm {
        match &config.c2dm {
            Some(c2dm) => {
                let conn = C2dmConnection::from_config(c2dm, failure_tx.clone())
                    .expect("failed to initialize the C2DM connection");
                providers.push(Arc::new(conn));
                info!("C2DM connection enabled");
            }
            None => warn!("use_c2dm is set but the [c2dm] section is missing"),
        }
    }
    drop(failure_tx);

    let failure_logger = spawn_failure_logger(failure_rx);
    let dispatcher = Dispatcher::new(registry.clone(), queue.clone(), providers, &config.worker);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(dispatcher.run(shutdown_rx));

    let state = Arc::new(AppState {
        config: config.clone(),
        registry,
        queue,
        credentials: Arc::new(ConfigCredentialStore::new(&config.auth)),
    });
    let app = routes(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("failed to bind the server address");
    info!("listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // The HTTP side is down; stop the worker and let it close the
    // provider connections before exiting.
    let _ = shutdown_tx.send(true);
    let _ = worker.await;
    let _ = failure_logger.await;
    info!("shutdown complete");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", err);
    }
}
