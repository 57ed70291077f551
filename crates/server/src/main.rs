mod api;
mod config;
mod range;
mod scan;
mod state;

use std::sync::Arc;

use api::api_router;
use config::{config_path_from_env, load_or_create_config, MusicSource};
use library::{Library, LocalDir, MusicDir, S3Dir};
use metadata::LoftyReader;
use scan::{spawn_scan_timer, start_scan};
use state::AppState;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let source = config
        .music_source(&config_path)
        .ok_or("no music source configured; set music_root or s3_bucket")?;
    // the blocking http client cannot be built on a runtime thread
    let dir: Arc<dyn MusicDir> =
        tokio::task::spawn_blocking(move || open_music_dir(source)).await??;

    let library = Library::open(&config.index_path(&config_path))?;
    let scanner = library.scanner(dir, Arc::new(LoftyReader));
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let scan_on_start = config.scan_on_start;
    let interval = config.scan_interval_mins;
    let state = AppState::new(library, scanner, config);

    if scan_on_start {
        start_scan(&state, "startup");
    }
    spawn_scan_timer(state.clone(), interval);

    let app = api_router(state)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn open_music_dir(source: MusicSource) -> Result<Arc<dyn MusicDir>, library::LibraryError> {
    match source {
        MusicSource::Local(root) => {
            if !root.exists() {
                warn!("Music directory {:?} does not exist yet", root);
            }
            info!("Serving music from {:?}", root);
            Ok(Arc::new(LocalDir::new(root)))
        }
        MusicSource::S3 { endpoint, bucket } => {
            info!("Serving music from bucket {} at {}", bucket, endpoint);
            Ok(Arc::new(S3Dir::new(&endpoint, &bucket)?))
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
        }
    }

    info!("Shutdown signal received.");
}
