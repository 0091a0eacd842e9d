use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use clap::Parser;

use tube::media::library::{Library, LibraryError};
use tube::store::{RocksStore, ViewStore};
use tube::{cli, config, http, watcher};

/// Set to true once the first Ctrl+C is received. Second Ctrl+C force-exits.
static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);

/// Wait for the first Ctrl+C (graceful shutdown). A second Ctrl+C during
/// shutdown exits immediately.
async fn wait_for_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl+C: {}", e);
        return;
    }
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() && SHUTTING_DOWN.swap(true, Ordering::SeqCst) {
            eprintln!("\ntube: forced exit");
            std::process::exit(1);
        }
    });
    SHUTTING_DOWN.store(true, Ordering::SeqCst);
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {}", message);
    std::process::exit(1);
}

/// Register the upload directory as a root so transcoded uploads are indexed
/// and watched like any other video. A clash with a configured root is fine.
fn register_uploads(library: &Library, upload_path: &std::path::Path) {
    if let Err(e) = std::fs::create_dir_all(upload_path) {
        tracing::warn!("Cannot create upload path {}: {}", upload_path.display(), e);
        return;
    }
    match library.add_root(upload_path, config::UPLOAD_PREFIX) {
        Ok(_) => {}
        Err(
            e @ (LibraryError::DuplicatePrefix(_)
            | LibraryError::DuplicateDirectory(_)
            | LibraryError::OverlappingPrefix { .. }),
        ) => {
            tracing::info!("Upload path not registered separately: {}", e);
        }
        Err(e) => tracing::warn!("Cannot register upload path: {}", e),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();

    let file_config = config::find_config_file(args.config.as_deref()).and_then(|path| {
        match config::load_config(&path) {
            Ok(cfg) => {
                tracing::debug!("Loaded config from {}", path.display());
                Some(cfg)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file: {}", e);
                None
            }
        }
    });

    let config = config::Config::resolve(file_config, &args);

    let store = RocksStore::open(&config.store_path).unwrap_or_else(|e| {
        fail(format_args!(
            "cannot open view store {}: {}",
            config.store_path.display(),
            e
        ))
    });

    let library = Arc::new(Library::new());
    for root in &config.library {
        if let Err(e) = library.add_root(&root.path, &root.prefix) {
            fail(format_args!("cannot add root {}: {}", root.path.display(), e));
        }
    }
    register_uploads(&library, &config.upload_path);

    // Watch before scanning so changes made during a scan are queued, not
    // lost. Replayed upserts and removes are idempotent.
    let watcher = match watcher::spawn(Arc::clone(&library)) {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("{} -- the index will not follow disk changes", e);
            None
        }
    };

    // Initial scans block; the server is not accepting requests yet.
    for root in library.roots() {
        if let Err(e) = library.scan(&root.prefix) {
            tracing::warn!("Scan of {} failed: {}", root.dir.display(), e);
        }
    }

    let store: Arc<dyn ViewStore> = Arc::new(store);
    let item_count = library.len();
    let app = http::build_router(http::state::AppState::new(library, store));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| fail(format_args!("failed to bind {}: {}", addr, e)));
    tracing::info!("Serving {} videos on http://{}", item_count, addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
    {
        tracing::error!("HTTP server error: {}", e);
    }

    tracing::info!("Shutting down...");
    if let Some(handle) = watcher {
        handle.shutdown().await;
    }
    tracing::info!("Goodbye.");
}
