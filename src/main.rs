use clap::Parser;
use dotenvy::dotenv;
use pdf2img_web::config::{ConverterConfig, LogConfig};
use pdf2img_web::infrastructure::{storage, tools};
use pdf2img_web::services::converter::ConversionService;
use pdf2img_web::services::worker::BackgroundWorker;
use pdf2img_web::{AppState, create_app};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Converts uploaded PDFs into archives of page images", long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = 7219)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let log_config = LogConfig::from_env();

    // RUST_LOG wins over LOG_FILTER
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_config.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting pdf2img-web...");

    let config = ConverterConfig::from_env();
    info!(
        "⚙️  Converter Config: Max Size={}MB, Format={:?}, Archiver={}, Timeout={:?}, Retention={}s",
        config.max_file_size / 1024 / 1024,
        config.image_format,
        config.archiver_type,
        config.tool_timeout,
        config.archive_retention.as_secs()
    );
    if log_config.verbose_requests {
        warn!("Verbose request logging is on; request headers will be logged at debug level");
    }

    // Setup Infrastructure
    let layout = storage::setup_storage(&config).await?;
    let (rasterizer, archiver) = tools::setup_tools(&config).await;

    let converter = Arc::new(ConversionService::new(
        layout.clone(),
        rasterizer,
        archiver,
        &config,
    ));

    let state = AppState {
        converter,
        config: config.clone(),
        log: log_config,
    };

    // Setup Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // Start Retention Sweeper
    let worker = BackgroundWorker::new(
        layout,
        config.archive_retention,
        config.sweep_interval,
        shutdown_rx,
    );
    tokio::spawn(async move {
        worker.run().await;
    });

    let app = create_app(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            ),
    );

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("✅ Server ready at http://{}", addr);
    info!("📖 OpenAPI: http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
