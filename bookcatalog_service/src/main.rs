use std::path::{Path, PathBuf};
use std::sync::Arc;

use actix_web::{App, HttpServer};
use anyhow::Context;
use clap::Parser;
use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::runtime::TokioCurrentThread;
use paperclip::actix::{web, OpenApiExt};
use tracing_actix_web::TracingLogger;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use bookcatalog_service::app_config::{config_app, json_config, path_config, query_config};
use bookcatalog_service::books_repository::{
    BookRepository, InMemoryBookRepository, PostgresBooksRepository,
};
use bookcatalog_service::catalog;
use bookcatalog_service::settings::Settings;

/// Book catalog HTTP service, configured through environment variables
#[derive(Parser, Debug)]
#[command(name = "bookcatalog_service")]
#[command(version)]
struct Args {
    /// JSON array of books with ids loaded before the server starts
    #[arg(long)]
    load_sample: Option<PathBuf>,
}

// Based on https://github.com/LukeMathWalker/tracing-actix-web/blob/main/examples/opentelemetry/src/main.rs#L15
fn init_telemetry() {
    let app_name = "bookcatalog_service";

    // Start a new Jaeger trace pipeline.
    // Spans are exported in batch - recommended setup for a production application.
    global::set_text_map_propagator(TraceContextPropagator::new());
    #[allow(deprecated)]
    let tracer = opentelemetry_jaeger::new_agent_pipeline()
        .with_service_name(app_name)
        .install_batch(TokioCurrentThread)
        .expect("Failed to install OpenTelemetry tracer.");

    // Filter based on level - trace, debug, info, warn, error
    // Tunable via `RUST_LOG` env variable
    let env_filter = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("info"));
    // Create a `tracing` layer using the Jaeger tracer
    let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);
    // Create a `tracing` layer to emit spans as structured logs to stdout
    let formatting_layer = BunyanFormattingLayer::new(app_name.into(), std::io::stdout);
    // Combined them all together in a `tracing` subscriber
    let subscriber = Registry::default()
        .with(env_filter)
        .with(telemetry)
        .with(JsonStorageLayer)
        .with(formatting_layer);
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to install `tracing` subscriber.")
}

/// Loads a JSON array of books with ids, e.g. `--load-sample books.json`
async fn load_sample(
    books_repository: &dyn BookRepository,
    path: &Path,
) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read sample file {}", path.display()))?;
    let books: Vec<serde_json::Value> =
        serde_json::from_str(&content).context("Sample file is not a JSON array")?;
    let loaded = catalog::load_sample_books(books_repository, books)
        .await
        .context("Failed to load sample books")?;
    tracing::info!("Loaded {} sample books from {}", loaded, path.display());
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_telemetry();
    let settings = Settings::load()?;

    let books_repository: Arc<dyn BookRepository> = if settings.use_in_memory_db {
        Arc::new(InMemoryBookRepository::default())
    } else {
        Arc::new(
            PostgresBooksRepository::init(settings.postgres_config())
                .await
                .context("Failed to init postgres")?,
        )
    };

    if let Some(path) = &args.load_sample {
        load_sample(books_repository.as_ref(), path).await?;
    }

    tracing::info!(
        "starting HTTP server at http://{}:{}",
        settings.bind_address,
        settings.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap_api()
            .app_data(web::Data::new(books_repository.clone()))
            .app_data(json_config())
            .app_data(query_config())
            .app_data(path_config())
            .wrap(TracingLogger::default())
            .configure(config_app)
            .with_json_spec_at("/apispec/v2")
            .build()
    })
    .bind((settings.bind_address.as_str(), settings.port))?
    .run()
    .await?;
    Ok(())
}
