//! Service entry point: configuration, wiring, listeners, and shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use recall_context::{SynthesisEngine, UnifiedContextManager};
use recall_llm::{CompletionClient, HttpCompletionClient, ProviderConfig, ProviderKind};
use recall_retrieval::{
    IntentAnalyzer, KnowledgeSearch, MemoryKnowledgeStore, MemoryTimelineStore, MemoryVectorStore,
    TimelineSearch, VectorSearch, WideRecallRetriever,
};
use recall_server::init_dialog::InitDialogRegistry;
use recall_server::push::PushChannel;
use recall_server::{ServerState, router};
use recall_settings::{Settings, get_settings, init_settings, load_settings};
use recall_store::{DataLayout, MemoryStore, SessionStore, UserStore};
use tracing::{info, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Programming-context memory service.
#[derive(Debug, Parser)]
#[command(name = "recall", version, about)]
struct Cli {
    /// Bind address override.
    #[arg(long)]
    host: Option<String>,
    /// HTTP (RPC) port override.
    #[arg(long)]
    http_port: Option<u16>,
    /// Data directory override.
    #[arg(long)]
    data_dir: Option<std::path::PathBuf>,
    /// Log filter (overrides RUST_LOG).
    #[arg(long)]
    log_level: Option<String>,
}

fn init_tracing(cli: &Cli) {
    let filter = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn build_llm(settings: &Settings) -> Arc<dyn CompletionClient> {
    let kind = ProviderKind::parse(&settings.llm.provider).unwrap_or_else(|| {
        warn!(provider = %settings.llm.provider, "unknown LLM provider, using deepseek");
        ProviderKind::DeepSeek
    });
    let api_key = std::env::var("LLM_API_KEY").unwrap_or_default();
    Arc::new(HttpCompletionClient::new(ProviderConfig::new(
        kind,
        api_key,
        settings.llm.model.clone(),
    )))
}

struct Adapters {
    timeline: Option<Arc<dyn TimelineSearch>>,
    knowledge: Option<Arc<dyn KnowledgeSearch>>,
    vector: Option<Arc<dyn VectorSearch>>,
}

/// Backend selection. Vendor drivers plug in here; the in-memory adapters
/// back the `memory` selector and `disabled` leaves a dimension skipped.
fn build_adapters(settings: &Settings) -> Adapters {
    match settings.storage.vector_store_type.as_str() {
        "memory" => Adapters {
            timeline: Some(Arc::new(MemoryTimelineStore::new())),
            knowledge: Some(Arc::new(MemoryKnowledgeStore::new())),
            vector: Some(Arc::new(MemoryVectorStore::new())),
        },
        other => {
            if other != "disabled" {
                warn!(vector_store_type = other, "unknown storage backend, retrieval disabled");
            }
            Adapters {
                timeline: None,
                knowledge: None,
                vector: None,
            }
        }
    }
}

fn build_state(settings: Arc<Settings>) -> ServerState {
    let layout = DataLayout::new(settings.storage.data_dir.clone());
    let sessions = Arc::new(SessionStore::with_layout(layout.clone()));
    let users = Arc::new(UserStore::with_layout(layout.clone()));
    let memories = Arc::new(MemoryStore::with_layout(layout));

    let llm = build_llm(&settings);
    let adapters = build_adapters(&settings);
    let retriever = Arc::new(WideRecallRetriever::new(
        adapters.timeline,
        adapters.knowledge,
        adapters.vector,
        settings.timeouts.retrieval_dimension,
    ));
    let contexts = Arc::new(UnifiedContextManager::new(
        IntentAnalyzer::new(Arc::clone(&llm)),
        retriever,
        SynthesisEngine::new(Arc::clone(&llm), settings.timeouts.llm),
        settings.timeouts.llm,
    ));

    ServerState {
        sessions,
        users: Arc::clone(&users),
        memories,
        contexts,
        llm,
        push: Arc::new(PushChannel::new(settings.timeouts.push_ack)),
        init_dialogs: Arc::new(InitDialogRegistry::new(users)),
        settings,
    }
}

/// Periodically archive expired sessions.
fn spawn_cleanup(state: Arc<ServerState>) {
    let interval = state.settings.session.cleanup_interval;
    let timeout = state.settings.session.timeout;
    drop(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        loop {
            let _ = ticker.tick().await;
            let archived = state.sessions.archive_expired(timeout);
            if archived > 0 {
                info!(archived, "archived expired sessions");
            }
        }
    }));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut settings = load_settings();
    if let Some(host) = cli.host.clone() {
        settings.server.host = host;
    }
    if let Some(port) = cli.http_port {
        settings.server.http_port = port;
    }
    if let Some(dir) = cli.data_dir.clone() {
        settings.storage.data_dir = dir;
    }
    init_settings(settings);
    let settings = get_settings();

    recall_server::metrics::describe();
    let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("installing prometheus recorder")?;

    let state = Arc::new(build_state(Arc::clone(&settings)));
    spawn_cleanup(Arc::clone(&state));

    let app = router(Arc::clone(&state)).route(
        "/metrics",
        axum_metrics_route(prometheus),
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(
        addr = %addr,
        data_dir = %settings.storage.data_dir.display(),
        provider = %settings.llm.provider,
        model = %settings.llm.model,
        "recall service listening"
    );

    // Dedicated push listener, unless it shares the RPC port.
    if settings.server.ws_port != settings.server.http_port {
        let ws_addr = format!("{}:{}", settings.server.host, settings.server.ws_port);
        let ws_listener = tokio::net::TcpListener::bind(&ws_addr)
            .await
            .with_context(|| format!("binding {ws_addr}"))?;
        let ws_app = recall_server::http::ws_router(Arc::clone(&state));
        info!(addr = %ws_addr, "websocket listener ready");
        drop(tokio::spawn(async move {
            if let Err(e) = axum::serve(ws_listener, ws_app).await {
                warn!(error = %e, "websocket listener exited");
            }
        }));
    }

    let shutdown_state = Arc::clone(&state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received, draining push channel");
            shutdown_state.push.disconnect_all();
        })
        .await
        .context("serving")?;
    Ok(())
}

fn axum_metrics_route(
    handle: metrics_exporter_prometheus::PrometheusHandle,
) -> axum::routing::MethodRouter {
    axum::routing::get(move || {
        let handle = handle.clone();
        async move { handle.render() }
    })
}
