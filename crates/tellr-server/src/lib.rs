//! tellr Server Library
//!
//! Provides the HTTP server for tellr's ask API.

pub mod routes;
pub mod state;

use axum::{
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use tellr_core::{AssistantService, EventBus, EventHistory, TellrConfig};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use state::AppState;

static TRACING_INIT: Once = Once::new();

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Initialize tracing subscriber (only once)
///
/// A subscriber already installed by the caller is kept.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| {
                    "tellr=info,tellr_core=info,tellr_server=info,tower_http=debug".into()
                }),
            ))
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    });
}

/// Build the Axum router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // API routes
        .route("/api/health", get(health_check))
        .route("/api/ask", post(routes::ask))
        .route("/api/fanout", post(routes::fan_out))
        .route("/api/events", get(routes::list_events))
        .route("/api/events/:run_id", get(routes::run_events))
        .route("/", get(index_html))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Wire a service to a fresh event history
///
/// The collector thread lives as long as the service's event sender.
pub fn build_state(service: AssistantService, history_capacity: usize) -> anyhow::Result<AppState> {
    let bus = EventBus::new(EVENT_CHANNEL_CAPACITY);
    let history = Arc::new(EventHistory::new(history_capacity));
    history.spawn_collector(bus.receiver())?;

    Ok(AppState::new(service.with_event_sender(bus.sender()), history))
}

/// Run the tellr web server
pub async fn run_server(config: TellrConfig, offline: bool) -> anyhow::Result<()> {
    // Initialize tracing (if not already done)
    init_tracing();

    tracing::info!("Starting tellr server...");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let history_capacity = config.server.event_history;

    let service = AssistantService::from_config(config, offline)?;
    tracing::info!(oracle = service.oracle_label(), "oracle selected");

    let state = build_state(service, history_capacity)?;
    let app = build_router(state);

    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": tellr_core::version()
    }))
}

async fn index_html() -> impl IntoResponse {
    Html(
        r#"
<!DOCTYPE html>
<html>
<head>
    <title>tellr</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #10231c;
            color: #eee;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
        }
        .container {
            text-align: center;
            padding: 2rem;
        }
        h1 { color: #f5c542; }
        .status { color: #4ade80; }
        .endpoints {
            margin-top: 2rem;
            text-align: left;
            background: #173a2d;
            padding: 1rem 2rem;
            border-radius: 8px;
        }
        code {
            background: #0d5c3f;
            padding: 0.2rem 0.5rem;
            border-radius: 4px;
        }
        a { color: #f5c542; }
    </style>
</head>
<body>
    <div class="container">
        <h1>tellr</h1>
        <p class="status">Banking assistant is running</p>
        <div class="endpoints">
            <h3>API Endpoints:</h3>
            <ul>
                <li><code>GET /api/health</code> - Health check</li>
                <li><code>POST /api/ask</code> - Answer a question: <code>{"question": "..."}</code></li>
                <li><code>POST /api/fanout</code> - Run capabilities at once: <code>{"tasks": {"db": "...", "web": "..."}}</code></li>
                <li><code>GET /api/events?limit=N</code> - Recent run events</li>
                <li><code>GET /api/events/:run_id</code> - Events of one run</li>
            </ul>
        </div>
        <p style="margin-top: 2rem;">
            <a href="/api/health">Check API Health</a>
        </p>
    </div>
</body>
</html>
    "#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tellr_core::capabilities::{DbResult, StepPayload};
    use tellr_core::testing::{CountingAdapter, ScriptedOracle};
    use tellr_core::{Capability, CapabilityAdapter, CapabilityError, CapabilitySet, SharedOracle};
    use tower::ServiceExt;

    struct PanickingDb;

    impl CapabilityAdapter for PanickingDb {
        fn capability(&self) -> Capability {
            Capability::Db
        }
        fn invoke(&self, _query: &str) -> Result<StepPayload, CapabilityError> {
            panic!("row source crashed");
        }
    }

    fn test_state() -> AppState {
        let oracle: SharedOracle = Arc::new(
            ScriptedOracle::new().reply("expert banking assistant", "You have 3 grocery purchases."),
        );
        let capabilities = CapabilitySet::new(
            Arc::new(CountingAdapter::succeeding(StepPayload::Db(DbResult {
                rows: vec![],
                count: 3,
                table: None,
            }))),
            Arc::new(CountingAdapter::failing(Capability::Viz, "no chart today")),
            Arc::new(CountingAdapter::failing(
                Capability::Web,
                "Missing TAVILY_API_KEY in environment.",
            )),
        )
        .unwrap();
        let service = AssistantService::with_components(TellrConfig::default(), oracle, capabilities);
        build_state(service, 64).unwrap()
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(build_router(test_state()), "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_ask_returns_result() {
        let app = build_router(test_state());
        let (status, body) = send(
            app,
            "POST",
            "/api/ask",
            Some(json!({"question": "How much did I spend on groceries?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["answer"], "You have 3 grocery purchases.");
        assert_eq!(body["result"]["db"]["count"], 3);
    }

    #[tokio::test]
    async fn test_ask_empty_question() {
        let app = build_router(test_state());
        let (status, body) = send(app, "POST", "/api/ask", Some(json!({"question": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Empty question"}));
    }

    #[tokio::test]
    async fn test_capability_error_is_a_result() {
        let app = build_router(test_state());
        let (status, body) = send(
            app,
            "POST",
            "/api/ask",
            Some(json!({"question": "What are the latest mortgage rates?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"result": {"error": "Missing TAVILY_API_KEY in environment."}})
        );
    }

    #[tokio::test]
    async fn test_capability_panic_is_a_result() {
        let capabilities = CapabilitySet::new(
            Arc::new(PanickingDb),
            Arc::new(CountingAdapter::failing(Capability::Viz, "no chart today")),
            Arc::new(CountingAdapter::failing(Capability::Web, "no search today")),
        )
        .unwrap();
        let service = AssistantService::with_components(
            TellrConfig::default(),
            Arc::new(ScriptedOracle::new()),
            capabilities,
        );
        let app = build_router(build_state(service, 64).unwrap());

        let (status, body) = send(
            app,
            "POST",
            "/api/ask",
            Some(json!({"question": "List my transactions"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": {"error": "db capability panicked"}}));
    }

    #[tokio::test]
    async fn test_fan_out_reports_each_capability() {
        let app = build_router(test_state());
        let (status, body) = send(
            app,
            "POST",
            "/api/fanout",
            Some(json!({"tasks": {"db": "rows", "viz": "chart"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"]["db"]["count"], 3);
        assert_eq!(body["errors"]["viz"], "no chart today");
    }

    #[tokio::test]
    async fn test_events_recorded_per_run() {
        let state = test_state();
        let (status, _) = send(
            build_router(state.clone()),
            "POST",
            "/api/ask",
            Some(json!({"question": "List my transactions"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // The collector runs on its own thread
        let mut events = Vec::new();
        for _ in 0..50 {
            events = state.history.snapshot();
            if events.iter().any(|e| matches!(e.kind, tellr_core::EventKind::RunFinished { .. })) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let run_id = events.first().map(|e| e.run_id).unwrap();

        let uri = format!("/api/events/{}", run_id);
        let (status, body) = send(build_router(state.clone()), "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events"][0]["event"], "run_started");

        let (status, _) = send(build_router(state), "GET", "/api/events/not-a-run", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
