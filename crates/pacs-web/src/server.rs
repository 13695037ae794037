//! Web服务器

use axum::{
    routing::{get, post},
    Router,
};
use pacs_core::{PacsError, Result, StudyStore};
use pacs_triage::TriageService;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::{api_root, get_studies, get_study_detail, health, triage_study};

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new<S: StudyStore + 'static>(addr: SocketAddr, service: Arc<TriageService<S>>) -> Self {
        Self {
            addr,
            app: create_app(service),
        }
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| PacsError::Internal(format!("Web server stopped: {}", e)))?;

        Ok(())
    }
}

/// 构建完整路由
pub fn create_app<S: StudyStore + 'static>(service: Arc<TriageService<S>>) -> Router {
    Router::new()
        // 根路径
        .route("/", get(api_root))
        // 健康检查
        .route("/health", get(health))
        // API路由
        .nest("/api/v1", api_routes(service))
        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

/// API v1 路由
fn api_routes<S: StudyStore + 'static>(service: Arc<TriageService<S>>) -> Router {
    Router::new()
        .route("/", get(api_root))
        .route("/studies", get(get_studies::<S>))
        .route("/studies/:study_id", get(get_study_detail::<S>))
        .route("/triage/:study_id", post(triage_study::<S>))
        .with_state(service)
}
