//! PACS影像分诊服务主程序

use anyhow::{Context, Result};
use clap::Parser;
use pacs_admin::{init_logging, ConfigManager};
use pacs_database::{DatabasePool, DatabaseQueries};
use pacs_triage::{AdvisorSettings, ChatCompletionsBackend, SimilarityRanker, TriageAdvisor, TriageBackend, TriageService};
use pacs_web::WebServer;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// 分诊服务命令行参数
#[derive(Parser, Debug)]
#[command(name = "pacs-server")]
#[command(about = "PACS 影像分诊服务：相似病例检索与优先级建议")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 监听地址，覆盖配置文件
    #[arg(long)]
    host: Option<String>,

    /// 监听端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigManager::load(args.config.as_deref())?.into_config();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // 初始化日志
    init_logging(&config.logging, args.log_level.as_deref())?;

    info!("启动PACS分诊服务...");
    info!("  数据库: {}:{}/{}", config.database.host, config.database.port, config.database.name);
    info!("  相似病例: limit={}, threshold={}", config.ranker.limit, config.ranker.threshold);

    let pool = DatabasePool::connect(&config.database).await?;
    let store = DatabaseQueries::new(pool);
    store.create_tables().await?;

    // 后端客户端只构建一次，之后只读共享
    let backend = ChatCompletionsBackend::from_config(&config.backend)?
        .map(|backend| Arc::new(backend) as Arc<dyn TriageBackend>);
    if backend.is_none() {
        warn!("DEEPSEEK_API_KEY not configured, triage will use the default MEDIUM suggestion");
    }

    let advisor = TriageAdvisor::new(backend, AdvisorSettings::from(&config.backend));
    let ranker = SimilarityRanker::new(config.ranker.clone());
    let service = Arc::new(TriageService::new(Arc::new(store), ranker, advisor));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    WebServer::new(addr, service).run().await?;
    Ok(())
}
