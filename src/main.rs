//! Excel 产品图服务主入口

use excel_produktbilder::{
    config::AppConfig,
    handlers::health,
    middleware::AppState,
    routes,
    services::{EnrichmentService, HttpImageFetcher},
    telemetry,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("excel-produktbilder {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）
    // 按优先级加载：.env.local > .env.development > .env
    if let Ok(name) = std::env::var("EXCEL_ENV") {
        dotenv::from_filename(format!(".env.{}", name)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 运行时，工作线程数来自配置
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers)
        .enable_all()
        .build()?;

    // 关闭时不无限等待仍在 blocking 线程上的工作
    let grace = Duration::from_secs(config.server.graceful_shutdown_timeout_secs);
    let result = runtime.block_on(serve(config));
    runtime.shutdown_timeout(grace);
    result
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    // 3. 初始化日志与指标
    telemetry::init_telemetry(&config);
    telemetry::init_metrics();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        workers = config.server.workers,
        request_timeout_secs = config.server.request_timeout_secs,
        "Excel image service starting..."
    );

    // 4. 构建应用状态
    let fetcher = Arc::new(HttpImageFetcher::new(&config.images)?);
    let enrichment_service = Arc::new(EnrichmentService::new(fetcher, config.images.clone()));

    let app_state = Arc::new(AppState {
        config: config.clone(),
        enrichment_service,
    });

    // 5. 构建路由
    let app = routes::create_router(app_state);

    // 6. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 7. 优雅关闭
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    let grace = Duration::from_secs(config.server.graceful_shutdown_timeout_secs);

    tokio::select! {
        result = server => result?,
        _ = drain_deadline(grace) => {
            tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }
}

/// 收到关闭信号后再等待 grace，超时则放弃仍在处理的请求
async fn drain_deadline(grace: Duration) {
    shutdown_signal().await;
    tokio::time::sleep(grace).await;
}

/// 打印帮助信息
fn print_help() {
    println!("excel-produktbilder {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: excel-produktbilder [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  PORT                          监听端口（默认 8080）");
    println!("  EXCEL_SERVER__WORKERS         工作线程数（默认 2）");
    println!("  EXCEL_SERVER__REQUEST_TIMEOUT_SECS  请求超时（默认 120）");
    println!("  EXCEL_IMAGES__BASE_URL        产品图服务器地址");
    println!("  其余选项请参考 .env.example");
}
