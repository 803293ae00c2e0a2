pub mod connection;

use crate::config::ProxyConfig;
use crate::metrics::MetricsSink;
use crate::routes::RoutingTable;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info};

/// 服务器共享状态
///
/// 路由表是唯一被连接处理器和重载路径共享的可变状态；
/// 指标沉降器内部自行串行化写入
pub struct ServerState {
    pub config: Arc<ProxyConfig>,
    pub routes: RoutingTable,
    pub metrics: MetricsSink,
}

impl ServerState {
    /// 从配置和依赖创建状态
    pub fn new(config: ProxyConfig, routes: RoutingTable, metrics: MetricsSink) -> Self {
        Self {
            config: Arc::new(config),
            routes,
            metrics,
        }
    }
}

/// 运行代理服务器
///
/// 接受循环是唯一的顶层驱动：每个连接交给独立任务处理，
/// 单次 accept 失败只记录日志，不会终止监听
pub async fn run_server(
    config: ProxyConfig,
    acceptor: TlsAcceptor,
    routes: RoutingTable,
    metrics: MetricsSink,
) -> Result<()> {
    let state = Arc::new(ServerState::new(config, routes, metrics));

    let listen_addr = state.config.listen_address();
    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to start proxy listener on {}", listen_addr))?;

    info!("Listening on {}", listen_addr);
    info!("Waiting for client connections... (Press Ctrl+C to stop)");

    // 设置 Ctrl+C 处理
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        info!("Got a new connection from: {}", peer_addr);

                        let state = Arc::clone(&state);
                        let acceptor = acceptor.clone();

                        tokio::spawn(async move {
                            if let Err(e) = connection::handle_connection(stream, peer_addr, acceptor, state).await {
                                error!("Connection from {} ended with error: {}", peer_addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed accepting client: {}", e);
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Received shutdown signal, stopping server...");
                break;
            }
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}
