/// SNI Router 库入口
///
/// 将核心模块导出为库，方便测试和复用
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod tls;
pub mod watcher;

// 重新导出常用类型
pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use metrics::{ConnectionMetrics, MetricsSink};
pub use routes::RoutingTable;
