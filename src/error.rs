/// 自定义错误类型
///
/// 使用 thiserror 定义精确的错误类型，替代泛型的 anyhow::Error
/// 这样可以让调用者进行更精确的错误处理和恢复
use std::io;
use thiserror::Error;

/// SNI Router 的主要错误类型
#[derive(Error, Debug)]
pub enum ProxyError {
    /// 连接失败
    #[error("Failed to connect to {addr}: {source}")]
    ConnectionFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 路由文件解析错误
    #[error("Invalid route line '{line}': {reason}")]
    RouteParse { line: String, reason: String },

    /// TLS 握手失败
    #[error("TLS handshake failed: {0}")]
    HandshakeFailed(String),

    /// 超时错误
    #[error("Operation timeout after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// 未知主机名（SNI 未命中路由表）
    #[error("Unknown hostname '{hostname}'")]
    UnknownHostname { hostname: String },

    /// I/O 错误
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 其他错误（保留与 anyhow 的兼容性）
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    /// 创建连接失败错误
    pub fn connection_failed(addr: impl Into<String>, source: io::Error) -> Self {
        Self::ConnectionFailed {
            addr: addr.into(),
            source,
        }
    }

    /// 创建配置错误
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// 创建路由解析错误
    pub fn route_parse(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RouteParse {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// 创建超时错误
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout { duration }
    }

    /// 创建未知主机名错误
    pub fn unknown_hostname(hostname: impl Into<String>) -> Self {
        Self::UnknownHostname {
            hostname: hostname.into(),
        }
    }

    /// 检查是否为超时错误
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// 检查是否为配置错误
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError(_))
    }

    /// 检查是否为路由解析错误
    pub fn is_route_parse(&self) -> bool {
        matches!(self, Self::RouteParse { .. })
    }

    /// 检查是否为未知主机名错误
    pub fn is_unknown_hostname(&self) -> bool {
        matches!(self, Self::UnknownHostname { .. })
    }
}
