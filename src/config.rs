/// 进程配置
///
/// 全部来自启动参数；除路由文件内容可热重载外，其余启动后不可变
use crate::error::{ProxyError, Result};
use std::path::PathBuf;

/// 代理进程配置
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// 监听地址
    pub listen_host: String,
    /// 监听端口
    pub listen_port: u16,
    /// TLS 证书路径
    pub cert_path: PathBuf,
    /// TLS 私钥路径
    pub key_path: PathBuf,
    /// 路由文件路径
    pub routes_path: PathBuf,
    /// 指标输出文件路径（None 表示禁用指标）
    pub metrics_path: Option<PathBuf>,
}

impl ProxyConfig {
    /// 校验配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.listen_host.trim().is_empty() {
            return Err(ProxyError::config_error("listen host must not be empty"));
        }
        if self.listen_port == 0 {
            return Err(ProxyError::config_error("listen port must not be 0"));
        }
        if self.routes_path.as_os_str().is_empty() {
            return Err(ProxyError::config_error(
                "routes file path must not be empty",
            ));
        }
        if self.cert_path.as_os_str().is_empty() || self.key_path.as_os_str().is_empty() {
            return Err(ProxyError::config_error(
                "certificate and key paths must not be empty",
            ));
        }
        Ok(())
    }

    /// 监听地址字符串
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}
