/// 路由表模块
///
/// 维护主机名到本地端口的映射，供所有连接处理器并发查询。
/// 重载时整表替换：查询方要么看到旧表，要么看到新表，不会看到中间状态
use crate::error::{ProxyError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// 共享路由表
///
/// 克隆句柄开销很小，可以安全地分发给每个连接处理任务
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    inner: Arc<RwLock<HashMap<String, u16>>>,
}

impl RoutingTable {
    /// 创建空路由表
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询主机名对应的本地端口
    ///
    /// 查询键统一转换为小写，与加载时的归一化保持一致
    pub fn lookup(&self, hostname: &str) -> Option<u16> {
        self.inner.read().get(&hostname.to_ascii_lowercase()).copied()
    }

    /// 整表替换为新的映射
    pub fn replace(&self, routes: HashMap<String, u16>) {
        *self.inner.write() = routes;
    }

    /// 当前条目数
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// 从文件重新加载路由表
    ///
    /// 先完整解析再替换；解析失败时不触碰现有表，旧条目继续生效
    pub fn reload_from(&self, path: &Path) -> Result<usize> {
        let routes = load_routes(path)?;
        let count = routes.len();
        self.replace(routes);
        info!("Loaded {} route(s) from {}", count, path.display());
        Ok(count)
    }
}

/// 读取并解析路由文件
///
/// 文件不存在时连同父目录一起创建（得到一个空表），
/// 已存在时只读打开
pub fn load_routes(path: &Path) -> Result<HashMap<String, u16>> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| {
                ProxyError::config_error(format!(
                    "could not create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
    }

    // 已存在时只读打开；不存在时先创建一个空文件
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            File::create(path).map_err(|e| {
                ProxyError::config_error(format!(
                    "failed creating route file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            File::open(path)?
        }
        Err(e) => {
            return Err(ProxyError::config_error(format!(
                "failed opening route file {}: {}",
                path.display(),
                e
            )));
        }
    };

    parse_routes(BufReader::new(file))
}

/// 逐行解析路由定义
///
/// 行格式为 `hostname:port`；空行和 `#` 开头的行跳过。
/// 任何一行非法都会导致整个解析失败，不产生部分结果
fn parse_routes<R: BufRead>(reader: R) -> Result<HashMap<String, u16>> {
    let mut routes = HashMap::new();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() != 2 {
            return Err(ProxyError::route_parse(
                trimmed,
                "line must have format 'hostname:port'",
            ));
        }

        let hostname = parts[0];
        if hostname.is_empty() {
            return Err(ProxyError::route_parse(trimmed, "hostname must not be empty"));
        }

        let port: u16 = parts[1].parse().map_err(|_| {
            ProxyError::route_parse(trimmed, "port must be an integer in range 1-65535")
        })?;
        if port == 0 {
            return Err(ProxyError::route_parse(
                trimmed,
                "port must be in range 1-65535",
            ));
        }

        // 同名主机后出现的条目覆盖先出现的
        routes.insert(hostname.to_ascii_lowercase(), port);
    }

    Ok(routes)
}
