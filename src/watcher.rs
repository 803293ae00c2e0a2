/// 路由文件热重载
///
/// 监听路由文件所在目录并按文件名过滤事件：编辑器保存时往往会
/// 删除重建文件，直接监听文件本身会在第一次重建后失效
use crate::error::{ProxyError, Result};
use crate::routes::RoutingTable;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// 启动路由文件监听
///
/// 返回的 watcher 必须由调用方持有：句柄释放后监听随之停止。
/// 重载失败只记录日志，当前生效的路由表保持不变
pub fn spawn_routes_watcher(path: PathBuf, routes: RoutingTable) -> Result<RecommendedWatcher> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let mut watcher =
        notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
            let _ = tx.send(res);
        })
        .map_err(|e| {
            ProxyError::config_error(format!("failed setting up filesystem watcher: {}", e))
        })?;

    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    watcher
        .watch(&directory, RecursiveMode::NonRecursive)
        .map_err(|e| {
            ProxyError::config_error(format!(
                "failed watching directory {}: {}",
                directory.display(),
                e
            ))
        })?;

    info!("Filesystem watcher initialized for file {}", path.display());

    tokio::spawn(async move {
        while let Some(res) = rx.recv().await {
            match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        continue;
                    }
                    if !event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == path.file_name())
                    {
                        continue;
                    }

                    debug!("Route file changed: {:?}", event.kind);

                    if let Err(e) = routes.reload_from(&path) {
                        // 旧表继续生效
                        error!(
                            "Failed reloading routes (triggered by file watcher): {}",
                            e
                        );
                    }
                }
                Err(e) => {
                    warn!("Filesystem watcher got error: {}", e);
                }
            }
        }

        // 事件通道关闭后热重载失效，代理继续用最后一张表服务
        error!("Filesystem watcher channel closed; live route reload disabled");
    });

    Ok(watcher)
}
