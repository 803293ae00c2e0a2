use super::ServerState;
use crate::error::{ProxyError, Result};
use crate::metrics::ConnectionMetrics;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

/// TLS 握手超时
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);

/// 转发缓冲区大小
const COPY_BUF_SIZE: usize = 8192;

/// 主机名未命中路由表时回复给客户端的提示
const UNKNOWN_HOSTNAME_REPLY: &[u8] =
    b"Unknown hostname. Please reconnect using a known hostname. Your instance might have expired.\n";

/// 处理单个接入连接的完整生命周期
///
/// 握手、查表、拨号、双向转发、指标上报依次进行；
/// 任何一步失败都终止本连接，不产生重试。
/// 后端拨号成功之前失败的连接不产生指标记录
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    acceptor: TlsAcceptor,
    state: Arc<ServerState>,
) -> Result<()> {
    // 1. 带超时的 TLS 握手
    let mut tls_stream = match timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(ProxyError::HandshakeFailed(e.to_string())),
        Err(_) => return Err(ProxyError::timeout(HANDSHAKE_TIMEOUT)),
    };

    // 2. 从会话状态读取协商出的 SNI 并查路由表
    let hostname = {
        let (_, server_conn) = tls_stream.get_ref();
        server_conn
            .server_name()
            .unwrap_or_default()
            .to_ascii_lowercase()
    };

    debug!("Handshake completed, target server: '{}'", hostname);

    let port = if hostname.is_empty() {
        None
    } else {
        state.routes.lookup(&hostname)
    };
    let Some(port) = port else {
        // 回复一行提示后断开；这是唯一会带诊断信息关闭的失败路径
        let _ = tls_stream.write_all(UNKNOWN_HOSTNAME_REPLY).await;
        let _ = tls_stream.shutdown().await;
        return Err(ProxyError::unknown_hostname(hostname));
    };

    // 3. 拨号后端：环回地址上的明文 TCP，单次尝试
    let target_addr = format!("127.0.0.1:{}", port);
    let backend = TcpStream::connect(&target_addr)
        .await
        .map_err(|e| ProxyError::connection_failed(target_addr.clone(), e))?;

    info!("Proxying '{}' to {}", hostname, target_addr);

    let connected_at = Utc::now();

    // 4. 双向转发
    let (mut client_read, mut client_write) = tokio::io::split(tls_stream);
    let (mut backend_read, mut backend_write) = backend.into_split();

    // 客户端 -> 后端；源端结束后半关闭后端写端，让后端把剩余响应发完
    let client_to_backend = async {
        let (n, result) = copy_counted(&mut client_read, &mut backend_write).await;
        if let Err(e) = result {
            warn!("Error copying client to backend: {}", e);
        }
        debug!("Client side finished sending");
        let _ = backend_write.shutdown().await;
        n
    };

    // 后端 -> 客户端；源端结束后关闭客户端连接（发送 close_notify）
    let backend_to_client = async {
        let (n, result) = copy_counted(&mut backend_read, &mut client_write).await;
        if let Err(e) = result {
            warn!("Error copying backend to client: {}", e);
        }
        debug!("Backend finished sending");
        let _ = client_write.shutdown().await;
        n
    };

    // 用 join! 而不是 select!：两个方向都结束后字节数才是最终值
    let (bytes_received, bytes_sent) = tokio::join!(client_to_backend, backend_to_client);

    debug!("Connection from {} terminating", peer_addr);

    // 5. 收尾：两个方向都结束后恰好上报一条指标记录
    state.metrics.record(&ConnectionMetrics {
        client_address: peer_addr.to_string(),
        target_address: target_addr,
        hostname,
        bytes_sent,
        bytes_received,
        connected_at,
        disconnected_at: Utc::now(),
    });

    Ok(())
}

/// 将 reader 的全部数据拷贝到 writer，返回转发的字节数
///
/// 与 io::copy 的区别：出错时同样返回已经转发的字节数，
/// 保证指标里的计数和实际穿过代理的字节严格一致
async fn copy_counted<R, W>(reader: &mut R, writer: &mut W) -> (u64, std::io::Result<()>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; COPY_BUF_SIZE];
    let mut total = 0u64;

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => return (total, Ok(())),
            Ok(n) => {
                if let Err(e) = writer.write_all(&buf[..n]).await {
                    return (total, Err(e));
                }
                total += n as u64;
            }
            Err(e) => return (total, Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_copy_counted_empty_stream() {
        let (mut a, b) = duplex(64);
        drop(b);
        let mut out = Vec::new();

        let (n, result) = copy_counted(&mut a, &mut out).await;
        assert_eq!(n, 0);
        assert!(result.is_ok());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_copy_counted_counts_every_byte() {
        let (mut a, mut b) = duplex(1024);
        let payload = vec![0xabu8; 100_000];

        let writer = {
            let payload = payload.clone();
            tokio::spawn(async move {
                b.write_all(&payload).await.unwrap();
                b.shutdown().await.unwrap();
            })
        };

        let mut out = Vec::new();
        let (n, result) = copy_counted(&mut a, &mut out).await;
        writer.await.unwrap();

        assert!(result.is_ok());
        assert_eq!(n, payload.len() as u64);
        assert_eq!(out, payload);
    }

    #[tokio::test]
    async fn test_copy_counted_keeps_count_on_write_error() {
        let (mut a, mut b) = duplex(1024);

        tokio::spawn(async move {
            b.write_all(b"0123456789").await.unwrap();
            b.shutdown().await.unwrap();
        });

        // Writer half of a second duplex whose reader is dropped: writes fail
        let (closed_writer, closed_reader) = duplex(4);
        drop(closed_reader);
        let mut closed_writer = closed_writer;

        let (n, result) = copy_counted(&mut a, &mut closed_writer).await;
        assert!(result.is_err());
        // No bytes were accepted by the closed peer
        assert_eq!(n, 0);
    }
}
