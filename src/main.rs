use anyhow::{Context, Result};
use clap::Parser;
use sni_router::cli::{Cli, Commands};
use sni_router::config::ProxyConfig;
use sni_router::metrics::MetricsSink;
use sni_router::routes::{self, RoutingTable};
use sni_router::{server, tls, watcher};
use std::path::{Path, PathBuf};
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_level.clone())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Display version information
    info!("SNI Router v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve {
            host,
            port,
            cert,
            key,
            routes,
            metrics,
        } => {
            let config = ProxyConfig {
                listen_host: host,
                listen_port: port,
                cert_path: cert,
                key_path: key,
                routes_path: routes,
                metrics_path: metrics,
            };
            config.validate()?;
            run_serve(config).await?;
        }
        Commands::Check { routes } => {
            check_routes(&routes)?;
        }
        Commands::Cert {
            cert_out,
            key_out,
            common_name,
            alt_names,
        } => {
            generate_certificate(&cert_out, &key_out, &common_name, &alt_names)?;
        }
    }

    Ok(())
}

/// 装配并运行代理
async fn run_serve(config: ProxyConfig) -> Result<()> {
    // 启动时路由文件必须有效；之后的重载失败只保留旧表，不影响服务
    let table = RoutingTable::new();
    table
        .reload_from(&config.routes_path)
        .context("Failed loading initial routing table")?;

    // watcher 句柄释放后监听随之停止，持有到进程结束
    let _watcher = watcher::spawn_routes_watcher(config.routes_path.clone(), table.clone())?;

    let metrics = match &config.metrics_path {
        Some(path) => match MetricsSink::open(path) {
            Ok(sink) => sink,
            Err(e) => {
                warn!("Failed to init metrics: {}", e);
                MetricsSink::disabled()
            }
        },
        None => {
            info!("No metrics file provided. Metric logging disabled");
            MetricsSink::disabled()
        }
    };

    let tls_config = tls::load_server_config(&config.cert_path, &config.key_path)
        .context("Failed to load certificate")?;
    let acceptor = TlsAcceptor::from(tls_config);

    server::run_server(config, acceptor, table, metrics).await
}

/// 检查路由文件格式
fn check_routes(path: &Path) -> Result<()> {
    println!("Checking route file: {}\n", path.display());

    match routes::load_routes(path) {
        Ok(table) => {
            let mut entries: Vec<_> = table.into_iter().collect();
            entries.sort();
            for (hostname, port) in &entries {
                println!("✓ {} -> 127.0.0.1:{}", hostname, port);
            }
            println!("\n✓ {} route(s) loaded successfully!", entries.len());
            Ok(())
        }
        Err(e) => {
            println!("✗ Route file validation failed!");
            println!("\nError details:");
            println!("{}", e);

            println!("\nCommon issues:");
            println!("  1. Each line must have format 'hostname:port'");
            println!("  2. Ports must be integers in range 1-65535");
            println!("  3. Lines starting with '#' are comments");
            println!("  4. Blank lines are ignored");

            Err(e.into())
        }
    }
}

/// 生成自签名 TLS 证书
fn generate_certificate(
    cert_out: &PathBuf,
    key_out: &PathBuf,
    common_name: &str,
    alt_names: &[String],
) -> Result<()> {
    for path in [cert_out, key_out] {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory {:?}", dir))?;
            }
        }
    }

    tls::generate_self_signed_cert(common_name, alt_names, cert_out, key_out)?;

    println!("Generated self-signed certificate: {}", cert_out.display());
    println!("Generated private key: {}", key_out.display());

    Ok(())
}
