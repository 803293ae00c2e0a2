use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sni-router")]
#[command(author, version, about = "SNI-based TLS reverse proxy", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 运行代理服务器
    Serve {
        /// 监听地址
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// 监听端口
        #[arg(short, long, default_value_t = 1337)]
        port: u16,

        /// TLS 证书路径
        #[arg(long, default_value = "certs/certificate.pem")]
        cert: PathBuf,

        /// TLS 私钥路径
        #[arg(long, default_value = "certs/priv.key")]
        key: PathBuf,

        /// 路由文件路径（每行一条 hostname:port）
        #[arg(long, default_value = "targets.txt")]
        routes: PathBuf,

        /// 流量指标输出文件（省略则不记录指标）
        #[arg(short, long)]
        metrics: Option<PathBuf>,
    },
    /// 检查路由文件格式是否正确
    Check {
        /// 路由文件路径
        #[arg(short, long)]
        routes: PathBuf,
    },
    /// 生成自签名证书
    Cert {
        /// 证书输出路径（cert.pem）
        #[arg(long, default_value = "certs/certificate.pem")]
        cert_out: PathBuf,

        /// 私钥输出路径（key.pem）
        #[arg(long, default_value = "certs/priv.key")]
        key_out: PathBuf,

        /// 证书的 Common Name
        #[arg(long, default_value = "localhost")]
        common_name: String,

        /// 证书的 SubjectAltName（用逗号分隔多个）
        #[arg(long, value_delimiter = ',', value_name = "DNS,...")]
        alt_names: Vec<String>,
    },
}
