// apps/cn_cli/src/main.rs

//! ClimNet 命令行界面
//!
//! 气候相关网络批处理运行的命令行工具。
//!
//! # 子命令
//!
//! - `run`: 执行一次完整的批处理运行（含分片合并）
//! - `merge`: 手动合并分片（用于中断运行的事后恢复）
//! - `info`: 显示结果存储的元数据
//! - `grid-cache`: 构建/校验网格缓存工件

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// ClimNet 气候网络分析命令行工具
#[derive(Parser)]
#[command(name = "cn_cli")]
#[command(author = "ClimNet Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "ClimNet climate correlation network pipeline", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 执行批处理运行
    Run(commands::run::RunArgs),
    /// 手动合并分片
    Merge(commands::merge::MergeArgs),
    /// 显示结果存储信息
    Info(commands::info::InfoArgs),
    /// 构建/校验网格缓存
    GridCache(commands::grid_cache::GridCacheArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 执行命令
    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Merge(args) => commands::merge::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::GridCache(args) => commands::grid_cache::execute(args),
    }
}
