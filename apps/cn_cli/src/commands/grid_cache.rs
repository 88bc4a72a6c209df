// apps/cn_cli/src/commands/grid_cache.rs

//! grid-cache 子命令：构建/校验网格缓存工件

use clap::Args;
use cn_mesh::cache::{self, DEFAULT_CACHE_FILENAME};
use std::path::PathBuf;

/// grid-cache 子命令参数
#[derive(Args)]
pub struct GridCacheArgs {
    /// 细分次数
    #[arg(long, default_value_t = 5)]
    iterations: u32,

    /// 缓存文件路径
    #[arg(long, value_name = "FILE")]
    path: Option<PathBuf>,

    /// 删除现有缓存并重建
    #[arg(long)]
    force: bool,
}

/// 执行 grid-cache 子命令
pub fn execute(args: GridCacheArgs) -> anyhow::Result<()> {
    let path = args
        .path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILENAME));

    if args.force && path.is_file() {
        tracing::info!("removing existing cache {}", path.display());
        std::fs::remove_file(&path)?;
    }

    // 命中缓存时做一次全新构建比对
    let mesh = cache::load_or_build(&path, args.iterations, true)?;
    tracing::info!(
        "mesh cache at {}: {} vertices ({} iterations)",
        path.display(),
        mesh.len(),
        mesh.iterations()
    );

    println!("{}", path.display());
    Ok(())
}
