// apps/cn_cli/src/commands/merge.rs

//! merge 子命令：手动合并分片
//!
//! 运行被致命错误中断时，已写入的分片保留在磁盘上；本命令把它们
//! 合并成一个输出存储，用于事后检查或恢复。

use anyhow::bail;
use clap::Args;
use cn_store::ResultStore;
use std::path::PathBuf;

/// merge 子命令参数
#[derive(Args)]
pub struct MergeArgs {
    /// 待合并的分片文件
    #[arg(required = true)]
    shards: Vec<PathBuf>,

    /// 合并输出文件
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// 合并后保留来源分片
    #[arg(long)]
    keep_shards: bool,
}

/// 执行 merge 子命令
pub fn execute(args: MergeArgs) -> anyhow::Result<()> {
    if args.output.exists() {
        bail!("'{}' 已经存在", args.output.display());
    }

    let merged = ResultStore::merge_files(&args.shards, &args.output, !args.keep_shards)?;
    tracing::info!(
        "merged {} shards, {} windows",
        args.shards.len(),
        merged.num_windows()
    );

    println!("{}", args.output.display());
    Ok(())
}
