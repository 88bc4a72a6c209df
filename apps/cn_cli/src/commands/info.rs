// apps/cn_cli/src/commands/info.rs

//! info 子命令：显示结果存储的元数据

use clap::Args;
use cn_data::calendar::from_epoch_days;
use cn_store::ResultStore;
use std::path::PathBuf;

/// info 子命令参数
#[derive(Args)]
pub struct InfoArgs {
    /// 结果存储文件
    store: PathBuf,
}

/// 执行 info 子命令
pub fn execute(args: InfoArgs) -> anyhow::Result<()> {
    let store = ResultStore::load(&args.store)?;

    println!("store: {}", args.store.display());
    println!("windows: {}", store.num_windows());
    if let (Some(first), Some(last)) = (store.dates().first(), store.dates().last()) {
        println!(
            "range: {} -> {}",
            from_epoch_days(first.0),
            from_epoch_days(last.1)
        );
    }
    println!("field length: {}", store.field_len());

    let scalars: Vec<&String> = store.scalar_names().collect();
    let fields: Vec<&String> = store.field_names().collect();
    println!("scalars: {scalars:?}");
    println!("fields: {fields:?}");

    println!("header: {}", serde_json::to_string_pretty(store.header())?);
    Ok(())
}
