// apps/cn_cli/src/commands/run.rs

//! run 子命令：执行一次完整的批处理运行

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use cn_data::loader::{BinaryYearLoader, YearLoader};
use cn_foundation::CnResult;
use cn_mesh::cache::DEFAULT_CACHE_FILENAME;
use cn_runtime::{BatchOrchestrator, GridVariant, RunConfig, RunProfile, ScriptMode};
use std::path::PathBuf;

/// 输出文件扩展名
const OUTPUT_EXTENSION: &str = "cns";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileArg {
    Normal,
    Fast,
    Medium,
    Daily,
}

impl From<ProfileArg> for RunProfile {
    fn from(value: ProfileArg) -> Self {
        match value {
            ProfileArg::Normal => RunProfile::Normal,
            ProfileArg::Fast => RunProfile::Fast,
            ProfileArg::Medium => RunProfile::Medium,
            ProfileArg::Daily => RunProfile::Daily,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Paper,
    Modularity,
    ComparisonModularity,
}

impl From<ModeArg> for ScriptMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Paper => ScriptMode::Paper,
            ModeArg::Modularity => ScriptMode::Modularity,
            ModeArg::ComparisonModularity => ScriptMode::ComparisonModularity,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GridArg {
    Icosahedral,
    IcosahedralWithoutEnsoBig,
}

impl From<GridArg> for GridVariant {
    fn from(value: GridArg) -> Self {
        match value {
            GridArg::Icosahedral => GridVariant::Icosahedral,
            GridArg::IcosahedralWithoutEnsoBig => GridVariant::IcosahedralWithoutEnsoBig,
        }
    }
}

/// run 子命令参数
#[derive(Args)]
pub struct RunArgs {
    /// 运行档案（控制窗口时间步进）
    #[arg(value_enum)]
    profile: ProfileArg,

    /// 脚本模式（控制计算的指标）
    #[arg(value_enum)]
    mode: ModeArg,

    /// 逆序处理（从最晚的窗口开始）
    #[arg(short, long)]
    reverse: bool,

    /// 输出文件（默认按档案/模式/网格自动命名）
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// 网格变体
    #[arg(long, value_enum, default_value = "icosahedral")]
    grid: GridArg,

    /// 起始日期
    #[arg(long, value_name = "yyyy-mm-dd", default_value = "1948-01-01")]
    begin_date: NaiveDate,

    /// 结束日期（与起始日期至少相隔一年）
    #[arg(long, value_name = "yyyy-mm-dd", default_value = "2015-12-31")]
    end_date: NaiveDate,

    /// 临时数据目录（运行结束后把输出移回本地）
    #[arg(long, value_name = "directory")]
    scratch_directory: Option<PathBuf>,

    /// 源数据目录
    #[arg(long, value_name = "directory", default_value = "data/")]
    data_directory: PathBuf,

    /// 源数据变量名
    #[arg(long, default_value = "air")]
    variable: String,

    /// 确定源网格形状的参考年份
    #[arg(long, default_value_t = 1948)]
    reference_year: i32,

    /// 工作者数量
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// 网格缓存工件路径
    #[arg(long, value_name = "FILE")]
    mesh_cache: Option<PathBuf>,
}

/// 执行 run 子命令
pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    let profile: RunProfile = args.profile.into();
    let mode: ScriptMode = args.mode.into();
    let grid: GridVariant = args.grid.into();

    // 模式与档案的约束
    match mode {
        ScriptMode::Paper => {
            if profile != RunProfile::Daily {
                bail!("paper 模式需要 daily 档案才能精确复现结果");
            }
        }
        ScriptMode::Modularity | ScriptMode::ComparisonModularity => {
            if profile != RunProfile::Normal {
                bail!("模块度模式请使用 normal 档案，避免过长的运行时间");
            }
        }
    }

    // 输出命名：Output.FullRun.<profile>[-<mode>].<grid>.cns
    let mut output = match args.output {
        Some(path) => path,
        None => {
            let mut run_name = profile.name().to_string();
            match mode {
                ScriptMode::Paper => run_name.push_str("-paper"),
                ScriptMode::Modularity => run_name.push_str("-modularity"),
                ScriptMode::ComparisonModularity => run_name.push_str("-cmp-modularity"),
            }
            let name =
                format!("Output.FullRun.{run_name}.{}.{OUTPUT_EXTENSION}", grid.name());
            tracing::info!("using output {name}");
            PathBuf::from(name)
        }
    };
    if !output.extension().is_some_and(|e| e == OUTPUT_EXTENSION) {
        bail!("输出文件扩展名应为 .{OUTPUT_EXTENSION}");
    }

    // 临时目录：在 scratch 中计算，结束后移回
    let mut local_file = None;
    if let Some(scratch) = &args.scratch_directory {
        let file_name = output
            .file_name()
            .context("输出路径没有文件名")?
            .to_os_string();
        if output.exists() {
            bail!("'{}' 已经存在", output.display());
        }
        local_file = Some(output.clone());
        output = scratch.join(file_name);
        tracing::info!("using scratch output {}", output.display());
    }
    if output.exists() {
        bail!("'{}' 已经存在", output.display());
    }

    let mut config = RunConfig::new(
        profile,
        mode,
        grid,
        args.begin_date,
        args.end_date,
        output.clone(),
    );
    config.reverse = args.reverse;
    config.num_workers = args.workers;
    config.mesh_cache = Some(
        args.mesh_cache
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILENAME)),
    );

    let data_directory = args.data_directory.clone();
    let variable = args.variable.clone();
    let reference_year = args.reference_year;

    let orchestrator = BatchOrchestrator::new(config)?;
    let outcome = orchestrator.run(move || -> CnResult<Box<dyn YearLoader>> {
        let loader =
            BinaryYearLoader::open(data_directory.clone(), variable.clone(), reference_year)?;
        Ok(Box::new(loader))
    })?;

    tracing::info!(
        "completed: {} windows on {} vertices",
        outcome.num_windows,
        outcome.num_vertices
    );

    // 从 scratch 移回本地
    let final_path = match local_file {
        Some(local) => {
            tracing::info!(
                "moving {} -> {}",
                outcome.output.display(),
                local.display()
            );
            move_file(&outcome.output, &local)?;
            local
        }
        None => outcome.output,
    };

    println!("{}", final_path.display());
    Ok(())
}

/// 跨文件系统安全的移动
fn move_file(from: &std::path::Path, to: &std::path::Path) -> anyhow::Result<()> {
    if std::fs::rename(from, to).is_err() {
        std::fs::copy(from, to)
            .with_context(|| format!("复制 {} 到 {}", from.display(), to.display()))?;
        std::fs::remove_file(from)
            .with_context(|| format!("删除 {}", from.display()))?;
    }
    Ok(())
}
