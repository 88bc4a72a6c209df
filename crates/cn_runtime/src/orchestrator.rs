// crates/cn_runtime/src/orchestrator.rs

//! 批处理编排
//!
//! 枚举时间窗口，划分给固定数量的工作者线程，驱动每个窗口的
//! 缓冲加载 → 相关矩阵 → 阈值化 → 建图 → 指标提取，写入各自的
//! 分片存储；结束屏障后由协调者合并为最终输出。
//!
//! 每个工作者独占自己的滚动缓冲与分片，窗口严格按其划分内的顺序
//! 处理（正序或配置的逆序）——乱序会破坏缓冲 shift 复用的前提。
//! 任何致命错误先尽力向同伴广播中止，再携带出错窗口的诊断信息
//! 终止运行；已写入分片的部分进度保留在磁盘上供事后检查。

use crate::config::{GridVariant, RunConfig};
use crate::partition::partition;
use crate::transport::{
    broadcast_abort, end_barrier, start_barrier, ChannelTransport, Transport,
};
use chrono::{Datelike, NaiveDate};
use cn_data::calendar::window_pairs;
use cn_data::loader::YearLoader;
use cn_data::remap::Remapper;
use cn_data::buffer::RollingBuffer;
use cn_foundation::{CnError, CnResult};
use cn_geo::pointcloud::PointCloud;
use cn_mesh::cache;
use cn_mesh::grid::Grid;
use cn_mesh::mesh::Mesh;
use cn_network::correlation::{absolute_correlation, threshold_matrix};
use cn_network::graph::build_graph;
use cn_network::metrics::{area_by_name, MetricsEngine};
use cn_store::ResultStore;
use std::path::PathBuf;
use std::thread;

/// 一次批处理运行的结果
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// 最终合并输出的路径
    pub output: PathBuf,
    /// 窗口数量
    pub num_windows: usize,
    /// 分析网格的顶点数量
    pub num_vertices: usize,
}

/// 批处理编排器
pub struct BatchOrchestrator {
    config: RunConfig,
}

impl BatchOrchestrator {
    /// 创建编排器（校验配置）
    pub fn new(config: RunConfig) -> CnResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 运行配置
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// 执行整个批处理运行
    ///
    /// `loader_factory` 为每个工作者创建一个独立的年度加载器实例
    /// （加载器可能持有文件句柄或内部缓存，不跨工作者共享）。
    pub fn run<F>(&self, loader_factory: F) -> CnResult<BatchOutcome>
    where
        F: Fn() -> CnResult<Box<dyn YearLoader>> + Send + Sync,
    {
        let config = &self.config;

        // 窗口枚举
        let windows = window_pairs(
            config.begin_date,
            config.end_date,
            config.time_step(),
            config.correlation_time,
        );
        if windows.is_empty() {
            return Err(CnError::config(format!(
                "日期范围 {} -> {} 放不下任何长度 {} 天的窗口",
                config.begin_date, config.end_date, config.correlation_time
            )));
        }
        tracing::info!("run spans {} windows", windows.len());

        // 分析网格（可选缓存工件）
        let mesh = match &config.mesh_cache {
            Some(path) => cache::load_or_build(path, config.iterations, false)?,
            None => Mesh::build(config.iterations)?,
        };
        let mut grid = Grid::icosahedral(&mesh)?;
        if config.grid == GridVariant::IcosahedralWithoutEnsoBig {
            let region = area_by_name("ENSO-big").expect("ENSO-big in area table");
            grid = grid.with_region_removed(&region)?;
        }
        tracing::info!(
            "grid: {} ({} vertices, {} iterations)",
            config.grid.name(),
            grid.len(),
            config.iterations
        );

        // 处理顺序与划分（逆序时整体反转后再连续切分）
        let mut order: Vec<usize> = (0..windows.len()).collect();
        if config.reverse {
            order.reverse();
        }
        let ranges = partition(order.len(), config.num_workers);
        let (scalar_names, field_names) = config.result_keys();

        let transports = ChannelTransport::create_group(config.num_workers);
        let grid = &grid;
        let windows = &windows;
        let order = &order;
        let scalar_names = &scalar_names;
        let field_names = &field_names;
        let loader_factory = &loader_factory;

        let mut merged: Option<PathBuf> = None;
        let mut first_error: Option<CnError> = None;

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(config.num_workers);
            for (rank, transport) in transports.into_iter().enumerate() {
                let assigned = &order[ranges[rank].clone()];
                handles.push(scope.spawn(move || -> CnResult<Option<PathBuf>> {
                    let result = worker_loop(
                        rank,
                        &transport,
                        config,
                        grid,
                        windows,
                        assigned,
                        loader_factory,
                        scalar_names,
                        field_names,
                    );
                    if let Err(e) = &result {
                        tracing::error!("worker {rank} failed: {e}");
                        broadcast_abort(&transport, &e.to_string());
                    }
                    result
                }));
            }

            for handle in handles {
                match handle.join() {
                    Ok(Ok(Some(path))) => merged = Some(path),
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                    Err(_) => {
                        if first_error.is_none() {
                            first_error =
                                Some(CnError::internal("工作者线程 panic"));
                        }
                    }
                }
            }
        });

        if let Some(e) = first_error {
            return Err(e);
        }
        let output = merged
            .ok_or_else(|| CnError::internal("协调者没有产出合并结果"))?;
        Ok(BatchOutcome {
            output,
            num_windows: windows.len(),
            num_vertices: grid.len(),
        })
    }
}

/// 单个工作者的完整生命周期
///
/// 开始屏障 → 预处理（加载器、重映射、缓冲、指标引擎、分片）→
/// 窗口循环 → 结束屏障（协调者随后合并）。屏障在预处理之前：
/// 昂贵的预处理只在整个编队都活着之后才开始。
#[allow(clippy::too_many_arguments)]
fn worker_loop<F>(
    rank: usize,
    transport: &dyn Transport,
    config: &RunConfig,
    grid: &Grid,
    windows: &[(NaiveDate, NaiveDate)],
    assigned: &[usize],
    loader_factory: &F,
    scalar_names: &[String],
    field_names: &[String],
) -> CnResult<Option<PathBuf>>
where
    F: Fn() -> CnResult<Box<dyn YearLoader>> + Send + Sync,
{
    // 开始屏障在前：所有工作者都活着之后才开始昂贵的预处理
    start_barrier(transport)?;

    let loader = loader_factory()?;
    let source_cloud = PointCloud::from_points(loader.source_points())?;
    let remapper = Remapper::new(&source_cloud, grid.cloud(), config.neighbors)?;
    let mut buffer = RollingBuffer::new(loader, Some(remapper), None)?;
    let engine = MetricsEngine::new(grid.points(), scalar_names, field_names)?;

    let mut shard = ResultStore::prepare(
        windows,
        grid.len(),
        scalar_names,
        field_names,
        config.header(),
    );
    let shard_path = config.shard_path(rank);

    tracing::info!(
        "worker {rank}: {} of {} windows assigned",
        assigned.len(),
        windows.len()
    );

    for &index in assigned {
        let (begin, end) = windows[index];
        process_window(
            rank, config, grid, &mut buffer, &engine, &mut shard, index, begin, end,
        )
        .map_err(|e| {
            tracing::error!(
                "worker {rank} | window {index} ({begin} -> {end}) failed: {e}"
            );
            e
        })?;
        // 每个窗口后落盘：致命中断时部分进度保留在分片里
        shard.save(&shard_path)?;
    }
    shard.save(&shard_path)?;

    match end_barrier(transport, shard_path)? {
        Some(shard_paths) => {
            tracing::info!("merging {} shards", shard_paths.len());
            ResultStore::merge_files(&shard_paths, &config.output, true)?;
            tracing::info!("merged output at {}", config.output.display());
            Ok(Some(config.output.clone()))
        }
        None => Ok(None),
    }
}

/// 处理一个时间窗口
#[allow(clippy::too_many_arguments)]
fn process_window(
    rank: usize,
    config: &RunConfig,
    grid: &Grid,
    buffer: &mut RollingBuffer,
    engine: &MetricsEngine,
    shard: &mut ResultStore,
    index: usize,
    begin: NaiveDate,
    end: NaiveDate,
) -> CnResult<()> {
    tracing::info!("worker {rank} | window {index:5}: {begin} -> {end}");

    buffer.load_years(begin.year(), end.year())?;
    let window = buffer.window(begin, end)?;
    if window.nrows() as i64 != config.correlation_time {
        return Err(CnError::internal(format!(
            "窗口长度 {} 与 correlation_time {} 不符",
            window.nrows(),
            config.correlation_time
        )));
    }

    let corr = absolute_correlation(window)?;
    let adjacency = threshold_matrix(&corr, config.keep_fraction)?;
    drop(corr);
    let graph = build_graph(&adjacency, grid.points())?;
    drop(adjacency);

    let num_v = graph.node_count();
    let num_e = graph.edge_count();
    let max_e = num_v * (num_v - 1) / 2;
    tracing::debug!(
        "worker {rank} | window {index}: {num_v} nodes, {num_e} edges ({:.6}% of {max_e})",
        100.0 * num_e as f64 / max_e as f64
    );

    let result = engine.compute(&graph)?;
    shard.write(index, begin, end, &result.scalars, &result.fields)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RunProfile, ScriptMode};
    use cn_data::synthetic::SyntheticLoader;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// 小网格 + 合成数据的运行配置
    fn small_config(output: PathBuf) -> RunConfig {
        let mut config = RunConfig::new(
            RunProfile::Normal,
            ScriptMode::Paper,
            GridVariant::Icosahedral,
            d(1950, 1, 1),
            d(1952, 12, 31),
            output,
        );
        config.iterations = 1; // 42 顶点
        config.neighbors = 1; // 源网格与分析网格重合 → 恒等重映射
        config.keep_fraction = 0.05;
        config
    }

    fn mesh_point_loader() -> CnResult<Box<dyn YearLoader>> {
        let mesh = Mesh::build(1)?;
        let points = mesh.points().to_vec();
        Ok(Box::new(SyntheticLoader::with_generator(
            points,
            365,
            |year, t, i| {
                (t as f64 * 0.17 + i as f64 * 0.71).sin()
                    + 0.05 * ((i % 7) as f64) * (t as f64 * 0.05).cos()
                    + 0.001 * f64::from(year - 1950)
            },
        )))
    }

    #[test]
    fn test_end_to_end_two_workers() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path().join("run.cns"));
        config.num_workers = 2;

        let orchestrator = BatchOrchestrator::new(config.clone()).unwrap();
        let outcome = orchestrator.run(mesh_point_loader).unwrap();

        assert!(outcome.num_windows > 0);
        assert_eq!(outcome.num_vertices, 42);

        let merged = ResultStore::load(&outcome.output).unwrap();
        assert_eq!(merged.num_windows(), outcome.num_windows);
        // 每个窗口都被某个工作者写过：没有 NaN 残留
        assert!(merged
            .scalar("global-transitivity")
            .unwrap()
            .iter()
            .all(|v| v.is_finite()));
        assert!(merged
            .field("degree-field")
            .unwrap()
            .iter()
            .all(|v| v.is_finite()));
        // header 记录了运行配置
        assert_eq!(merged.header()["profile"], "normal");

        // 合并成功后分片被删除
        assert!(!config.shard_path(0).exists());
        assert!(!config.shard_path(1).exists());
    }

    #[test]
    fn test_reverse_matches_forward() {
        let dir = tempfile::tempdir().unwrap();

        let mut forward = small_config(dir.path().join("fwd.cns"));
        forward.end_date = d(1951, 8, 31);
        let fwd_outcome = BatchOrchestrator::new(forward)
            .unwrap()
            .run(mesh_point_loader)
            .unwrap();

        let mut backward = small_config(dir.path().join("bwd.cns"));
        backward.end_date = d(1951, 8, 31);
        backward.reverse = true;
        let bwd_outcome = BatchOrchestrator::new(backward)
            .unwrap()
            .run(mesh_point_loader)
            .unwrap();

        let fwd = ResultStore::load(&fwd_outcome.output).unwrap();
        let bwd = ResultStore::load(&bwd_outcome.output).unwrap();
        assert_eq!(fwd.dates(), bwd.dates());
        assert_eq!(
            fwd.scalar("global-transitivity").unwrap(),
            bwd.scalar("global-transitivity").unwrap()
        );
    }

    #[test]
    fn test_region_removed_variant() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path().join("cut.cns"));
        config.end_date = d(1951, 3, 31);
        config.grid = GridVariant::IcosahedralWithoutEnsoBig;

        let outcome = BatchOrchestrator::new(config)
            .unwrap()
            .run(mesh_point_loader)
            .unwrap();
        // ENSO-big 区域内的顶点被移除
        assert!(outcome.num_vertices < 42);

        let merged = ResultStore::load(&outcome.output).unwrap();
        assert_eq!(merged.field_len(), outcome.num_vertices);
    }

    #[test]
    fn test_loader_failure_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path().join("fail.cns"));
        config.num_workers = 2;
        config.end_date = d(1951, 6, 30);

        let orchestrator = BatchOrchestrator::new(config).unwrap();
        let result = orchestrator.run(|| {
            Err(CnError::DataLoad {
                year: 1950,
                message: "synthetic failure".to_string(),
            })
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_window_range_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path().join("none.cns"));
        // 放不下一个完整的 365 天窗口
        config.end_date = d(1950, 6, 1);

        let orchestrator = BatchOrchestrator::new(config).unwrap();
        assert!(orchestrator.run(mesh_point_loader).is_err());
    }
}
