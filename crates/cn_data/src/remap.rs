// crates/cn_data/src/remap.rs

//! k 近邻重映射
//!
//! 把源网格上的数据插值到目标（测地）网格：对每个目标顶点，取源
//! 网格中最近的 k 个点（单位球上的最近邻），每个时间步取无权平均。
//! 这是唯一的插值策略，不做距离加权。

use cn_foundation::{CnError, CnResult};
use cn_geo::pointcloud::PointCloud;
use cn_geo::spatial_index::SpatialIndex;
use ndarray::{Array2, ArrayView2};

/// 默认近邻数
pub const DEFAULT_NEIGHBORS: usize = 4;

/// 网格重映射器
///
/// 构造时对源点云建立空间索引，并为每个目标顶点预计算 k 个最近的
/// 源网格序号；之后每次 `remap` 只做求平均。
pub struct Remapper {
    neighbor_ids: Vec<Vec<usize>>,
    n_source: usize,
    k: usize,
}

impl Remapper {
    /// 建立源网格到目标点云的重映射
    pub fn new(source: &PointCloud, target: &PointCloud, k: usize) -> CnResult<Self> {
        if k == 0 || k > source.len() {
            return Err(CnError::invalid_input(format!(
                "近邻数 k={k} 非法 (源网格共 {} 点)",
                source.len()
            )));
        }

        let index = SpatialIndex::build(source);
        let neighbor_ids: Vec<Vec<usize>> = target
            .vectors()
            .iter()
            .map(|&v| index.k_nearest(v, k))
            .collect();

        Ok(Self {
            neighbor_ids,
            n_source: source.len(),
            k,
        })
    }

    /// 默认 k=4 的重映射
    pub fn with_default_neighbors(source: &PointCloud, target: &PointCloud) -> CnResult<Self> {
        Self::new(source, target, DEFAULT_NEIGHBORS)
    }

    /// 目标网格大小
    #[must_use]
    pub fn target_len(&self) -> usize {
        self.neighbor_ids.len()
    }

    /// 源网格大小
    #[must_use]
    pub fn source_len(&self) -> usize {
        self.n_source
    }

    /// 重映射一段数据
    ///
    /// `raw` 形状为 `(时间, 源网格点数)`（调用方负责把 (time, lat, lon)
    /// 展平为 (time, spatial)）；输出形状 `(时间, 目标顶点数)`，
    /// 时间长度保持不变。空间维不匹配是致命错误。
    pub fn remap(&self, raw: ArrayView2<f64>) -> CnResult<Array2<f64>> {
        if raw.ncols() != self.n_source {
            return Err(CnError::ShapeMismatch {
                name: "remap input",
                expected: vec![raw.nrows(), self.n_source],
                actual: raw.shape().to_vec(),
            });
        }

        let num_t = raw.nrows();
        let mut out = Array2::zeros((num_t, self.neighbor_ids.len()));
        let inv_k = 1.0 / self.k as f64;
        for (j, neighbors) in self.neighbor_ids.iter().enumerate() {
            for t in 0..num_t {
                let mut acc = 0.0;
                for &s in neighbors {
                    acc += raw[[t, s]];
                }
                out[[t, j]] = acc * inv_k;
            }
        }
        Ok(out)
    }
}
