// crates/cn_geo/src/pointcloud.rs

//! 单位球面点云
//!
//! 为网格的每个顶点保存其单位向量嵌入 (x, y, z)。点云由创建它的
//! 网格拥有，网格变化（如区域移除）后必须重建。

use crate::point::GeoPoint;
use cn_foundation::{CnError, CnResult};

/// 单位范数容差
pub const UNIT_NORM_TOLERANCE: f64 = 1e-9;

/// 单位球面点云
///
/// 不变量：每个向量的范数与 1 的偏差不超过 [`UNIT_NORM_TOLERANCE`]，
/// 构造时强制检查。
#[derive(Debug, Clone)]
pub struct PointCloud {
    vectors: Vec<[f64; 3]>,
}

impl PointCloud {
    /// 从经纬度点序列构建点云
    ///
    /// 任一向量的范数偏离 1 超过容差即为致命构造错误。
    pub fn from_points(points: &[GeoPoint]) -> CnResult<Self> {
        let mut vectors = Vec::with_capacity(points.len());
        for (index, p) in points.iter().enumerate() {
            let v = p.unit_vector();
            let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
            if (norm - 1.0).abs() > UNIT_NORM_TOLERANCE {
                return Err(CnError::UnitNorm {
                    index,
                    norm,
                    tolerance: UNIT_NORM_TOLERANCE,
                });
            }
            vectors.push(v);
        }
        Ok(Self { vectors })
    }

    /// 点数量
    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// 取第 i 个单位向量
    #[inline]
    pub fn get(&self, i: usize) -> [f64; 3] {
        self.vectors[i]
    }

    /// 单位向量切片
    #[inline]
    pub fn vectors(&self) -> &[[f64; 3]] {
        &self.vectors
    }
}
