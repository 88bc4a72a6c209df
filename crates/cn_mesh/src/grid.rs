// crates/cn_mesh/src/grid.rs

//! 网格抽象
//!
//! 正则网格与二十面体测地网格统一为一个配置驱动的变体：
//! `GridKind` 标签 + 可选的区域移除，而不是类型层次。
//! 区域移除产生一个新的 `Grid`，其点云随之重建。

use crate::mesh::Mesh;
use cn_foundation::CnResult;
use cn_geo::point::GeoPoint;
use cn_geo::pointcloud::PointCloud;
use cn_geo::region::Region;
use serde::{Deserialize, Serialize};

/// 网格类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridKind {
    /// 正则经纬度网格（源数据网格）
    Regular,
    /// 二十面体测地网格（分析网格）
    Icosahedral,
}

impl std::fmt::Display for GridKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Regular => write!(f, "regular"),
            Self::Icosahedral => write!(f, "icosahedral"),
        }
    }
}

/// 分析网格：顶点序列 + 单位球点云
///
/// 点云由网格拥有；任何改变顶点集的操作（区域移除）都会重建点云。
#[derive(Debug, Clone)]
pub struct Grid {
    kind: GridKind,
    points: Vec<GeoPoint>,
    cloud: PointCloud,
}

impl Grid {
    /// 从任意点序列构造正则网格
    pub fn regular(points: Vec<GeoPoint>) -> CnResult<Self> {
        let cloud = PointCloud::from_points(&points)?;
        Ok(Self {
            kind: GridKind::Regular,
            points,
            cloud,
        })
    }

    /// 从测地网格构造
    pub fn icosahedral(mesh: &Mesh) -> CnResult<Self> {
        let points = mesh.points().to_vec();
        let cloud = PointCloud::from_points(&points)?;
        Ok(Self {
            kind: GridKind::Icosahedral,
            points,
            cloud,
        })
    }

    /// 移除区域内的顶点，返回新网格
    ///
    /// 使用掩码的反面：区域内的点被删除，其余保留原有顺序。
    pub fn with_region_removed(&self, region: &Region) -> CnResult<Self> {
        let mask = region.mask(&self.points);
        let points: Vec<GeoPoint> = self
            .points
            .iter()
            .zip(&mask)
            .filter(|(_, &inside)| !inside)
            .map(|(p, _)| *p)
            .collect();
        let cloud = PointCloud::from_points(&points)?;
        Ok(Self {
            kind: self.kind,
            points,
            cloud,
        })
    }

    /// 网格类别
    #[must_use]
    pub fn kind(&self) -> GridKind {
        self.kind
    }

    /// 顶点数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 顶点序列
    #[must_use]
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    /// 单位球点云
    #[must_use]
    pub fn cloud(&self) -> &PointCloud {
        &self.cloud
    }
}
