// crates/cn_geo/src/spatial_index.rs

//! 三维最近邻索引
//!
//! 基于 R-tree 的空间索引，对单位球面点云提供 k 近邻与半径查询。
//! 每个源网格的点云对应一个索引（按网格缓存，不跨网格共享）。
//!
//! # 示例
//!
//! ```
//! use cn_geo::point::GeoPoint;
//! use cn_geo::pointcloud::PointCloud;
//! use cn_geo::spatial_index::SpatialIndex;
//!
//! let points = vec![
//!     GeoPoint::new(0.0, 0.0).unwrap(),
//!     GeoPoint::new(90.0, 0.0).unwrap(),
//!     GeoPoint::new(180.0, 0.0).unwrap(),
//! ];
//! let cloud = PointCloud::from_points(&points).unwrap();
//! let index = SpatialIndex::build(&cloud);
//!
//! let nearest = index.k_nearest(points[0].unit_vector(), 2);
//! assert_eq!(nearest[0], 0);
//! ```

use crate::pointcloud::PointCloud;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// 索引条目：单位向量及其在点云中的序号
#[derive(Debug, Clone)]
struct IndexedVector {
    pos: [f64; 3],
    index: usize,
}

impl RTreeObject for IndexedVector {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.pos)
    }
}

impl PointDistance for IndexedVector {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.pos[0] - point[0];
        let dy = self.pos[1] - point[1];
        let dz = self.pos[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// 基于 R-tree 的最近邻索引
pub struct SpatialIndex {
    tree: RTree<IndexedVector>,
}

impl SpatialIndex {
    /// 从点云批量构建索引
    ///
    /// 点云构造时已经强制单位范数不变量，这里直接批量装载。
    #[must_use]
    pub fn build(cloud: &PointCloud) -> Self {
        let entries: Vec<IndexedVector> = cloud
            .vectors()
            .iter()
            .enumerate()
            .map(|(index, &pos)| IndexedVector { pos, index })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// 查询最近的 k 个点，返回点云序号（按距离升序）
    #[must_use]
    pub fn k_nearest(&self, query: [f64; 3], k: usize) -> Vec<usize> {
        self.tree
            .nearest_neighbor_iter(&query)
            .take(k)
            .map(|e| e.index)
            .collect()
    }

    /// 查询弦距离 radius 之内的所有点
    ///
    /// 半径为三维欧氏（弦）距离，与单位球上的 KD 树球查询语义一致。
    #[must_use]
    pub fn within_radius(&self, center: [f64; 3], radius: f64) -> Vec<usize> {
        let r2 = radius * radius;
        self.tree
            .nearest_neighbor_iter(&center)
            .take_while(|e| e.distance_2(&center) <= r2)
            .map(|e| e.index)
            .collect()
    }

    /// 索引中的点数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// 是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::GeoPoint;

    fn equator_cloud() -> (Vec<GeoPoint>, PointCloud) {
        let points: Vec<GeoPoint> = (0..8)
            .map(|i| GeoPoint::new(f64::from(i) * 45.0, 0.0).unwrap())
            .collect();
        let cloud = PointCloud::from_points(&points).unwrap();
        (points, cloud)
    }

    #[test]
    fn test_k_nearest_self_first() {
        let (points, cloud) = equator_cloud();
        let index = SpatialIndex::build(&cloud);

        let nearest = index.k_nearest(points[2].unit_vector(), 3);
        assert_eq!(nearest.len(), 3);
        assert_eq!(nearest[0], 2);
        // 两侧邻居紧随其后
        assert!(nearest[1..].contains(&1));
        assert!(nearest[1..].contains(&3));
    }

    #[test]
    fn test_within_radius() {
        let (points, cloud) = equator_cloud();
        let index = SpatialIndex::build(&cloud);

        // 45 度对应的弦长约 0.765；取稍大的半径应覆盖自身与两侧邻居
        let hits = index.within_radius(points[4].unit_vector(), 0.8);
        assert_eq!(hits.len(), 3);
        assert!(hits.contains(&4));
        assert!(hits.contains(&3));
        assert!(hits.contains(&5));
    }

    #[test]
    fn test_len() {
        let (_, cloud) = equator_cloud();
        let index = SpatialIndex::build(&cloud);
        assert_eq!(index.len(), 8);
        assert!(!index.is_empty());
    }
}
