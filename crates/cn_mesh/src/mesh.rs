// crates/cn_mesh/src/mesh.rs

//! 细分结果网格
//!
//! 构造完成后只有有序的顶点坐标序列作为网格持久存在；
//! 邻接结构除非显式保留，否则随构造图一起丢弃。

use crate::icosahedron::IcoGraph;
use cn_foundation::CnResult;
use cn_geo::point::GeoPoint;

/// 测地网格：有序顶点坐标序列
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    iterations: u32,
    points: Vec<GeoPoint>,
}

impl Mesh {
    /// 构建 n 次细分的测地网格（丢弃邻接结构）
    pub fn build(iterations: u32) -> CnResult<Self> {
        let graph = IcoGraph::build(iterations)?;
        Ok(Self {
            iterations,
            points: graph.into_points(),
        })
    }

    /// 构建网格并保留构造图
    pub fn build_keeping_graph(iterations: u32) -> CnResult<(Self, IcoGraph)> {
        let graph = IcoGraph::build(iterations)?;
        let mesh = Self {
            iterations,
            points: graph.points().to_vec(),
        };
        Ok((mesh, graph))
    }

    /// 从缓存坐标直接构造（跳过不变量检查，仅供缓存加载使用）
    pub(crate) fn from_cached_points(iterations: u32, points: Vec<GeoPoint>) -> Self {
        Self { iterations, points }
    }

    /// 细分次数
    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
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

    /// 顶点坐标序列
    #[must_use]
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_drops_graph() {
        let mesh = Mesh::build(1).unwrap();
        assert_eq!(mesh.len(), 42);
        assert_eq!(mesh.iterations(), 1);
    }

    #[test]
    fn test_build_keeping_graph_consistent() {
        let (mesh, graph) = Mesh::build_keeping_graph(1).unwrap();
        assert_eq!(mesh.points(), graph.points());
    }
}
