// crates/cn_network/src/graph.rs

//! 图装配
//!
//! 由 0/1 邻接矩阵构建无向图：每个网格顶点对应一个节点（携带其
//! 经纬度），对角线以上每个置位条目对应一条无向边，不产生重边。

use cn_foundation::{CnError, CnResult};
use cn_geo::point::GeoPoint;
use ndarray::Array2;
use petgraph::graph::{NodeIndex, UnGraph};

/// 气候网络图：节点为网格顶点（携带坐标），边无权
pub type NetworkGraph = UnGraph<GeoPoint, ()>;

/// 从邻接矩阵与顶点坐标装配网络图
pub fn build_graph(adjacency: &Array2<u8>, points: &[GeoPoint]) -> CnResult<NetworkGraph> {
    let n = points.len();
    if adjacency.nrows() != n || adjacency.ncols() != n {
        return Err(CnError::ShapeMismatch {
            name: "adjacency",
            expected: vec![n, n],
            actual: adjacency.shape().to_vec(),
        });
    }

    let mut graph = NetworkGraph::with_capacity(n, n);
    for p in points {
        graph.add_node(*p);
    }
    for i in 0..n {
        for j in (i + 1)..n {
            if adjacency[[i, j]] != 0 {
                graph.add_edge(NodeIndex::new(i), NodeIndex::new(j), ());
            }
        }
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn points(n: usize) -> Vec<GeoPoint> {
        (0..n)
            .map(|i| GeoPoint::new(i as f64 * 30.0, 10.0).unwrap())
            .collect()
    }

    #[test]
    fn test_build_graph() {
        let adjacency = array![
            [0u8, 1, 0],
            [1, 0, 1],
            [0, 1, 0]
        ];
        let graph = build_graph(&adjacency, &points(3)).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);

        // 节点携带坐标
        let p = graph.node_weight(NodeIndex::new(2)).unwrap();
        assert!((p.lon - 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_duplicate_edges() {
        // 对称矩阵的上下三角不会产生重边
        let adjacency = array![[0u8, 1], [1, 0]];
        let graph = build_graph(&adjacency, &points(2)).unwrap();
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_shape_mismatch() {
        let adjacency = array![[0u8, 1], [1, 0]];
        assert!(build_graph(&adjacency, &points(3)).is_err());
    }
}
