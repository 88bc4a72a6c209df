// crates/cn_mesh/src/icosahedron.rs

//! 二十面体构造图与递归细分
//!
//! `IcoGraph` 只在构造期间存在：细分完成后通常丢弃邻接结构，仅保留
//! 顶点坐标序列（见 [`crate::mesh::Mesh`]）。
//!
//! # 细分算法
//!
//! 每轮细分：对当前每条边，在其两端点的球面中点插入新顶点，删除原边，
//! 连接两条半边。一轮插入完成后（最后一轮除外），上一批新顶点通过
//! 连接最近的二阶邻居补足 4 条新边——连同细分保留的 2 条半边，内部
//! 顶点最终为 6 度。最后一轮的新顶点保持 2 度。

use cn_foundation::{CnError, CnResult};
use cn_geo::point::{geodesic_midpoint, GeoPoint};
use std::collections::BTreeSet;

/// 初始环纬度（五边形环）
const RING_LATITUDE: f64 = 26.65;

/// 初始边长一致性检查的绝对容差（单位球大圆距离）
const EDGE_LENGTH_ATOL: f64 = 0.01;

/// 二十面体构造图
///
/// 顶点按插入顺序编号；邻接表使用有序集合保证遍历的确定性。
#[derive(Debug, Clone)]
pub struct IcoGraph {
    points: Vec<GeoPoint>,
    adjacency: Vec<BTreeSet<u32>>,
}

impl IcoGraph {
    /// 构建 n 次细分后的测地网格图
    ///
    /// `iterations == 0` 返回基础二十面体。构造是确定性的。
    pub fn build(iterations: u32) -> CnResult<Self> {
        let mut graph = Self::base_icosahedron();
        graph.check_base_invariants()?;

        if iterations > 0 {
            let mut new_vertices = graph.subdivide_once();
            for _ in 1..iterations {
                graph.connect_new_vertices(&new_vertices)?;
                new_vertices = graph.subdivide_once();
            }

            let expected_last = 15usize * 2usize.pow(2 * iterations - 1);
            if new_vertices.len() != expected_last {
                return Err(CnError::mesh_invariant(format!(
                    "最后一轮新顶点数错误: 期望 {expected_last}, 实际 {}",
                    new_vertices.len()
                )));
            }
        }

        graph.check_postconditions(iterations)?;
        Ok(graph)
    }

    /// n 次细分后的总顶点数: `2 + 5·2^(2n+1)`
    #[must_use]
    pub fn expected_vertex_count(iterations: u32) -> usize {
        2 + 5 * 2usize.pow(2 * iterations + 1)
    }

    /// 顶点数量
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    /// 顶点坐标序列（按编号有序）
    #[must_use]
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    /// 转移出顶点坐标序列，丢弃邻接结构
    #[must_use]
    pub fn into_points(self) -> Vec<GeoPoint> {
        self.points
    }

    /// 顶点度数
    #[must_use]
    pub fn degree(&self, v: u32) -> usize {
        self.adjacency[v as usize].len()
    }

    /// 边列表 (a < b)，按字典序
    #[must_use]
    pub fn edges(&self) -> Vec<(u32, u32)> {
        let mut edges = Vec::new();
        for (a, neighbors) in self.adjacency.iter().enumerate() {
            let a = a as u32;
            for &b in neighbors.iter() {
                if a < b {
                    edges.push((a, b));
                }
            }
        }
        edges
    }

    // ========================================================================
    // 基础二十面体
    // ========================================================================

    /// 基础二十面体：极点 ±90°，两个五边形环位于 ±26.65°
    fn base_icosahedron() -> Self {
        let delta_phi = 360.0 / 5.0;

        let mut lons = vec![0.0];
        let upper: Vec<f64> = (0..5).map(|x| delta_phi * f64::from(x)).collect();
        let lower: Vec<f64> = upper
            .iter()
            .map(|l| (l - delta_phi / 2.0).rem_euclid(360.0))
            .collect();
        lons.extend(&upper);
        lons.extend(&lower);
        lons.push(0.0);

        let mut lats = vec![90.0];
        lats.extend(std::iter::repeat(RING_LATITUDE).take(5));
        lats.extend(std::iter::repeat(-RING_LATITUDE).take(5));
        lats.push(-90.0);

        let points: Vec<GeoPoint> = lons
            .iter()
            .zip(&lats)
            .map(|(&lon, &lat)| GeoPoint { lon, lat })
            .collect();

        let mut graph = Self {
            adjacency: vec![BTreeSet::new(); points.len()],
            points,
        };

        // 边表：顶点 0 为北极，1-5 上环，6-10 下环，11 为南极
        const BASE_EDGES: [(u32, u32); 30] = [
            (0, 1), // 从北极到上环
            (0, 2),
            (0, 3),
            (0, 4),
            (0, 5),
            (1, 2), // 上环内部
            (2, 3),
            (3, 4),
            (4, 5),
            (5, 1),
            (1, 6), // 上环到下环
            (1, 7),
            (2, 7),
            (2, 8),
            (3, 8),
            (3, 9),
            (4, 9),
            (4, 10),
            (5, 10),
            (5, 6),
            (6, 7), // 下环内部
            (7, 8),
            (8, 9),
            (9, 10),
            (10, 6),
            (6, 11), // 下环到南极
            (7, 11),
            (8, 11),
            (9, 11),
            (10, 11),
        ];
        for &(a, b) in &BASE_EDGES {
            graph.add_edge(a, b);
        }
        graph
    }

    /// 初始不变量：所有顶点 5 度，所有边长一致
    fn check_base_invariants(&self) -> CnResult<()> {
        for v in 0..self.vertex_count() as u32 {
            if self.degree(v) != 5 {
                return Err(CnError::mesh_invariant(format!(
                    "初始顶点 {v} 度数为 {}, 期望 5",
                    self.degree(v)
                )));
            }
        }

        let edges = self.edges();
        let reference = self.edge_length(edges[0]);
        for &e in &edges {
            let len = self.edge_length(e);
            if (len - reference).abs() > EDGE_LENGTH_ATOL {
                return Err(CnError::mesh_invariant(format!(
                    "初始边 {e:?} 长度 {len:.6} 偏离参考值 {reference:.6} 超过容差 {EDGE_LENGTH_ATOL}"
                )));
            }
        }
        Ok(())
    }

    /// 后置条件：顶点总数与度数分布
    ///
    /// 度数按顶点编号分段：前 12 个为 5 度，中间为 6 度，最后一轮
    /// 插入的 `15·2^(2n-1)` 个为 2 度。
    fn check_postconditions(&self, iterations: u32) -> CnResult<()> {
        let expected = Self::expected_vertex_count(iterations);
        if self.vertex_count() != expected {
            return Err(CnError::mesh_invariant(format!(
                "细分 {iterations} 次后顶点数错误: 期望 {expected}, 实际 {}",
                self.vertex_count()
            )));
        }

        if iterations == 0 {
            return Ok(());
        }

        let num_last = 15usize * 2usize.pow(2 * iterations - 1);
        let first_leaf = self.vertex_count() - num_last;
        for v in 0..self.vertex_count() {
            let expected_degree = if v < 12 {
                5
            } else if v < first_leaf {
                6
            } else {
                2
            };
            let actual = self.degree(v as u32);
            if actual != expected_degree {
                return Err(CnError::mesh_invariant(format!(
                    "顶点 {v} 度数为 {actual}, 期望 {expected_degree}"
                )));
            }
        }
        Ok(())
    }

    // ========================================================================
    // 细分
    // ========================================================================

    /// 一轮细分：对每条边插入球面中点，返回新顶点编号
    fn subdivide_once(&mut self) -> Vec<u32> {
        let edges = self.edges();
        let mut new_vertices = Vec::with_capacity(edges.len());
        for (a, b) in edges {
            let midpoint =
                geodesic_midpoint(&self.points[a as usize], &self.points[b as usize]);
            let m = self.add_vertex(midpoint);
            self.remove_edge(a, b);
            self.add_edge(a, m);
            self.add_edge(b, m);
            new_vertices.push(m);
        }
        new_vertices
    }

    /// 将上一轮的所有新顶点补足到 6 度
    fn connect_new_vertices(&mut self, new_vertices: &[u32]) -> CnResult<()> {
        let new_set: BTreeSet<u32> = new_vertices.iter().copied().collect();
        for &v in new_vertices {
            self.connect_new_vertex(v, &new_set)?;
        }
        Ok(())
    }

    /// 为单个新顶点建立与最近二阶邻居的连接
    ///
    /// 新顶点此时有 2 个旧邻居（被细分边的端点）以及 0 个或多个
    /// 同批新邻居（先处理的顶点已经连过来的）。目标是 4 条同批连接，
    /// 缺口由最近的二阶邻居（旧邻居的其他邻居）补足，距离用单位球
    /// 大圆距离度量。
    fn connect_new_vertex(&mut self, v: u32, new_set: &BTreeSet<u32>) -> CnResult<()> {
        let mut old_neighbors = Vec::new();
        let mut new_neighbors = Vec::new();
        for &n in &self.adjacency[v as usize] {
            if new_set.contains(&n) {
                new_neighbors.push(n);
            } else {
                old_neighbors.push(n);
            }
        }

        if old_neighbors.len() != 2 {
            return Err(CnError::mesh_invariant(format!(
                "新顶点 {v} 的旧邻居数为 {}, 期望 2",
                old_neighbors.len()
            )));
        }

        let mut next_neighbors: Vec<u32> = Vec::new();
        for &neighbor in &old_neighbors {
            for &n in &self.adjacency[neighbor as usize] {
                if n != v && !new_neighbors.contains(&n) && !next_neighbors.contains(&n) {
                    next_neighbors.push(n);
                }
            }
        }

        let number_to_add = 4usize.checked_sub(new_neighbors.len()).ok_or_else(|| {
            CnError::mesh_invariant(format!(
                "新顶点 {v} 已有 {} 个同批邻居, 超出目标 4",
                new_neighbors.len()
            ))
        })?;

        let origin = self.points[v as usize];
        let mut by_distance: Vec<(f64, u32)> = next_neighbors
            .iter()
            .map(|&n| (origin.haversine_unit(&self.points[n as usize]), n))
            .collect();
        by_distance.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        for &(_, n) in by_distance.iter().take(number_to_add) {
            self.add_edge(v, n);
        }
        Ok(())
    }

    // ========================================================================
    // 图操作
    // ========================================================================

    fn add_vertex(&mut self, point: GeoPoint) -> u32 {
        let id = self.points.len() as u32;
        self.points.push(point);
        self.adjacency.push(BTreeSet::new());
        id
    }

    fn add_edge(&mut self, a: u32, b: u32) {
        self.adjacency[a as usize].insert(b);
        self.adjacency[b as usize].insert(a);
    }

    fn remove_edge(&mut self, a: u32, b: u32) {
        self.adjacency[a as usize].remove(&b);
        self.adjacency[b as usize].remove(&a);
    }

    /// 边的单位球大圆长度
    fn edge_length(&self, (a, b): (u32, u32)) -> f64 {
        self.points[a as usize].haversine_unit(&self.points[b as usize])
    }
}
