// crates/cn_network/src/metrics.rs

//! 图指标引擎
//!
//! 对一个窗口的网络图计算请求的标量与逐顶点场：
//!
//! - `degree-field`: 每个顶点的边数
//! - `teleconnectivity-field`: 顶点所有关联边的大圆长度之和，除以
//!   `(顶点数 − 1) × 半个地球周长`——度量一个顶点链接的地理弥散程度
//! - `transitivity-field`: 局部聚类系数（度数 < 2 为 NaN）
//! - `global-transitivity`: 全局聚类系数（度数 < 2 记 0，不记 NaN）
//! - `elnino-deg` / `elnino-tele`: Niño 3.4 掩码内对应场的平均
//! - `modularity-<算法>`: 社区检测算法的模块度；单个算法抛错只把该
//!   标量记为 NaN，其余指标与后续窗口继续
//!
//! 后置条件：每个请求的键都在结果中出现，没有键被遗漏。
//!
//! 区域掩码由引擎构造时一次性计算并持有（显式归属，不用模块级
//! 全局缓存），生命周期与一次编排运行一致。

use crate::community::{algorithm_by_name, modularity, CommunityAlgorithm, MODULARITY_PREFIX};
use crate::graph::NetworkGraph;
use cn_foundation::{CnError, CnResult};
use cn_geo::point::{GeoPoint, HALF_EARTH_CIRCUMFERENCE_KM};
use cn_geo::region::Region;
use ndarray::Array1;
use petgraph::graph::NodeIndex;
use std::collections::BTreeMap;

// ============================================================
// 指标键
// ============================================================

/// 度数场
pub const DEGREE_FIELD: &str = "degree-field";
/// 遥相关场
pub const TELECONNECTIVITY_FIELD: &str = "teleconnectivity-field";
/// 局部传递性场
pub const TRANSITIVITY_FIELD: &str = "transitivity-field";
/// 全局传递性
pub const GLOBAL_TRANSITIVITY: &str = "global-transitivity";
/// Niño 3.4 区域平均度数
pub const ELNINO_DEG: &str = "elnino-deg";
/// Niño 3.4 区域平均遥相关度
pub const ELNINO_TELE: &str = "elnino-tele";

/// 固定参考区域表（El Niño 相关）
///
/// 返回 (短名, 区域)。坐标与文献中的 Niño 区域一致。
pub fn area_coordinates() -> Vec<(&'static str, Region)> {
    vec![
        (
            "nino-3-4-region",
            Region::rectangle_from_infsup(-5.0, 5.0, 190.0, 240.0).expect("nino 3.4"),
        ),
        (
            "nino-3-region",
            Region::rectangle_from_infsup(-5.0, 5.0, -150.0, -90.0).expect("nino 3"),
        ),
        (
            "nino-4-region",
            Region::rectangle_from_infsup(-5.0, 5.0, 160.0, -150.0).expect("nino 4"),
        ),
        (
            "ENSO-big",
            Region::rectangle_from_infsup(-30.0, 10.0, 180.0, -60.0).expect("ENSO big"),
        ),
    ]
}

/// 按短名查找参考区域
#[must_use]
pub fn area_by_name(name: &str) -> Option<Region> {
    area_coordinates()
        .into_iter()
        .find(|(n, _)| *n == name)
        .map(|(_, r)| r)
}

// ============================================================
// 运行结果
// ============================================================

/// 一个时间窗口的指标结果
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    /// 标量指标（按键）
    pub scalars: BTreeMap<String, f64>,
    /// 逐顶点场（按键）
    pub fields: BTreeMap<String, Array1<f64>>,
}

// ============================================================
// 指标引擎
// ============================================================

/// 指标引擎
///
/// 构造时解析请求的键（未知的社区算法名是配置错误）并预计算区域
/// 掩码；之后对每个窗口的图调用 [`MetricsEngine::compute`]。
pub struct MetricsEngine {
    requested_scalars: Vec<String>,
    requested_fields: Vec<String>,
    community_algorithms: Vec<(String, CommunityAlgorithm)>,
    elnino_mask: Vec<bool>,
}

impl MetricsEngine {
    /// 创建指标引擎
    pub fn new(
        points: &[GeoPoint],
        requested_scalars: &[String],
        requested_fields: &[String],
    ) -> CnResult<Self> {
        // 校验场名
        for name in requested_fields {
            match name.as_str() {
                DEGREE_FIELD | TELECONNECTIVITY_FIELD | TRANSITIVITY_FIELD => {}
                other => {
                    return Err(CnError::config(format!("未知的场指标: {other}")));
                }
            }
        }

        // 校验标量名并解析社区算法
        let mut community_algorithms = Vec::new();
        for name in requested_scalars {
            if let Some(algo_name) = name.strip_prefix(MODULARITY_PREFIX) {
                let algo = algorithm_by_name(algo_name).ok_or_else(|| {
                    CnError::config(format!("未知的社区检测算法: {algo_name}"))
                })?;
                community_algorithms.push((name.clone(), algo));
            } else {
                match name.as_str() {
                    GLOBAL_TRANSITIVITY | ELNINO_DEG | ELNINO_TELE => {}
                    other => {
                        return Err(CnError::config(format!("未知的标量指标: {other}")));
                    }
                }
            }
        }

        // Niño 3.4 掩码一次性构造，由引擎持有
        let elnino_mask = area_by_name("nino-3-4-region")
            .expect("nino 3.4 in area table")
            .mask(points);
        tracing::debug!(
            "metrics engine: elnino mask covers {}/{} vertices",
            elnino_mask.iter().filter(|&&m| m).count(),
            points.len()
        );

        Ok(Self {
            requested_scalars: requested_scalars.to_vec(),
            requested_fields: requested_fields.to_vec(),
            community_algorithms,
            elnino_mask,
        })
    }

    /// 请求的标量键
    #[must_use]
    pub fn requested_scalars(&self) -> &[String] {
        &self.requested_scalars
    }

    /// 请求的场键
    #[must_use]
    pub fn requested_fields(&self) -> &[String] {
        &self.requested_fields
    }

    /// 对一个图计算全部请求的指标
    pub fn compute(&self, graph: &NetworkGraph) -> CnResult<RunResult> {
        let n = graph.node_count();
        if n != self.elnino_mask.len() {
            return Err(CnError::SizeMismatch {
                name: "graph vertices",
                expected: self.elnino_mask.len(),
                actual: n,
            });
        }

        let mut result = RunResult::default();

        // 区域标量也需要对应的场，必要时内部计算
        let need_degree = self.wants_field(DEGREE_FIELD) || self.wants_scalar(ELNINO_DEG);
        let need_tele =
            self.wants_field(TELECONNECTIVITY_FIELD) || self.wants_scalar(ELNINO_TELE);

        let degree_field = need_degree.then(|| degree_field(graph));
        let tele_field = need_tele.then(|| teleconnectivity_field(graph));

        if let Some(field) = &degree_field {
            if self.wants_field(DEGREE_FIELD) {
                result.fields.insert(DEGREE_FIELD.to_string(), field.clone());
            }
            if self.wants_scalar(ELNINO_DEG) {
                result.scalars.insert(
                    ELNINO_DEG.to_string(),
                    masked_mean(field, &self.elnino_mask),
                );
            }
        }
        if let Some(field) = &tele_field {
            if self.wants_field(TELECONNECTIVITY_FIELD) {
                result
                    .fields
                    .insert(TELECONNECTIVITY_FIELD.to_string(), field.clone());
            }
            if self.wants_scalar(ELNINO_TELE) {
                result.scalars.insert(
                    ELNINO_TELE.to_string(),
                    masked_mean(field, &self.elnino_mask),
                );
            }
        }

        if self.wants_field(TRANSITIVITY_FIELD) {
            result
                .fields
                .insert(TRANSITIVITY_FIELD.to_string(), local_transitivity(graph));
        }
        if self.wants_scalar(GLOBAL_TRANSITIVITY) {
            result
                .scalars
                .insert(GLOBAL_TRANSITIVITY.to_string(), global_transitivity(graph));
        }

        // 社区检测：逐算法失败隔离
        for (key, algo) in &self.community_algorithms {
            let value = match algo(graph) {
                Ok(membership) => modularity(graph, &membership),
                Err(e) => {
                    tracing::warn!("community detection {key} failed: {e}, continuing");
                    f64::NAN
                }
            };
            result.scalars.insert(key.clone(), value);
        }

        // 后置条件：所有请求的键都已生成
        for key in &self.requested_scalars {
            if !result.scalars.contains_key(key) {
                return Err(CnError::internal(format!("标量 {key} 未被生成")));
            }
        }
        for key in &self.requested_fields {
            if !result.fields.contains_key(key) {
                return Err(CnError::internal(format!("场 {key} 未被生成")));
            }
        }
        Ok(result)
    }

    fn wants_scalar(&self, key: &str) -> bool {
        self.requested_scalars.iter().any(|k| k == key)
    }

    fn wants_field(&self, key: &str) -> bool {
        self.requested_fields.iter().any(|k| k == key)
    }
}

// ============================================================
// 场与标量的具体计算
// ============================================================

/// 每个顶点的边数
fn degree_field(graph: &NetworkGraph) -> Array1<f64> {
    Array1::from_iter(
        (0..graph.node_count())
            .map(|v| graph.neighbors(NodeIndex::new(v)).count() as f64),
    )
}

/// 遥相关场：关联边大圆长度累加，按 `(V−1)·半周长` 归一化
fn teleconnectivity_field(graph: &NetworkGraph) -> Array1<f64> {
    let n = graph.node_count();
    let mut cumulative = vec![0.0f64; n];
    for edge in graph.edge_indices() {
        let (a, b) = graph.edge_endpoints(edge).expect("edge endpoints");
        let pa = graph.node_weight(a).expect("node weight");
        let pb = graph.node_weight(b).expect("node weight");
        let dist = pa.haversine_km(pb);
        cumulative[a.index()] += dist;
        cumulative[b.index()] += dist;
    }
    let norm = (n as f64 - 1.0) * HALF_EARTH_CIRCUMFERENCE_KM;
    Array1::from_iter(cumulative.into_iter().map(|d| d / norm))
}

/// 每个顶点的邻居集合（升序）
fn neighbor_sets(graph: &NetworkGraph) -> Vec<Vec<usize>> {
    (0..graph.node_count())
        .map(|v| {
            let mut nb: Vec<usize> = graph
                .neighbors(NodeIndex::new(v))
                .map(|x| x.index())
                .collect();
            nb.sort_unstable();
            nb
        })
        .collect()
}

/// 顶点邻居之间实际存在的边数
fn links_among_neighbors(neighbors: &[Vec<usize>], v: usize) -> usize {
    let nb = &neighbors[v];
    let mut links = 0;
    for (i, &a) in nb.iter().enumerate() {
        for &b in &nb[i + 1..] {
            if neighbors[a].binary_search(&b).is_ok() {
                links += 1;
            }
        }
    }
    links
}

/// 全局传递性（零回退约定）
///
/// `3 × 三角形数 / 连通三元组数`；没有任何三元组时返回 0 而不是 NaN。
fn global_transitivity(graph: &NetworkGraph) -> f64 {
    let neighbors = neighbor_sets(graph);
    let n = graph.node_count();

    let mut closed = 0usize; // 每个三角形在三个顶点处各计一次
    let mut triads = 0usize;
    for v in 0..n {
        let deg = neighbors[v].len();
        if deg < 2 {
            continue;
        }
        triads += deg * (deg - 1) / 2;
        closed += links_among_neighbors(&neighbors, v);
    }
    if triads == 0 {
        return 0.0;
    }
    closed as f64 / triads as f64
}

/// 局部传递性场（度数 < 2 为 NaN）
fn local_transitivity(graph: &NetworkGraph) -> Array1<f64> {
    let neighbors = neighbor_sets(graph);
    Array1::from_iter((0..graph.node_count()).map(|v| {
        let deg = neighbors[v].len();
        if deg < 2 {
            return f64::NAN;
        }
        let possible = deg * (deg - 1) / 2;
        links_among_neighbors(&neighbors, v) as f64 / possible as f64
    }))
}

/// 掩码内的平均值
fn masked_mean(field: &Array1<f64>, mask: &[bool]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (value, &keep) in field.iter().zip(mask) {
        if keep {
            sum += value;
            count += 1;
        }
    }
    if count == 0 {
        return f64::NAN;
    }
    sum / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use ndarray::Array2;

    fn triangle_plus_leaf() -> NetworkGraph {
        // 顶点 0-1-2 成三角形，3 挂在 2 上
        let points: Vec<GeoPoint> = vec![
            GeoPoint::new(0.0, 0.0).unwrap(),
            GeoPoint::new(10.0, 0.0).unwrap(),
            GeoPoint::new(20.0, 0.0).unwrap(),
            GeoPoint::new(30.0, 0.0).unwrap(),
        ];
        let mut adjacency = Array2::zeros((4, 4));
        for &(a, b) in &[(0, 1), (0, 2), (1, 2), (2, 3)] {
            adjacency[[a, b]] = 1u8;
            adjacency[[b, a]] = 1;
        }
        build_graph(&adjacency, &points).unwrap()
    }

    fn strings(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_degree_and_transitivity() {
        let graph = triangle_plus_leaf();
        let engine = MetricsEngine::new(
            &(0..4)
                .map(|i| GeoPoint::new(i as f64 * 10.0, 0.0).unwrap())
                .collect::<Vec<_>>(),
            &strings(&[GLOBAL_TRANSITIVITY]),
            &strings(&[DEGREE_FIELD, TRANSITIVITY_FIELD]),
        )
        .unwrap();

        let result = engine.compute(&graph).unwrap();
        let degrees = &result.fields[DEGREE_FIELD];
        assert_eq!(degrees.to_vec(), vec![2.0, 2.0, 3.0, 1.0]);

        // 三角形数 1；三元组: v0:1, v1:1, v2:3 → 5; T = 3/5
        let t = result.scalars[GLOBAL_TRANSITIVITY];
        assert!((t - 3.0 / 5.0).abs() < 1e-12);

        let local = &result.fields[TRANSITIVITY_FIELD];
        assert!((local[0] - 1.0).abs() < 1e-12);
        assert!((local[2] - 1.0 / 3.0).abs() < 1e-12);
        assert!(local[3].is_nan()); // 度数 < 2
    }

    #[test]
    fn test_global_transitivity_zero_fallback() {
        // 一条边：没有三元组 → 0 而不是 NaN
        let points = vec![
            GeoPoint::new(0.0, 0.0).unwrap(),
            GeoPoint::new(10.0, 0.0).unwrap(),
        ];
        let mut adjacency = Array2::zeros((2, 2));
        adjacency[[0, 1]] = 1u8;
        adjacency[[1, 0]] = 1;
        let graph = build_graph(&adjacency, &points).unwrap();
        assert_eq!(global_transitivity(&graph), 0.0);
    }

    #[test]
    fn test_teleconnectivity_normalization() {
        // 两个顶点一条边: 每个顶点的累计距离 = 边长
        let p0 = GeoPoint::new(0.0, 0.0).unwrap();
        let p1 = GeoPoint::new(180.0, 0.0).unwrap(); // 对径点, 距离 = 半周长
        let mut adjacency = Array2::zeros((2, 2));
        adjacency[[0, 1]] = 1u8;
        adjacency[[1, 0]] = 1;
        let graph = build_graph(&adjacency, &[p0, p1]).unwrap();

        let field = teleconnectivity_field(&graph);
        // 归一化: 半周长 / ((2−1)·半周长) = 1
        assert!((field[0] - 1.0).abs() < 1e-9);
        assert!((field[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_elnino_scalars() {
        // 把一个顶点放进 Niño 3.4 区域 (lat −5..5, lon 190..240)
        let points = vec![
            GeoPoint::new(210.0, 0.0).unwrap(), // 区域内
            GeoPoint::new(10.0, 50.0).unwrap(),
            GeoPoint::new(100.0, -40.0).unwrap(),
        ];
        let mut adjacency = Array2::zeros((3, 3));
        adjacency[[0, 1]] = 1u8;
        adjacency[[1, 0]] = 1;
        let graph = build_graph(&adjacency, &points).unwrap();

        let engine = MetricsEngine::new(
            &points,
            &strings(&[ELNINO_DEG, ELNINO_TELE]),
            &strings(&[]),
        )
        .unwrap();
        let result = engine.compute(&graph).unwrap();
        // 区域内只有顶点 0，度数 1
        assert!((result.scalars[ELNINO_DEG] - 1.0).abs() < 1e-12);
        assert!(result.scalars[ELNINO_TELE] > 0.0);
        // 区域标量不要求导出对应的场
        assert!(result.fields.is_empty());
    }

    #[test]
    fn test_modularity_failure_isolation() {
        // 空图让所有社区算法报错：模块度记 NaN，其余标量照常
        let points: Vec<GeoPoint> = (0..3)
            .map(|i| GeoPoint::new(i as f64 * 10.0, 0.0).unwrap())
            .collect();
        let graph = build_graph(&Array2::zeros((3, 3)), &points).unwrap();

        let engine = MetricsEngine::new(
            &points,
            &strings(&[
                GLOBAL_TRANSITIVITY,
                "modularity-fast-greedy",
                "modularity-label-propagation",
            ]),
            &strings(&[DEGREE_FIELD]),
        )
        .unwrap();
        let result = engine.compute(&graph).unwrap();

        assert!(result.scalars["modularity-fast-greedy"].is_nan());
        assert!(result.scalars["modularity-label-propagation"].is_nan());
        assert_eq!(result.scalars[GLOBAL_TRANSITIVITY], 0.0);
        assert!(result.fields.contains_key(DEGREE_FIELD));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let points = vec![GeoPoint::new(0.0, 0.0).unwrap()];
        assert!(MetricsEngine::new(&points, &strings(&["bogus"]), &strings(&[])).is_err());
        assert!(MetricsEngine::new(&points, &strings(&[]), &strings(&["bogus"])).is_err());
        assert!(
            MetricsEngine::new(&points, &strings(&["modularity-walktrap"]), &strings(&[]))
                .is_err()
        );
    }

    #[test]
    fn test_area_table() {
        assert!(area_by_name("nino-3-4-region").is_some());
        assert!(area_by_name("ENSO-big").is_some());
        assert!(area_by_name("atlantis").is_none());
    }
}
