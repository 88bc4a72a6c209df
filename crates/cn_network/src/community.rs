// crates/cn_network/src/community.rs

//! 社区检测与模块度
//!
//! 每个算法以 `Result<Membership, CommunityError>` 形式运行：单个
//! 算法的计算失败被记录为该算法的模块度 NaN，绝不会中断当前窗口
//! 其余指标的计算（失败隔离见 [`crate::metrics`]）。
//!
//! # 可用算法
//!
//! - `fast-greedy`: CNM 凝聚式模块度贪心
//! - `label-propagation`: 异步标签传播（确定性遍历顺序，平局取最小标签）
//! - `leading-eigenvector`: 模块度矩阵首特征向量的递归二分（幂迭代）

use crate::graph::NetworkGraph;
use petgraph::graph::NodeIndex;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// 社区归属：每个节点一个社区编号（紧凑，从 0 起）
pub type Membership = Vec<usize>;

/// 模块度标量的键前缀（`modularity-<算法名>`）
pub const MODULARITY_PREFIX: &str = "modularity-";

/// 社区检测算法的函数类型
pub type CommunityAlgorithm = fn(&NetworkGraph) -> Result<Membership, CommunityError>;

/// 社区检测失败
///
/// 这些错误在指标引擎中被就地隔离，不会向上传播为致命错误。
#[derive(Debug, Error)]
pub enum CommunityError {
    /// 图没有任何边
    #[error("graph has no edges")]
    EmptyGraph,
    /// 迭代未收敛
    #[error("did not converge after {iterations} iterations")]
    NotConverged {
        /// 已执行的迭代数
        iterations: usize,
    },
    /// 数值失败
    #[error("numerical failure: {0}")]
    Numerical(String),
}

/// 可用算法名列表
#[must_use]
pub fn available_algorithm_names() -> &'static [&'static str] {
    &["fast-greedy", "label-propagation", "leading-eigenvector"]
}

/// 按名字查找算法
#[must_use]
pub fn algorithm_by_name(name: &str) -> Option<CommunityAlgorithm> {
    match name {
        "fast-greedy" => Some(fast_greedy),
        "label-propagation" => Some(label_propagation),
        "leading-eigenvector" => Some(leading_eigenvector),
        _ => None,
    }
}

/// 计算给定划分的模块度 Q
///
/// Q = Σ_c (e_c/m − (d_c/2m)²)。无边图返回 NaN（与 0/0 一致）。
#[must_use]
pub fn modularity(graph: &NetworkGraph, membership: &[usize]) -> f64 {
    let m = graph.edge_count() as f64;
    if m == 0.0 {
        return f64::NAN;
    }

    let n_comm = membership.iter().copied().max().map_or(0, |c| c + 1);
    let mut intra = vec![0.0f64; n_comm];
    let mut degree_sum = vec![0.0f64; n_comm];

    for edge in graph.edge_indices() {
        let (a, b) = graph.edge_endpoints(edge).expect("edge endpoints");
        let (ca, cb) = (membership[a.index()], membership[b.index()]);
        if ca == cb {
            intra[ca] += 1.0;
        }
        degree_sum[ca] += 1.0;
        degree_sum[cb] += 1.0;
    }

    let mut q = 0.0;
    for c in 0..n_comm {
        q += intra[c] / m - (degree_sum[c] / (2.0 * m)).powi(2);
    }
    q
}

/// 社区编号紧凑化：按首次出现顺序重编号为 0..k
fn renumber(labels: &[usize]) -> Membership {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    let mut next = 0;
    labels
        .iter()
        .map(|&l| {
            *mapping.entry(l).or_insert_with(|| {
                let id = next;
                next += 1;
                id
            })
        })
        .collect()
}

// ============================================================
// fast-greedy (CNM)
// ============================================================

/// CNM 凝聚式模块度贪心
///
/// 每个顶点初始自成社区；反复合并使 ΔQ 最大的相连社区对，直到只剩
/// 一个社区；返回过程中模块度最高的划分。
pub fn fast_greedy(graph: &NetworkGraph) -> Result<Membership, CommunityError> {
    let n = graph.node_count();
    let m = graph.edge_count() as f64;
    if m == 0.0 {
        return Err(CommunityError::EmptyGraph);
    }

    // 社区间边比例 w[c1][c2]（c1 != c2）与各社区端点比例 a[c]
    let mut weights: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n];
    let mut intra = vec![0.0f64; n];
    let mut ends = vec![0.0f64; n];
    for edge in graph.edge_indices() {
        let (u, v) = graph.edge_endpoints(edge).expect("edge endpoints");
        let (u, v) = (u.index(), v.index());
        if u == v {
            intra[u] += 1.0 / m;
        } else {
            *weights[u].entry(v).or_insert(0.0) += 1.0 / m;
            *weights[v].entry(u).or_insert(0.0) += 1.0 / m;
        }
        ends[u] += 1.0 / (2.0 * m);
        ends[v] += 1.0 / (2.0 * m);
    }

    let mut labels: Vec<usize> = (0..n).collect();
    let mut alive: Vec<bool> = vec![true; n];
    let mut q: f64 = intra
        .iter()
        .zip(&ends)
        .map(|(e, a)| e - a * a)
        .sum();
    let mut best_q = q;
    let mut best_labels = labels.clone();

    loop {
        // 在相连社区对中找 ΔQ = w_ij − 2 a_i a_j 的最大值
        let mut best: Option<(usize, usize, f64)> = None;
        for c1 in 0..n {
            if !alive[c1] {
                continue;
            }
            for (&c2, &w) in &weights[c1] {
                if c2 <= c1 {
                    continue;
                }
                let dq = w - 2.0 * ends[c1] * ends[c2];
                if best.map_or(true, |(_, _, b)| dq > b) {
                    best = Some((c1, c2, dq));
                }
            }
        }
        let Some((keep, drop, dq)) = best else {
            break; // 不连通的社区之间没有可合并的对
        };

        // 把 drop 并入 keep
        let w_kd = weights[keep].remove(&drop).unwrap_or(0.0);
        intra[keep] += intra[drop] + w_kd;
        ends[keep] += ends[drop];
        let drop_neighbors: Vec<(usize, f64)> = weights[drop]
            .iter()
            .filter(|(&c, _)| c != keep)
            .map(|(&c, &w)| (c, w))
            .collect();
        for (c, w) in drop_neighbors {
            *weights[keep].entry(c).or_insert(0.0) += w;
            let wc = &mut weights[c];
            wc.remove(&drop);
            *wc.entry(keep).or_insert(0.0) += w;
        }
        weights[drop].clear();
        for wc in weights.iter_mut() {
            wc.remove(&drop);
        }
        alive[drop] = false;

        for l in labels.iter_mut() {
            if *l == drop {
                *l = keep;
            }
        }

        q += dq;
        if q > best_q {
            best_q = q;
            best_labels = labels.clone();
        }

        if alive.iter().filter(|&&a| a).count() <= 1 {
            break;
        }
    }

    Ok(renumber(&best_labels))
}

// ============================================================
// label propagation
// ============================================================

/// 标签传播的最大遍历轮数
const LABEL_PROPAGATION_MAX_SWEEPS: usize = 100;

/// 异步标签传播
///
/// 按固定节点顺序遍历（确定性），每个节点采用邻居中最常见的标签，
/// 平局取最小标签；一轮无变化即收敛。
pub fn label_propagation(graph: &NetworkGraph) -> Result<Membership, CommunityError> {
    let n = graph.node_count();
    if graph.edge_count() == 0 {
        return Err(CommunityError::EmptyGraph);
    }

    let mut labels: Vec<usize> = (0..n).collect();
    for _ in 0..LABEL_PROPAGATION_MAX_SWEEPS {
        let mut changed = false;
        for v in 0..n {
            let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
            for nb in graph.neighbors(NodeIndex::new(v)) {
                *counts.entry(labels[nb.index()]).or_insert(0) += 1;
            }
            let Some(max_count) = counts.values().copied().max() else {
                continue; // 孤立节点保持原标签
            };
            // 平局取最小标签（BTreeMap 迭代有序）
            let new_label = counts
                .iter()
                .find(|(_, &c)| c == max_count)
                .map(|(&l, _)| l)
                .expect("nonempty counts");
            if new_label != labels[v] {
                labels[v] = new_label;
                changed = true;
            }
        }
        if !changed {
            return Ok(renumber(&labels));
        }
    }
    Err(CommunityError::NotConverged {
        iterations: LABEL_PROPAGATION_MAX_SWEEPS,
    })
}

// ============================================================
// leading eigenvector
// ============================================================

/// 幂迭代的最大迭代数
const POWER_MAX_ITERS: usize = 2000;

/// 幂迭代收敛容差
const POWER_TOLERANCE: f64 = 1e-10;

/// 认为不可再分的 ΔQ 下限
const SPLIT_MIN_GAIN: f64 = 1e-12;

/// 模块度矩阵首特征向量的递归二分
///
/// 对每个待分社区求受限模块度矩阵的最正特征值方向，按特征向量符号
/// 二分；特征值非正或 ΔQ 不为正则停止细分。
pub fn leading_eigenvector(graph: &NetworkGraph) -> Result<Membership, CommunityError> {
    let n = graph.node_count();
    let m = graph.edge_count() as f64;
    if m == 0.0 {
        return Err(CommunityError::EmptyGraph);
    }

    let degrees: Vec<f64> = (0..n)
        .map(|v| graph.neighbors(NodeIndex::new(v)).count() as f64)
        .collect();

    let mut membership = vec![0usize; n];
    let mut next_label = 1;
    let mut queue: Vec<Vec<usize>> = vec![(0..n).collect()];

    while let Some(members) = queue.pop() {
        if members.len() < 2 {
            continue;
        }
        if let Some((negatives, positives)) =
            split_by_leading_eigenvector(graph, &degrees, m, &members)?
        {
            // 负号一侧保持原社区号，正号一侧取新号
            for &v in &positives {
                membership[v] = next_label;
            }
            next_label += 1;
            queue.push(negatives);
            queue.push(positives);
        }
    }

    Ok(renumber(&membership))
}

/// 对一个社区做一次谱二分
///
/// 返回 `None` 表示该社区不可再分。
fn split_by_leading_eigenvector(
    graph: &NetworkGraph,
    degrees: &[f64],
    m: f64,
    members: &[usize],
) -> Result<Option<(Vec<usize>, Vec<usize>)>, CommunityError> {
    let size = members.len();
    let local: HashMap<usize, usize> = members
        .iter()
        .enumerate()
        .map(|(i, &v)| (v, i))
        .collect();

    // 社区内邻接（局部编号）
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); size];
    for (i, &v) in members.iter().enumerate() {
        for nb in graph.neighbors(NodeIndex::new(v)) {
            if let Some(&j) = local.get(&nb.index()) {
                neighbors[i].push(j);
            }
        }
    }

    let k_sum: f64 = members.iter().map(|&v| degrees[v]).sum();
    let two_m = 2.0 * m;

    // 广义模块度矩阵的对角修正 d_i = Σ_{j∈g} B_ij
    let diag: Vec<f64> = (0..size)
        .map(|i| neighbors[i].len() as f64 - degrees[members[i]] * k_sum / two_m)
        .collect();

    // B^g v = A_g v − k (k·v)/2m − diag ∘ v；加位移 σ 保证收敛到最正特征值
    let row_bound: f64 = (0..size)
        .map(|i| {
            neighbors[i].len() as f64
                + degrees[members[i]] * k_sum / two_m
                + diag[i].abs()
        })
        .fold(0.0f64, f64::max);
    let sigma = row_bound + 1.0;

    let apply = |v: &[f64], out: &mut [f64]| {
        let k_dot: f64 = (0..size).map(|i| degrees[members[i]] * v[i]).sum();
        for i in 0..size {
            let mut acc = 0.0;
            for &j in &neighbors[i] {
                acc += v[j];
            }
            acc -= degrees[members[i]] * k_dot / two_m;
            acc -= diag[i] * v[i];
            out[i] = acc + sigma * v[i];
        }
    };

    // 确定性初始向量（避免与首特征向量正交的病态情况）
    let mut vector: Vec<f64> = (0..size)
        .map(|i| 1.0 + ((i * 2_654_435_761) % 97) as f64 / 97.0)
        .collect();
    normalize(&mut vector).map_err(CommunityError::Numerical)?;

    let mut eigenvalue = 0.0;
    let mut converged = false;
    let mut scratch = vec![0.0f64; size];
    for _ in 0..POWER_MAX_ITERS {
        apply(&vector, &mut scratch);
        let norm = normalize(&mut scratch).map_err(CommunityError::Numerical)?;
        let delta: f64 = vector
            .iter()
            .zip(&scratch)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f64, f64::max);
        vector.copy_from_slice(&scratch);
        eigenvalue = norm - sigma;
        if delta < POWER_TOLERANCE {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(CommunityError::NotConverged {
            iterations: POWER_MAX_ITERS,
        });
    }

    // 特征值非正：社区不可分
    if eigenvalue <= POWER_TOLERANCE {
        return Ok(None);
    }

    let mut negatives = Vec::new();
    let mut positives = Vec::new();
    for (i, &v) in members.iter().enumerate() {
        if vector[i] < 0.0 {
            negatives.push(v);
        } else {
            positives.push(v);
        }
    }
    if negatives.is_empty() || positives.is_empty() {
        return Ok(None);
    }

    // ΔQ = (1/4m) Σ_ij s_i s_j B^g_ij
    let signs: Vec<f64> = (0..size)
        .map(|i| if vector[i] < 0.0 { -1.0 } else { 1.0 })
        .collect();
    let mut bs = vec![0.0f64; size];
    let apply_plain = |v: &[f64], out: &mut [f64]| {
        let k_dot: f64 = (0..size).map(|i| degrees[members[i]] * v[i]).sum();
        for i in 0..size {
            let mut acc = 0.0;
            for &j in &neighbors[i] {
                acc += v[j];
            }
            acc -= degrees[members[i]] * k_dot / two_m;
            acc -= diag[i] * v[i];
            out[i] = acc;
        }
    };
    apply_plain(&signs, &mut bs);
    let gain: f64 = signs.iter().zip(&bs).map(|(s, b)| s * b).sum::<f64>() / (4.0 * m);
    if gain <= SPLIT_MIN_GAIN {
        return Ok(None);
    }

    Ok(Some((negatives, positives)))
}

/// 归一化向量，返回原范数
fn normalize(v: &mut [f64]) -> Result<f64, String> {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if !norm.is_finite() || norm == 0.0 {
        return Err(format!("vector norm is {norm}"));
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    Ok(norm)
}
