// crates/cn_mesh/src/lib.rs

//! ClimNet 网格层
//!
//! 通过递归细分正二十面体的边，构建球面的近均匀测地离散化。
//!
//! # 模块概览
//!
//! - [`icosahedron`]: 构造图 `IcoGraph` 与细分算法（含度数/边长不变量）
//! - [`mesh`]: 细分结果 `Mesh`（仅保留有序顶点坐标序列）
//! - [`grid`]: 网格抽象 `Grid`（`GridKind` 标签 + 可选区域移除）
//! - [`cache`]: 网格缓存工件（magic + 版本 + bincode）
//!
//! # 构造不变量
//!
//! 初始 12 个顶点全部为 5 度，且边长一致（单位球大圆距离，绝对容差
//! 0.01）；n 次细分后顶点数恰为 `2 + 5·2^(2n+1)`，度数分布为
//! {5: 12, 6: 内部顶点, 2: 最后一轮新顶点}。任何检查失败都是致命的
//! 构造错误，绝不重试。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod grid;
pub mod icosahedron;
pub mod mesh;

pub use grid::{Grid, GridKind};
pub use icosahedron::IcoGraph;
pub use mesh::Mesh;
