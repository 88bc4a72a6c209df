// crates/cn_network/src/lib.rs

//! ClimNet 网络层
//!
//! 从数据窗口到图指标的完整路径：
//!
//! - [`correlation`]: Pearson 相关矩阵与 keep-fraction 阈值化
//! - [`graph`]: 由邻接矩阵装配无向图（顶点携带经纬度）
//! - [`community`]: 社区检测算法与模块度（逐算法失败隔离）
//! - [`metrics`]: 指标引擎（度数场、遥相关场、传递性、区域限定标量）
//!
//! # 约定
//!
//! 阈值化之前取相关系数的绝对值（NaN 置 0）：强负相关与强正相关
//! 一样构成链接。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod community;
pub mod correlation;
pub mod graph;
pub mod metrics;

pub use community::{CommunityError, Membership, MODULARITY_PREFIX};
pub use correlation::{absolute_correlation, corr_coeff, threshold_matrix};
pub use graph::{build_graph, NetworkGraph};
pub use metrics::{MetricsEngine, RunResult};
