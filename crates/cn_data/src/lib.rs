// crates/cn_data/src/lib.rs

//! ClimNet 数据层
//!
//! 覆盖从原始年度数据到分析网格数据窗口的全部路径：
//!
//! - [`calendar`]: 365 天历法（闰年的 2 月 29 日被固定移除）
//! - [`loader`]: 年度加载器边界 `YearLoader` 与二进制年度文件适配器
//! - [`synthetic`]: 确定性合成数据加载器（测试与演练）
//! - [`remap`]: k 近邻无权平均重映射
//! - [`buffer`]: 两年滚动缓冲 `RollingBuffer`
//!
//! 原始文件的解析与季节性去除不在本层范围内；`YearLoader` 是与
//! 外部预处理协作方之间的唯一边界。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod calendar;
pub mod loader;
pub mod remap;
pub mod synthetic;

pub use buffer::{RollingBuffer, ShiftDirection, Slot};
pub use loader::{BinaryYearLoader, YearLoader};
pub use remap::Remapper;
pub use synthetic::SyntheticLoader;
