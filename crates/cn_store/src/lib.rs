// crates/cn_store/src/lib.rs

//! ClimNet 结果存储
//!
//! 持久化的结构化输出：窗口日期对、按窗口索引的标量数组与按
//! `(窗口, 顶点)` 索引的场数组，全部预分配并以 NaN 填充——部分/并行
//! 写入与顺序无关，且可以合并。
//!
//! # 文件格式
//!
//! ```text
//! [魔数: 4 bytes] "CNRS"
//! [版本: u32 LE]
//! [bincode 负载: ResultStore]
//! [CRC32: u32 LE]（对负载计算）
//! ```
//!
//! # 合并语义
//!
//! 所有输入分片必须有完全一致的日期对；逐元素合并时"来源的非 NaN
//! 值获胜"，但目的位置已有非 NaN 值即为致命冲突——输入必须不相交地
//! 划分索引空间，重叠说明分片划分有 bug，继续会静默损坏结果。

#![warn(missing_docs)]
#![warn(clippy::all)]

mod crc32;
pub mod store;

pub use store::ResultStore;
