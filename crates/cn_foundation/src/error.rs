// crates/cn_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `CnError` 枚举和 `CnResult` 类型别名，用于整个项目的错误处理。
//!
//! # 错误分类
//!
//! 按 §7 的错误分类设计：
//!
//! 1. **构造不变量失败** (网格度数/边长检查、点云范数、形状不匹配): 致命
//! 2. **数据加载失败** (缺失/损坏的年度数据): 致命，携带出错标识
//! 3. **单个指标计算失败** (某个社区检测算法抛错): 局部恢复，不经过本类型
//! 4. **合并冲突** (两个分片的非 NaN 区域重叠): 致命
//! 5. **分布式握手违例** (屏障处收到意外消息): 致命，协议错误

use std::path::PathBuf;
use thiserror::Error;

/// 统一结果类型
pub type CnResult<T> = Result<T, CnError>;

/// ClimNet 错误类型
///
/// 核心错误类型，用于整个项目。致命错误终止整个运行；
/// 已写入分片的部分结果保留在磁盘上供事后检查。
#[derive(Error, Debug)]
pub enum CnError {
    // ========================================================================
    // IO 相关错误
    // ========================================================================
    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        #[source]
        /// 可选的底层 IO 错误
        source: Option<std::io::Error>,
    },

    /// 文件不存在
    #[error("文件不存在: {path}")]
    FileNotFound {
        /// 未找到的路径
        path: PathBuf,
    },

    /// 序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        /// 序列化失败原因
        message: String,
    },

    // ========================================================================
    // 构造不变量
    // ========================================================================
    /// 网格构造不变量失败
    #[error("网格构造不变量失败: {message}")]
    MeshInvariant {
        /// 具体错误信息
        message: String,
    },

    /// 点云范数超出容差
    #[error("点云范数超出容差: 顶点 {index}, 范数 {norm}, 容差 {tolerance}")]
    UnitNorm {
        /// 顶点索引
        index: usize,
        /// 实际范数
        norm: f64,
        /// 允许容差
        tolerance: f64,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 数组形状不匹配
    #[error("数组形状不匹配: {name} 期望{expected:?}, 实际{actual:?}")]
    ShapeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望形状
        expected: Vec<usize>,
        /// 实际形状
        actual: Vec<usize>,
    },

    /// 数据超出范围
    #[error("数据超出范围: {field}={value}, 期望范围=[{min}, {max}]")]
    OutOfRange {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
        /// 最小允许值
        min: f64,
        /// 最大允许值
        max: f64,
    },

    // ========================================================================
    // 数据加载
    // ========================================================================
    /// 年度数据加载失败
    #[error("年度数据加载失败: {year} ({message})")]
    DataLoad {
        /// 出错年份
        year: i32,
        /// 失败原因
        message: String,
    },

    // ========================================================================
    // 结果存储与合并
    // ========================================================================
    /// 窗口日期不匹配
    #[error("窗口日期不匹配: 索引 {index}, 存储 {stored}, 写入 {given}")]
    DateMismatch {
        /// 窗口索引
        index: usize,
        /// 存储中的日期对
        stored: String,
        /// 写入请求的日期对
        given: String,
    },

    /// 合并冲突：两个分片在同一位置都写入了数据
    #[error("合并冲突: {name} 在索引 {index} 处已有非 NaN 数据，分片划分有误")]
    MergeConflict {
        /// 冲突的数据集名称
        name: String,
        /// 冲突的线性索引
        index: usize,
    },

    // ========================================================================
    // 分布式协议
    // ========================================================================
    /// 协议错误：屏障处收到意外消息
    #[error("协议错误: {message}")]
    Protocol {
        /// 具体错误信息
        message: String,
    },

    /// 运行被中止
    #[error("运行被中止: {reason}")]
    Aborted {
        /// 中止原因
        reason: String,
    },

    // ========================================================================
    // 配置与其他
    // ========================================================================
    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

impl CnError {
    /// 创建 IO 错误
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// 从底层 IO 错误创建
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 创建序列化错误
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// 创建网格不变量错误
    pub fn mesh_invariant(message: impl Into<String>) -> Self {
        Self::MeshInvariant {
            message: message.into(),
        }
    }

    /// 创建协议错误
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// 创建配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 创建无效输入错误
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 是否为致命错误
    ///
    /// 当前所有通过 `CnError` 传播的错误都是致命的；
    /// 单个社区检测算法的失败在 cn_network 内部被隔离，不会到达这里。
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl From<std::io::Error> for CnError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CnError::SizeMismatch {
            name: "window",
            expected: 365,
            actual: 366,
        };
        let msg = err.to_string();
        assert!(msg.contains("365"));
        assert!(msg.contains("366"));
    }

    #[test]
    fn test_convenience_constructors() {
        assert!(matches!(
            CnError::mesh_invariant("度数错误"),
            CnError::MeshInvariant { .. }
        ));
        assert!(matches!(CnError::protocol("boom"), CnError::Protocol { .. }));
        assert!(CnError::config("x").is_fatal());
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CnError = io.into();
        assert!(matches!(err, CnError::Io { .. }));
    }
}
