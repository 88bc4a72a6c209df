// crates/cn_runtime/src/lib.rs

//! ClimNet 运行时
//!
//! 把整个流水线组织成一次批处理运行：
//!
//! - [`config`]: 运行档案、脚本模式与 `RunConfig`
//! - [`partition`]: 窗口序列在工作者之间的确定性连续划分
//! - [`transport`]: 点对点消息传输与两阶段屏障（ready/go、done/merge）
//! - [`orchestrator`]: 工作者循环与协调者合并
//!
//! # 并发模型
//!
//! 固定数量的相互独立的工作者，各自单线程，只通过显式的点对点
//! 消息和共享存储上互不相交的输出分片通信——没有共享内存，没有锁。
//! 0 号为协调者，负责开始屏障的放行与结束屏障后的合并。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod orchestrator;
pub mod partition;
pub mod transport;

pub use config::{GridVariant, RunConfig, RunProfile, ScriptMode};
pub use orchestrator::{BatchOrchestrator, BatchOutcome};
pub use partition::partition;
pub use transport::{ChannelTransport, Message, Transport};
