// crates/cn_runtime/src/config.rs

//! 运行配置
//!
//! 运行档案控制窗口之间的时间步进与窗口长度；脚本模式选择要计算的
//! 指标键集合；网格变体在整球与去除 ENSO 区域的球之间选择。
//! 配置随结果存储的 header 一起落盘。

use chrono::NaiveDate;
use cn_foundation::{CnError, CnResult};
use cn_network::community::{available_algorithm_names, MODULARITY_PREFIX};
use cn_network::metrics::{DEGREE_FIELD, GLOBAL_TRANSITIVITY, TELECONNECTIVITY_FIELD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 运行档案：控制窗口起点的时间步进
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunProfile {
    /// 15 天步进
    Normal,
    /// 30 天步进
    Fast,
    /// 5 天步进
    Medium,
    /// 逐日步进
    Daily,
}

impl RunProfile {
    /// 窗口起点之间的天数（365 天历法）
    #[must_use]
    pub fn time_step(self) -> i64 {
        match self {
            Self::Normal => 15,
            Self::Fast => 30,
            Self::Medium => 5,
            Self::Daily => 1,
        }
    }

    /// 档案名
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Daily => "daily",
        }
    }
}

/// 脚本模式：选择计算哪些指标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptMode {
    /// 论文模式：度数/遥相关场 + 全局传递性
    Paper,
    /// 单算法模块度
    Modularity,
    /// 全部社区算法的模块度对比
    ComparisonModularity,
}

impl ScriptMode {
    /// 模式名
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Modularity => "modularity",
            Self::ComparisonModularity => "comparison-modularity",
        }
    }

    /// 该模式请求的 (标量键, 场键)
    #[must_use]
    pub fn result_keys(self) -> (Vec<String>, Vec<String>) {
        match self {
            Self::Paper => (
                vec![GLOBAL_TRANSITIVITY.to_string()],
                vec![
                    DEGREE_FIELD.to_string(),
                    TELECONNECTIVITY_FIELD.to_string(),
                ],
            ),
            Self::Modularity => (
                vec![format!("{MODULARITY_PREFIX}fast-greedy")],
                Vec::new(),
            ),
            Self::ComparisonModularity => (
                available_algorithm_names()
                    .iter()
                    .map(|name| format!("{MODULARITY_PREFIX}{name}"))
                    .collect(),
                Vec::new(),
            ),
        }
    }
}

/// 网格变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GridVariant {
    /// 整球二十面体网格
    Icosahedral,
    /// 去除 ENSO-big 区域后的二十面体网格
    IcosahedralWithoutEnsoBig,
}

impl GridVariant {
    /// 变体名
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Icosahedral => "icosahedral",
            Self::IcosahedralWithoutEnsoBig => "icosahedral-without-ENSO-big",
        }
    }
}

/// 一次批处理运行的完整配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// 运行档案
    pub profile: RunProfile,
    /// 脚本模式
    pub mode: ScriptMode,
    /// 网格变体
    pub grid: GridVariant,
    /// 运行起始日期
    pub begin_date: NaiveDate,
    /// 运行结束日期
    pub end_date: NaiveDate,
    /// 逆序处理（从最晚的窗口开始）
    pub reverse: bool,
    /// 工作者数量
    pub num_workers: usize,
    /// 窗口长度（天，365 天历法）
    pub correlation_time: i64,
    /// keep-fraction 阈值
    pub keep_fraction: f64,
    /// 网格细分次数
    pub iterations: u32,
    /// 重映射近邻数
    pub neighbors: usize,
    /// 最终输出路径
    pub output: PathBuf,
    /// 网格缓存工件路径（缺省则每次重新构建）
    pub mesh_cache: Option<PathBuf>,
}

impl RunConfig {
    /// 以默认参数创建运行配置
    ///
    /// 默认：窗口长度 365 天，keep-fraction 0.005，细分 5 次，k=4。
    pub fn new(
        profile: RunProfile,
        mode: ScriptMode,
        grid: GridVariant,
        begin_date: NaiveDate,
        end_date: NaiveDate,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            profile,
            mode,
            grid,
            begin_date,
            end_date,
            reverse: false,
            num_workers: 1,
            correlation_time: 365,
            keep_fraction: 0.005,
            iterations: 5,
            neighbors: 4,
            output: output.into(),
            mesh_cache: None,
        }
    }

    /// 窗口起点步进
    #[must_use]
    pub fn time_step(&self) -> i64 {
        self.profile.time_step()
    }

    /// 该运行请求的 (标量键, 场键)
    #[must_use]
    pub fn result_keys(&self) -> (Vec<String>, Vec<String>) {
        self.mode.result_keys()
    }

    /// 某个工作者的分片路径：`<output>.worker-<rank>`
    #[must_use]
    pub fn shard_path(&self, rank: usize) -> PathBuf {
        let mut name = self.output.as_os_str().to_os_string();
        name.push(format!(".worker-{rank}"));
        PathBuf::from(name)
    }

    /// 配置校验
    pub fn validate(&self) -> CnResult<()> {
        if self.begin_date >= self.end_date {
            return Err(CnError::config(format!(
                "起始日期 {} 必须早于结束日期 {}",
                self.begin_date, self.end_date
            )));
        }
        if self.num_workers == 0 {
            return Err(CnError::config("工作者数量必须至少为 1"));
        }
        if !(self.keep_fraction > 0.0 && self.keep_fraction <= 1.0) {
            return Err(CnError::config(format!(
                "keep_fraction {} 不在 (0, 1] 内",
                self.keep_fraction
            )));
        }
        if self.correlation_time < 2 {
            return Err(CnError::config("窗口长度至少需要 2 天"));
        }
        if self.neighbors == 0 {
            return Err(CnError::config("重映射近邻数必须至少为 1"));
        }
        Ok(())
    }

    /// 写入结果存储 header 的自由格式元数据
    #[must_use]
    pub fn header(&self) -> BTreeMap<String, String> {
        let mut header = BTreeMap::new();
        header.insert("profile".to_string(), self.profile.name().to_string());
        header.insert("mode".to_string(), self.mode.name().to_string());
        header.insert("grid-type".to_string(), self.grid.name().to_string());
        header.insert(
            "correlation-time".to_string(),
            self.correlation_time.to_string(),
        );
        header.insert(
            "cut-off-fraction".to_string(),
            self.keep_fraction.to_string(),
        );
        header.insert("time-step".to_string(), self.time_step().to_string());
        header.insert("begin-date".to_string(), self.begin_date.to_string());
        header.insert("end-date".to_string(), self.end_date.to_string());
        header.insert("iterations".to_string(), self.iterations.to_string());
        header.insert("reverse".to_string(), self.reverse.to_string());
        header
    }
}
