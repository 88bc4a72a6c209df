// crates/cn_data/src/buffer.rs

//! 两年滚动缓冲
//!
//! 缓冲持有 `t_mult`（固定为 2）个年度槽位，每个槽位 `num_t` 个时间
//! 步的已映射数据。相邻时间窗口大多覆盖重叠的年份，`shift` 操作在
//! 不重新加载的情况下切换"左/右"槽位，只补载缺失的一年。
//!
//! 缓冲由单个工作者独占；窗口必须按单调顺序处理，否则 shift 复用
//! 的前提不成立。

use crate::calendar::{is_leap, DAYS_PER_YEAR};
use crate::loader::YearLoader;
use crate::remap::Remapper;
use chrono::{Datelike, NaiveDate};
use cn_foundation::{ensure_window_shape, CnError, CnResult};
use ndarray::{s, Array2, ArrayView2};

/// 年度槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// 左槽位（较早的年份）
    Left,
    /// 右槽位（较晚的年份）
    Right,
}

impl Slot {
    fn position(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

/// 槽位移动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftDirection {
    /// 左槽数据移入右槽（缓冲整体后退一年）
    LeftToRight,
    /// 右槽数据移入左槽（缓冲整体前进一年）
    RightToLeft,
}

/// 两年滚动数据缓冲
pub struct RollingBuffer {
    data: Array2<f64>,
    num_t: usize,
    grid_size: usize,
    loaded_years: [i32; 2],
    loader: Box<dyn YearLoader>,
    remapper: Option<Remapper>,
    data_mask: Option<Vec<bool>>,
}

impl RollingBuffer {
    /// 年度槽位数
    pub const T_MULT: usize = 2;

    /// 创建滚动缓冲
    ///
    /// - `remapper`: 不规则（测地）网格的重映射；给定时数据掩码无意义
    /// - `data_mask`: 正则网格的可选布尔掩码，按源网格点过滤列
    pub fn new(
        loader: Box<dyn YearLoader>,
        remapper: Option<Remapper>,
        data_mask: Option<Vec<bool>>,
    ) -> CnResult<Self> {
        if remapper.is_some() && data_mask.is_some() {
            return Err(CnError::invalid_input(
                "重映射网格下数据掩码会被覆盖，不应同时给出",
            ));
        }

        let n_source = loader.source_points().len();
        if let Some(r) = &remapper {
            if r.source_len() != n_source {
                return Err(CnError::SizeMismatch {
                    name: "remapper source",
                    expected: n_source,
                    actual: r.source_len(),
                });
            }
        }
        if let Some(mask) = &data_mask {
            if mask.len() != n_source {
                return Err(CnError::SizeMismatch {
                    name: "data mask",
                    expected: n_source,
                    actual: mask.len(),
                });
            }
        }

        let grid_size = match (&remapper, &data_mask) {
            (Some(r), _) => r.target_len(),
            (None, Some(mask)) => mask.iter().filter(|&&m| m).count(),
            (None, None) => n_source,
        };

        let num_t = loader.num_t();
        Ok(Self {
            data: Array2::zeros((Self::T_MULT * num_t, grid_size)),
            num_t,
            grid_size,
            loaded_years: [0, 0],
            loader,
            remapper,
            data_mask,
        })
    }

    /// 每年时间步数
    #[must_use]
    pub fn num_t(&self) -> usize {
        self.num_t
    }

    /// 映射后的网格大小
    #[must_use]
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// 当前驻留的年份 [左, 右]
    #[must_use]
    pub fn loaded_years(&self) -> [i32; 2] {
        self.loaded_years
    }

    /// 加载一年的数据到指定槽位
    ///
    /// 加载 → 可选重映射 → 可选掩码 → 形状校验 → 写入槽位。
    pub fn load_year(&mut self, year: i32, slot: Slot) -> CnResult<()> {
        let position = slot.position();
        tracing::debug!(
            "buffer: dropping {} and loading {} (slot {})",
            self.loaded_years[position],
            year,
            position
        );

        let raw = self.loader.load_year(year)?;
        let n_source = self.loader.source_points().len();
        ensure_window_shape("raw year data", self.num_t, n_source, raw.shape())?;

        let mapped = match &self.remapper {
            Some(remapper) => remapper.remap(raw.view())?,
            None => raw,
        };

        let mapped = match &self.data_mask {
            Some(mask) => {
                let kept: Vec<usize> = mask
                    .iter()
                    .enumerate()
                    .filter(|(_, &m)| m)
                    .map(|(i, _)| i)
                    .collect();
                mapped.select(ndarray::Axis(1), &kept)
            }
            None => mapped,
        };

        ensure_window_shape("mapped year data", self.num_t, self.grid_size, mapped.shape())?;

        let begin = position * self.num_t;
        let end = begin + self.num_t;
        self.data.slice_mut(s![begin..end, ..]).assign(&mapped);
        self.loaded_years[position] = year;
        Ok(())
    }

    /// 切换槽位标签并就地复制保留的一半数据
    ///
    /// 留在缓冲中的那一年不会被触碰；只有目标槽位被覆盖。
    pub fn shift(&mut self, direction: ShiftDirection) {
        let num_t = self.num_t;
        match direction {
            ShiftDirection::LeftToRight => {
                tracing::debug!(
                    "buffer: shifting {} left->right (dropping {})",
                    self.loaded_years[0],
                    self.loaded_years[1]
                );
                self.loaded_years[1] = self.loaded_years[0];
                let src = self.data.slice(s![0..num_t, ..]).to_owned();
                self.data.slice_mut(s![num_t..2 * num_t, ..]).assign(&src);
            }
            ShiftDirection::RightToLeft => {
                tracing::debug!(
                    "buffer: shifting {} right->left (dropping {})",
                    self.loaded_years[1],
                    self.loaded_years[0]
                );
                self.loaded_years[0] = self.loaded_years[1];
                let src = self.data.slice(s![num_t..2 * num_t, ..]).to_owned();
                self.data.slice_mut(s![0..num_t, ..]).assign(&src);
            }
        }
    }

    /// 幂等的高层入口：保证 [y1, y2] 两年驻留
    ///
    /// 两年都已驻留时不做任何事；只差一年且满足 y2 = y1 + 1 时用
    /// `shift` 复用重叠年份；否则全新加载。两年不同时要求 y2 = y1 + 1。
    pub fn load_years(&mut self, y1: i32, y2: i32) -> CnResult<()> {
        if y1 == y2 {
            if !self.loaded_years.contains(&y2) {
                self.load_year(y2, Slot::Left)?;
            }
            return Ok(());
        }

        if y2 != y1 + 1 {
            return Err(CnError::invalid_input(format!(
                "滚动缓冲要求连续年份: 收到 ({y1}, {y2})"
            )));
        }

        if self.loaded_years == [y1, y2] {
            return Ok(());
        }

        if y2 == self.loaded_years[0] {
            self.shift(ShiftDirection::LeftToRight);
            self.load_year(y1, Slot::Left)?;
        } else if y1 == self.loaded_years[1] {
            self.shift(ShiftDirection::RightToLeft);
            self.load_year(y2, Slot::Right)?;
        } else {
            self.load_year(y1, Slot::Left)?;
            self.load_year(y2, Slot::Right)?;
        }
        Ok(())
    }

    /// 日期到缓冲内线性时间步的映射
    ///
    /// 闰年 3 月 1 日及之后的日期要多减一天，对应被移除的 2 月 29 日。
    pub fn get_index(&self, date: NaiveDate) -> CnResult<usize> {
        let position = self
            .loaded_years
            .iter()
            .position(|&y| y == date.year())
            .ok_or_else(|| {
                CnError::invalid_input(format!(
                    "年份 {} 不在缓冲中 (驻留: {:?})",
                    date.year(),
                    self.loaded_years
                ))
            })?;

        let mut index = position * self.num_t + date.ordinal() as usize - 1;
        if is_leap(date.year()) {
            let leap_day = NaiveDate::from_ymd_opt(date.year(), 2, 29)
                .expect("leap year has Feb 29");
            if date > leap_day {
                index -= 1;
            }
        }
        Ok(index)
    }

    /// 提取一个数据窗口 [begin, end)
    pub fn window(&self, begin: NaiveDate, end: NaiveDate) -> CnResult<ArrayView2<'_, f64>> {
        let i0 = self.get_index(begin)?;
        let i1 = self.get_index(end)?;
        if i1 <= i0 {
            return Err(CnError::invalid_input(format!(
                "窗口为空或逆序: {begin} -> {end} (索引 {i0} -> {i1})"
            )));
        }
        Ok(self.data.slice(s![i0..i1, ..]))
    }

    /// 缓冲全量视图（测试用）
    #[must_use]
    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }
}

/// 正则网格的默认时间步数校验值
pub const EXPECTED_NUM_T: usize = DAYS_PER_YEAR;
