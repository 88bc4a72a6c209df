// crates/cn_data/src/calendar.rs

//! 365 天历法
//!
//! 数据缓冲从不存储闰年的 2 月 29 日：每年固定 365 个时间步。
//! 这是历法的固定简化，不可配置。本模块提供与之配套的日期运算：
//! 跳过 2 月 29 日的加法、闰日计数以及时间窗口枚举。

use chrono::{Datelike, NaiveDate};

/// 每年时间步数（2 月 29 日被移除）
pub const DAYS_PER_YEAR: usize = 365;

/// 是否为闰年
#[must_use]
pub fn is_leap(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// 该年的 2 月 29 日（仅闰年存在）
fn feb29(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 2, 29)
}

/// 统计半开区间 (d1, d2] 内的 2 月 29 日个数
///
/// d1 > d2 时返回负数，符号表示方向。d1 自身的闰日不计，
/// d2 自身的闰日计入。
#[must_use]
pub fn count_feb29s(d1: NaiveDate, d2: NaiveDate) -> i64 {
    assert!(d1 != d2, "count_feb29s 需要两个不同的日期");

    if d1 > d2 {
        // 反向：开区间 (d2, d1) 内的个数，加上较小端点自身
        let mut count = open_interval_feb29s(d2, d1);
        if d2.month() == 2 && d2.day() == 29 {
            count += 1;
        }
        return -count;
    }

    let mut count = open_interval_feb29s(d1, d2);
    if d2.month() == 2 && d2.day() == 29 {
        count += 1;
    }
    count
}

/// 统计严格开区间 (lo, hi) 内的 2 月 29 日个数
fn open_interval_feb29s(lo: NaiveDate, hi: NaiveDate) -> i64 {
    let mut count = 0;
    for year in lo.year()..=hi.year() {
        if !is_leap(year) {
            continue;
        }
        let Some(leap_day) = feb29(year) else {
            continue;
        };
        if leap_day > lo && leap_day < hi {
            count += 1;
        }
    }
    count
}

/// 日期加法，跳过沿途的 2 月 29 日
///
/// `days` 以 365 天历法计数：若普通加法越过了闰日，继续顺延，
/// 直到不再跨过新的闰日为止。支持负的天数。
#[must_use]
pub fn add_days_skipping_feb29(date: NaiveDate, days: i64) -> NaiveDate {
    if days == 0 {
        return date;
    }
    let mut result = date + chrono::Duration::days(days);
    let mut extra = count_feb29s(date, result);
    while extra != 0 {
        let next = result + chrono::Duration::days(extra);
        extra = count_feb29s(result, next);
        result = next;
    }
    result
}

/// 枚举一次运行的全部时间窗口
///
/// 从 `begin` 开始，每个窗口为 `(start, start + time_between)`（365 天
/// 历法），窗口起点以 `time_step` 递进，直到窗口终点超过 `end`。
#[must_use]
pub fn window_pairs(
    begin: NaiveDate,
    end: NaiveDate,
    time_step: i64,
    time_between: i64,
) -> Vec<(NaiveDate, NaiveDate)> {
    let mut pairs = Vec::new();
    let mut start = begin;
    let mut stop = add_days_skipping_feb29(start, time_between);
    while stop <= end {
        pairs.push((start, stop));
        start = add_days_skipping_feb29(start, time_step);
        stop = add_days_skipping_feb29(start, time_between);
    }
    pairs
}

/// 日期与 1970-01-01 的天数差（用于持久化的整数日期）
#[must_use]
pub fn to_epoch_days(date: NaiveDate) -> i64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch");
    (date - epoch).num_days()
}

/// 从天数差还原日期
#[must_use]
pub fn from_epoch_days(days: i64) -> NaiveDate {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch");
    epoch + chrono::Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_is_leap() {
        assert!(is_leap(1952));
        assert!(is_leap(2000));
        assert!(!is_leap(1950));
        assert!(!is_leap(1900));
    }

    #[test]
    fn test_count_feb29s() {
        // 1952 是闰年
        assert_eq!(count_feb29s(d(1952, 1, 1), d(1952, 12, 31)), 1);
        assert_eq!(count_feb29s(d(1952, 3, 1), d(1952, 12, 31)), 0);
        assert_eq!(count_feb29s(d(1950, 1, 1), d(1951, 12, 31)), 0);
        // 反向为负
        assert_eq!(count_feb29s(d(1952, 12, 31), d(1952, 1, 1)), -1);
        // 端点约定：起点的闰日不计，终点的闰日计入
        assert_eq!(count_feb29s(d(1952, 2, 29), d(1952, 3, 5)), 0);
        assert_eq!(count_feb29s(d(1952, 2, 1), d(1952, 2, 29)), 1);
    }

    #[test]
    fn test_add_days_skipping_feb29() {
        // 非闰年：普通加法
        assert_eq!(add_days_skipping_feb29(d(1950, 1, 1), 365), d(1951, 1, 1));
        // 闰年：跨过 2 月 29 日需要多走一天
        assert_eq!(add_days_skipping_feb29(d(1952, 2, 28), 1), d(1952, 3, 1));
        assert_eq!(add_days_skipping_feb29(d(1952, 1, 1), 365), d(1953, 1, 1));
    }

    #[test]
    fn test_window_pairs() {
        let pairs = window_pairs(d(1950, 1, 1), d(1951, 12, 31), 15, 365);
        assert!(!pairs.is_empty());
        // 第一个窗口正好一年（365 天历法）
        assert_eq!(pairs[0], (d(1950, 1, 1), d(1951, 1, 1)));
        // 窗口起点按 time_step 递进
        assert_eq!(pairs[1].0, d(1950, 1, 16));
        // 所有终点都不超过 end
        for (_, stop) in &pairs {
            assert!(*stop <= d(1951, 12, 31));
        }
    }

    #[test]
    fn test_window_pairs_across_leap() {
        // 跨过 1952-02-29 的窗口终点被顺延一天
        let pairs = window_pairs(d(1951, 6, 1), d(1953, 6, 1), 365, 365);
        assert_eq!(pairs[0], (d(1951, 6, 1), d(1952, 6, 1)));
        assert_eq!(pairs[1], (d(1952, 6, 1), d(1953, 6, 1)));
    }

    #[test]
    fn test_epoch_days_roundtrip() {
        let date = d(1950, 7, 15);
        assert_eq!(from_epoch_days(to_epoch_days(date)), date);
        assert_eq!(to_epoch_days(d(1970, 1, 1)), 0);
    }
}
