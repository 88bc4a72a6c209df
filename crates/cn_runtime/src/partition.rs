// crates/cn_runtime/src/partition.rs

//! 工作者划分
//!
//! N 个窗口在 W 个工作者之间的确定性连续划分：基础块大小
//! `N div W`，前 `N mod W` 个工作者各多一个，用累计偏移得到
//! 半开区间。无运行时再平衡。

use std::ops::Range;

/// 划分 `num_items` 个条目给 `num_workers` 个工作者
///
/// 返回每个工作者的半开索引区间；区间连续无缝隙，长度之和为
/// `num_items`。
#[must_use]
pub fn partition(num_items: usize, num_workers: usize) -> Vec<Range<usize>> {
    assert!(num_workers > 0, "至少需要一个工作者");

    let base = num_items / num_workers;
    let leftovers = num_items % num_workers;

    let mut ranges = Vec::with_capacity(num_workers);
    let mut offset = 0;
    for rank in 0..num_workers {
        let size = if rank < leftovers { base + 1 } else { base };
        ranges.push(offset..offset + size);
        offset += size;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_windows_three_workers() {
        // 10 个窗口 3 个工作者 → 块大小 [4, 3, 3]
        let ranges = partition(10, 3);
        let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);

        // 连续且无缝隙
        assert_eq!(ranges[0], 0..4);
        assert_eq!(ranges[1], 4..7);
        assert_eq!(ranges[2], 7..10);
    }

    #[test]
    fn test_even_split() {
        let ranges = partition(9, 3);
        assert!(ranges.iter().all(|r| r.len() == 3));
    }

    #[test]
    fn test_more_workers_than_items() {
        let ranges = partition(2, 5);
        let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![1, 1, 0, 0, 0]);
    }

    #[test]
    fn test_single_worker() {
        let ranges = partition(7, 1);
        assert_eq!(ranges, vec![0..7]);
    }

    #[test]
    fn test_covers_everything() {
        for n in 0..30 {
            for w in 1..8 {
                let ranges = partition(n, w);
                let total: usize = ranges.iter().map(|r| r.len()).sum();
                assert_eq!(total, n);
                let mut expected = 0;
                for r in &ranges {
                    assert_eq!(r.start, expected);
                    expected = r.end;
                }
            }
        }
    }
}
