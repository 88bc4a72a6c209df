// crates/cn_foundation/src/validation.rs

//! 运行时验证工具
//!
//! 提供形状与取值范围检查的便捷函数。全部返回 `CnResult<()>`，
//! 失败即为致命错误（构造不变量类，见 error 模块的分类）。

use crate::error::{CnError, CnResult};

/// 检查一维长度
pub fn ensure_len(name: &'static str, expected: usize, actual: usize) -> CnResult<()> {
    if expected != actual {
        return Err(CnError::SizeMismatch {
            name,
            expected,
            actual,
        });
    }
    Ok(())
}

/// 检查任意维形状
pub fn ensure_shape(name: &'static str, expected: &[usize], actual: &[usize]) -> CnResult<()> {
    if expected != actual {
        return Err(CnError::ShapeMismatch {
            name,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

/// 检查 (时间, 空间) 窗口形状
///
/// 数据窗口的标准形状为 `(num_t, grid_size)`；任何不匹配都是配置或
/// 逻辑缺陷，立即终止。
pub fn ensure_window_shape(
    name: &'static str,
    num_t: usize,
    grid_size: usize,
    actual: &[usize],
) -> CnResult<()> {
    ensure_shape(name, &[num_t, grid_size], actual)
}

/// 检查标量取值范围（闭区间）
pub fn ensure_in_range(field: &'static str, value: f64, min: f64, max: f64) -> CnResult<()> {
    if !(min..=max).contains(&value) {
        return Err(CnError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_len() {
        assert!(ensure_len("x", 3, 3).is_ok());
        assert!(ensure_len("x", 3, 4).is_err());
    }

    #[test]
    fn test_ensure_shape() {
        assert!(ensure_shape("w", &[365, 100], &[365, 100]).is_ok());
        let err = ensure_shape("w", &[365, 100], &[366, 100]).unwrap_err();
        assert!(matches!(err, CnError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_ensure_window_shape() {
        assert!(ensure_window_shape("buf", 365, 42, &[365, 42]).is_ok());
        assert!(ensure_window_shape("buf", 365, 42, &[365, 43]).is_err());
    }

    #[test]
    fn test_ensure_in_range() {
        assert!(ensure_in_range("lat", 45.0, -90.0, 90.0).is_ok());
        assert!(ensure_in_range("lat", 91.0, -90.0, 90.0).is_err());
    }
}
