// crates/cn_network/src/correlation.rs

//! 相关矩阵与阈值化
//!
//! Pearson 相关：逐列去均值，叉积矩阵除以各列标准差（总体，非样本）
//! 的外积。阈值化保留严格下三角中最强的 `keep_fraction` 比例的值，
//! 生成无权 0/1 邻接矩阵（无自环，对称）。

use cn_foundation::{CnError, CnResult};
use ndarray::{Array2, ArrayView2, Axis};

/// 计算数据窗口各列之间的 Pearson 相关矩阵
///
/// 输入形状 `(时间, 顶点)`，至少 2 个时间步。输出为对称方阵；
/// 常数列产生 NaN（0/0），由上游的绝对值清洗处理。
pub fn corr_coeff(window: ArrayView2<f64>) -> CnResult<Array2<f64>> {
    if window.nrows() < 2 {
        return Err(CnError::invalid_input(format!(
            "相关计算至少需要 2 个时间步, 实际 {}",
            window.nrows()
        )));
    }

    // 逐列去均值
    let means = window
        .mean_axis(Axis(0))
        .ok_or_else(|| CnError::internal("空窗口的均值计算失败"))?;
    let centered = &window - &means;

    // 叉积矩阵与各列平方和
    let numerator = centered.t().dot(&centered);
    let sum_squares: Vec<f64> = centered
        .axis_iter(Axis(1))
        .map(|col| col.dot(&col))
        .collect();

    let n = sum_squares.len();
    let mut corr = numerator;
    for i in 0..n {
        for j in 0..n {
            corr[[i, j]] /= (sum_squares[i] * sum_squares[j]).sqrt();
        }
    }
    Ok(corr)
}

/// 相关矩阵的绝对值清洗：|r|，NaN 置 0
///
/// 强负相关与强正相关同样构成链接；该约定在阈值化之前统一应用。
pub fn absolute_correlation(window: ArrayView2<f64>) -> CnResult<Array2<f64>> {
    let corr = corr_coeff(window)?;
    Ok(corr.mapv(|x| if x.is_nan() { 0.0 } else { x.abs() }))
}

/// keep-fraction 阈值化
///
/// NaN 置 0、对角线清零后，把严格下三角的值升序排序，以第
/// `⌊(1−keep_fraction)·N⌋` 个值为阈值；严格大于阈值的位置置 1
/// （对称）。`keep_fraction` 通常很小（≈0.005）。
pub fn threshold_matrix(corr: &Array2<f64>, keep_fraction: f64) -> CnResult<Array2<u8>> {
    let n = corr.nrows();
    if corr.ncols() != n {
        return Err(CnError::ShapeMismatch {
            name: "correlation matrix",
            expected: vec![n, n],
            actual: corr.shape().to_vec(),
        });
    }
    if !(keep_fraction > 0.0 && keep_fraction <= 1.0) {
        return Err(CnError::OutOfRange {
            field: "keep_fraction",
            value: keep_fraction,
            min: f64::MIN_POSITIVE,
            max: 1.0,
        });
    }
    if n < 2 {
        return Err(CnError::invalid_input("阈值化需要至少 2 个顶点"));
    }

    // 清洗副本：NaN → 0，对角线 → 0
    let mut cleaned = corr.mapv(|x| if x.is_nan() { 0.0 } else { x });
    for i in 0..n {
        cleaned[[i, i]] = 0.0;
    }

    // 严格下三角升序排序，取阈值
    let mut flat: Vec<f64> = Vec::with_capacity(n * (n - 1) / 2);
    for i in 1..n {
        for j in 0..i {
            flat.push(cleaned[[i, j]]);
        }
    }
    flat.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let threshold_index = ((1.0 - keep_fraction) * flat.len() as f64) as usize;
    let threshold = flat[threshold_index.min(flat.len() - 1)];
    tracing::debug!("thresholding at {threshold}");

    // 严格大于阈值的位置置 1（对称，无自环）
    let mut adjacency = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            if i != j && cleaned[[i, j]] > threshold {
                adjacency[[i, j]] = 1;
            }
        }
    }
    Ok(adjacency)
}
