// crates/cn_data/src/loader.rs

//! 年度加载器边界
//!
//! 原始数据的文件解析、季节性去除等预处理属于外部协作方，
//! 本层只定义不透明的 [`YearLoader`] 边界：给定年份，返回形状为
//! `(num_t, 源网格点数)` 的矩阵。
//!
//! [`BinaryYearLoader`] 是该边界的最小文件适配器，读取预处理流水线
//! 落盘的二进制年度文件。
//!
//! # 年度文件格式
//!
//! ```text
//! [魔数: 4 bytes] "CNYD"
//! [bincode 负载: YearFileData { version, year, num_t, lon, lat, values }]
//! ```
//!
//! `values` 按 (时间, 纬度, 经度) 展平，长度 `num_t · n_lat · n_lon`。

use crate::calendar::DAYS_PER_YEAR;
use cn_foundation::{CnError, CnResult};
use cn_geo::point::GeoPoint;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 年度文件魔数
const YEAR_FILE_MAGIC: &[u8; 4] = b"CNYD";

/// 年度文件格式版本
const YEAR_FILE_VERSION: u32 = 1;

/// 年度加载器：外部预处理协作方的不透明边界
pub trait YearLoader: Send {
    /// 加载一年的数据，形状 `(num_t, 源网格点数)`
    ///
    /// 返回的数据已经去除 2 月 29 日（闰年为 366 天的源在预处理阶段
    /// 删除第 60 天）。失败是该运行的致命错误，携带出错年份。
    fn load_year(&self, year: i32) -> CnResult<Array2<f64>>;

    /// 源网格的经纬度点（按 (纬度, 经度) 展平顺序）
    fn source_points(&self) -> &[GeoPoint];

    /// 每年时间步数
    fn num_t(&self) -> usize;
}

// ============================================================
// 二进制年度文件
// ============================================================

/// 年度文件负载
#[derive(Debug, Serialize, Deserialize)]
struct YearFileData {
    version: u32,
    year: i32,
    num_t: u32,
    lon: Vec<f64>,
    lat: Vec<f64>,
    values: Vec<f64>,
}

/// 二进制年度文件加载器
///
/// 文件命名为 `<base>.<year>.cnd`，位于同一数据目录下。打开时读取
/// 参考年份的文件以确定网格轴；之后每次加载都校验维度一致。
pub struct BinaryYearLoader {
    directory: PathBuf,
    base_name: String,
    num_t: usize,
    n_lat: usize,
    n_lon: usize,
    points: Vec<GeoPoint>,
}

impl BinaryYearLoader {
    /// 打开数据目录，以 `reference_year` 的文件确定网格形状
    pub fn open(
        directory: impl Into<PathBuf>,
        base_name: impl Into<String>,
        reference_year: i32,
    ) -> CnResult<Self> {
        let directory = directory.into();
        let base_name = base_name.into();

        let reference =
            read_year_file(&year_file_path(&directory, &base_name, reference_year))?;
        let n_lat = reference.lat.len();
        let n_lon = reference.lon.len();

        // 源网格点：纬度为主序，经度变化最快（与数据展平顺序一致）
        let mut points = Vec::with_capacity(n_lat * n_lon);
        for &lat in &reference.lat {
            for &lon in &reference.lon {
                points.push(GeoPoint::new(lon, lat)?);
            }
        }

        Ok(Self {
            directory,
            base_name,
            num_t: reference.num_t as usize,
            n_lat,
            n_lon,
            points,
        })
    }

    /// 数据目录
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// 源网格形状 (n_lat, n_lon)
    #[must_use]
    pub fn grid_shape(&self) -> (usize, usize) {
        (self.n_lat, self.n_lon)
    }
}

impl YearLoader for BinaryYearLoader {
    fn load_year(&self, year: i32) -> CnResult<Array2<f64>> {
        let path = year_file_path(&self.directory, &self.base_name, year);
        let data = read_year_file(&path)
            .map_err(|e| CnError::DataLoad {
                year,
                message: e.to_string(),
            })?;

        if data.year != year {
            return Err(CnError::DataLoad {
                year,
                message: format!("文件头年份 {} 与请求不符", data.year),
            });
        }
        if data.num_t as usize != self.num_t
            || data.lat.len() != self.n_lat
            || data.lon.len() != self.n_lon
        {
            return Err(CnError::DataLoad {
                year,
                message: format!(
                    "维度与参考年不符: (num_t={}, lat={}, lon={}), 期望 ({}, {}, {})",
                    data.num_t,
                    data.lat.len(),
                    data.lon.len(),
                    self.num_t,
                    self.n_lat,
                    self.n_lon
                ),
            });
        }

        let spatial = self.n_lat * self.n_lon;
        Array2::from_shape_vec((self.num_t, spatial), data.values).map_err(|_| {
            CnError::DataLoad {
                year,
                message: "数据长度与声明的维度不一致".to_string(),
            }
        })
    }

    fn source_points(&self) -> &[GeoPoint] {
        &self.points
    }

    fn num_t(&self) -> usize {
        self.num_t
    }
}

/// 年度文件路径：`<dir>/<base>.<year>.cnd`
fn year_file_path(directory: &Path, base_name: &str, year: i32) -> PathBuf {
    directory.join(format!("{base_name}.{year}.cnd"))
}

/// 读取并校验一个年度文件
fn read_year_file(path: &Path) -> CnResult<YearFileData> {
    if !path.is_file() {
        return Err(CnError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = fs::read(path)
        .map_err(|e| CnError::io_with_source(format!("读取年度文件 {}", path.display()), e))?;
    if bytes.len() < 4 || &bytes[..4] != YEAR_FILE_MAGIC {
        return Err(CnError::serialization(format!(
            "{} 不是年度数据文件 (魔数不匹配)",
            path.display()
        )));
    }
    let data: YearFileData = bincode::deserialize(&bytes[4..])
        .map_err(|e| CnError::serialization(format!("年度文件解码失败: {e}")))?;
    if data.version != YEAR_FILE_VERSION {
        return Err(CnError::serialization(format!(
            "年度文件版本不兼容: 文件 {}, 当前 {YEAR_FILE_VERSION}",
            data.version
        )));
    }
    let expected = data.num_t as usize * data.lat.len() * data.lon.len();
    if data.values.len() != expected {
        return Err(CnError::serialization(format!(
            "年度文件数据长度 {} 与维度乘积 {expected} 不符",
            data.values.len()
        )));
    }
    Ok(data)
}

/// 写出一个年度文件（预处理流水线与测试使用）
///
/// `values` 形状为 `(num_t, n_lat · n_lon)`，默认 `num_t = 365`。
pub fn write_year_file(
    path: &Path,
    year: i32,
    lon: &[f64],
    lat: &[f64],
    values: &Array2<f64>,
) -> CnResult<()> {
    let num_t = values.nrows();
    if num_t != DAYS_PER_YEAR {
        return Err(CnError::invalid_input(format!(
            "年度文件时间步数 {num_t} != {DAYS_PER_YEAR}"
        )));
    }
    if values.ncols() != lat.len() * lon.len() {
        return Err(CnError::invalid_input(format!(
            "年度文件空间维 {} 与 lat·lon = {} 不符",
            values.ncols(),
            lat.len() * lon.len()
        )));
    }

    let data = YearFileData {
        version: YEAR_FILE_VERSION,
        year,
        num_t: num_t as u32,
        lon: lon.to_vec(),
        lat: lat.to_vec(),
        values: values.iter().copied().collect(),
    };
    let payload = bincode::serialize(&data)
        .map_err(|e| CnError::serialization(format!("年度文件编码失败: {e}")))?;
    let mut bytes = Vec::with_capacity(4 + payload.len());
    bytes.extend_from_slice(YEAR_FILE_MAGIC);
    bytes.extend_from_slice(&payload);
    fs::write(path, bytes)
        .map_err(|e| CnError::io_with_source(format!("写入年度文件 {}", path.display()), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn write_test_year(dir: &Path, year: i32) {
        let lon = vec![0.0, 90.0, 180.0, 270.0];
        let lat = vec![-30.0, 0.0, 30.0];
        let values = Array2::from_shape_fn((DAYS_PER_YEAR, 12), |(t, i)| {
            f64::from(year) + t as f64 * 0.01 + i as f64
        });
        write_year_file(&year_file_path(dir, "air", year), year, &lon, &lat, &values)
            .unwrap();
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        write_test_year(dir.path(), 1950);
        write_test_year(dir.path(), 1951);

        let loader = BinaryYearLoader::open(dir.path(), "air", 1950).unwrap();
        assert_eq!(loader.num_t(), DAYS_PER_YEAR);
        assert_eq!(loader.grid_shape(), (3, 4));
        assert_eq!(loader.source_points().len(), 12);
        // 纬度为主序，经度变化最快
        assert!((loader.source_points()[0].lat - -30.0).abs() < 1e-12);
        assert!((loader.source_points()[1].lon - 90.0).abs() < 1e-12);

        let data = loader.load_year(1951).unwrap();
        assert_eq!(data.shape(), &[DAYS_PER_YEAR, 12]);
        assert!((data[[0, 0]] - 1951.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_year_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_test_year(dir.path(), 1950);

        let loader = BinaryYearLoader::open(dir.path(), "air", 1950).unwrap();
        let err = loader.load_year(1999).unwrap_err();
        assert!(matches!(err, CnError::DataLoad { year: 1999, .. }));
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("air.1950.cnd");
        fs::write(&path, b"XXXXdata").unwrap();
        assert!(read_year_file(&path).is_err());
    }
}
