// crates/cn_store/src/store.rs

//! 结果存储的核心实现

use crate::crc32;
use chrono::NaiveDate;
use cn_foundation::{CnError, CnResult};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// 存储文件魔数
const STORE_MAGIC: &[u8; 4] = b"CNRS";

/// 存储格式版本
const STORE_VERSION: u32 = 1;

/// 日期转天数差（1970-01-01 起算）
fn to_epoch_days(date: NaiveDate) -> i64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch");
    (date - epoch).num_days()
}

/// 结果存储
///
/// 所有数组在 `prepare` 时按整个运行的长度预分配并填充 NaN，
/// 此后的写入与合并都是按位置覆盖 NaN 占位。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultStore {
    /// 自由格式的运行配置元数据
    header: BTreeMap<String, String>,
    /// 窗口日期对 (begin, end)，天数差表示
    dates: Vec<(i64, i64)>,
    /// 标量数组：名字 → (num_windows,)
    scalars: BTreeMap<String, Vec<f64>>,
    /// 场数组：名字 → (num_windows, num_vertices)
    fields: BTreeMap<String, Array2<f64>>,
    /// 场的顶点维长度
    field_len: usize,
}

impl ResultStore {
    /// 预分配一个完整运行的存储
    ///
    /// 标量数组形状 `(windows,)`，场数组形状 `(windows, field_len)`，
    /// 全部填充 NaN；窗口日期对原样记录。
    pub fn prepare(
        windows: &[(NaiveDate, NaiveDate)],
        field_len: usize,
        scalar_names: &[String],
        field_names: &[String],
        header: BTreeMap<String, String>,
    ) -> Self {
        let n = windows.len();
        let dates = windows
            .iter()
            .map(|&(b, e)| (to_epoch_days(b), to_epoch_days(e)))
            .collect();
        let scalars = scalar_names
            .iter()
            .map(|name| (name.clone(), vec![f64::NAN; n]))
            .collect();
        let fields = field_names
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    Array2::from_elem((n, field_len), f64::NAN),
                )
            })
            .collect();
        Self {
            header,
            dates,
            scalars,
            fields,
            field_len,
        }
    }

    /// 窗口数量
    #[must_use]
    pub fn num_windows(&self) -> usize {
        self.dates.len()
    }

    /// 场的顶点维长度
    #[must_use]
    pub fn field_len(&self) -> usize {
        self.field_len
    }

    /// 窗口日期对（天数差）
    #[must_use]
    pub fn dates(&self) -> &[(i64, i64)] {
        &self.dates
    }

    /// 运行元数据
    #[must_use]
    pub fn header(&self) -> &BTreeMap<String, String> {
        &self.header
    }

    /// 标量数组名
    pub fn scalar_names(&self) -> impl Iterator<Item = &String> {
        self.scalars.keys()
    }

    /// 场数组名
    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// 取标量数组
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<&[f64]> {
        self.scalars.get(name).map(Vec::as_slice)
    }

    /// 取场数组
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Array2<f64>> {
        self.fields.get(name)
    }

    /// 写入一个窗口的结果
    ///
    /// 存储中 `index` 处的日期对必须与 `(begin, end)` 完全一致，否则
    /// 致命；存储声明的每个标量/场键都必须出现在提供的值中。
    pub fn write(
        &mut self,
        index: usize,
        begin: NaiveDate,
        end: NaiveDate,
        scalars: &BTreeMap<String, f64>,
        fields: &BTreeMap<String, Array1<f64>>,
    ) -> CnResult<()> {
        let Some(&stored) = self.dates.get(index) else {
            return Err(CnError::invalid_input(format!(
                "窗口索引 {index} 超出范围 0..{}",
                self.dates.len()
            )));
        };
        let given = (to_epoch_days(begin), to_epoch_days(end));
        if stored != given {
            return Err(CnError::DateMismatch {
                index,
                stored: format!("{stored:?}"),
                given: format!("({begin}, {end})"),
            });
        }

        for (name, array) in self.scalars.iter_mut() {
            let value = scalars.get(name).ok_or_else(|| {
                CnError::internal(format!("窗口 {index} 的结果缺少标量 {name}"))
            })?;
            array[index] = *value;
        }
        for (name, array) in self.fields.iter_mut() {
            let values = fields.get(name).ok_or_else(|| {
                CnError::internal(format!("窗口 {index} 的结果缺少场 {name}"))
            })?;
            if values.len() != self.field_len {
                return Err(CnError::SizeMismatch {
                    name: "field values",
                    expected: self.field_len,
                    actual: values.len(),
                });
            }
            array.row_mut(index).assign(values);
        }
        Ok(())
    }

    /// 从另一个分片合并
    ///
    /// 来源的非 NaN 值获胜；目的位置已有非 NaN 值即为致命的合并冲突。
    pub fn merge_from(&mut self, other: &ResultStore) -> CnResult<()> {
        if self.dates != other.dates {
            return Err(CnError::invalid_input(
                "分片的窗口日期对不一致，拒绝合并",
            ));
        }

        for (name, src) in &other.scalars {
            let dst = self.scalars.get_mut(name).ok_or_else(|| {
                CnError::invalid_input(format!("目的存储缺少标量 {name}"))
            })?;
            for (i, &value) in src.iter().enumerate() {
                if value.is_nan() {
                    continue;
                }
                if !dst[i].is_nan() {
                    return Err(CnError::MergeConflict {
                        name: name.clone(),
                        index: i,
                    });
                }
                dst[i] = value;
            }
        }

        for (name, src) in &other.fields {
            let dst = self.fields.get_mut(name).ok_or_else(|| {
                CnError::invalid_input(format!("目的存储缺少场 {name}"))
            })?;
            if dst.shape() != src.shape() {
                return Err(CnError::ShapeMismatch {
                    name: "merged field",
                    expected: dst.shape().to_vec(),
                    actual: src.shape().to_vec(),
                });
            }
            for ((i, j), &value) in src.indexed_iter() {
                if value.is_nan() {
                    continue;
                }
                if !dst[[i, j]].is_nan() {
                    return Err(CnError::MergeConflict {
                        name: name.clone(),
                        index: i * src.ncols() + j,
                    });
                }
                dst[[i, j]] = value;
            }
        }
        Ok(())
    }

    // ========================================================================
    // 持久化
    // ========================================================================

    /// 保存到文件
    pub fn save(&self, path: &Path) -> CnResult<()> {
        let payload = bincode::serialize(self)
            .map_err(|e| CnError::serialization(format!("结果存储编码失败: {e}")))?;
        let crc = crc32::compute(&payload);

        let mut bytes = Vec::with_capacity(12 + payload.len());
        bytes.extend_from_slice(STORE_MAGIC);
        bytes.extend_from_slice(&STORE_VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);
        bytes.extend_from_slice(&crc.to_le_bytes());
        fs::write(path, bytes).map_err(|e| {
            CnError::io_with_source(format!("写入结果存储 {}", path.display()), e)
        })?;
        Ok(())
    }

    /// 从文件加载
    pub fn load(path: &Path) -> CnResult<Self> {
        if !path.is_file() {
            return Err(CnError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = fs::read(path).map_err(|e| {
            CnError::io_with_source(format!("读取结果存储 {}", path.display()), e)
        })?;
        if bytes.len() < 12 || &bytes[..4] != STORE_MAGIC {
            return Err(CnError::serialization(format!(
                "{} 不是结果存储文件 (魔数不匹配)",
                path.display()
            )));
        }
        let version = u32::from_le_bytes(bytes[4..8].try_into().expect("4 bytes"));
        if version != STORE_VERSION {
            return Err(CnError::serialization(format!(
                "结果存储版本不兼容: 文件 {version}, 当前 {STORE_VERSION}"
            )));
        }
        let payload = &bytes[8..bytes.len() - 4];
        let stored_crc = u32::from_le_bytes(
            bytes[bytes.len() - 4..].try_into().expect("4 bytes"),
        );
        let computed = crc32::compute(payload);
        if stored_crc != computed {
            return Err(CnError::serialization(format!(
                "结果存储校验和错误: 期望 {stored_crc:08x}, 实际 {computed:08x}"
            )));
        }
        bincode::deserialize(payload)
            .map_err(|e| CnError::serialization(format!("结果存储解码失败: {e}")))
    }

    /// 合并一组分片文件到一个新存储
    ///
    /// 以最后一个文件为参照获取日期对与数组名，逐个合并；
    /// `delete_after` 为真时在成功合并后删除来源分片。
    pub fn merge_files(
        paths: &[std::path::PathBuf],
        out_path: &Path,
        delete_after: bool,
    ) -> CnResult<Self> {
        let Some(reference_path) = paths.last() else {
            return Err(CnError::invalid_input("没有可合并的分片"));
        };
        tracing::info!(
            "using reference shard {} for dates and dataset names",
            reference_path.display()
        );
        let reference = Self::load(reference_path)?;

        let scalar_names: Vec<String> = reference.scalar_names().cloned().collect();
        let field_names: Vec<String> = reference.field_names().cloned().collect();
        let mut merged = Self {
            header: reference.header.clone(),
            dates: reference.dates.clone(),
            scalars: scalar_names
                .iter()
                .map(|n| (n.clone(), vec![f64::NAN; reference.num_windows()]))
                .collect(),
            fields: field_names
                .iter()
                .map(|n| {
                    (
                        n.clone(),
                        Array2::from_elem(
                            (reference.num_windows(), reference.field_len),
                            f64::NAN,
                        ),
                    )
                })
                .collect(),
            field_len: reference.field_len,
        };

        for path in paths {
            tracing::info!("merging {} into {}", path.display(), out_path.display());
            let shard = Self::load(path)?;
            merged.merge_from(&shard)?;
        }

        merged.save(out_path)?;

        if delete_after {
            for path in paths {
                tracing::info!("removing merged shard {}", path.display());
                fs::remove_file(path).map_err(|e| {
                    CnError::io_with_source(format!("删除分片 {}", path.display()), e)
                })?;
            }
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn windows() -> Vec<(NaiveDate, NaiveDate)> {
        vec![
            (d(1950, 1, 1), d(1951, 1, 1)),
            (d(1950, 1, 16), d(1951, 1, 16)),
            (d(1950, 1, 31), d(1951, 1, 31)),
        ]
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn sample_store() -> ResultStore {
        ResultStore::prepare(
            &windows(),
            4,
            &names(&["global-transitivity"]),
            &names(&["degree-field"]),
            BTreeMap::new(),
        )
    }

    fn result_for(value: f64) -> (BTreeMap<String, f64>, BTreeMap<String, Array1<f64>>) {
        let mut scalars = BTreeMap::new();
        scalars.insert("global-transitivity".to_string(), value);
        let mut fields = BTreeMap::new();
        fields.insert(
            "degree-field".to_string(),
            Array1::from_elem(4, value * 10.0),
        );
        (scalars, fields)
    }

    #[test]
    fn test_prepare_nan_filled() {
        let store = sample_store();
        assert_eq!(store.num_windows(), 3);
        assert!(store.scalar("global-transitivity").unwrap().iter().all(|v| v.is_nan()));
        assert!(store.field("degree-field").unwrap().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_write_and_date_validation() {
        let mut store = sample_store();
        let (scalars, fields) = result_for(0.5);

        store
            .write(1, d(1950, 1, 16), d(1951, 1, 16), &scalars, &fields)
            .unwrap();
        assert!((store.scalar("global-transitivity").unwrap()[1] - 0.5).abs() < 1e-12);
        assert!(store.scalar("global-transitivity").unwrap()[0].is_nan());

        // 错误的日期对是致命的
        let err = store
            .write(0, d(1950, 1, 16), d(1951, 1, 16), &scalars, &fields)
            .unwrap_err();
        assert!(matches!(err, CnError::DateMismatch { index: 0, .. }));
    }

    #[test]
    fn test_write_missing_key_fatal() {
        let mut store = sample_store();
        let err = store
            .write(0, d(1950, 1, 1), d(1951, 1, 1), &BTreeMap::new(), &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, CnError::Internal { .. }));
    }

    #[test]
    fn test_merge_disjoint() {
        // 两个不相交的分片合并后逐位置重现非 NaN 的并集
        let mut shard_a = sample_store();
        let mut shard_b = sample_store();
        let (s0, f0) = result_for(1.0);
        let (s2, f2) = result_for(3.0);
        shard_a.write(0, d(1950, 1, 1), d(1951, 1, 1), &s0, &f0).unwrap();
        shard_b.write(2, d(1950, 1, 31), d(1951, 1, 31), &s2, &f2).unwrap();

        let mut merged = sample_store();
        merged.merge_from(&shard_a).unwrap();
        merged.merge_from(&shard_b).unwrap();

        let scalar = merged.scalar("global-transitivity").unwrap();
        assert!((scalar[0] - 1.0).abs() < 1e-12);
        assert!(scalar[1].is_nan());
        assert!((scalar[2] - 3.0).abs() < 1e-12);
        let field = merged.field("degree-field").unwrap();
        assert!((field[[0, 0]] - 10.0).abs() < 1e-12);
        assert!((field[[2, 3]] - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_overlap_rejected() {
        let mut shard_a = sample_store();
        let mut shard_b = sample_store();
        let (s, f) = result_for(1.0);
        shard_a.write(0, d(1950, 1, 1), d(1951, 1, 1), &s, &f).unwrap();
        shard_b.write(0, d(1950, 1, 1), d(1951, 1, 1), &s, &f).unwrap();

        let mut merged = sample_store();
        merged.merge_from(&shard_a).unwrap();
        let err = merged.merge_from(&shard_b).unwrap_err();
        assert!(matches!(err, CnError::MergeConflict { .. }));
    }

    #[test]
    fn test_merge_requires_identical_dates() {
        let mut other_windows = windows();
        other_windows.pop();
        let shard = ResultStore::prepare(
            &other_windows,
            4,
            &names(&["global-transitivity"]),
            &names(&["degree-field"]),
            BTreeMap::new(),
        );
        let mut merged = sample_store();
        assert!(merged.merge_from(&shard).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.cns");

        let mut store = sample_store();
        let (s, f) = result_for(2.0);
        store.write(1, d(1950, 1, 16), d(1951, 1, 16), &s, &f).unwrap();
        store.save(&path).unwrap();

        let loaded = ResultStore::load(&path).unwrap();
        assert_eq!(loaded.num_windows(), 3);
        assert_eq!(loaded.dates(), store.dates());
        assert!((loaded.scalar("global-transitivity").unwrap()[1] - 2.0).abs() < 1e-12);
        assert!(loaded.scalar("global-transitivity").unwrap()[0].is_nan());
    }

    #[test]
    fn test_load_corrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.cns");

        let store = sample_store();
        store.save(&path).unwrap();

        // 翻转负载中的一个字节破坏校验和
        let mut bytes = std::fs::read(&path).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        let err = ResultStore::load(&path).unwrap_err();
        assert!(matches!(err, CnError::Serialization { .. }));
    }

    #[test]
    fn test_merge_files_with_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let path_a = dir.path().join("run.cns.worker-0");
        let path_b = dir.path().join("run.cns.worker-1");
        let out = dir.path().join("run.cns");

        let mut shard_a = sample_store();
        let mut shard_b = sample_store();
        let (s0, f0) = result_for(1.0);
        let (s1, f1) = result_for(2.0);
        shard_a.write(0, d(1950, 1, 1), d(1951, 1, 1), &s0, &f0).unwrap();
        shard_b.write(1, d(1950, 1, 16), d(1951, 1, 16), &s1, &f1).unwrap();
        shard_a.save(&path_a).unwrap();
        shard_b.save(&path_b).unwrap();

        let merged = ResultStore::merge_files(
            &[path_a.clone(), path_b.clone()],
            &out,
            true,
        )
        .unwrap();

        assert!((merged.scalar("global-transitivity").unwrap()[0] - 1.0).abs() < 1e-12);
        assert!((merged.scalar("global-transitivity").unwrap()[1] - 2.0).abs() < 1e-12);
        assert!(out.exists());
        // 合并成功后来源分片被删除
        assert!(!path_a.exists());
        assert!(!path_b.exists());
    }
}
