// crates/cn_mesh/src/cache.rs

//! 网格缓存工件
//!
//! 网格构造是确定性的，可缓存为单个二进制文件：按细分次数作为键，
//! 保存有序顶点坐标数组。
//!
//! # 文件格式
//!
//! ```text
//! [魔数: 4 bytes] "CNGM"
//! [bincode 负载: MeshCacheData { version, iterations, lon_lat }]
//! ```
//!
//! 加载缓存跳过构造不变量检查（它们只在构造时适用）；
//! `load_or_build` 的 `verify` 选项会额外做一次全新构建并逐点比对。

use crate::mesh::Mesh;
use cn_foundation::{CnError, CnResult};
use cn_geo::point::GeoPoint;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 缓存文件魔数
const MESH_CACHE_MAGIC: &[u8; 4] = b"CNGM";

/// 缓存格式版本
const MESH_CACHE_VERSION: u32 = 1;

/// 默认缓存文件名
pub const DEFAULT_CACHE_FILENAME: &str = ".icosahedral-grid.cache.cnm";

/// 缓存负载
#[derive(Debug, Serialize, Deserialize)]
struct MeshCacheData {
    version: u32,
    iterations: u32,
    lon_lat: Vec<(f64, f64)>,
}

/// 保存网格到缓存文件
pub fn save(mesh: &Mesh, path: &Path) -> CnResult<()> {
    let data = MeshCacheData {
        version: MESH_CACHE_VERSION,
        iterations: mesh.iterations(),
        lon_lat: mesh.points().iter().map(|p| (p.lon, p.lat)).collect(),
    };
    let payload = bincode::serialize(&data)
        .map_err(|e| CnError::serialization(format!("网格缓存编码失败: {e}")))?;

    let mut bytes = Vec::with_capacity(4 + payload.len());
    bytes.extend_from_slice(MESH_CACHE_MAGIC);
    bytes.extend_from_slice(&payload);
    fs::write(path, bytes)
        .map_err(|e| CnError::io_with_source(format!("写入网格缓存 {}", path.display()), e))?;
    Ok(())
}

/// 从缓存文件加载网格
///
/// 校验魔数、版本与细分次数；坐标直接采信（跳过构造不变量检查）。
pub fn load(path: &Path, expected_iterations: u32) -> CnResult<Mesh> {
    if !path.is_file() {
        return Err(CnError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = fs::read(path)
        .map_err(|e| CnError::io_with_source(format!("读取网格缓存 {}", path.display()), e))?;

    if bytes.len() < 4 || &bytes[..4] != MESH_CACHE_MAGIC {
        return Err(CnError::serialization(format!(
            "{} 不是网格缓存文件 (魔数不匹配)",
            path.display()
        )));
    }
    let data: MeshCacheData = bincode::deserialize(&bytes[4..])
        .map_err(|e| CnError::serialization(format!("网格缓存解码失败: {e}")))?;

    if data.version != MESH_CACHE_VERSION {
        return Err(CnError::serialization(format!(
            "网格缓存版本不兼容: 文件 {}, 当前 {MESH_CACHE_VERSION}",
            data.version
        )));
    }
    if data.iterations != expected_iterations {
        return Err(CnError::config(format!(
            "网格缓存细分次数不匹配: 文件 {}, 期望 {expected_iterations}",
            data.iterations
        )));
    }

    let points = data
        .lon_lat
        .into_iter()
        .map(|(lon, lat)| GeoPoint { lon, lat })
        .collect();
    Ok(Mesh::from_cached_points(expected_iterations, points))
}

/// 加载缓存，缺失则构建并写回
///
/// `verify` 为真时，即使缓存命中也会做一次全新构建并逐点比对，
/// 偏差超过 1e-9 度视为缓存损坏。
pub fn load_or_build(path: &Path, iterations: u32, verify: bool) -> CnResult<Mesh> {
    if path.exists() {
        let mesh = load(path, iterations)?;
        if verify {
            let fresh = Mesh::build(iterations)?;
            verify_against(&mesh, &fresh)?;
        }
        return Ok(mesh);
    }

    let mesh = Mesh::build(iterations)?;
    save(&mesh, path)?;
    Ok(mesh)
}

/// 逐点比对缓存网格与新构建的网格
fn verify_against(cached: &Mesh, fresh: &Mesh) -> CnResult<()> {
    if cached.len() != fresh.len() {
        return Err(CnError::mesh_invariant(format!(
            "缓存校验失败: 顶点数 {} != {}",
            cached.len(),
            fresh.len()
        )));
    }
    for (i, (a, b)) in cached.points().iter().zip(fresh.points()).enumerate() {
        if (a.lon - b.lon).abs() > 1e-9 || (a.lat - b.lat).abs() > 1e-9 {
            return Err(CnError::mesh_invariant(format!(
                "缓存校验失败: 顶点 {i} 坐标偏差 ({}, {}) vs ({}, {})",
                a.lon, a.lat, b.lon, b.lat
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CACHE_FILENAME);

        let mesh = Mesh::build(1).unwrap();
        save(&mesh, &path).unwrap();

        let loaded = load(&path, 1).unwrap();
        assert_eq!(loaded.len(), mesh.len());
        assert_eq!(loaded.points(), mesh.points());
    }

    #[test]
    fn test_cache_iteration_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.cnm");

        let mesh = Mesh::build(1).unwrap();
        save(&mesh, &path).unwrap();

        assert!(load(&path, 2).is_err());
    }

    #[test]
    fn test_cache_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.cnm");
        std::fs::write(&path, b"NOPE....").unwrap();
        assert!(load(&path, 1).is_err());
    }

    #[test]
    fn test_load_or_build_creates_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.cnm");

        let first = load_or_build(&path, 1, false).unwrap();
        assert!(path.exists());

        // 第二次命中缓存并通过校验
        let second = load_or_build(&path, 1, true).unwrap();
        assert_eq!(first.points(), second.points());
    }
}
