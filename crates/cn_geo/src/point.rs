// crates/cn_geo/src/point.rs

//! 经纬度点与大圆距离
//!
//! 经度约定为 [0, 360) 度，纬度为 [-90, 90] 度。构造时负经度会被
//! 归一化（mod 360），越界纬度是致命错误。
//!
//! # 距离计算
//!
//! - [`GeoPoint::haversine`]: Haversine 公式，任意球半径
//! - [`GeoPoint::haversine_km`]: 地球半径 (6371 km) 上的大圆距离
//! - [`geodesic_midpoint`]: 球面中点公式（非线性插值）

use cn_foundation::validation::ensure_in_range;
use cn_foundation::{CnError, CnResult};
use serde::{Deserialize, Serialize};

// ============================================================================
// 地球物理常量
// ============================================================================

/// 地球平均半径 [km]
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// 地球直径 [km]
pub const EARTH_DIAMETER_KM: f64 = 2.0 * EARTH_RADIUS_KM;

/// 半个地球周长 [km]，用于遥相关度的归一化
pub const HALF_EARTH_CIRCUMFERENCE_KM: f64 = EARTH_RADIUS_KM * std::f64::consts::PI;

/// 地球周长 [km]
pub const EARTH_CIRCUMFERENCE_KM: f64 = 2.0 * HALF_EARTH_CIRCUMFERENCE_KM;

// ============================================================================
// GeoPoint
// ============================================================================

/// 球面上的经纬度点
///
/// 放置到网格后不可变。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// 经度 [0, 360) 度
    pub lon: f64,
    /// 纬度 [-90, 90] 度
    pub lat: f64,
}

impl GeoPoint {
    /// 创建经纬度点
    ///
    /// 允许 [-180, 360) 范围的经度输入并归一化到 [0, 360)；
    /// 纬度越界返回错误。
    pub fn new(lon: f64, lat: f64) -> CnResult<Self> {
        if !(-180.0..360.0).contains(&lon) {
            return Err(CnError::OutOfRange {
                field: "lon",
                value: lon,
                min: -180.0,
                max: 360.0,
            });
        }
        ensure_in_range("lat", lat, -90.0, 90.0)?;
        Ok(Self {
            lon: lon.rem_euclid(360.0),
            lat,
        })
    }

    /// 经纬度转弧度
    #[inline]
    pub fn to_radians(&self) -> (f64, f64) {
        (self.lon.to_radians(), self.lat.to_radians())
    }

    /// 单位球面上的三维嵌入 (x, y, z)，‖·‖ = 1
    #[inline]
    pub fn unit_vector(&self) -> [f64; 3] {
        let (lon, lat) = self.to_radians();
        [
            lat.cos() * lon.cos(),
            lat.cos() * lon.sin(),
            lat.sin(),
        ]
    }

    /// Haversine 大圆距离，球半径由调用方给定
    pub fn haversine(&self, other: &Self, radius: f64) -> f64 {
        let (lon1, lat1) = self.to_radians();
        let (lon2, lat2) = other.to_radians();

        let dlat = lat2 - lat1;
        let dlon = lon2 - lon1;
        let a = (dlat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        radius * c
    }

    /// 地球表面上的大圆距离 [km]
    #[inline]
    pub fn haversine_km(&self, other: &Self) -> f64 {
        self.haversine(other, EARTH_RADIUS_KM)
    }

    /// 单位球上的大圆距离（弧长）
    #[inline]
    pub fn haversine_unit(&self, other: &Self) -> f64 {
        self.haversine(other, 1.0)
    }
}

/// 两点之间的球面中点
///
/// 使用球面中点公式而不是坐标线性插值，保证中点落在大圆弧上。
pub fn geodesic_midpoint(p1: &GeoPoint, p2: &GeoPoint) -> GeoPoint {
    let (lon1, lat1) = p1.to_radians();
    let (lon2, lat2) = p2.to_radians();

    let dlon = lon2 - lon1;
    let bx = lat2.cos() * dlon.cos();
    let by = lat2.cos() * dlon.sin();

    let lat3 = (lat1.sin() + lat2.sin())
        .atan2(((lat1.cos() + bx).powi(2) + by * by).sqrt());
    let lon3 = lon1 + by.atan2(lat1.cos() + bx);

    GeoPoint {
        lon: lon3.to_degrees().rem_euclid(360.0),
        lat: lat3.to_degrees(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lon_normalization() {
        let p = GeoPoint::new(-36.0, 10.0).unwrap();
        assert!((p.lon - 324.0).abs() < 1e-12);
        assert!(GeoPoint::new(360.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, 91.0).is_err());
    }

    #[test]
    fn test_unit_vector_norm() {
        let p = GeoPoint::new(123.0, -45.0).unwrap();
        let v = p.unit_vector();
        let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_haversine_quarter_circle() {
        // 赤道上相距 90 度经度的两点，距离为四分之一周长
        let p1 = GeoPoint::new(0.0, 0.0).unwrap();
        let p2 = GeoPoint::new(90.0, 0.0).unwrap();
        let expected = EARTH_CIRCUMFERENCE_KM / 4.0;
        assert!((p1.haversine_km(&p2) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_haversine_poles() {
        let north = GeoPoint::new(0.0, 90.0).unwrap();
        let south = GeoPoint::new(0.0, -90.0).unwrap();
        assert!((north.haversine_unit(&south) - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_geodesic_midpoint_equator() {
        let p1 = GeoPoint::new(0.0, 0.0).unwrap();
        let p2 = GeoPoint::new(90.0, 0.0).unwrap();
        let mid = geodesic_midpoint(&p1, &p2);
        assert!((mid.lon - 45.0).abs() < 1e-9);
        assert!(mid.lat.abs() < 1e-9);
    }

    #[test]
    fn test_geodesic_midpoint_on_sphere() {
        // 中点必须落在大圆弧上：到两端点的距离相等
        let p1 = GeoPoint::new(10.0, 40.0).unwrap();
        let p2 = GeoPoint::new(80.0, -20.0).unwrap();
        let mid = geodesic_midpoint(&p1, &p2);
        let d1 = mid.haversine_unit(&p1);
        let d2 = mid.haversine_unit(&p2);
        assert!((d1 - d2).abs() < 1e-9);
    }
}
