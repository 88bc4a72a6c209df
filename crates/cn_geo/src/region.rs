// crates/cn_geo/src/region.rs

//! 地理区域与顶点掩码
//!
//! 区域用于两件事：
//!
//! 1. 指标引擎的区域限定标量（如 Niño 3.4 区域内的平均度数）
//! 2. 网格变体中的区域移除（去掉某区域后重建点云）
//!
//! 矩形掩码使用严格不等式（边界上的点不计入），与坐标排序后的
//! 上下界比较；圆形区域按单位球上的弦距离判定。

use crate::point::GeoPoint;
use cn_foundation::{CnError, CnResult};
use serde::{Deserialize, Serialize};

/// 地理区域
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Region {
    /// 覆盖整个网格
    Everywhere,
    /// 不覆盖任何顶点
    Nowhere,
    /// 经纬度矩形（两个对角点，自动排序）
    Rectangle {
        /// 角点一
        point1: GeoPoint,
        /// 角点二
        point2: GeoPoint,
    },
    /// 球面圆（中心 + 单位球弦距离半径）
    Circle {
        /// 圆心
        center: GeoPoint,
        /// 弦距离半径（单位球）
        radius: f64,
    },
}

impl Region {
    /// 从上下界构造矩形区域
    ///
    /// 经度允许负值输入（归一化到 [0, 360)），与点的构造规则一致。
    pub fn rectangle_from_infsup(
        lat_inf: f64,
        lat_sup: f64,
        lon_inf: f64,
        lon_sup: f64,
    ) -> CnResult<Self> {
        Ok(Self::Rectangle {
            point1: GeoPoint::new(lon_inf, lat_inf)?,
            point2: GeoPoint::new(lon_sup, lat_sup)?,
        })
    }

    /// 构造球面圆区域
    pub fn circle(center: GeoPoint, radius: f64) -> CnResult<Self> {
        if radius <= 0.0 {
            return Err(CnError::OutOfRange {
                field: "radius",
                value: radius,
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
            });
        }
        Ok(Self::Circle { center, radius })
    }

    /// 计算区域在给定顶点序列上的布尔掩码
    ///
    /// `mask[i] == true` 表示顶点 i 落在区域内。
    #[must_use]
    pub fn mask(&self, points: &[GeoPoint]) -> Vec<bool> {
        match self {
            Self::Everywhere => vec![true; points.len()],
            Self::Nowhere => vec![false; points.len()],
            Self::Rectangle { point1, point2 } => {
                let (lat1, lat2) = sorted(point1.lat, point2.lat);
                let (lon1, lon2) = sorted(point1.lon, point2.lon);
                points
                    .iter()
                    .map(|p| p.lat > lat1 && p.lat < lat2 && p.lon > lon1 && p.lon < lon2)
                    .collect()
            }
            Self::Circle { center, radius } => {
                let c = center.unit_vector();
                let r2 = radius * radius;
                points
                    .iter()
                    .map(|p| {
                        let v = p.unit_vector();
                        let dx = v[0] - c[0];
                        let dy = v[1] - c[1];
                        let dz = v[2] - c[2];
                        dx * dx + dy * dy + dz * dz <= r2
                    })
                    .collect()
            }
        }
    }

    /// 区域内的顶点个数
    #[must_use]
    pub fn count(&self, points: &[GeoPoint]) -> usize {
        self.mask(points).iter().filter(|&&m| m).count()
    }
}

#[inline]
fn sorted(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_points() -> Vec<GeoPoint> {
        // 5x5 经纬度网格，经度 0..=240，纬度 -40..=40
        let mut points = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                points.push(
                    GeoPoint::new(f64::from(j) * 60.0, -40.0 + f64::from(i) * 20.0).unwrap(),
                );
            }
        }
        points
    }

    #[test]
    fn test_everywhere_nowhere() {
        let points = grid_points();
        assert_eq!(Region::Everywhere.count(&points), 25);
        assert_eq!(Region::Nowhere.count(&points), 0);
    }

    #[test]
    fn test_rectangle_mask_strict() {
        let points = grid_points();
        // 覆盖 lon ∈ (50, 130), lat ∈ (-30, 30) → lon ∈ {60, 120}, lat ∈ {-20, 0, 20}
        let region = Region::rectangle_from_infsup(-30.0, 30.0, 50.0, 130.0).unwrap();
        assert_eq!(region.count(&points), 6);

        // 边界上的点被严格排除：lon ∈ {60, 120} 均在边界上
        let tight = Region::rectangle_from_infsup(-20.0, 20.0, 60.0, 120.0).unwrap();
        assert_eq!(tight.count(&points), 0);
    }

    #[test]
    fn test_rectangle_negative_lon() {
        // 负经度归一化：lon_inf = -150 → 210
        let region = Region::rectangle_from_infsup(-5.0, 5.0, -150.0, -90.0).unwrap();
        let inside = GeoPoint::new(240.0, 0.0).unwrap();
        let outside = GeoPoint::new(100.0, 0.0).unwrap();
        let mask = region.mask(&[inside, outside]);
        assert_eq!(mask, vec![true, false]);
    }

    #[test]
    fn test_circle_mask() {
        let points = grid_points();
        let center = GeoPoint::new(120.0, 0.0).unwrap();
        // 很小的半径只应覆盖圆心本身
        let region = Region::circle(center, 1e-6).unwrap();
        assert_eq!(region.count(&points), 1);
    }

    #[test]
    fn test_circle_rejects_nonpositive_radius() {
        let center = GeoPoint::new(0.0, 0.0).unwrap();
        assert!(Region::circle(center, 0.0).is_err());
    }
}
