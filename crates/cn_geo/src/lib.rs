// crates/cn_geo/src/lib.rs

//! ClimNet 地理层
//!
//! 提供球面几何的基础类型与算法：
//!
//! - [`point`]: 经纬度点 `GeoPoint`、大圆 (Haversine) 距离、球面中点
//! - [`pointcloud`]: 单位球面点云（范数不变量 1e-9）
//! - [`spatial_index`]: 基于 R-tree 的三维最近邻索引
//! - [`region`]: 地理区域（矩形/圆形）与顶点掩码
//!
//! # 示例
//!
//! ```
//! use cn_geo::point::GeoPoint;
//!
//! let p1 = GeoPoint::new(0.0, 0.0).unwrap();
//! let p2 = GeoPoint::new(90.0, 0.0).unwrap();
//! let quarter = cn_geo::point::EARTH_CIRCUMFERENCE_KM / 4.0;
//! assert!((p1.haversine_km(&p2) - quarter).abs() < 1.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod point;
pub mod pointcloud;
pub mod region;
pub mod spatial_index;

pub use point::{GeoPoint, EARTH_RADIUS_KM, HALF_EARTH_CIRCUMFERENCE_KM};
pub use pointcloud::{PointCloud, UNIT_NORM_TOLERANCE};
pub use region::Region;
pub use spatial_index::SpatialIndex;
