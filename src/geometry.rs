// geometry.rs — 球面坐标、切平面基与二维小工具

use glam::DVec3;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// 把角度归一化到 (-π, π]。
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// 绕原点旋转二维坐标。
pub fn rotate(point: [f64; 2], angle: f64) -> [f64; 2] {
    let (sin, cos) = angle.sin_cos();
    [
        point[0] * cos - point[1] * sin,
        point[0] * sin + point[1] * cos,
    ]
}

// 经度 0 指向 -X，经度增加转向 +Y；纬度沿 +Z 增加（对应原图向下的行方向）
pub fn sphere_point(lon: f64, lat: f64) -> DVec3 {
    let (sin_lon, cos_lon) = lon.sin_cos();
    let (sin_lat, cos_lat) = lat.sin_cos();
    DVec3::new(-cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
}

/// `sphere_point` 的逆运算，不要求向量已归一化。
pub fn spherical(v: DVec3) -> (f64, f64) {
    let lat = (v.z / v.x.hypot(v.y)).atan();
    let lon = normalize_angle(v.x.atan2(v.y) + FRAC_PI_2);
    (lon, lat)
}

/// 视线方向处的切平面基。
///
/// `x` 沿经度增加方向（屏幕向右），`x.z` 恒为 0；`y` 沿纬度增加方向（屏幕向下）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentBasis {
    pub x: DVec3,
    pub y: DVec3,
}

impl TangentBasis {
    pub fn new(lon: f64, lat: f64) -> Self {
        let (sin_lon, cos_lon) = lon.sin_cos();
        let (sin_lat, cos_lat) = lat.sin_cos();
        Self {
            x: DVec3::new(sin_lon, cos_lon, 0.0),
            y: DVec3::new(sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 点集的轴对齐包围盒；空输入返回 `None`。
pub fn bounding_box(points: &[[f64; 2]]) -> Option<Rect> {
    let (first, rest) = points.split_first()?;
    let (mut min, mut max) = (*first, *first);
    for p in rest {
        min[0] = min[0].min(p[0]);
        min[1] = min[1].min(p[1]);
        max[0] = max[0].max(p[0]);
        max[1] = max[1].max(p[1]);
    }
    Some(Rect {
        x: min[0],
        y: min[1],
        width: max[0] - min[0],
        height: max[1] - min[1],
    })
}
