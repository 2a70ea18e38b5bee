// hotspot.rs — 把球面上的热点反投影到当前画面坐标

use crate::geometry::{sphere_point, TangentBasis};
use crate::viewport::ViewerState;
use serde::{Deserialize, Serialize};

/// 热点坐标（角度制，类似经纬度，但不是真实地理坐标）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lon: f64,
    pub lat: f64,
}

impl GeoCoord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn to_radians(self) -> (f64, f64) {
        (self.lon.to_radians(), self.lat.to_radians())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

// 系数保留三位小数后为 0 视为 0
fn negligible(v: f64) -> bool {
    (v * 1000.0).round() == 0.0
}

/// 计算热点在画面中的像素位置；位于观察者身后或方程退化时返回 `None`。
///
/// 求解 `diff = x * basis.x + y * basis.y`，按系数是否可忽略分三种情况：
/// 1. zPy 与 xPx 都不可忽略：由 z 分量求 y，再由 x 分量求 x
/// 2. zPy 不可忽略、xPx 可忽略：改用 y 分量求 x
/// 3. zPy 可忽略（正对天顶/天底）：x、y 两行用克莱姆法则
pub fn project(state: &ViewerState, size: (u32, u32), coord: GeoCoord) -> Option<ScreenPoint> {
    let view = state.orientation;
    let base = sphere_point(view.longitude, view.latitude) * state.zoom;
    let (lon, lat) = coord.to_radians();
    let link = sphere_point(lon, lat);

    let s = base.dot(base) / base.dot(link);
    if !s.is_finite() || s < 0.0 {
        return None;
    }
    let diff = link * s.abs() - base;
    let basis = TangentBasis::new(view.longitude, view.latitude);
    let (x_px, x_py) = (basis.x.x, basis.x.y);
    let (y_px, y_py, z_py) = (basis.y.x, basis.y.y, basis.y.z);

    let (x, y) = if !negligible(z_py) {
        let y = diff.z / z_py;
        if !negligible(x_px) {
            ((diff.x - y_px * y) / x_px, y)
        } else {
            ((diff.y - y_py * y) / x_py, y)
        }
    } else {
        let det = x_px * y_py - x_py * y_px;
        if negligible(det) {
            return None;
        }
        (
            (diff.x * y_py - diff.y * y_px) / det,
            (x_px * diff.y - x_py * diff.x) / det,
        )
    };

    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some(ScreenPoint {
        x: x + size.0 as f64 / 2.0,
        y: y + size.1 as f64 / 2.0,
    })
}

pub fn project_all(
    state: &ViewerState,
    size: (u32, u32),
    coords: &[GeoCoord],
) -> Vec<Option<ScreenPoint>> {
    coords.iter().map(|c| project(state, size, *c)).collect()
}
