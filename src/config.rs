// config.rs — 视图配置
//
// 配置文件为 JSON，所有字段都有默认值，例如：
//   { "base_zoom": 800, "quality": 2.5, "start": { "lon": 90, "lat": 0 } }
//
// 路径来源：
// - CLI: --config <path>
// - Env: PANORAMA_CONFIG
// - 都没有时使用默认值

use crate::error::ConfigError;
use crate::hotspot::GeoCoord;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_ENV: &str = "PANORAMA_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// 初始缩放，同时作为 max_zoom 的下限。
    pub base_zoom: f64,
    /// 可配置的最小缩放；实际下限还取决于画布尺寸。
    pub min_zoom: f64,
    /// max_zoom = 原图每弧度像素数 × quality
    pub quality: f64,
    /// 滚轮每一格的缩放倍率
    pub wheel_step: f64,
    pub mirror: bool,
    pub background: [u8; 3],
    pub start: GeoCoord,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            base_zoom: 1000.0,
            min_zoom: 50.0,
            quality: 3.0,
            wheel_step: 1.1,
            mirror: true,
            background: [0, 0, 0],
            start: GeoCoord { lon: 0.0, lat: 0.0 },
        }
    }
}

impl ViewConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }
}
