// error.rs — 错误分类

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failed to read image source: {0}")]
    Io(#[from] std::io::Error),
    #[error("access to image pixels was refused: {0}")]
    Restricted(String),
    #[error("failed to decode image: {0}")]
    Format(#[from] image::ImageError),
    #[error("image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("decode worker exited without a result")]
    Disconnected,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderError {
    // 图片尚未解码完成，或解码失败后没有可用图像
    #[error("panorama is not ready")]
    NotReady,
}

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("an image decode is already in flight for this view")]
    DecodeInFlight,
    #[error("view has been torn down")]
    TornDown,
    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}
