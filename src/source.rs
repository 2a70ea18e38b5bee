// source.rs — 等距柱状投影原图及其视场参数

use crate::error::DecodeError;
use image::io::Reader as ImageReader;
use image::RgbaImage;
use log::{debug, info};
use std::f64::consts::{PI, TAU};
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;

/// 解码完成、只读的全景图。
///
/// 宽高比不是 2:1 时按比例缩小其中一个方向的视场，
/// 即图片只覆盖球面的一部分（水平条带或扇区）。
#[derive(Debug, Clone)]
pub struct EquirectangularImage {
    pixels: RgbaImage,
    field_of_view: [f64; 2],
    longitude_to_pixel: f64,
    latitude_to_pixel: f64,
    max_zoom: f64,
}

impl EquirectangularImage {
    pub fn new(pixels: RgbaImage, base_zoom: f64, quality: f64) -> Result<Self, DecodeError> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty { width, height });
        }
        let (w, h) = (width as f64, height as f64);

        let mut field_of_view = [TAU, PI];
        let ratio = w / h / 2.0;
        if ratio > 1.0 {
            field_of_view[1] /= ratio;
        } else if ratio < 1.0 {
            field_of_view[0] *= ratio;
        }

        let longitude_to_pixel = w / field_of_view[0];
        let latitude_to_pixel = (h - 1.0) / field_of_view[1];
        let max_zoom = ((w / field_of_view[0]).max(h / field_of_view[1]) * quality).max(base_zoom);

        debug!(
            "panorama {}x{}: fov {:.4}x{:.4} rad, max zoom {:.1}",
            width, height, field_of_view[0], field_of_view[1], max_zoom
        );

        Ok(Self {
            pixels,
            field_of_view,
            longitude_to_pixel,
            latitude_to_pixel,
            max_zoom,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn field_of_view(&self) -> [f64; 2] {
        self.field_of_view
    }

    pub fn longitude_to_pixel(&self) -> f64 {
        self.longitude_to_pixel
    }

    pub fn latitude_to_pixel(&self) -> f64 {
        self.latitude_to_pixel
    }

    pub fn max_zoom(&self) -> f64 {
        self.max_zoom
    }

    // 水平方向覆盖完整一周时，采样在左右边缘循环
    pub fn is_full_circle(&self) -> bool {
        self.field_of_view[0] >= TAU
    }

    /// 原图中对应 (lon, lat) 的像素坐标；落在覆盖范围之外时为 `None`。
    pub fn pixel_at(&self, lon: f64, lat: f64) -> Option<(u32, u32)> {
        let (w, h) = self.pixels.dimensions();
        let col = (self.longitude_to_pixel * (lon + self.field_of_view[0] / 2.0)).round();
        let row = (self.latitude_to_pixel * (lat + self.field_of_view[1] / 2.0)).round();
        if !col.is_finite() || !row.is_finite() || row < 0.0 || row > (h - 1) as f64 {
            return None;
        }
        let col = if self.is_full_circle() {
            col.rem_euclid(w as f64)
        } else if col < 0.0 || col >= w as f64 {
            return None;
        } else {
            col
        };
        Some((col as u32, row as u32))
    }

    pub fn sample(&self, lon: f64, lat: f64) -> Option<[u8; 3]> {
        let (x, y) = self.pixel_at(lon, lat)?;
        let p = self.pixels.get_pixel(x, y).0;
        Some([p[0], p[1], p[2]])
    }
}

/// 图片解码服务，在后台线程中调用。
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, source: &Path) -> Result<RgbaImage, DecodeError>;
}

/// 用 `image` 解码本地文件，自动识别格式，不限制尺寸。
#[derive(Debug, Default, Clone, Copy)]
pub struct FileDecoder;

impl ImageDecoder for FileDecoder {
    fn decode(&self, source: &Path) -> Result<RgbaImage, DecodeError> {
        info!("loading panorama {:?}", source);

        let file = File::open(source).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => {
                DecodeError::Restricted(format!("{}: {}", source.display(), e))
            }
            _ => DecodeError::Io(e),
        })?;
        let reader = BufReader::new(file);

        let mut reader = ImageReader::new(reader).with_guessed_format()?;
        reader.no_limits();
        let img = reader.decode()?;

        let rgba = img.to_rgba8();
        info!("panorama decoded: {}x{}", rgba.width(), rgba.height());
        Ok(rgba)
    }
}
