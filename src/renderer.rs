// renderer.rs — 核心渲染器 (CPU Ray Casting)
//
// 对目标画面的每个像素反向求出视线，换算成球面经纬度后在原图中采样。

use crate::config::ViewConfig;
use crate::geometry::{normalize_angle, sphere_point, spherical, TangentBasis};
use crate::hotspot::{self, GeoCoord, ScreenPoint};
use crate::source::EquirectangularImage;
use crate::viewport::ViewerState;
use image::{Rgba, RgbaImage};
use log::{debug, info};

/// 显示表面：尺寸由渲染端主动查询，帧一次性整体提交。
pub trait DisplaySurface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn put_frame(&mut self, frame: &RgbaImage);

    // 不支持逐帧光线投射的表面退回平面裁剪渲染
    fn supports_raycast(&self) -> bool {
        true
    }

    fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }
}

/// 在内存中保留最后一帧的显示表面。
#[derive(Debug, Clone)]
pub struct MemorySurface {
    width: u32,
    height: u32,
    raycast: bool,
    last: Option<RgbaImage>,
    presented: usize,
}

impl MemorySurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            raycast: true,
            last: None,
            presented: 0,
        }
    }

    pub fn without_raycast(mut self) -> Self {
        self.raycast = false;
        self
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn last_frame(&self) -> Option<&RgbaImage> {
        self.last.as_ref()
    }

    pub fn frames_presented(&self) -> usize {
        self.presented
    }
}

impl DisplaySurface for MemorySurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn put_frame(&mut self, frame: &RgbaImage) {
        match &mut self.last {
            Some(last) if last.dimensions() == frame.dimensions() => last.copy_from_slice(frame),
            _ => self.last = Some(frame.clone()),
        }
        self.presented += 1;
    }

    fn supports_raycast(&self) -> bool {
        self.raycast
    }
}

/// 目标帧缓冲，只有尺寸变化时才重新分配。
#[derive(Debug, Clone)]
pub struct RenderFrame {
    buffer: RgbaImage,
}

impl Default for RenderFrame {
    fn default() -> Self {
        Self {
            buffer: RgbaImage::new(0, 0),
        }
    }
}

impl RenderFrame {
    /// 返回是否重新分配了缓冲。
    pub fn ensure_size(&mut self, width: u32, height: u32) -> bool {
        if self.buffer.dimensions() == (width, height) {
            return false;
        }
        debug!("frame buffer resized to {}x{}", width, height);
        self.buffer = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
        true
    }

    pub fn image(&self) -> &RgbaImage {
        &self.buffer
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.buffer
    }

    pub fn size(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }
}

pub trait PanoramaRenderer {
    fn name(&self) -> &'static str;

    /// 按当前状态填满 `frame` 的每个像素。
    fn render(&mut self, image: &EquirectangularImage, state: &ViewerState, frame: &mut RgbaImage);

    /// 热点在本渲染方式下的画面位置，不可见时为 `None`。
    fn locate(&self, state: &ViewerState, size: (u32, u32), coord: GeoCoord) -> Option<ScreenPoint>;
}

/// 构造时选定渲染方式，之后不再切换。
pub fn select_renderer(surface: &dyn DisplaySurface, config: &ViewConfig) -> Box<dyn PanoramaRenderer> {
    let renderer: Box<dyn PanoramaRenderer> = if surface.supports_raycast() {
        let mut canvas = CanvasRenderer::new(config.background);
        canvas.set_mirror(config.mirror);
        Box::new(canvas)
    } else {
        Box::new(FallbackRenderer::new(config.background))
    };
    info!("using {} renderer", renderer.name());
    renderer
}

fn shade(sample: Option<[u8; 3]>, background: [u8; 3]) -> Rgba<u8> {
    let [r, g, b] = sample.unwrap_or(background);
    Rgba([r, g, b, 255])
}

/// 透视渲染器。
///
/// 像素偏移取像素中心 `x + 0.5 - W/2`，因此第 `x` 列与第 `W-1-x` 列偏移互为相反数，
/// 右半边可以直接沿视线所在经线镜像左半边的结果。
#[derive(Debug, Clone)]
pub struct CanvasRenderer {
    background: [u8; 3],
    mirror: bool,
    // 当前行左半边每列的 (lon, lat)
    row: Vec<(f64, f64)>,
}

impl CanvasRenderer {
    pub fn new(background: [u8; 3]) -> Self {
        Self {
            background,
            mirror: true,
            row: Vec::new(),
        }
    }

    pub fn set_mirror(&mut self, enabled: bool) {
        self.mirror = enabled;
    }
}

impl PanoramaRenderer for CanvasRenderer {
    fn name(&self) -> &'static str {
        "canvas"
    }

    fn render(&mut self, image: &EquirectangularImage, state: &ViewerState, frame: &mut RgbaImage) {
        let (w, h) = frame.dimensions();
        let view = state.orientation;
        let base = sphere_point(view.longitude, view.latitude) * state.zoom;
        let basis = TangentBasis::new(view.longitude, view.latitude);
        let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);

        let traced = if self.mirror { w.div_ceil(2) } else { w };
        self.row.clear();
        self.row.resize(traced as usize, (0.0, 0.0));

        for y in 0..h {
            let dy = y as f64 + 0.5 - cy;
            let row_base = base + basis.y * dy;

            for x in 0..traced {
                let dx = x as f64 + 0.5 - cx;
                let (lon, lat) = spherical(row_base + basis.x * dx);
                self.row[x as usize] = (lon, lat);
                frame.put_pixel(x, y, shade(image.sample(lon, lat), self.background));
            }

            for x in traced..w {
                let (lon, lat) = self.row[(w - 1 - x) as usize];
                let lon = normalize_angle(2.0 * view.longitude - lon);
                frame.put_pixel(x, y, shade(image.sample(lon, lat), self.background));
            }
        }
    }

    fn locate(&self, state: &ViewerState, size: (u32, u32), coord: GeoCoord) -> Option<ScreenPoint> {
        hotspot::project(state, size, coord)
    }
}

/// 平面渲染器：不做透视，按缩放直接裁剪原图。
#[derive(Debug, Clone)]
pub struct FallbackRenderer {
    background: [u8; 3],
}

impl FallbackRenderer {
    pub fn new(background: [u8; 3]) -> Self {
        Self { background }
    }
}

impl PanoramaRenderer for FallbackRenderer {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn render(&mut self, image: &EquirectangularImage, state: &ViewerState, frame: &mut RgbaImage) {
        let (w, h) = frame.dimensions();
        let view = state.orientation;
        let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);

        for y in 0..h {
            let lat = view.latitude + (y as f64 + 0.5 - cy) / state.zoom;
            for x in 0..w {
                let lon = normalize_angle(view.longitude + (x as f64 + 0.5 - cx) / state.zoom);
                frame.put_pixel(x, y, shade(image.sample(lon, lat), self.background));
            }
        }
    }

    fn locate(&self, state: &ViewerState, size: (u32, u32), coord: GeoCoord) -> Option<ScreenPoint> {
        let view = state.orientation;
        let (lon, lat) = coord.to_radians();
        let x = normalize_angle(lon - view.longitude) * state.zoom + size.0 as f64 / 2.0;
        let y = (lat - view.latitude) * state.zoom + size.1 as f64 / 2.0;
        let inside = (0.0..size.0 as f64).contains(&x) && (0.0..size.1 as f64).contains(&y);
        inside.then_some(ScreenPoint { x, y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::Orientation;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn noise_image(w: u32, h: u32, seed: u64) -> EquirectangularImage {
        let mut rng = StdRng::seed_from_u64(seed);
        let pixels = RgbaImage::from_fn(w, h, |_, _| Rgba([rng.gen(), rng.gen(), rng.gen(), 255]));
        EquirectangularImage::new(pixels, 100.0, 3.0).unwrap()
    }

    fn state(lon: f64, lat: f64, zoom: f64) -> ViewerState {
        ViewerState {
            orientation: Orientation::new(lon, lat),
            zoom,
        }
    }

    fn render_with(mirror: bool, image: &EquirectangularImage, st: &ViewerState, w: u32, h: u32) -> RgbaImage {
        let mut renderer = CanvasRenderer::new([0, 0, 0]);
        renderer.set_mirror(mirror);
        let mut frame = RenderFrame::default();
        frame.ensure_size(w, h);
        renderer.render(image, st, frame.image_mut());
        frame.image().clone()
    }

    #[test]
    fn frame_reallocates_only_on_size_change() {
        let mut frame = RenderFrame::default();
        assert!(frame.ensure_size(4, 3));
        assert!(!frame.ensure_size(4, 3));
        assert!(frame.ensure_size(5, 3));
        assert_eq!(frame.size(), (5, 3));
    }

    #[test]
    fn mirrored_columns_match_full_trace() {
        let image = noise_image(360, 180, 1);
        let mut rng = StdRng::seed_from_u64(2);
        for (w, h) in [(64, 48), (65, 33), (1, 1), (2, 7)] {
            for _ in 0..8 {
                let st = state(
                    rng.gen_range(-PI..PI),
                    rng.gen_range(-1.5..1.5),
                    rng.gen_range(20.0..300.0),
                );
                let fast = render_with(true, &image, &st, w, h);
                let full = render_with(false, &image, &st, w, h);
                assert_eq!(fast, full, "{w}x{h} at {st:?}");
            }
        }
    }

    #[test]
    fn alpha_stays_opaque() {
        let image = noise_image(64, 16, 5);
        let frame = render_with(true, &image, &state(0.3, 0.0, 40.0), 32, 32);
        assert!(frame.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn outside_band_uses_background() {
        // 8:1 的条带只覆盖纬度 ±π/8，向上看时画面顶部超出范围
        let pixels = RgbaImage::from_pixel(80, 10, Rgba([200, 200, 200, 255]));
        let image = EquirectangularImage::new(pixels, 10.0, 3.0).unwrap();
        let mut renderer = CanvasRenderer::new([1, 2, 3]);
        let mut frame = RgbaImage::new(20, 20);
        renderer.render(&image, &state(0.0, -PI / 8.0, 10.0), &mut frame);
        assert_eq!(frame.get_pixel(10, 0).0, [1, 2, 3, 255]);
        assert_eq!(frame.get_pixel(10, 19).0, [200, 200, 200, 255]);
    }

    #[test]
    fn fallback_locate_is_flat_and_bounded() {
        let renderer = FallbackRenderer::new([0, 0, 0]);
        let st = state(0.0, 0.0, 100.0);
        let p = renderer.locate(&st, (200, 100), GeoCoord::new(0.0, 0.0)).unwrap();
        assert_eq!((p.x, p.y), (100.0, 50.0));
        assert!(renderer.locate(&st, (200, 100), GeoCoord::new(90.0, 0.0)).is_none());
    }

    #[test]
    fn fallback_centre_samples_view_direction() {
        let mut pixels = RgbaImage::from_pixel(40, 20, Rgba([0, 0, 0, 255]));
        pixels.put_pixel(20, 10, Rgba([250, 0, 0, 255]));
        let image = EquirectangularImage::new(pixels, 10.0, 3.0).unwrap();
        let mut renderer = FallbackRenderer::new([0, 0, 0]);
        let mut frame = RgbaImage::new(4, 4);
        renderer.render(&image, &state(0.0, 0.0, 1000.0), &mut frame);
        assert_eq!(frame.get_pixel(2, 2).0, [250, 0, 0, 255]);
    }

    #[test]
    fn selection_follows_surface_capability() {
        let config = ViewConfig::default();
        assert_eq!(select_renderer(&MemorySurface::new(4, 4), &config).name(), "canvas");
        let flat = MemorySurface::new(4, 4).without_raycast();
        assert_eq!(select_renderer(&flat, &config).name(), "fallback");
    }

    #[test]
    fn surface_keeps_last_frame() {
        let mut surface = MemorySurface::new(2, 2);
        let frame = RgbaImage::from_pixel(2, 2, Rgba([7, 7, 7, 255]));
        surface.put_frame(&frame);
        surface.put_frame(&frame);
        assert_eq!(surface.frames_presented(), 2);
        assert_eq!(surface.last_frame(), Some(&frame));
    }
}
