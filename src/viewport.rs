// viewport.rs — 视角状态（经度/纬度/缩放）与拖拽、滚轮交互

use crate::config::ViewConfig;
use crate::geometry::normalize_angle;
use crate::hotspot::GeoCoord;
use log::debug;
use std::f64::consts::{PI, TAU};

/// 视线方向，弧度。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub longitude: f64,
    pub latitude: f64,
}

impl Orientation {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    pub fn from_coord(coord: GeoCoord) -> Self {
        let (lon, lat) = coord.to_radians();
        Self::new(lon, lat)
    }

    pub fn to_coord(self) -> GeoCoord {
        GeoCoord::new(self.longitude.to_degrees(), self.latitude.to_degrees())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerState {
    pub orientation: Orientation,
    pub zoom: f64,
}

/// 缩放范围。
///
/// `floor` 来自配置；`hard_min` 由画布尺寸与视场算出，保证画面不超出原图覆盖范围；
/// `max` 由原图分辨率决定，图片就绪前为无穷大。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub floor: f64,
    pub hard_min: f64,
    pub max: f64,
}

impl ZoomLimits {
    // 下限超过上限时（小图 + 大画布）以上限为准
    pub fn min(&self) -> f64 {
        self.floor.max(self.hard_min).min(self.max)
    }

    pub fn clamp(&self, zoom: f64) -> f64 {
        zoom.max(self.min()).min(self.max)
    }
}

pub fn hard_min_zoom(surface: (u32, u32), field_of_view: [f64; 2]) -> f64 {
    (surface.0 as f64 / field_of_view[0]).max(surface.1 as f64 / field_of_view[1])
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Panning { last: (f64, f64) },
}

type OrientationListener = Box<dyn FnMut(Orientation)>;

/// 视角控制器：唯一可以修改 `ViewerState` 的地方。
///
/// 修改状态的方法返回是否需要重绘，由持有者负责调用渲染。
pub struct Viewport {
    state: ViewerState,
    limits: ZoomLimits,
    field_of_view: [f64; 2],
    base_zoom: f64,
    wheel_step: f64,
    start: Orientation,
    drag: DragState,
    listeners: Vec<OrientationListener>,
}

impl Viewport {
    pub fn new(config: &ViewConfig) -> Self {
        let limits = ZoomLimits {
            floor: config.min_zoom,
            hard_min: 0.0,
            max: f64::INFINITY,
        };
        let field_of_view = [TAU, PI];
        let start = Orientation::from_coord(config.start);
        let mut viewport = Self {
            state: ViewerState {
                orientation: start,
                zoom: limits.clamp(config.base_zoom),
            },
            limits,
            field_of_view,
            base_zoom: config.base_zoom,
            wheel_step: config.wheel_step,
            start,
            drag: DragState::Idle,
            listeners: Vec::new(),
        };
        viewport.state.orientation = viewport.constrain(start);
        viewport
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn limits(&self) -> &ZoomLimits {
        &self.limits
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn field_of_view(&self) -> [f64; 2] {
        self.field_of_view
    }

    pub fn on_orientation_changed(&mut self, listener: impl FnMut(Orientation) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// 新图片就绪：更新视场与缩放上限，并重新约束当前状态。
    pub fn set_image_bounds(&mut self, field_of_view: [f64; 2], max_zoom: f64, surface: (u32, u32)) {
        self.field_of_view = field_of_view;
        self.limits.max = max_zoom;
        self.limits.hard_min = hard_min_zoom(surface, field_of_view);
        self.state.zoom = self.limits.clamp(self.state.zoom);
        let constrained = self.constrain(self.state.orientation);
        self.apply_orientation(constrained);
    }

    /// 画布尺寸变化后重新计算 `hard_min`。
    pub fn refresh_hard_min(&mut self, surface: (u32, u32)) {
        self.limits.hard_min = hard_min_zoom(surface, self.field_of_view);
        self.state.zoom = self.limits.clamp(self.state.zoom);
    }

    pub fn drag_start(&mut self, x: f64, y: f64) {
        self.drag = DragState::Panning { last: (x, y) };
    }

    pub fn drag_move(&mut self, x: f64, y: f64) -> bool {
        let DragState::Panning { last } = self.drag else {
            return false;
        };
        self.drag = DragState::Panning { last: (x, y) };

        // 缩放越大，同样的位移对应的角度越小
        let dx = (x - last.0) / self.state.zoom;
        let dy = (y - last.1) / self.state.zoom;
        let current = self.state.orientation;
        let target = Orientation::new(current.longitude - dx, current.latitude - dy);
        self.apply_orientation(self.constrain(target));
        true
    }

    pub fn drag_end(&mut self) {
        self.drag = DragState::Idle;
    }

    /// 滚轮：正值放大。
    pub fn wheel(&mut self, delta: f64, surface: (u32, u32)) -> bool {
        self.set_zoom(self.state.zoom * self.wheel_step.powf(delta), surface)
    }

    pub fn set_zoom(&mut self, zoom: f64, surface: (u32, u32)) -> bool {
        if !zoom.is_finite() {
            debug!("ignoring non-finite zoom {zoom}");
            return false;
        }
        self.limits.hard_min = hard_min_zoom(surface, self.field_of_view);
        self.state.zoom = self.limits.clamp(zoom);
        true
    }

    /// 直接跳转到指定位置，不经过拖拽状态。
    pub fn jump_to(&mut self, target: GeoCoord, zoom: Option<f64>, surface: (u32, u32)) -> bool {
        if let Some(zoom) = zoom {
            self.set_zoom(zoom, surface);
        }
        self.apply_orientation(self.constrain(Orientation::from_coord(target)));
        true
    }

    pub fn reset(&mut self, surface: (u32, u32)) -> bool {
        self.drag = DragState::Idle;
        self.set_zoom(self.base_zoom, surface);
        self.apply_orientation(self.constrain(self.start));
        true
    }

    // 经度取模回绕，纬度夹取到视场范围内
    fn constrain(&self, o: Orientation) -> Orientation {
        let half = self.field_of_view[1] / 2.0;
        let latitude = if o.latitude.is_finite() {
            o.latitude.clamp(-half, half)
        } else {
            self.state.orientation.latitude
        };
        let longitude = if o.longitude.is_finite() {
            normalize_angle(o.longitude)
        } else {
            self.state.orientation.longitude
        };
        Orientation::new(longitude, latitude)
    }

    fn apply_orientation(&mut self, orientation: Orientation) {
        self.state.orientation = orientation;
        for listener in &mut self.listeners {
            listener(orientation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::cell::RefCell;
    use std::rc::Rc;

    const SURFACE: (u32, u32) = (800, 600);

    fn ready_viewport() -> Viewport {
        let mut vp = Viewport::new(&ViewConfig::default());
        vp.set_image_bounds([TAU, PI], 1909.0, SURFACE);
        vp
    }

    #[test]
    fn starts_idle_at_base_zoom() {
        let vp = Viewport::new(&ViewConfig::default());
        assert_eq!(vp.drag_state(), DragState::Idle);
        assert_eq!(vp.state().zoom, 1000.0);
        assert_eq!(vp.state().orientation, Orientation::default());
    }

    #[test]
    fn drag_pans_against_pointer_scaled_by_zoom() {
        let mut vp = ready_viewport();
        assert!(!vp.drag_move(10.0, 10.0));

        vp.drag_start(100.0, 100.0);
        assert!(vp.drag_move(150.0, 80.0));
        let o = vp.state().orientation;
        assert_relative_eq!(o.longitude, -50.0 / 1000.0);
        assert_relative_eq!(o.latitude, 20.0 / 1000.0);

        vp.drag_end();
        assert_eq!(vp.drag_state(), DragState::Idle);
        assert!(!vp.drag_move(0.0, 0.0));
    }

    #[test]
    fn drag_notifies_listeners() {
        let mut vp = ready_viewport();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        vp.on_orientation_changed(move |o| sink.borrow_mut().push(o));

        vp.drag_start(0.0, 0.0);
        vp.drag_move(-100.0, 0.0);
        vp.drag_move(-200.0, 0.0);
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_relative_eq!(seen[1].longitude, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn longitude_wraps_latitude_clamps() {
        let mut vp = ready_viewport();
        vp.drag_start(0.0, 0.0);
        vp.drag_move(-3500.0, -5000.0);
        let o = vp.state().orientation;
        assert_relative_eq!(o.longitude, normalize_angle(3.5), epsilon = 1e-12);
        assert!(o.longitude > -PI && o.longitude <= PI);
        assert_relative_eq!(o.latitude, PI / 2.0);
    }

    #[test]
    fn latitude_stays_within_band_after_random_pans() {
        let mut vp = Viewport::new(&ViewConfig::default());
        vp.set_image_bounds([TAU, PI / 4.0], 500.0, (320, 240));
        let mut rng = StdRng::seed_from_u64(11);
        vp.drag_start(0.0, 0.0);
        for _ in 0..1000 {
            let (x, y): (f64, f64) = (rng.gen_range(-2000.0..2000.0), rng.gen_range(-2000.0..2000.0));
            vp.drag_move(x, y);
            assert!(vp.state().orientation.latitude.abs() <= PI / 8.0 + 1e-12);
        }
    }

    #[test]
    fn zoom_is_always_clamped() {
        let mut vp = ready_viewport();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let v: f64 = rng.gen_range(-1e5..1e5);
            vp.set_zoom(v, SURFACE);
            let z = vp.state().zoom;
            assert!(vp.limits().min() <= z && z <= vp.limits().max, "{v} -> {z}");
        }
        for v in [f64::NAN, f64::INFINITY, 0.0, -1.0, 1e12] {
            vp.set_zoom(v, SURFACE);
            let z = vp.state().zoom;
            assert!(vp.limits().min() <= z && z <= vp.limits().max);
        }
    }

    #[test]
    fn hard_min_follows_surface() {
        let mut vp = ready_viewport();
        vp.set_zoom(1.0, (1600, 1200));
        assert_relative_eq!(vp.state().zoom, 1200.0 / PI);
        vp.set_zoom(1.0, (200, 100));
        assert_relative_eq!(vp.state().zoom, 50.0);
    }

    #[test]
    fn min_never_exceeds_max() {
        let mut vp = Viewport::new(&ViewConfig::default());
        vp.set_image_bounds([TAU, PI], 100.0, (4000, 4000));
        assert_eq!(vp.limits().min(), 100.0);
        assert_eq!(vp.state().zoom, 100.0);
    }

    #[test]
    fn wheel_zooms_by_step() {
        let mut vp = ready_viewport();
        vp.wheel(1.0, SURFACE);
        assert_relative_eq!(vp.state().zoom, 1100.0, epsilon = 1e-9);
        vp.wheel(-2.0, SURFACE);
        assert_relative_eq!(vp.state().zoom, 1100.0 / 1.21, epsilon = 1e-9);
    }

    #[test]
    fn jump_and_reset() {
        let mut vp = ready_viewport();
        vp.jump_to(GeoCoord::new(270.0, 30.0), Some(1500.0), SURFACE);
        let o = vp.state().orientation;
        assert_relative_eq!(o.longitude, -PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(o.latitude, PI / 6.0, epsilon = 1e-12);
        assert_eq!(vp.state().zoom, 1500.0);

        vp.drag_start(1.0, 1.0);
        vp.reset(SURFACE);
        assert_eq!(vp.drag_state(), DragState::Idle);
        assert_eq!(vp.state().orientation, Orientation::default());
        assert_eq!(vp.state().zoom, 1000.0);
    }

    #[test]
    fn narrower_band_reclamps_latitude() {
        let mut vp = ready_viewport();
        vp.jump_to(GeoCoord::new(0.0, 60.0), None, SURFACE);
        vp.set_image_bounds([TAU, PI / 2.0], 2000.0, SURFACE);
        assert_relative_eq!(vp.state().orientation.latitude, PI / 4.0);
    }
}
