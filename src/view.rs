// view.rs — 单个全景视图实例：持有显示表面、渲染器、视角控制器与异步解码状态
//
// 所有状态都挂在实例上，同一进程内的多个视图互不影响。

use crate::config::ViewConfig;
use crate::error::{DecodeError, RenderError, ViewError};
use crate::hotspot::{GeoCoord, ScreenPoint};
use crate::renderer::{select_renderer, DisplaySurface, PanoramaRenderer, RenderFrame};
use crate::source::{EquirectangularImage, ImageDecoder};
use crate::viewport::{Orientation, ViewerState, Viewport};
use image::RgbaImage;
use log::{debug, error, info};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

type DecodeResult = Result<RgbaImage, DecodeError>;

enum LoadState {
    Empty,
    Pending(Receiver<DecodeResult>),
    Ready,
    Failed,
    TornDown,
}

pub struct PanoramaView<S: DisplaySurface> {
    config: ViewConfig,
    surface: S,
    renderer: Box<dyn PanoramaRenderer>,
    viewport: Viewport,
    frame: RenderFrame,
    image: Option<EquirectangularImage>,
    load: LoadState,
    last_error: Option<DecodeError>,
    ready_listeners: Vec<Box<dyn FnMut()>>,
    error_listeners: Vec<Box<dyn FnMut(&DecodeError)>>,
}

impl<S: DisplaySurface> PanoramaView<S> {
    pub fn new(surface: S, config: ViewConfig) -> Self {
        let renderer = select_renderer(&surface, &config);
        let viewport = Viewport::new(&config);
        Self {
            config,
            surface,
            renderer,
            viewport,
            frame: RenderFrame::default(),
            image: None,
            load: LoadState::Empty,
            last_error: None,
            ready_listeners: Vec::new(),
            error_listeners: Vec::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    // 调整表面尺寸后，下一次 poll 或渲染会自动察觉
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn state(&self) -> &ViewerState {
        self.viewport.state()
    }

    pub fn image(&self) -> Option<&EquirectangularImage> {
        self.image.as_ref()
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    pub fn is_ready(&self) -> bool {
        self.image.is_some()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.load, LoadState::Pending(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.load, LoadState::Failed)
    }

    /// 最近一次加载失败的原因；新的加载开始或成功后清空。
    pub fn last_error(&self) -> Option<&DecodeError> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<DecodeError> {
        self.last_error.take()
    }

    pub fn on_ready(&mut self, listener: impl FnMut() + 'static) {
        self.ready_listeners.push(Box::new(listener));
    }

    pub fn on_error(&mut self, listener: impl FnMut(&DecodeError) + 'static) {
        self.error_listeners.push(Box::new(listener));
    }

    pub fn on_orientation_changed(&mut self, listener: impl FnMut(Orientation) + 'static) {
        self.viewport.on_orientation_changed(listener);
    }

    fn check_can_load(&self) -> Result<(), ViewError> {
        match self.load {
            LoadState::Pending(_) => Err(ViewError::DecodeInFlight),
            LoadState::TornDown => Err(ViewError::TornDown),
            _ => Ok(()),
        }
    }

    /// 在后台线程解码，结果通过 `poll` / `wait` 取回。
    pub fn load(
        &mut self,
        source: impl Into<PathBuf>,
        decoder: Arc<dyn ImageDecoder>,
    ) -> Result<(), ViewError> {
        self.check_can_load()?;
        let source = source.into();
        let (tx, rx) = channel();
        info!("decoding {:?} in background", source);

        thread::spawn(move || {
            let result = decoder.decode(&source);
            if tx.send(result).is_err() {
                debug!("view went away before {:?} finished decoding", source);
            }
        });

        self.load = LoadState::Pending(rx);
        self.last_error = None;
        Ok(())
    }

    /// 直接安装已解码的像素（同步路径）。
    pub fn load_pixels(&mut self, pixels: RgbaImage) -> Result<(), ViewError> {
        self.check_can_load()?;
        self.complete(Ok(pixels));
        Ok(())
    }

    /// 非阻塞地检查解码结果；返回本次是否完成了一次加载（成功或失败）。
    ///
    /// 没有新结果时，若表面尺寸与上一帧不同则重新渲染。
    pub fn poll(&mut self) -> bool {
        if self.poll_decode() {
            return true;
        }
        if self.is_ready() && self.surface.size() != self.frame.size() {
            let (w, h) = self.surface.size();
            debug!("surface resized to {}x{}", w, h);
            self.redraw();
        }
        false
    }

    fn poll_decode(&mut self) -> bool {
        let LoadState::Pending(rx) = &self.load else {
            return false;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => Err(DecodeError::Disconnected),
        };
        self.complete(result);
        true
    }

    /// 阻塞直到当前解码结束；返回视图是否就绪。
    pub fn wait(&mut self) -> bool {
        if let LoadState::Pending(rx) = &self.load {
            let result = rx.recv().unwrap_or(Err(DecodeError::Disconnected));
            self.complete(result);
        }
        self.is_ready()
    }

    fn complete(&mut self, result: DecodeResult) {
        let image = result.and_then(|pixels| {
            EquirectangularImage::new(pixels, self.config.base_zoom, self.config.quality)
        });

        match image {
            Ok(image) => {
                info!("panorama ready: {}x{}", image.width(), image.height());
                self.viewport
                    .set_image_bounds(image.field_of_view(), image.max_zoom(), self.surface.size());
                self.image = Some(image);
                self.load = LoadState::Ready;
                self.last_error = None;
                for listener in &mut self.ready_listeners {
                    listener();
                }
                self.redraw();
            }
            Err(e) => {
                error!("panorama failed to load: {}", e);
                self.image = None;
                self.load = LoadState::Failed;
                for listener in &mut self.error_listeners {
                    listener(&e);
                }
                self.last_error = Some(e);
            }
        }
    }

    /// 销毁视图；之后到达的解码结果不再产生任何影响。
    pub fn teardown(&mut self) {
        self.load = LoadState::TornDown;
        self.image = None;
        self.viewport.drag_end();
    }

    /// 渲染一帧并提交到显示表面。
    pub fn render(&mut self) -> Result<(), RenderError> {
        let Some(image) = self.image.as_ref() else {
            return Err(RenderError::NotReady);
        };

        let (w, h) = self.surface.size();
        if self.frame.ensure_size(w, h) {
            self.viewport.refresh_hard_min((w, h));
        }
        if w == 0 || h == 0 {
            return Ok(());
        }

        self.renderer
            .render(image, self.viewport.state(), self.frame.image_mut());
        self.surface.put_frame(self.frame.image());
        Ok(())
    }

    // 未就绪时静默推迟，等 ready 之后再渲染
    fn redraw(&mut self) {
        if let Err(RenderError::NotReady) = self.render() {
            debug!("render deferred: panorama not ready");
        }
    }

    pub fn drag_start(&mut self, x: f64, y: f64) {
        self.viewport.drag_start(x, y);
    }

    pub fn drag_move(&mut self, x: f64, y: f64) {
        if self.viewport.drag_move(x, y) {
            self.redraw();
        }
    }

    pub fn drag_end(&mut self) {
        self.viewport.drag_end();
    }

    pub fn wheel(&mut self, delta: f64) {
        if self.viewport.wheel(delta, self.surface.size()) {
            self.redraw();
        }
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if self.viewport.set_zoom(zoom, self.surface.size()) {
            self.redraw();
        }
    }

    pub fn jump_to(&mut self, target: GeoCoord, zoom: Option<f64>) {
        if self.viewport.jump_to(target, zoom, self.surface.size()) {
            self.redraw();
        }
    }

    pub fn reset(&mut self) {
        if self.viewport.reset(self.surface.size()) {
            self.redraw();
        }
    }

    /// 每个热点在当前画面中的位置；未就绪时全部不可见。
    pub fn locate_hotspots(&self, coords: &[GeoCoord]) -> Vec<Option<ScreenPoint>> {
        if !self.is_ready() {
            return vec![None; coords.len()];
        }
        let size = self.surface.size();
        let state = self.viewport.state();
        coords
            .iter()
            .map(|c| self.renderer.locate(state, size, *c))
            .collect()
    }
}
