// main.rs — 命令行：加载全景图，按给定视角渲染一帧并输出热点位置

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use panorama_tour::{DecodeError, FileDecoder, GeoCoord, MemorySurface, PanoramaView, ViewConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "panorama_tour", about = "Render a perspective view of an equirectangular panorama")]
struct Args {
    /// 全景图路径
    image: PathBuf,

    #[arg(short, long, default_value = "frame.png")]
    out: PathBuf,

    /// 画面尺寸，例如 800x600
    #[arg(long, default_value = "800x600", value_parser = parse_size)]
    size: (u32, u32),

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    lon: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    lat: f64,

    #[arg(long)]
    zoom: Option<f64>,

    /// 热点坐标 lon,lat（角度），可重复
    #[arg(long = "hotspot", value_parser = parse_coord, allow_hyphen_values = true)]
    hotspots: Vec<GeoCoord>,

    /// JSON 配置文件；未指定时读取 PANORAMA_CONFIG
    #[arg(long)]
    config: Option<PathBuf>,

    /// 使用平面渲染（不做透视）
    #[arg(long)]
    flat: bool,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let w = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    Ok((w, h))
}

fn parse_coord(s: &str) -> Result<GeoCoord, String> {
    let (lon, lat) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LON,LAT, got {s:?}"))?;
    let lon = lon.trim().parse().map_err(|e| format!("bad longitude: {e}"))?;
    let lat = lat.trim().parse().map_err(|e| format!("bad latitude: {e}"))?;
    Ok(GeoCoord::new(lon, lat))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ViewConfig::load(path)?,
        None => ViewConfig::from_env()?,
    };

    let (w, h) = args.size;
    let mut surface = MemorySurface::new(w, h);
    if args.flat {
        surface = surface.without_raycast();
    }

    let mut view = PanoramaView::new(surface, config);
    view.load(args.image.clone(), Arc::new(FileDecoder))?;
    if !view.wait() {
        let cause = view.take_error().unwrap_or(DecodeError::Disconnected);
        return Err(cause).with_context(|| format!("could not load {}", args.image.display()));
    }

    view.jump_to(GeoCoord::new(args.lon, args.lat), args.zoom);
    let state = *view.state();
    let at = state.orientation.to_coord();
    info!("view at ({:.2}°, {:.2}°), zoom {:.1}", at.lon, at.lat, state.zoom);

    let frame = view
        .surface()
        .last_frame()
        .context("no frame was rendered")?;
    frame
        .save(&args.out)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    println!("wrote {} ({}x{})", args.out.display(), w, h);

    for (coord, placement) in args.hotspots.iter().zip(view.locate_hotspots(&args.hotspots)) {
        match placement {
            Some(p) => println!("hotspot {:>8.2},{:>7.2} -> {:.1},{:.1}", coord.lon, coord.lat, p.x, p.y),
            None => println!("hotspot {:>8.2},{:>7.2} -> not visible", coord.lon, coord.lat),
        }
    }

    Ok(())
}
