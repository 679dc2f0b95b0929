use std::env;
use std::error::Error;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

use pixels::{Pixels, SurfaceTexture};
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use dayface::{Canvas, ClockConfig, ClockRenderer, Color, LocalTime, Segment};

struct Args {
    radius: f64,
    rotation_deg: f64,
    density: f64,
    refresh_secs: u64,
    title: String,
}

fn parse_args() -> Args {
    // Defaults put 00:00 at the top of the face and redraw once per minute,
    // which is enough while only the hour hand and static layers are shown.
    let mut parsed = Args {
        radius: 200.0,
        rotation_deg: -90.0,
        density: 1.0,
        refresh_secs: 60,
        title: "dayface".to_string(),
    };
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--radius" => {
                if let Some(value) = args.next().and_then(|v| v.parse().ok()) {
                    parsed.radius = value;
                }
            }
            "--rotation-deg" => {
                if let Some(value) = args.next().and_then(|v| v.parse().ok()) {
                    parsed.rotation_deg = value;
                }
            }
            "--density" => {
                if let Some(value) = args.next().and_then(|v| v.parse().ok()) {
                    parsed.density = value;
                }
            }
            "--refresh-secs" => {
                if let Some(value) = args.next().and_then(|v| v.parse().ok()) {
                    parsed.refresh_secs = value;
                }
            }
            "--title" => {
                if let Some(title) = args.next() {
                    parsed.title = title;
                }
            }
            _ => {}
        }
    }
    parsed
}

fn default_segments() -> Result<Vec<Segment>, Box<dyn Error>> {
    Ok(vec![
        Segment::new("22:00", "06:30", "#d6dcf0".parse()?, "sleep")?,
        Segment::new("06:30", "09:00", "#fdf2d0".parse()?, "morning")?,
        Segment::new("09:00", "17:00", "#d9ecdb".parse()?, "work")?,
        Segment::new("17:00", "22:00", "#f3ddd3".parse()?, "evening")?,
    ])
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = parse_args();

    let config = ClockConfig::builder()
        .radius(args.radius)
        .rotation(args.rotation_deg * PI / 180.0)
        .pixel_density_scale(args.density)
        .stroke_color(Color::new(0x44, 0x44, 0x44))
        .segments(default_segments()?)
        .build();
    let renderer = ClockRenderer::new(config)?;

    let side = renderer.physical_size();
    let logical = renderer.logical_size();
    log::info!(
        "face: {logical}x{logical} logical, {side}x{side} physical, redraw every {}s",
        args.refresh_secs
    );

    let event_loop = EventLoop::new()?;
    let window = WindowBuilder::new()
        .with_title(&args.title)
        .with_inner_size(LogicalSize::new(logical, logical))
        .with_resizable(false)
        .build(&event_loop)?;
    let window = std::sync::Arc::new(window);
    let window_clone = window.clone();

    // The backing buffer uses the physical pixel size; the surface stays at
    // the window's size and pixels scales between the two.
    let surface_size = window.inner_size();
    let surface_texture = SurfaceTexture::new(surface_size.width, surface_size.height, &window);
    let mut pixels = Pixels::new(side, side, surface_texture)?;

    let clock = LocalTime;
    let refresh = Duration::from_secs(args.refresh_secs.max(1));
    let mut last_frame = Instant::now();
    window.request_redraw();

    event_loop.run(move |event, window_target| {
        window_target.set_control_flow(ControlFlow::WaitUntil(last_frame + refresh));
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    let _ = pixels.resize_surface(new_size.width, new_size.height);
                }
                WindowEvent::RedrawRequested => {
                    let frame = pixels.frame_mut();
                    let mut canvas = Canvas::new(frame, side as usize, side as usize);
                    renderer.render(&mut canvas, &clock);
                    if let Err(err) = pixels.render() {
                        log::error!("surface present failed: {err}");
                        window_target.exit();
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                if last_frame.elapsed() >= refresh {
                    window_clone.request_redraw();
                    last_frame = Instant::now();
                }
            }
            _ => {}
        }
    })?;

    Ok(())
}
