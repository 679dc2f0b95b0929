use std::error::Error;
use std::f64::consts::FRAC_PI_2;
use std::time::{Duration, Instant};

use dayface::{Canvas, ClockConfig, ClockRenderer, Color, HandKind, LocalTime, Segment};
use pixels::{Pixels, SurfaceTexture};
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

// A segmented workday face with 00:00 rotated to the top and the faster
// hands switched on, redrawn once per second.
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let segments = vec![
        Segment::new("23:00", "07:00", "#c9d4ef".parse()?, "sleep")?,
        Segment::new("07:00", "09:30", "#fbeec1".parse()?, "commute")?,
        Segment::new("09:30", "12:30", "#cfe8d1".parse()?, "deep work")?,
        Segment::new("12:30", "13:30", "#f6e0b5".parse()?, "lunch")?,
        Segment::new("13:30", "18:00", "#cfe8d1".parse()?, "meetings")?,
        Segment::new("18:00", "23:00", "#f2d8cd".parse()?, "evening")?,
    ];

    let config = ClockConfig::builder()
        .radius(240.0)
        .rotation(-FRAC_PI_2)
        .stroke_color(Color::new(0x33, 0x33, 0x33))
        .segments(segments)
        .visible_hands(vec![HandKind::Hour, HandKind::Minute, HandKind::Second])
        .build();
    let renderer = ClockRenderer::new(config)?;

    let side = renderer.physical_size();
    let logical = renderer.logical_size();

    let event_loop = EventLoop::new()?;
    let window = WindowBuilder::new()
        .with_title("workday")
        .with_inner_size(LogicalSize::new(logical, logical))
        .with_resizable(false)
        .build(&event_loop)?;
    let window = std::sync::Arc::new(window);
    let window_clone = window.clone();

    let surface_size = window.inner_size();
    let surface_texture = SurfaceTexture::new(surface_size.width, surface_size.height, &window);
    let mut pixels = Pixels::new(side, side, surface_texture)?;

    let clock = LocalTime;
    let refresh = Duration::from_secs(1);
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
                        eprintln!("surface present failed: {err}");
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
