//! Moving color-bar demo
//!
//! A producer thread pushes a scrolling test pattern at ~30 fps while
//! the main thread pumps window events and presents at display pace.
//! Frames are queued discardable, so dragging or resizing the window
//! never stalls the producer.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use glfw::{Action, Key, WindowEvent};
use log::{error, info};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use video_display::vulkan::VulkanBackend;
use video_display::{
    DisplayConfig, ImageDescription, PixelFormat, VulkanDisplay, WindowHandler, WindowParameters,
};

const FRAME_WIDTH: u32 = 640;
const FRAME_HEIGHT: u32 = 480;
const PRODUCER_FPS: u64 = 30;

/// SMPTE-ish bar colors, RGBA
const BARS: [[u8; 4]; 8] = [
    [255, 255, 255, 255],
    [255, 255, 0, 255],
    [0, 255, 255, 255],
    [0, 255, 0, 255],
    [255, 0, 255, 255],
    [255, 0, 0, 255],
    [0, 0, 255, 255],
    [16, 16, 16, 255],
];

/// Drawable size shared between the event loop and the engine
struct SharedWindowSize {
    width: AtomicU32,
    height: AtomicU32,
}

impl SharedWindowSize {
    fn new(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            width: AtomicU32::new(width),
            height: AtomicU32::new(height),
        })
    }

    fn set(&self, width: i32, height: i32) {
        self.width.store(width.max(0) as u32, Ordering::Release);
        self.height.store(height.max(0) as u32, Ordering::Release);
    }
}

impl WindowHandler for SharedWindowSize {
    fn window_parameters(&self) -> WindowParameters {
        WindowParameters::new(
            self.width.load(Ordering::Acquire),
            self.height.load(Ordering::Acquire),
        )
    }
}

/// Write one frame of scrolling bars, honoring the slot's row pitch
fn write_bars(bytes: &mut [u8], pitch: usize, offset: u32) {
    let bar_width = FRAME_WIDTH / BARS.len() as u32;
    for row in 0..FRAME_HEIGHT as usize {
        let row_bytes = &mut bytes[row * pitch..row * pitch + FRAME_WIDTH as usize * 4];
        for x in 0..FRAME_WIDTH {
            let bar = (((x + offset) / bar_width) as usize) % BARS.len();
            let pixel = x as usize * 4;
            row_bytes[pixel..pixel + 4].copy_from_slice(&BARS[bar]);
        }
    }
}

fn run_producer(display: Arc<VulkanDisplay>, running: Arc<AtomicBool>) {
    let desc = ImageDescription::new(FRAME_WIDTH, FRAME_HEIGHT, PixelFormat::Rgba);
    let frame_interval = Duration::from_millis(1000 / PRODUCER_FPS);
    let mut offset = 0u32;
    let mut dropped = 0u64;

    while running.load(Ordering::Acquire) {
        let mut frame = match display.acquire_image(desc) {
            Ok(frame) => frame,
            Err(err) => {
                error!("frame acquisition failed: {err}");
                break;
            }
        };
        let pitch = frame.row_pitch();
        write_bars(frame.bytes_mut(), pitch, offset);
        offset = (offset + 2) % FRAME_WIDTH;

        match display.queue_image(frame, true) {
            Ok(true) => dropped += 1,
            Ok(false) => {}
            Err(err) => {
                error!("frame queueing failed: {err}");
                break;
            }
        }
        thread::sleep(frame_interval);
    }
    info!("producer exiting, {dropped} frames dropped");
}

fn main() {
    env_logger::init();

    let mut glfw = match glfw::init(glfw::fail_on_errors) {
        Ok(glfw) => glfw,
        Err(err) => {
            error!("GLFW initialization failed: {err}");
            std::process::exit(1);
        }
    };
    glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
    glfw.window_hint(glfw::WindowHint::Resizable(true));

    let Some((mut window, events)) =
        glfw.create_window(1280, 720, "Video Display Testcard", glfw::WindowMode::Windowed)
    else {
        error!("failed to create window");
        std::process::exit(1);
    };
    window.set_key_polling(true);
    window.set_framebuffer_size_polling(true);

    let (fb_width, fb_height) = window.get_framebuffer_size();
    let size = SharedWindowSize::new(fb_width.max(0) as u32, fb_height.max(0) as u32);

    let config = DisplayConfig::default();
    let backend = match VulkanBackend::new(
        window.raw_display_handle(),
        window.raw_window_handle(),
        size.window_parameters(),
        &config,
    ) {
        Ok(backend) => backend,
        Err(err) => {
            error!("Vulkan initialization failed: {err}");
            std::process::exit(1);
        }
    };
    let display = match VulkanDisplay::new(backend, size.clone(), config) {
        Ok(display) => Arc::new(display),
        Err(err) => {
            error!("display engine initialization failed: {err}");
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let producer = {
        let display = Arc::clone(&display);
        let running = Arc::clone(&running);
        thread::spawn(move || run_producer(display, running))
    };

    info!("presenting; press Escape to quit");
    while !window.should_close() {
        glfw.poll_events();
        for (_, event) in glfw::flush_messages(&events) {
            match event {
                WindowEvent::Key(Key::Escape, _, Action::Press, _) => {
                    window.set_should_close(true);
                }
                WindowEvent::FramebufferSize(width, height) => {
                    size.set(width, height);
                }
                _ => {}
            }
        }

        match display.display_queued_image() {
            Ok(_) => {}
            Err(err) => {
                error!("display failed: {err}");
                window.set_should_close(true);
            }
        }
    }

    running.store(false, Ordering::Release);
    if producer.join().is_err() {
        error!("producer thread panicked");
    }
    if let Err(err) = display.destroy() {
        error!("teardown failed: {err}");
    }
}
