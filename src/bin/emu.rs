use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::Context;
use clap::Parser;
use pixels::{Pixels, SurfaceTexture};
use rodio::{OutputStream, OutputStreamBuilder, Sink, Source, source::SquareWave};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, KeyCode, NamedKey},
    window::{Window, WindowId},
};

use quirk8::{
    emu::{Chip8, Chip8Runner, DEFAULT_CYCLES_PER_FRAME, DISPLAY_X, DISPLAY_Y, Quirks},
    u4,
};

const WINDOW_SCALE: u32 = 10;

const PIXEL_ON: [u8; 4] = [0x20, 0xE0, 0x20, 0xFF];
const PIXEL_OFF: [u8; 4] = [0x00, 0x10, 0x00, 0xFF];

/// Mapping from physical keyboard keys to the CHIP-8 hex keypad (0x0-0xF).
const KEY_MAP: [KeyCode; 16] = [
    KeyCode::KeyX,   // 0x0
    KeyCode::Digit1, // 0x1
    KeyCode::Digit2, // 0x2
    KeyCode::Digit3, // 0x3
    KeyCode::KeyQ,   // 0x4
    KeyCode::KeyW,   // 0x5
    KeyCode::KeyE,   // 0x6
    KeyCode::KeyA,   // 0x7
    KeyCode::KeyS,   // 0x8
    KeyCode::KeyD,   // 0x9
    KeyCode::KeyZ,   // 0xA
    KeyCode::KeyC,   // 0xB
    KeyCode::Digit4, // 0xC
    KeyCode::KeyR,   // 0xD
    KeyCode::KeyF,   // 0xE
    KeyCode::KeyV,   // 0xF
];

struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,

    /// Audio output stream (must be kept alive).
    _audio_stream: OutputStream,
    audio_sink: Sink,

    runner: Chip8Runner,
    last_frame_instant: Instant,

    /// Result to be returned from main once the event loop exits.
    exit_result: anyhow::Result<()>,
}

impl App {
    fn new(rom: &[u8], cycles_per_frame: u32, quirks: Quirks) -> anyhow::Result<Self> {
        let mut _audio_stream = OutputStreamBuilder::open_default_stream()
            .context("Failed to open audio output stream")?;
        _audio_stream.log_on_drop(false);

        let audio_sink = Sink::connect_new(_audio_stream.mixer());
        audio_sink.pause();
        audio_sink.append(SquareWave::new(440.0).amplify(0.5));

        let mut chip8 = Chip8::new(quirks);
        chip8
            .load(rom)
            .context("Failed to load ROM into CHIP-8 memory")?;

        Ok(Self {
            window: None,
            pixels: None,

            _audio_stream,
            audio_sink,

            runner: Chip8Runner::new(chip8, cycles_per_frame),
            last_frame_instant: Instant::now(),

            exit_result: Ok(()),
        })
    }

    /// Copy the finished frame into the pixel buffer. Runs only after the
    /// frame's instruction batch has completed, so a partially drawn
    /// framebuffer is never visible.
    fn publish_display(&mut self) {
        let Some(pixels) = self.pixels.as_mut() else {
            return;
        };

        for (idx, pixel) in pixels.frame_mut().chunks_exact_mut(4).enumerate() {
            let x = idx % DISPLAY_X;
            let y = idx / DISPLAY_X;

            let rgba = if self.runner.get_display_pixel(y, x) {
                PIXEL_ON
            } else {
                PIXEL_OFF
            };
            pixel.copy_from_slice(&rgba);
        }
    }

    fn try_resumed(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let size = LogicalSize::new(
            DISPLAY_X as u32 * WINDOW_SCALE,
            DISPLAY_Y as u32 * WINDOW_SCALE,
        );
        let min_size = LogicalSize::new(DISPLAY_X as u32, DISPLAY_Y as u32);

        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title("quirk8")
                        .with_inner_size(size)
                        .with_min_inner_size(min_size),
                )
                .context("Failed to create window")?,
        );

        let window_size = window.inner_size();
        let surface_texture =
            SurfaceTexture::new(window_size.width, window_size.height, window.clone());
        let pixels = Pixels::new(DISPLAY_X as u32, DISPLAY_Y as u32, surface_texture)
            .context("Failed to create pixels surface")?;

        window.request_redraw();
        self.window = Some(window);
        self.pixels = Some(pixels);

        // Avoid a large dt on the first frame
        self.last_frame_instant = Instant::now();
        Ok(())
    }

    fn try_window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        event: WindowEvent,
    ) -> anyhow::Result<()> {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(pixels) = self.pixels.as_mut() {
                    pixels
                        .resize_surface(size.width, size.height)
                        .context("Failed to resize pixels surface")?;
                }
            }

            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.last_frame_instant).as_secs_f32();
                self.last_frame_instant = now;

                self.runner.update(dt).context("CHIP-8 execution error")?;

                if self.runner.should_beep() {
                    self.audio_sink.play();
                } else {
                    self.audio_sink.pause();
                }

                self.publish_display();

                if let Some(pixels) = self.pixels.as_ref() {
                    pixels.render().context("Pixels render error")?;
                }
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(key) = KEY_MAP.iter().position(|&k| k == event.physical_key) {
                    let pressed = event.state == ElementState::Pressed;
                    self.runner.set_key(u4::new(key as u8), pressed);
                }
            }

            _ => (),
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.try_resumed(event_loop) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Err(e) = self.try_window_event(event_loop, event) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }
}

/// CHIP-8 emulator with configurable interpreter quirks.
///
/// Keys 1-4, Q-R, A-F, Z-V map to the CHIP-8 keypad.
/// Escape exits the emulator.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the CHIP-8 ROM file
    rom_path: PathBuf,

    /// Instructions executed per 60Hz frame
    #[arg(default_value_t = DEFAULT_CYCLES_PER_FRAME)]
    cycles_per_frame: u32,

    /// 8XY6/8XYE shift Vy instead of Vx
    #[arg(long)]
    shift_legacy: bool,

    /// FX55/FX65 increment I by x + 1
    #[arg(long)]
    load_store_increment_i: bool,

    /// DXYN sprites wrap around screen edges
    #[arg(long)]
    draw_wrap: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let rom = std::fs::read(&args.rom_path).context("Failed to read ROM file")?;

    let quirks = Quirks {
        shift_legacy: args.shift_legacy,
        load_store_increment_i: args.load_store_increment_i,
        draw_wrap: args.draw_wrap,
        ..Quirks::default()
    };

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app =
        App::new(&rom, args.cycles_per_frame, quirks).context("Failed to initialize application")?;
    event_loop
        .run_app(&mut app)
        .context("Error occurred during event loop execution")?;

    // Return the result captured during the event loop
    app.exit_result
}
