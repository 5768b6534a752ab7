//! main.rs - Desktop simulator for the LED generators
//! Draws each LED as a square, fakes an audio feed, and lets you flip
//! generators and devices from the keyboard

use std::convert::Infallible;
use std::thread;
use std::time::{Duration, Instant};

use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};
use embedded_graphics_simulator::{OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window};

use blinky_particles::{
    AudioControl, DeviceConfig, GeneratorKind, PixelBuffer, RenderPipeline, RenderTarget,
};

const SCREEN_WIDTH: u32 = 800;
const SCREEN_HEIGHT: u32 = 640;
const STATUS_HEIGHT: u32 = 40;
const MAX_LED_SIZE: u32 = 24;
const MIN_LED_SIZE: u32 = 4;
/// Largest preset is the 4x60 tube.
const MAX_CELLS: usize = 256;
const TARGET_FPS: u32 = 30;

fn devices() -> [DeviceConfig; 4] {
    [
        DeviceConfig::tube_light(),
        DeviceConfig::bucket_totem(),
        DeviceConfig::long_tube(),
        DeviceConfig::hat(),
    ]
}

/// A steady beat with a slowly breathing loudness.
struct SyntheticAudio {
    bpm: f32,
    silent: bool,
}

impl SyntheticAudio {
    fn sample(&self, t: f32) -> AudioControl {
        if self.silent {
            return AudioControl::new(0.0, 0.0, 0.5);
        }
        let phase = (t * self.bpm / 60.0).fract();
        let energy = 0.45 + 0.3 * (t * 0.4).sin();
        // sharp hit right after each beat
        let transient = (1.0 - phase).powi(12);
        AudioControl::new(energy, transient, phase)
    }
}

struct UiState {
    device: usize,
    verbose: bool,
    info_message: String,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            device: 0,
            verbose: false,
            info_message: String::new(),
        }
    }
}

fn led_size(width: u16, height: u16) -> u32 {
    let fit_w = SCREEN_WIDTH / width.max(1) as u32;
    let fit_h = (SCREEN_HEIGHT - STATUS_HEIGHT) / height.max(1) as u32;
    fit_w.min(fit_h).clamp(MIN_LED_SIZE, MAX_LED_SIZE)
}

fn render_leds(
    display: &mut SimulatorDisplay<Rgb888>,
    buffer: &PixelBuffer<MAX_CELLS>,
    pipeline: &RenderPipeline,
    ui: &UiState,
) -> Result<(), Infallible> {
    display.clear(Rgb888::BLACK)?;

    let size = led_size(buffer.width(), buffer.height());
    for y in 0..buffer.height() {
        for x in 0..buffer.width() {
            let c = buffer.pixel(x, y);
            Rectangle::new(
                Point::new((x as u32 * size) as i32, (y as u32 * size) as i32),
                Size::new(size - 1, size - 1),
            )
            .into_styled(PrimitiveStyle::with_fill(Rgb888::new(c.r, c.g, c.b)))
            .draw(display)?;
        }
    }

    let text_style = MonoTextStyle::new(&FONT_6X10, Rgb888::new(0, 200, 255));
    let hint_style = MonoTextStyle::new(&FONT_6X10, Rgb888::new(0, 100, 140));
    let top = (SCREEN_HEIGHT - STATUS_HEIGHT) as i32;

    Text::with_baseline(
        &format!("{} | {}", pipeline.config().name, pipeline.status()),
        Point::new(5, top + 4),
        text_style,
        Baseline::Top,
    )
    .draw(display)?;

    if ui.verbose && !ui.info_message.is_empty() {
        Text::with_baseline(&ui.info_message, Point::new(5, top + 16), text_style, Baseline::Top)
            .draw(display)?;
    }

    Text::with_baseline(
        "N: Generator | D: Device | S: Silence | Space: Verbose | Q: Quit",
        Point::new(5, top + 28),
        hint_style,
        Baseline::Top,
    )
    .draw(display)?;

    Ok(())
}

fn switch_device(
    pipeline: &mut RenderPipeline,
    buffer: &mut PixelBuffer<MAX_CELLS>,
    config: DeviceConfig,
    now_ms: u32,
) {
    match PixelBuffer::new(config.matrix.width, config.matrix.height) {
        Ok(fresh) => *buffer = fresh,
        Err(e) => log::error!("{}: {}", config.name, e),
    }
    if let Err(e) = pipeline.set_config(config, now_ms) {
        log::error!("{} cannot run {}: {}", pipeline.name(), config.name, e);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut ui = UiState::default();
    let config = devices()[ui.device];
    let mut display = SimulatorDisplay::<Rgb888>::new(Size::new(SCREEN_WIDTH, SCREEN_HEIGHT));
    let output_settings = OutputSettingsBuilder::new().scale(1).build();
    let mut window = Window::new("Blinky - LED Generators", &output_settings);

    let mut buffer: PixelBuffer<MAX_CELLS> =
        match PixelBuffer::new(config.matrix.width, config.matrix.height) {
            Ok(buffer) => buffer,
            Err(e) => {
                log::error!("{}: {}", config.name, e);
                return;
            }
        };
    let mut pipeline = RenderPipeline::new(config, 0x00c0_ffee);
    let mut audio = SyntheticAudio {
        bpm: 120.0,
        silent: false,
    };

    let start = Instant::now();
    let frame_duration = Duration::from_secs_f32(1.0 / TARGET_FPS as f32);
    let mut last_status = Instant::now();

    if let Err(e) = pipeline.set_generator(GeneratorKind::Fire, 0) {
        log::error!("no generator could start: {}", e);
    }

    log::info!("=== Blinky - LED Generators ===");
    log::info!("N: next generator, D: next device, S: toggle silence, Space: verbose, Q: quit");

    'main_loop: loop {
        let frame_start = Instant::now();
        let now_ms = start.elapsed().as_millis() as u32;
        let t = now_ms as f32 / 1000.0;

        pipeline.render(&mut buffer, audio.sample(t), now_ms);
        render_leds(&mut display, &buffer, &pipeline, &ui).unwrap_or_else(|never| match never {});
        window.update(&display);

        for event in window.events() {
            match event {
                SimulatorEvent::Quit => break 'main_loop,
                SimulatorEvent::KeyDown { keycode, .. } => {
                    let key = format!("{:?}", keycode).to_lowercase();
                    match key.as_str() {
                        "space" => {
                            ui.verbose = !ui.verbose;
                            log::info!("Verbose mode: {}", if ui.verbose { "ON" } else { "OFF" });
                        }
                        "n" => {
                            let next = pipeline.kind().unwrap_or(GeneratorKind::HeatFire).next();
                            if let Err(e) = pipeline.set_generator(next, now_ms) {
                                log::error!("{} cannot run here: {}", next.name(), e);
                            }
                        }
                        "d" => {
                            ui.device = (ui.device + 1) % devices().len();
                            let config = devices()[ui.device];
                            log::info!("Device: {}", config.name);
                            switch_device(&mut pipeline, &mut buffer, config, now_ms);
                        }
                        "s" => {
                            audio.silent = !audio.silent;
                            log::info!("Audio: {}", if audio.silent { "silent" } else { "beat" });
                        }
                        "q" => break 'main_loop,
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        let work = frame_start.elapsed();
        pipeline.note_frame_time(work.as_millis() as u32);

        if ui.verbose && last_status.elapsed() >= Duration::from_secs(1) {
            ui.info_message = format!(
                "frames {} | overruns {} | frame {:.1} ms",
                pipeline.frames(),
                pipeline.overruns(),
                work.as_secs_f32() * 1000.0
            );
            log::info!("{}", pipeline.status());
            last_status = Instant::now();
        }

        if work < frame_duration {
            thread::sleep(frame_duration - work);
        }
    }

    log::info!("Rendered {} frames, bye", pipeline.frames());
}
