// Demo producer for the retro video output.
// What you SEE:
// • A 640x400 window showing a 320x200 viewport, each pixel drawn 2x2.
// • The whole viewport pulses from black to yellow, one step per frame.
// • ESC or closing the window quits.
//
// Usage: retro-demo [config.json]
// Set RETRO_SCREENSHOT=out.png to save the last frame on exit.

use log::{error, info};
use retro::{Error, Retro, RetroConfig, RetroHandle};
use std::time::{Duration, Instant};

const FRAMEBUFFER_PIXELS: usize = 128_000;
const ROW_WIDTH: usize = 640;
const VIEW_W: u32 = 320;
const VIEW_H: u32 = 200;
const STEPS: usize = 10_000;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    /* --- Config + window ---
       Visual: a small "Retro" window opens, black at first. */
    let config = match std::env::args().nth(1) {
        Some(path) => RetroConfig::from_json_file(path)?,
        None => RetroConfig::default(),
    };
    let retro = Retro::init_window(config)?;

    /* --- Framebuffer + viewport setup ---
       Visual: the window grows to fit the 320x200 viewport on the next tick. */
    retro.set_framebuffer_size(FRAMEBUFFER_PIXELS)?;
    retro.set_framebuffer_row_width(ROW_WIDTH);
    retro.set_target_frame_rate(60)?;
    retro.set_viewport_position(0, 0);
    retro.set_viewport_size(VIEW_W, VIEW_H);

    produce(&retro.handle());

    if let Ok(path) = std::env::var("RETRO_SCREENSHOT") {
        retro.capture().save_png(&path)?;
        info!("saved screenshot to {path}");
    }

    retro.shutdown()
}

/* ------------------------------ Producer loop ------------------------------ */
fn produce(retro: &RetroHandle) {
    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;

    for step in 0..STEPS {
        if !retro.is_running() {
            break;
        }

        /* 1) Paint the visible part of the framebuffer one flat color.
           Visual: red+green rise together, so the screen ramps toward yellow. */
        let level = ((step * 10) % 255) as u8;
        {
            let mut fb = retro.framebuffer();
            for y in 0..VIEW_H as usize {
                for x in 0..VIEW_W as usize {
                    fb.put_pixel_xy(x, y, [level, level, 0]);
                }
            }
        }

        /* 2) Wait for vertical retrace: at most one new frame per render pass. */
        if retro.wait_for_vsync().is_err() {
            break;
        }

        /* 3) FPS line once per second */
        frames_this_second += 1;
        let now = Instant::now();
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_fps_time).as_secs_f32();
            info!("FPS: {:.1}", frames_this_second as f32 / secs);
            frames_this_second = 0;
            last_fps_time = now;
        }
    }
}
