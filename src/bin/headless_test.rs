use std::env;
use std::path::PathBuf;
use std::process;

use arcade_video::debug_flags::{self, parse_u32_hex_or_dec};
use arcade_video::variants::powerins;
use arcade_video::video::compositor::LayerMask;
use arcade_video::video::gfx::GfxElement;
use arcade_video::video::registers::RegisterId;
use arcade_video::{BusTarget, VideoResult, VideoSaveState, VideoSystem};

// Headless video runner
// Usage:
//   cargo run --release --bin headless_test -- --frames 120 --layers 0x103
// HEADLESS_FRAMES sets the frame count when --frames is absent.

struct Options {
    frames: u64,
    save: Option<PathBuf>,
    load: Option<PathBuf>,
    layers: Option<u32>,
}

fn usage() {
    eprintln!("usage: headless_test [--frames N] [--save PATH] [--load PATH] [--layers MASK]");
    eprintln!("  --layers  bit n enables tile layer n, 0x100 enables sprites");
}

fn parse_args() -> Result<Options, String> {
    let mut args = env::args().skip(1);
    let mut frames: Option<u64> = None;
    let mut save = None;
    let mut load = None;
    let mut layers = None;

    while let Some(a) = args.next() {
        match a.as_str() {
            "--frames" => {
                let v = args.next().ok_or("--frames needs a value")?;
                frames = Some(parse_u32_hex_or_dec(&v).ok_or(format!("bad frame count: {}", v))? as u64);
            }
            "--save" => save = Some(PathBuf::from(args.next().ok_or("--save needs a path")?)),
            "--load" => load = Some(PathBuf::from(args.next().ok_or("--load needs a path")?)),
            "--layers" => {
                let v = args.next().ok_or("--layers needs a mask")?;
                layers = Some(parse_u32_hex_or_dec(&v).ok_or(format!("bad layer mask: {}", v))?);
            }
            "--help" | "-h" => {
                usage();
                process::exit(0);
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }

    let frames = frames
        .or_else(|| {
            env::var("HEADLESS_FRAMES")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or(120);

    Ok(Options {
        frames,
        save,
        load,
        layers,
    })
}

/// Tile set of `count` square tiles with a diagonal stripe pattern, packed 4bpp.
fn pattern_gfx(size: u32, count: u32) -> VideoResult<GfxElement> {
    let mut data = Vec::with_capacity((size * size * count / 2) as usize);
    for tile in 0..count {
        for y in 0..size {
            for x in (0..size).step_by(2) {
                let pen = |x: u32| ((x + y + tile) % 16) as u8;
                data.push((pen(x) << 4) | pen(x + 1));
            }
        }
    }
    GfxElement::from_packed_4bpp(size, size, &data)
}

fn seed(video: &mut VideoSystem) -> VideoResult<()> {
    let background: Vec<u16> = (0..0x2000u32).map(|i| (i.wrapping_mul(0x9e37) >> 3) as u16).collect();
    video.write_block(BusTarget::Layer(powerins::BACKGROUND), 0, &background)?;

    let foreground: Vec<u16> = (0..0x800u32)
        .map(|i| if i % 5 == 0 { (i as u16) & 0x0fff } else { 0x000f })
        .collect();
    video.write_block(BusTarget::Layer(powerins::FOREGROUND), 0, &foreground)?;

    for index in 0..32u16 {
        let words = [
            0x0001,
            0x0011 | ((index & 1) << 12),
            0,
            index * 4,
            index * 10,
            0,
            0x20 + index * 6,
            index & 0x3f,
        ];
        video.write_block(BusTarget::SpriteRam, usize::from(index) * 8, &words)?;
    }
    video.write(BusTarget::Register(powerins::TILE_BANK), 0, 1)
}

/// Per-frame register traffic: horizontal scroll drift and a bank flip every 64 frames.
fn animate(video: &mut VideoSystem, frame: u64) -> VideoResult<()> {
    let scroll_x = (frame * 2) as u16;
    video.write(BusTarget::Register(RegisterId::ScrollControl), 0, scroll_x >> 8)?;
    video.write(BusTarget::Register(RegisterId::ScrollControl), 1, scroll_x & 0xff)?;
    let bank = ((frame / 64) & 1) as u16;
    video.write(BusTarget::Register(powerins::TILE_BANK), 0, bank)
}

fn checksum(pixels: &[u16]) -> u32 {
    pixels.iter().fold(0x811c_9dc5u32, |hash, &pixel| {
        let hash = (hash ^ u32::from(pixel & 0xff)).wrapping_mul(0x0100_0193);
        (hash ^ u32::from(pixel >> 8)).wrapping_mul(0x0100_0193)
    })
}

fn run(options: &Options) -> VideoResult<()> {
    let mut video = powerins::build([pattern_gfx(16, 64)?, pattern_gfx(8, 256)?, pattern_gfx(16, 128)?])?;
    if let Some(mask) = options.layers {
        video.set_layer_mask(LayerMask::from_bits_truncate(mask));
    }

    match &options.load {
        Some(path) => {
            let state = VideoSaveState::load_from_file(path)?;
            video.load_from_save_state(&state)?;
        }
        None => seed(&mut video)?,
    }

    let start = video.frame_count();
    let mut sum = 0;
    for frame in start..start + options.frames {
        animate(&mut video, frame)?;
        sum = checksum(video.vblank()?.pixels());
        if !debug_flags::quiet() && frame % 60 == 0 {
            log::info!("frame {}: checksum {:08x}", frame, sum);
        }
    }

    println!(
        "frames={} total={} checksum={:08x}",
        options.frames,
        video.frame_count(),
        sum
    );

    if let Some(path) = &options.save {
        video.to_save_state().save_to_file(path)?;
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let options = match parse_args() {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message);
            usage();
            process::exit(2);
        }
    };

    if let Err(e) = run(&options) {
        log::error!("headless run failed: {}", e);
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
