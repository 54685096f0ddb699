//! Seamtile CLI - Seamless Tiled Image Processing
//!
//! A demonstration CLI for the seamtile library. The built-in transforms
//! (identity, invert, nearest-neighbour upscale) stand in for a real model.

use image::{GrayImage, RgbImage};
use seamtile::prelude::*;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("seamtile");

    if args.len() < 2 {
        print_usage(program);
        return ExitCode::FAILURE;
    }

    let result = match args[1].as_str() {
        "plan" => plan_command(&args[2..]),
        "process" => process_command(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage(program);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage(program);
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_usage(program: &str) {
    println!("🧩 Seamtile v{}", seamtile::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  plan <width> <height> [options]   Show the tiles for an image size");
    println!("  process <in> <out> [options]      Run a demo transform tile by tile");
    println!("  help                              Show this help message");
    println!();
    println!("Plan options:");
    println!("  --ratio <r>         Target aspect ratio per strip (default: 3.0)");
    println!("  --grid <size>       Plan a grid of <size> tiles instead of strips");
    println!("  --overlap <px>      Grid overlap (default: 16)");
    println!("  --json              Print the plan as JSON");
    println!();
    println!("Process options:");
    println!("  --config <file>     Load dispatch settings from a TOML file");
    println!("  --split-ratio <r>   Aspect ratio above which to split (<= 0 disables)");
    println!("  --scale <n>         Nearest-neighbour upscale each tile by n");
    println!("  --grid              Always tile on a grid (scaling transforms)");
    println!("  --invert            Invert colours of each tile");
}

fn plan_command(args: &[String]) -> anyhow::Result<()> {
    if args.len() < 2 {
        anyhow::bail!("plan needs <width> <height>");
    }
    let width: u32 = args[0].parse()?;
    let height: u32 = args[1].parse()?;

    let mut ratio = seamtile::core::config::DEFAULT_SPLIT_RATIO;
    let mut grid: Option<u32> = None;
    let mut overlap = seamtile::core::config::DEFAULT_TILE_OVERLAP;
    let mut json = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--ratio" if i + 1 < args.len() => {
                ratio = args[i + 1].parse()?;
                i += 2;
            }
            "--grid" if i + 1 < args.len() => {
                grid = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--overlap" if i + 1 < args.len() => {
                overlap = args[i + 1].parse()?;
                i += 2;
            }
            "--json" => {
                json = true;
                i += 1;
            }
            other => anyhow::bail!("Unknown option: {}", other),
        }
    }

    let plan = match grid {
        Some(tile_size) => plan_grid(width, height, tile_size, overlap)?,
        None => plan_strips(width, height, ratio)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!(
        "{}x{} (aspect {:.2}): {} tile(s), overlap {}",
        width,
        height,
        aspect_ratio(width, height),
        plan.len(),
        plan.overlap
    );
    match plan.layout {
        PlanLayout::Strips { axis } => println!("Layout: strips along {}", axis),
        PlanLayout::Grid { columns, rows } => println!("Layout: {}x{} grid", columns, rows),
    }
    for (index, rect) in plan.rects.iter().enumerate() {
        println!("  {:>3}: {}", index, rect);
    }
    Ok(())
}

fn process_command(args: &[String]) -> anyhow::Result<()> {
    if args.len() < 2 {
        anyhow::bail!("process needs <input> <output>");
    }
    let input_path = &args[0];
    let output_path = &args[1];

    let mut config = DispatchConfig::new();
    let mut grid = false;
    let mut invert = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                config = DispatchConfig::load(&args[i + 1])?;
                i += 2;
            }
            "--split-ratio" if i + 1 < args.len() => {
                config = config.with_split_ratio(args[i + 1].parse()?);
                i += 2;
            }
            "--scale" if i + 1 < args.len() => {
                config = config.with_scale(args[i + 1].parse()?);
                i += 2;
            }
            "--grid" => {
                grid = true;
                i += 1;
            }
            "--invert" => {
                invert = true;
                i += 1;
            }
            other => anyhow::bail!("Unknown option: {}", other),
        }
    }

    let image = image::open(input_path)?.to_rgb8();
    let scale = config.scale;
    let dispatcher = SplitDispatcher::new(config)?.with_progress(|update| {
        if let ProgressUpdate::TileCompleted { index, total, duration_ms, .. } = update {
            println!("   • Tile {}/{} done in {}ms", index + 1, total, duration_ms);
        }
    });

    println!("⚙️  Processing {} -> {}", input_path, output_path);
    let transform = |tile: &RgbImage, _: Option<&GrayImage>, _: &TileRequest| -> anyhow::Result<RgbImage> {
        let mut out = upscale_nearest(tile, scale);
        if invert {
            image::imageops::invert(&mut out);
        }
        Ok(out)
    };

    let result = if grid {
        dispatcher.dispatch_grid(&image, None, transform)?
    } else {
        dispatcher.dispatch(&image, None, transform)?
    };

    result.save(output_path)?;
    println!("🎉 Image saved to: {} ({}x{})", output_path, result.width(), result.height());
    Ok(())
}

fn upscale_nearest(image: &RgbImage, scale: u32) -> RgbImage {
    if scale <= 1 {
        return image.clone();
    }
    RgbImage::from_fn(image.width() * scale, image.height() * scale, |x, y| {
        *image.get_pixel(x / scale, y / scale)
    })
}
