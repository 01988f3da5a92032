//! Headless command-line driver for the BBC Micro emulation core.
//!
//! Loads a ROM set and an optional disc image, runs a fixed number of
//! frames, and writes out the final framebuffer as a PPM image plus any
//! battery-backed NVRAM. No windowing, audio device, or config file: a
//! host shell that wants those builds them on top of `beeb-core`.

use std::path::Path;

use beeb_core::prelude::Machine;
use beeb_machines::RomSet;
use beeb_machines::registry;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let model_name = args.get(1).unwrap_or_else(|| {
        eprintln!("Usage: beeb <model> <rom-dir> [frames] [disc-image]");
        eprintln!("Models: model-b, b-plus, master-128, master-compact");
        std::process::exit(1);
    });
    let rom_dir = args.get(2).unwrap_or_else(|| {
        eprintln!("Usage: beeb <model> <rom-dir> [frames] [disc-image]");
        std::process::exit(1);
    });
    let frames: u32 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(50);
    let disc_path = args.get(4);

    let definition = registry::find(model_name).unwrap_or_else(|| {
        eprintln!("Unknown model: {model_name}");
        std::process::exit(1);
    });

    let rom_set = RomSet::from_directory(Path::new(rom_dir)).unwrap_or_else(|e| {
        eprintln!("Failed to load ROM set from {rom_dir}: {e}");
        std::process::exit(1);
    });

    let mut machine = registry::create(definition, &rom_set).unwrap_or_else(|e| {
        eprintln!("Failed to build {model_name}: {e}");
        std::process::exit(1);
    });

    let nvram_path = Path::new(rom_dir).join(format!("{model_name}.nvram"));
    if let Ok(data) = std::fs::read(&nvram_path) {
        machine.load_nvram(&data);
    }

    machine.reset();

    if let Some(path) = disc_path {
        match std::fs::read(path) {
            Ok(image) => machine.insert_disc(0, image),
            Err(e) => eprintln!("Warning: failed to read disc image {path}: {e}"),
        }
    }

    for _ in 0..frames {
        machine.run_frame();
    }

    let (width, height) = machine.display_size();
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    machine.render_frame(&mut buffer);
    if let Err(e) = write_ppm(Path::new("frame.ppm"), width, height, &buffer) {
        eprintln!("Warning: failed to write frame.ppm: {e}");
    }

    let nvram = machine.save_nvram();
    if !nvram.is_empty()
        && let Err(e) = std::fs::write(&nvram_path, nvram)
    {
        eprintln!("Warning: failed to save NVRAM: {e}");
    }

    println!("Ran {frames} frames on {model_name}, wrote frame.ppm");
}

fn write_ppm(path: &Path, width: u32, height: u32, rgb: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(path)?;
    write!(file, "P6\n{width} {height}\n255\n")?;
    file.write_all(rgb)?;
    Ok(())
}
