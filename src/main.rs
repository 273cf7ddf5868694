use std::env;
use std::fs;
use std::path::PathBuf;

use kw6_reader::Reader;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "Usage: {} <path-to-kw6-file> [--sidecar <HDR_FILE>] [--export <DIR>]",
            args[0]
        );
        std::process::exit(1);
    }

    let kw6_path = &args[1];
    let sidecar_path = flag_value(&args, "--sidecar");
    let export_dir = flag_value(&args, "--export").map(PathBuf::from);

    println!("Reading kw6 file: {}", kw6_path);
    if let Some(ref sidecar) = sidecar_path {
        println!("Using sidecar index: {}", sidecar);
    }
    println!("{}", "=".repeat(60));

    let reader = match sidecar_path {
        Some(sidecar) => Reader::open_with_sidecar(kw6_path, sidecar),
        None => Reader::open(kw6_path),
    };
    let mut reader = match reader {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("\nERROR: Failed to open kw6 file");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    println!("\nFile Information:");
    println!("  Version: {}", reader.header.version_string);

    let count = match reader.num_positions() {
        Ok(count) => count,
        Err(e) => {
            eprintln!("\nERROR: Failed to scan positions");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };
    println!("  Positions: {}", count);

    println!("\nSample Positions (first 10):");
    for i in 0..count.min(10) {
        match reader.get(i as i64) {
            Ok(position) => {
                let dims: Vec<String> = position
                    .cameras
                    .iter()
                    .map(|c| format!("{}x{}", c.image.width(), c.image.height()))
                    .collect();
                println!(
                    "  {}. frame {} at t={}: {} cameras [{}]",
                    i + 1,
                    position.header.frame_index,
                    position.header.time,
                    position.cameras.len(),
                    dims.join(", ")
                );
            }
            Err(e) => {
                eprintln!("\nERROR: Failed to decode position {}", i);
                eprintln!("  {}", e);
                std::process::exit(1);
            }
        }
    }
    if count > 10 {
        println!("  ... and {} more", count - 10);
    }

    if let Some(dir) = export_dir {
        if let Err(e) = fs::create_dir_all(&dir) {
            eprintln!("\nERROR: Cannot create export directory {}", dir.display());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
        println!("\nExporting images to {}", dir.display());
        let mut exported = 0usize;
        for result in reader.iter_positions() {
            let position = match result {
                Ok(position) => position,
                Err(e) => {
                    eprintln!("\nERROR: Failed while exporting");
                    eprintln!("  {}", e);
                    std::process::exit(1);
                }
            };
            for camera in &position.cameras {
                let name = format!(
                    "{}_{}.png",
                    position.header.frame_index, camera.header.camera_index
                );
                if let Err(e) = camera.image.save(dir.join(&name)) {
                    eprintln!("\nERROR: Failed to write {}", name);
                    eprintln!("  {}", e);
                    std::process::exit(1);
                }
                exported += 1;
            }
        }
        println!("Exported {} images.", exported);
    }

    println!("\n{}", "=".repeat(60));
    println!("SUCCESS! Reading completed.");
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let idx = args.iter().position(|arg| arg == flag)?;
    match args.get(idx + 1) {
        Some(value) => Some(value.clone()),
        None => {
            eprintln!("ERROR: {} flag requires an argument.", flag);
            std::process::exit(1);
        }
    }
}
