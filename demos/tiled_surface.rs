//! Tiled surface example - splits a grid of tiles between the host pool and
//! a simulated accelerator, then checks the merged surface

use coexec::prelude::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const WIDTH: usize = 256;
const HEIGHT: usize = 256;
const TILE: usize = 16;

/// Sum of a toy height field over one tile.
fn shade_tile(tile: usize) -> f64 {
    let tiles_x = WIDTH / TILE;
    let (tx, ty) = (tile % tiles_x, tile / tiles_x);
    let mut acc = 0.0;
    for y in ty * TILE..(ty + 1) * TILE {
        for x in tx * TILE..(tx + 1) * TILE {
            let (fx, fy) = (x as f64 / WIDTH as f64, y as f64 / HEIGHT as f64);
            acc += (fx * 12.0).sin() * (fy * 9.0).cos();
        }
    }
    acc
}

fn main() -> coexec::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Tiled Surface Example ===\n");

    let n_tiles = (WIDTH / TILE) * (HEIGHT / TILE);
    let alpha = std::env::args()
        .nth(1)
        .and_then(|a| a.parse::<f64>().ok())
        .unwrap_or(0.4);

    let config = Config::builder()
        .alpha(alpha)
        .warmup(2)
        .reps(10)
        .work_groups(4)
        .build()?;
    println!(
        "{} tiles, alpha {} ({:?}), {} host threads",
        n_tiles,
        config.alpha,
        config.strategy(),
        config.host_threads()
    );

    let device = SimulatedAccelerator::new(infallible(shade_tile), 4)
        .with_name("sim-gpu")
        .with_task_delay(Duration::from_micros(20));
    let mut exec: CoExecutor<f64, _> = CoExecutor::new(config, n_tiles, device)?;

    let report = exec.run_and_verify(
        &infallible(shade_tile),
        &|surface: &ResultBuffer<f64>| -> std::result::Result<(), String> {
            for (tile, value) in surface.iter().enumerate() {
                let expected = shade_tile(tile);
                match value {
                    Some(v) if (v - expected).abs() < 1e-9 => {}
                    other => {
                        return Err(format!("tile {}: got {:?}, want {}", tile, other, expected))
                    }
                }
            }
            Ok(())
        },
    )?;

    println!(
        "Last iteration: {} tiles on host, {} on device, {:?}",
        report.last.host_tasks(),
        report.last.device_tasks(),
        report.last.elapsed
    );
    if let Some(merge) = report.last.merge {
        println!("Merged {} device tiles", merge.copied);
    }

    #[cfg(feature = "telemetry")]
    {
        println!("\n--- Run Metrics ---");
        let exporter = ConsoleExporter::new(true);
        exporter.export(&report.metrics)?;
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
