//! Frame proxies example - one host proxy and one device proxy share a
//! sequence of frames, then a two-stage pipeline post-processes them

use coexec::prelude::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const FRAMES: usize = 24;
const PIXELS: usize = 4096;

fn render(frame: usize) -> Vec<u8> {
    (0..PIXELS).map(|p| ((p * 7 + frame * 13) % 251) as u8).collect()
}

fn luminance(pixels: &[u8]) -> f64 {
    pixels.iter().map(|&p| p as f64).sum::<f64>() / pixels.len() as f64
}

fn main() -> coexec::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Frame Proxies Example ===\n");

    // Static split: host proxy renders the first quarter
    let config = Config::builder().alpha(0.25).work_groups(1).build()?;
    let device = SimulatedAccelerator::new(infallible(render), 1).with_name("sim-gpu");
    let mut proxies: ProxyExecutor<Vec<u8>, _> = ProxyExecutor::new(&config, FRAMES, device)?;
    let report = proxies.run(&infallible(render))?;
    println!(
        "static: {} frames on host, {} on device in {:?} ({} launches)",
        report.host_tasks,
        report.device_tasks,
        report.elapsed,
        proxies.accelerator().launch_count()
    );

    // Dynamic: both proxies claim from the shared cursor
    let config = Config::builder()
        .dynamic()
        .unified_memory(true)
        .work_groups(1)
        .build()?;
    let device = SimulatedAccelerator::new(infallible(render), 1)
        .with_name("sim-gpu")
        .with_task_delay(Duration::from_micros(200));
    let mut proxies: ProxyExecutor<Vec<u8>, _> = ProxyExecutor::new(&config, FRAMES, device)?;
    let report = proxies.run(&infallible(render))?;
    println!(
        "dynamic: {} frames on host, {} on device in {:?}",
        report.host_tasks, report.device_tasks, report.elapsed
    );
    let frames = proxies.into_results()?;

    // Pipeline: device renders, host measures as each frame is published
    let config = Config::builder().num_threads(2).work_groups(1).build()?;
    let device = SimulatedAccelerator::new(infallible(render), 1).with_name("sim-gpu");
    let mut pipeline: Pipeline<Vec<u8>, f64, _> = Pipeline::new(&config, FRAMES, device)?;
    let report = pipeline.run(&|_frame, pixels: &Vec<u8>| Ok(luminance(pixels)))?;
    println!(
        "pipeline: {} frames completed, {} abandoned in {:?}",
        report.completed, report.abandoned, report.elapsed
    );

    let levels = pipeline.into_results()?;
    for (frame, (pixels, level)) in frames.iter().zip(&levels).enumerate().take(4) {
        println!("frame {:2}: luminance {:.2} ({} px)", frame, level, pixels.len());
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
