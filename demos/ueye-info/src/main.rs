//! Lists the parameters and channels of the bundled uEye cameras and grabs a few frames.
//!
//! Pass the path of an engine config (JSON) to run its cameras instead of a single default one.

use metricam::api::channel::names;
use metricam::{CameraConfig, CameraManagement, Engine, EngineConfig};

const FRAMES: usize = 3;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig {
            cameras: vec![CameraConfig::new("UEye")],
        },
    };

    let management = CameraManagement::with_builtin();
    println!("Camera types: {:?}", management.available_types());

    let mut engine = Engine::from_config(&management, &config)?;
    for result in engine.connect_all().await {
        result?;
    }

    for camera in engine.cameras() {
        println!(
            "{} (serial {})",
            camera.name(),
            camera.serial_number().unwrap_or_default()
        );
        for param in camera.parameters() {
            let access = match (param.readable, param.writable) {
                (true, true) => "rw",
                (true, false) => "r-",
                (false, true) => "-w",
                (false, false) => "--",
            };
            println!("  {access} {param}");
        }
        let channels = camera
            .channels()
            .into_iter()
            .map(|channel| format!("{} ({})", channel.name, channel.image_type))
            .collect::<Vec<_>>();
        println!("  channels: {}", channels.join(", "));
    }

    let mut frames = engine.subscribe();
    for _ in 0..FRAMES {
        for result in engine.update_all().await {
            result?;
        }
        while let Ok(event) = frames.try_recv() {
            tracing::info!(camera = event.camera, frame = event.frame_number, "Frame acquired");
        }
        for channel in [names::COLOR, names::INTENSITY] {
            for (index, image) in engine.frames(channel) {
                let (width, height) = image.size();
                println!(
                    "camera {index}: {channel} {width}x{height} frame #{}",
                    image.frame_number
                );
            }
        }
    }

    for result in engine.disconnect_all().await {
        result?;
    }
    Ok(())
}
