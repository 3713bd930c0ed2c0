/*!
Vendor-neutral camera abstraction.

Cameras are driven through one API regardless of their vendor: connect, acquire frames, compute
images for named channels and read or write device settings through typed, validated
[parameter descriptors](api::ParamDesc).

```no_run
# async fn run() -> eyre::Result<()> {
use metricam::CameraManagement;
use metricam::api::channel::names;

let management = CameraManagement::with_builtin();
let mut camera = management.create("UEye")?;
camera.connect().await?;
camera.set_parameters([("AutoExposure", "false"), ("Exposure", "12.5")])?;
camera.update().await?;
let image = camera.calc_channel(names::INTENSITY)?;
println!("{}x{} frame #{}", image.size().0, image.size().1, image.frame_number);
# Ok(())
# }
```

## Crate features
- `ueye`: the IDS uEye driver with a simulated SDK backend (enabled by default).
*/

pub mod api;
pub mod config;
pub mod engine;
mod errors;
pub mod management;
pub mod params;
#[cfg(test)]
mod test_utils;
#[cfg(feature = "ueye")]
pub mod ueye;

pub use config::{CameraConfig, EngineConfig};
pub use engine::Engine;
pub use errors::{CameraError, CameraErrorCode, CameraResult};
pub use management::CameraManagement;
