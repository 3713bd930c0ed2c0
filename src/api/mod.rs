/*!
Camera abstraction.

A [`Camera`] wraps a device-specific [`CameraDriver`] and owns everything that is the same for all
devices: connection state, the list of active channels, frame bookkeeping, calibration lookup and
validated access to the driver's parameters.

## Parameters
Each driver exposes its settings as a table of named, typed parameters (see
[`camera_params!`](crate::camera_params)). A parameter's [`ParamDesc`] tells whether it can be read
or written in the current connection state, in which unit it is measured and which values it
accepts. Values are converted and checked against the descriptor before they reach the driver.

Parameters named `AutoX` with a boolean value control whether `X` is adjusted automatically by the
device. While `AutoX` is on, `X` can't be written.

## Channels
A channel is a named data stream such as `Intensity` or `ZImage`; see [`channel::names`]. Channel
names map to image layouts through the [`ChannelRegistry`].
*/

#[macro_use]
mod macros;

mod calibration;
pub use calibration::{Extrinsics, Intrinsics};

mod camera;
pub use camera::{Camera, CameraDriver, Parameters};

pub mod channel;
pub use channel::{ChannelDescriptor, ChannelRegistry, ImageType};

mod image;
pub use image::{CameraImage, ImageData};

mod param_desc;
pub use param_desc::{AccessState, Constraint, ParamDesc, Unit};
