//! Call surface of the uEye SDK used by [`UEyeCamera`](super::UEyeCamera).

use crate::{CameraError, CameraErrorCode};
use macro_rules_attribute::apply;
use std::fmt::Debug;
use std::time::Duration;

/// Non-success status code of an SDK call.
#[expect(missing_docs)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    num_enum::TryFromPrimitive,
    num_enum::IntoPrimitive,
    thiserror::Error,
)]
#[repr(i32)]
pub enum UEyeStatus {
    #[error("Unspecified SDK failure")]
    NoSuccess = -1,
    #[error("Invalid camera handle")]
    InvalidCameraHandle = 1,
    #[error("I/O request to the driver failed")]
    IoRequestFailed = 2,
    #[error("Camera could not be opened")]
    CantOpenDevice = 3,
    #[error("Timed out waiting for a frame")]
    TimedOut = 122,
    #[error("Invalid parameter")]
    InvalidParameter = 125,
    #[error("Function is not supported by this camera")]
    NotSupported = 155,
}

impl UEyeStatus {
    /// Status of the SDK's `IS_SUCCESS` convention: `0` is success, anything else a failure.
    pub fn check(raw: i32) -> Result<(), Self> {
        if raw == 0 {
            return Ok(());
        }
        Err(Self::try_from(raw).unwrap_or_else(|_| {
            tracing::warn!(raw, "Unknown uEye status code");
            Self::NoSuccess
        }))
    }
}

/// Driver code of [`UEyeStatus::NoSuccess`]; the other statuses keep their positive SDK value.
pub const NO_SUCCESS_DRIVER_CODE: u16 = 0x0FF;

impl From<UEyeStatus> for CameraError {
    fn from(status: UEyeStatus) -> Self {
        let raw = i32::from(status);
        let code = match status {
            UEyeStatus::CantOpenDevice => CameraErrorCode::CONNECTION_FAILED,
            UEyeStatus::InvalidParameter => CameraErrorCode::INVALID_VALUE,
            UEyeStatus::NotSupported => CameraErrorCode::NOT_IMPLEMENTED,
            UEyeStatus::NoSuccess => CameraErrorCode::new_for_driver(NO_SUCCESS_DRIVER_CODE),
            UEyeStatus::InvalidCameraHandle => CameraErrorCode::new_for_driver(1),
            UEyeStatus::IoRequestFailed => CameraErrorCode::new_for_driver(2),
            UEyeStatus::TimedOut => CameraErrorCode::new_for_driver(122),
        };
        Self::new(code, format_args!("uEye status {raw}: {status}"))
    }
}

/// Handle of an opened camera (`HIDS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraHandle(pub u32);

/// Static information about the sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorInfo {
    /// Sensor model name, e.g. `UI-1240LE-C`.
    pub name: String,
    /// Full sensor width in pixels.
    pub max_width: usize,
    /// Full sensor height in pixels.
    pub max_height: usize,
    /// Whether the sensor has a Bayer filter.
    pub color: bool,
}

/// Inclusive value range with step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Step between valid values.
    pub increment: f64,
}

/// Frame trigger source.
#[apply(crate::param_enum)]
pub enum TriggerMode {
    /// Continuous acquisition.
    Freerun,
    /// Each frame is triggered by the host.
    Software,
    /// External trigger on the rising edge.
    HardwareRising,
    /// External trigger on the falling edge.
    HardwareFalling,
}

/// A captured frame as delivered by the SDK: tightly packed rows of 8-bit mono or RGB pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// `1` for mono, `3` for RGB.
    pub bytes_per_pixel: usize,
    /// Pixel bytes.
    pub data: Vec<u8>,
}

/// uEye SDK functions needed to run a camera.
///
/// Exposure times are in milliseconds, frame rates in frames per second, pixel clocks in MHz and
/// the master gain in percent.
#[expect(missing_docs)]
pub trait UEyeApi: Debug + Send + Sync {
    fn init_camera(&mut self, device_id: u32) -> Result<CameraHandle, UEyeStatus>;
    fn exit_camera(&mut self, handle: CameraHandle) -> Result<(), UEyeStatus>;

    fn sensor_info(&self, handle: CameraHandle) -> Result<SensorInfo, UEyeStatus>;
    fn serial_number(&self, handle: CameraHandle) -> Result<String, UEyeStatus>;

    fn exposure(&self, handle: CameraHandle) -> Result<f64, UEyeStatus>;
    /// Returns the exposure time actually set.
    fn set_exposure(&mut self, handle: CameraHandle, exposure: f64) -> Result<f64, UEyeStatus>;
    /// Depends on the current frame rate.
    fn exposure_range(&self, handle: CameraHandle) -> Result<Range, UEyeStatus>;
    fn auto_shutter(&self, handle: CameraHandle) -> Result<bool, UEyeStatus>;
    fn set_auto_shutter(&mut self, handle: CameraHandle, enable: bool) -> Result<(), UEyeStatus>;

    fn master_gain(&self, handle: CameraHandle) -> Result<u32, UEyeStatus>;
    fn set_master_gain(&mut self, handle: CameraHandle, gain: u32) -> Result<(), UEyeStatus>;
    fn auto_gain(&self, handle: CameraHandle) -> Result<bool, UEyeStatus>;
    fn set_auto_gain(&mut self, handle: CameraHandle, enable: bool) -> Result<(), UEyeStatus>;

    fn pixel_clock(&self, handle: CameraHandle) -> Result<u32, UEyeStatus>;
    fn set_pixel_clock(&mut self, handle: CameraHandle, clock: u32) -> Result<(), UEyeStatus>;
    fn pixel_clock_list(&self, handle: CameraHandle) -> Result<Vec<u32>, UEyeStatus>;

    fn frame_rate(&self, handle: CameraHandle) -> Result<f64, UEyeStatus>;
    /// Returns the frame rate actually set.
    fn set_frame_rate(&mut self, handle: CameraHandle, fps: f64) -> Result<f64, UEyeStatus>;
    /// Depends on the current pixel clock.
    fn frame_rate_range(&self, handle: CameraHandle) -> Result<Range, UEyeStatus>;

    fn trigger_mode(&self, handle: CameraHandle) -> Result<TriggerMode, UEyeStatus>;
    fn set_trigger_mode(&mut self, handle: CameraHandle, mode: TriggerMode)
    -> Result<(), UEyeStatus>;
    fn force_trigger(&mut self, handle: CameraHandle) -> Result<(), UEyeStatus>;

    /// Wait for the next frame.
    fn capture(&mut self, handle: CameraHandle, timeout: Duration)
    -> Result<RawFrame, UEyeStatus>;
}
