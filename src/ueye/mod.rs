/*!
IDS uEye industrial cameras.

The driver talks to the SDK through the [`UEyeApi`] trait. [`SimulatedUEye`] implements it
in memory and is what [`UEyeCamera::default`] uses.
*/

mod api;
pub use api::{
    CameraHandle, NO_SUCCESS_DRIVER_CODE, Range, RawFrame, SensorInfo, TriggerMode, UEyeApi, UEyeStatus,
};

mod simulator;
pub use simulator::SimulatedUEye;

use crate::api::channel::names;
use crate::api::{ChannelDescriptor, Constraint, ImageData};
use crate::management::CameraType;
use crate::{CameraError, CameraErrorCode, CameraResult};
use async_trait::async_trait;
use ndarray::{Array2, Array3};
use std::borrow::Cow;
use std::time::Duration;

const CAPTURE_TIMEOUT: Duration = Duration::from_secs(1);

/// IDS uEye camera.
#[derive(Debug)]
pub struct UEyeCamera {
    api: Box<dyn UEyeApi>,
    device_id: u32,
    handle: Option<CameraHandle>,
    sensor: Option<SensorInfo>,
    serial: Option<String>,
    frame: Option<RawFrame>,
}

impl Default for UEyeCamera {
    fn default() -> Self {
        Self::with_api(SimulatedUEye::default())
    }
}

impl CameraType for UEyeCamera {
    const NAME: &'static str = "UEye";
}

fn open_identity(
    api: &dyn UEyeApi,
    handle: CameraHandle,
) -> Result<(SensorInfo, String), UEyeStatus> {
    Ok((api.sensor_info(handle)?, api.serial_number(handle)?))
}

fn image_error(err: ndarray::ShapeError) -> CameraError {
    CameraError::invalid_operation(format_args!("Frame does not match its dimensions: {err}"))
}

impl UEyeCamera {
    /// Camera backed by the given SDK implementation.
    pub fn with_api(api: impl UEyeApi + 'static) -> Self {
        Self {
            api: Box::new(api),
            device_id: 0,
            handle: None,
            sensor: None,
            serial: None,
            frame: None,
        }
    }

    fn handle(&self) -> CameraResult<CameraHandle> {
        self.handle.ok_or(CameraError::NOT_CONNECTED)
    }

    fn is_color(&self) -> bool {
        self.sensor.as_ref().is_some_and(|sensor| sensor.color)
    }

    const fn device_id(&self) -> CameraResult<u32> {
        Ok(self.device_id)
    }

    const fn set_device_id(&mut self, device_id: u32) -> CameraResult {
        self.device_id = device_id;
        Ok(())
    }

    fn serial(&self) -> CameraResult<String> {
        self.serial.clone().ok_or(CameraError::NOT_CONNECTED)
    }

    fn exposure(&self) -> CameraResult<f64> {
        Ok(self.api.exposure(self.handle()?)?)
    }

    fn set_exposure(&mut self, exposure: f64) -> CameraResult {
        let actual = self.api.set_exposure(self.handle()?, exposure)?;
        tracing::debug!(requested = exposure, actual, "Exposure set");
        Ok(())
    }

    fn exposure_range(&self) -> Constraint {
        self.range_constraint(|api, handle| api.exposure_range(handle))
    }

    fn auto_exposure(&self) -> CameraResult<bool> {
        Ok(self.api.auto_shutter(self.handle()?)?)
    }

    fn set_auto_exposure(&mut self, enable: bool) -> CameraResult {
        Ok(self.api.set_auto_shutter(self.handle()?, enable)?)
    }

    fn gain(&self) -> CameraResult<u32> {
        Ok(self.api.master_gain(self.handle()?)?)
    }

    fn set_gain(&mut self, gain: u32) -> CameraResult {
        Ok(self.api.set_master_gain(self.handle()?, gain)?)
    }

    fn gain_range(&self) -> Constraint {
        Constraint::range(0_u32, 100)
    }

    fn auto_gain(&self) -> CameraResult<bool> {
        Ok(self.api.auto_gain(self.handle()?)?)
    }

    fn set_auto_gain(&mut self, enable: bool) -> CameraResult {
        Ok(self.api.set_auto_gain(self.handle()?, enable)?)
    }

    fn frame_rate(&self) -> CameraResult<f64> {
        Ok(self.api.frame_rate(self.handle()?)?)
    }

    fn set_frame_rate(&mut self, fps: f64) -> CameraResult {
        let actual = self.api.set_frame_rate(self.handle()?, fps)?;
        tracing::debug!(requested = fps, actual, "Frame rate set");
        Ok(())
    }

    fn frame_rate_range(&self) -> Constraint {
        self.range_constraint(|api, handle| api.frame_rate_range(handle))
    }

    fn pixel_clock(&self) -> CameraResult<u32> {
        Ok(self.api.pixel_clock(self.handle()?)?)
    }

    fn set_pixel_clock(&mut self, clock: u32) -> CameraResult {
        Ok(self.api.set_pixel_clock(self.handle()?, clock)?)
    }

    fn pixel_clocks(&self) -> Constraint {
        let Some(handle) = self.handle else {
            return Constraint::Free;
        };
        match self.api.pixel_clock_list(handle) {
            Ok(clocks) => Constraint::list(clocks),
            Err(status) => {
                tracing::warn!(%status, "Failed to query pixel clocks");
                Constraint::Free
            }
        }
    }

    fn trigger_mode(&self) -> CameraResult<TriggerMode> {
        Ok(self.api.trigger_mode(self.handle()?)?)
    }

    fn set_trigger_mode(&mut self, mode: TriggerMode) -> CameraResult {
        Ok(self.api.set_trigger_mode(self.handle()?, mode)?)
    }

    fn trigger_modes(&self) -> Constraint {
        Constraint::variants::<TriggerMode>()
    }

    // Ranges can only be queried from an open camera; while closed nothing is writable anyway.
    fn range_constraint(
        &self,
        query: impl FnOnce(&dyn UEyeApi, CameraHandle) -> Result<Range, UEyeStatus>,
    ) -> Constraint {
        let Some(handle) = self.handle else {
            return Constraint::Free;
        };
        match query(&*self.api, handle) {
            Ok(range) => Constraint::range(range.min, range.max),
            Err(status) => {
                tracing::warn!(%status, "Failed to query value range");
                Constraint::Free
            }
        }
    }

    fn intensity(frame: &RawFrame) -> CameraResult<Array2<u8>> {
        let shape = (frame.height, frame.width);
        if frame.bytes_per_pixel == 1 {
            return Array2::from_shape_vec(shape, frame.data.clone()).map_err(image_error);
        }
        let rgb = Self::color(frame)?;
        Ok(Array2::from_shape_fn(shape, |(y, x)| {
            let sum: u16 = (0..3).map(|plane| u16::from(rgb[[y, x, plane]])).sum();
            u8::try_from(sum / 3).unwrap_or(u8::MAX)
        }))
    }

    fn color(frame: &RawFrame) -> CameraResult<Array3<u8>> {
        if frame.bytes_per_pixel != 3 {
            return Err(CameraError::invalid_operation(
                "Frame has no colour information",
            ));
        }
        Array3::from_shape_vec((frame.height, frame.width, 3), frame.data.clone())
            .map_err(image_error)
    }
}

crate::camera_params! {
    impl Parameters for UEyeCamera {
        /// Id of the camera to open; `0` opens the first available one.
        "DeviceId": u32 => device_id / set_device_id {
            read: Always,
            write: Disconnected,
        }
        /// Serial number of the opened camera.
        "SerialNumber": String => serial {
            read: Connected,
            write: Never,
        }
        /// Exposure time.
        "Exposure": f64 => exposure / set_exposure {
            read: Connected,
            write: Connected,
            unit: Milliseconds,
            constraint: exposure_range,
        }
        /// Automatic exposure control.
        "AutoExposure": bool => auto_exposure / set_auto_exposure {
            read: Connected,
            write: Connected,
        }
        /// Master gain.
        "Gain": u32 => gain / set_gain {
            read: Connected,
            write: Connected,
            unit: Percent,
            constraint: gain_range,
        }
        /// Automatic gain control.
        "AutoGain": bool => auto_gain / set_auto_gain {
            read: Connected,
            write: Connected,
        }
        /// Frame rate in free-running mode.
        "FrameRate": f64 => frame_rate / set_frame_rate {
            read: Connected,
            write: Connected,
            unit: Hertz,
            constraint: frame_rate_range,
        }
        /// Sensor pixel clock.
        "PixelClock": u32 => pixel_clock / set_pixel_clock {
            read: Connected,
            write: Connected,
            unit: Megahertz,
            constraint: pixel_clocks,
        }
        /// Frame trigger source.
        "TriggerMode": TriggerMode => trigger_mode / set_trigger_mode {
            read: Connected,
            write: Connected,
            constraint: trigger_modes,
        }
    }
}

#[async_trait]
impl crate::api::CameraDriver for UEyeCamera {
    fn vendor(&self) -> &str {
        "IDS"
    }

    fn model(&self) -> &str {
        self.sensor
            .as_ref()
            .map_or("uEye", |sensor| sensor.name.as_str())
    }

    fn serial_number(&self) -> Option<String> {
        self.serial.clone()
    }

    fn channels(&self) -> Vec<Cow<'static, str>> {
        let mut channels = vec![Cow::Borrowed(names::INTENSITY)];
        if self.is_color() {
            channels.push(Cow::Borrowed(names::COLOR));
        }
        channels
    }

    fn default_channels(&self) -> Vec<Cow<'static, str>> {
        vec![Cow::Borrowed(if self.is_color() {
            names::COLOR
        } else {
            names::INTENSITY
        })]
    }

    #[tracing::instrument(skip(self), fields(device_id = self.device_id), err)]
    async fn connect(&mut self) -> CameraResult {
        let handle = self.api.init_camera(self.device_id)?;
        let (sensor, serial) = match open_identity(&*self.api, handle) {
            Ok(identity) => identity,
            Err(status) => {
                if let Err(exit_status) = self.api.exit_camera(handle) {
                    tracing::warn!(%exit_status, "Failed to close camera after a failed open");
                }
                return Err(status.into());
            }
        };
        tracing::info!(sensor = %sensor.name, color = sensor.color, %serial, "uEye camera opened");
        self.handle = Some(handle);
        self.sensor = Some(sensor);
        self.serial = Some(serial);
        Ok(())
    }

    async fn disconnect(&mut self) -> CameraResult {
        self.api.exit_camera(self.handle()?)?;
        self.handle = None;
        self.serial = None;
        self.frame = None;
        Ok(())
    }

    async fn update(&mut self) -> CameraResult {
        let handle = self.handle()?;
        if self.api.trigger_mode(handle)? == TriggerMode::Software {
            self.api.force_trigger(handle)?;
        }
        self.frame = Some(self.api.capture(handle, CAPTURE_TIMEOUT)?);
        Ok(())
    }

    fn calc_channel(&mut self, channel: &ChannelDescriptor) -> CameraResult<ImageData> {
        let frame = self.frame.as_ref().ok_or_else(|| {
            CameraError::new(
                CameraErrorCode::VALUE_NOT_SET,
                "No frame has been captured yet",
            )
        })?;
        match &*channel.name {
            names::INTENSITY => Self::intensity(frame).map(ImageData::Byte),
            names::COLOR => Self::color(frame).map(ImageData::Color),
            other => Err(CameraError::unknown_channel(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Camera, ParamDesc, Unit};
    use crate::params::ParamValue;

    fn mono_sensor() -> SensorInfo {
        SensorInfo {
            name: "UI-1007XS-M".to_owned(),
            max_width: 6,
            max_height: 4,
            color: false,
        }
    }

    fn color_sensor() -> SensorInfo {
        SensorInfo {
            name: "UI-1240LE-C".to_owned(),
            max_width: 6,
            max_height: 4,
            color: true,
        }
    }

    async fn connected(sensor: SensorInfo) -> eyre::Result<Camera> {
        let mut camera = Camera::new(UEyeCamera::with_api(SimulatedUEye::new(sensor, "4711")));
        camera.connect().await?;
        Ok(camera)
    }

    #[tokio::test]
    async fn color_sensors_provide_both_channels() -> eyre::Result<()> {
        let mut camera = connected(color_sensor()).await?;
        assert_eq!(camera.name(), "IDS UI-1240LE-C");
        assert_eq!(camera.serial_number().as_deref(), Some("4711"));
        assert_eq!(camera.channels().len(), 2);
        assert_eq!(
            camera.selected_channel().map(|channel| &*channel.name),
            Some(names::COLOR)
        );

        camera.activate_channel(names::INTENSITY).await?;
        camera.update().await?;
        let color = camera.calc_channel(names::COLOR)?;
        let intensity = camera.calc_channel(names::INTENSITY)?;
        let (ImageData::Color(rgb), ImageData::Byte(mono)) = (&color.data, &intensity.data) else {
            panic!("unexpected image types");
        };
        assert_eq!(rgb.dim(), (4, 6, 3));
        for ((y, x), &value) in mono.indexed_iter() {
            let sum: u16 = (0..3).map(|plane| u16::from(rgb[[y, x, plane]])).sum();
            assert_eq!(u16::from(value), sum / 3);
        }
        Ok(())
    }

    #[tokio::test]
    async fn mono_sensors_only_provide_intensity() -> eyre::Result<()> {
        let mut camera = connected(mono_sensor()).await?;
        assert_eq!(camera.channels().len(), 1);
        assert!(camera.is_channel_active(names::INTENSITY));
        assert_eq!(
            camera.activate_channel(names::COLOR).await.map_err(|err| err.code),
            Err(CameraErrorCode::CHANNEL_NOT_SUPPORTED)
        );
        assert_eq!(
            camera.calc_channel(names::INTENSITY).map(|_| ()).map_err(|err| err.code),
            Err(CameraErrorCode::VALUE_NOT_SET)
        );
        camera.update().await?;
        assert_eq!(camera.calc_channel(names::INTENSITY)?.size(), (6, 4));
        Ok(())
    }

    #[tokio::test]
    async fn parameters_follow_the_sdk_ranges() -> eyre::Result<()> {
        let mut camera = connected(mono_sensor()).await?;
        let exposure = camera.parameter("Exposure")?;
        assert_eq!(exposure.unit, Some(Unit::Milliseconds));
        assert_eq!(exposure.range().map(|(_, max)| max.clone()), Some(ParamValue::Float(50.0)));

        // Constraints are checked against the state before the call.
        assert_eq!(
            camera
                .set_parameters([("FrameRate", 10), ("Exposure", 80)])
                .map_err(|err| err.code),
            Err(CameraErrorCode::INVALID_VALUE)
        );
        camera.set_parameter("FrameRate", 10)?;
        camera.set_parameter("Exposure", 80)?;
        assert_eq!(camera.parameter_value::<f64>("Exposure")?, 80.0);
        assert_eq!(
            camera.set_parameter("Exposure", 120).map_err(|err| err.code),
            Err(CameraErrorCode::INVALID_VALUE)
        );

        assert_eq!(
            camera.parameter("PixelClock")?.allowed_values().map(<[_]>::len),
            Some(6)
        );
        assert_eq!(
            camera.set_parameter("PixelClock", 41).map_err(|err| err.code),
            Err(CameraErrorCode::INVALID_VALUE)
        );
        camera.set_parameter("PixelClock", "86")?;
        assert_eq!(camera.parameter_value::<u32>("PixelClock")?, 86);

        assert_eq!(
            camera.set_parameter("Gain", 101).map_err(|err| err.code),
            Err(CameraErrorCode::INVALID_VALUE)
        );
        camera.set_parameter("Gain", 100)?;
        Ok(())
    }

    #[tokio::test]
    async fn auto_exposure_locks_exposure() -> eyre::Result<()> {
        let mut camera = connected(mono_sensor()).await?;
        camera.set_parameter("AutoExposure", "true")?;
        assert!(!camera.parameter("Exposure")?.writable);
        camera.set_parameters([("Exposure", ParamValue::from(5)), ("AutoExposure", false.into())])?;
        assert_eq!(camera.parameter_value::<f64>("Exposure")?, 5.0);
        Ok(())
    }

    #[tokio::test]
    async fn software_trigger_is_sent_on_update() -> eyre::Result<()> {
        let mut camera = connected(mono_sensor()).await?;
        camera.set_parameter("TriggerMode", "software")?;
        assert_eq!(
            camera.parameter_value::<TriggerMode>("TriggerMode")?,
            TriggerMode::Software
        );
        camera.update().await?;
        camera.update().await?;
        assert_eq!(camera.frame_number(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn device_id_is_only_writable_while_disconnected() -> eyre::Result<()> {
        let sdk = SimulatedUEye::new(mono_sensor(), "4711").with_device_id(3);
        let mut camera = Camera::new(UEyeCamera::with_api(sdk));

        let serial: ParamDesc = camera.parameter("SerialNumber")?;
        assert!(!serial.readable);
        camera.set_parameter("DeviceId", 2)?;
        assert_eq!(
            camera.connect().await.map_err(|err| err.code),
            Err(CameraErrorCode::CONNECTION_FAILED)
        );
        camera.set_parameter("DeviceId", 3)?;
        camera.connect().await?;
        assert_eq!(camera.parameter("SerialNumber")?.value_as_string(), "4711");
        assert_eq!(
            camera.set_parameter("DeviceId", 0).map_err(|err| err.code),
            Err(CameraErrorCode::PARAMETER_NOT_WRITABLE)
        );
        Ok(())
    }

    #[tokio::test]
    async fn sdk_failures_surface_as_driver_errors() -> eyre::Result<()> {
        let sdk = SimulatedUEye::new(mono_sensor(), "4711")
            .with_failure("capture", UEyeStatus::TimedOut)
            .with_failure("serial_number", UEyeStatus::IoRequestFailed);
        let mut camera = Camera::new(UEyeCamera::with_api(sdk));
        let err = camera.connect().await.expect_err("serial number query fails");
        assert_eq!(err.code.as_driver_error(), Ok(2));
        assert!(!camera.is_connected());

        let sdk = SimulatedUEye::new(mono_sensor(), "4711")
            .with_failure("capture", UEyeStatus::TimedOut);
        let mut camera = Camera::new(UEyeCamera::with_api(sdk));
        camera.connect().await?;
        let err = camera.update().await.expect_err("capture times out");
        assert_eq!(err.code.as_driver_error(), Ok(122));
        assert_eq!(camera.frame_number(), 0);
        Ok(())
    }
}
