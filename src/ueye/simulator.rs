use super::api::{CameraHandle, Range, RawFrame, SensorInfo, TriggerMode, UEyeApi, UEyeStatus};
use fnv::FnvHashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

const PIXEL_CLOCKS: &[u32] = &[5, 10, 20, 30, 40, 86];
const MIN_EXPOSURE: f64 = 0.05;
const EXPOSURE_INCREMENT: f64 = 0.01;
const MIN_FRAME_RATE: f64 = 0.5;

/// In-memory stand-in for the uEye SDK with a single attached camera.
///
/// Frames are a gradient that moves with every capture plus a little seeded noise, so runs are
/// reproducible. Any SDK call can be made to fail with [`SimulatedUEye::with_failure`].
#[derive(Debug)]
pub struct SimulatedUEye {
    sensor: SensorInfo,
    serial: String,
    device_id: u32,
    handle: Option<CameraHandle>,
    exposure: f64,
    auto_shutter: bool,
    gain: u32,
    auto_gain: bool,
    pixel_clock: u32,
    frame_rate: f64,
    trigger_mode: TriggerMode,
    triggered: bool,
    frames: u64,
    rng: StdRng,
    failures: FnvHashMap<&'static str, i32>,
}

impl Default for SimulatedUEye {
    fn default() -> Self {
        Self::new(
            SensorInfo {
                name: "UI-1240LE-C".to_owned(),
                max_width: 1280,
                max_height: 1024,
                color: true,
            },
            "4102785033",
        )
    }
}

impl SimulatedUEye {
    /// Simulate a camera with the given sensor and serial number, attached as device `1`.
    pub fn new(sensor: SensorInfo, serial: impl Into<String>) -> Self {
        let serial = serial.into();
        let seed = serial.bytes().fold(0_u64, |seed, byte| {
            seed.wrapping_mul(31).wrapping_add(u64::from(byte))
        });
        Self {
            sensor,
            serial,
            device_id: 1,
            handle: None,
            exposure: 10.0,
            auto_shutter: false,
            gain: 0,
            auto_gain: false,
            pixel_clock: 40,
            frame_rate: 20.0,
            trigger_mode: TriggerMode::Freerun,
            triggered: false,
            frames: 0,
            rng: StdRng::seed_from_u64(seed),
            failures: FnvHashMap::default(),
        }
    }

    /// Attach the camera under another device id. Device id `0` opens the first camera.
    pub const fn with_device_id(mut self, device_id: u32) -> Self {
        self.device_id = device_id;
        self
    }

    /// Make the named SDK call (e.g. `"capture"`) fail with the given status.
    pub fn with_failure(mut self, call: &'static str, status: UEyeStatus) -> Self {
        _ = self.failures.insert(call, status.into());
        self
    }

    fn call(&self, name: &'static str, handle: Option<CameraHandle>) -> Result<(), UEyeStatus> {
        UEyeStatus::check(self.failures.get(name).copied().unwrap_or_default())?;
        match handle {
            Some(handle) if self.handle != Some(handle) => Err(UEyeStatus::InvalidCameraHandle),
            _ => Ok(()),
        }
    }

    fn frame_rate_range_for(pixel_clock: u32) -> Range {
        Range {
            min: MIN_FRAME_RATE,
            max: f64::from(pixel_clock) / 2.0,
            increment: 0.1,
        }
    }

    fn exposure_range_for(frame_rate: f64) -> Range {
        Range {
            min: MIN_EXPOSURE,
            max: 1000.0 / frame_rate,
            increment: EXPOSURE_INCREMENT,
        }
    }

    #[expect(clippy::as_conversions, clippy::cast_possible_truncation)]
    fn render(&mut self) -> RawFrame {
        let (width, height) = (self.sensor.max_width, self.sensor.max_height);
        let bytes_per_pixel = if self.sensor.color { 3 } else { 1 };
        let shift = self.frames as usize;
        let mut data = Vec::with_capacity(width * height * bytes_per_pixel);
        for y in 0..height {
            for x in 0..width {
                let base = (x + y + shift) as u8;
                let noise = self.rng.random_range(0..4_u8);
                data.push(base.wrapping_add(noise));
                if bytes_per_pixel == 3 {
                    data.push((x + shift) as u8);
                    data.push((y + shift) as u8);
                }
            }
        }
        RawFrame {
            width,
            height,
            bytes_per_pixel,
            data,
        }
    }
}

impl UEyeApi for SimulatedUEye {
    fn init_camera(&mut self, device_id: u32) -> Result<CameraHandle, UEyeStatus> {
        self.call("init_camera", None)?;
        if self.handle.is_some() || (device_id != 0 && device_id != self.device_id) {
            return Err(UEyeStatus::CantOpenDevice);
        }
        let handle = CameraHandle(self.device_id);
        self.handle = Some(handle);
        self.frames = 0;
        Ok(handle)
    }

    fn exit_camera(&mut self, handle: CameraHandle) -> Result<(), UEyeStatus> {
        self.call("exit_camera", Some(handle))?;
        self.handle = None;
        Ok(())
    }

    fn sensor_info(&self, handle: CameraHandle) -> Result<SensorInfo, UEyeStatus> {
        self.call("sensor_info", Some(handle))?;
        Ok(self.sensor.clone())
    }

    fn serial_number(&self, handle: CameraHandle) -> Result<String, UEyeStatus> {
        self.call("serial_number", Some(handle))?;
        Ok(self.serial.clone())
    }

    fn exposure(&self, handle: CameraHandle) -> Result<f64, UEyeStatus> {
        self.call("exposure", Some(handle))?;
        Ok(self.exposure)
    }

    fn set_exposure(&mut self, handle: CameraHandle, exposure: f64) -> Result<f64, UEyeStatus> {
        self.call("set_exposure", Some(handle))?;
        let range = Self::exposure_range_for(self.frame_rate);
        let steps = ((exposure - range.min) / range.increment).round();
        self.exposure = steps
            .mul_add(range.increment, range.min)
            .clamp(range.min, range.max);
        Ok(self.exposure)
    }

    fn exposure_range(&self, handle: CameraHandle) -> Result<Range, UEyeStatus> {
        self.call("exposure_range", Some(handle))?;
        Ok(Self::exposure_range_for(self.frame_rate))
    }

    fn auto_shutter(&self, handle: CameraHandle) -> Result<bool, UEyeStatus> {
        self.call("auto_shutter", Some(handle))?;
        Ok(self.auto_shutter)
    }

    fn set_auto_shutter(&mut self, handle: CameraHandle, enable: bool) -> Result<(), UEyeStatus> {
        self.call("set_auto_shutter", Some(handle))?;
        self.auto_shutter = enable;
        Ok(())
    }

    fn master_gain(&self, handle: CameraHandle) -> Result<u32, UEyeStatus> {
        self.call("master_gain", Some(handle))?;
        Ok(self.gain)
    }

    fn set_master_gain(&mut self, handle: CameraHandle, gain: u32) -> Result<(), UEyeStatus> {
        self.call("set_master_gain", Some(handle))?;
        if gain > 100 {
            return Err(UEyeStatus::InvalidParameter);
        }
        self.gain = gain;
        Ok(())
    }

    fn auto_gain(&self, handle: CameraHandle) -> Result<bool, UEyeStatus> {
        self.call("auto_gain", Some(handle))?;
        Ok(self.auto_gain)
    }

    fn set_auto_gain(&mut self, handle: CameraHandle, enable: bool) -> Result<(), UEyeStatus> {
        self.call("set_auto_gain", Some(handle))?;
        self.auto_gain = enable;
        Ok(())
    }

    fn pixel_clock(&self, handle: CameraHandle) -> Result<u32, UEyeStatus> {
        self.call("pixel_clock", Some(handle))?;
        Ok(self.pixel_clock)
    }

    fn set_pixel_clock(&mut self, handle: CameraHandle, clock: u32) -> Result<(), UEyeStatus> {
        self.call("set_pixel_clock", Some(handle))?;
        if !PIXEL_CLOCKS.contains(&clock) {
            return Err(UEyeStatus::InvalidParameter);
        }
        self.pixel_clock = clock;
        // A slower clock lowers the maximum frame rate and with it the longest exposure.
        let fps_range = Self::frame_rate_range_for(clock);
        self.frame_rate = self.frame_rate.clamp(fps_range.min, fps_range.max);
        self.exposure = self
            .exposure
            .min(Self::exposure_range_for(self.frame_rate).max);
        Ok(())
    }

    fn pixel_clock_list(&self, handle: CameraHandle) -> Result<Vec<u32>, UEyeStatus> {
        self.call("pixel_clock_list", Some(handle))?;
        Ok(PIXEL_CLOCKS.to_vec())
    }

    fn frame_rate(&self, handle: CameraHandle) -> Result<f64, UEyeStatus> {
        self.call("frame_rate", Some(handle))?;
        Ok(self.frame_rate)
    }

    fn set_frame_rate(&mut self, handle: CameraHandle, fps: f64) -> Result<f64, UEyeStatus> {
        self.call("set_frame_rate", Some(handle))?;
        let range = Self::frame_rate_range_for(self.pixel_clock);
        self.frame_rate = fps.clamp(range.min, range.max);
        self.exposure = self
            .exposure
            .min(Self::exposure_range_for(self.frame_rate).max);
        Ok(self.frame_rate)
    }

    fn frame_rate_range(&self, handle: CameraHandle) -> Result<Range, UEyeStatus> {
        self.call("frame_rate_range", Some(handle))?;
        Ok(Self::frame_rate_range_for(self.pixel_clock))
    }

    fn trigger_mode(&self, handle: CameraHandle) -> Result<TriggerMode, UEyeStatus> {
        self.call("trigger_mode", Some(handle))?;
        Ok(self.trigger_mode)
    }

    fn set_trigger_mode(
        &mut self,
        handle: CameraHandle,
        mode: TriggerMode,
    ) -> Result<(), UEyeStatus> {
        self.call("set_trigger_mode", Some(handle))?;
        self.trigger_mode = mode;
        self.triggered = false;
        Ok(())
    }

    fn force_trigger(&mut self, handle: CameraHandle) -> Result<(), UEyeStatus> {
        self.call("force_trigger", Some(handle))?;
        self.triggered = true;
        Ok(())
    }

    fn capture(&mut self, handle: CameraHandle, timeout: Duration) -> Result<RawFrame, UEyeStatus> {
        self.call("capture", Some(handle))?;
        if self.trigger_mode == TriggerMode::Software && !std::mem::take(&mut self.triggered) {
            tracing::debug!(?timeout, "No software trigger was sent");
            return Err(UEyeStatus::TimedOut);
        }
        let frame = self.render();
        self.frames += 1;
        Ok(frame)
    }
}
