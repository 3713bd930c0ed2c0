use super::calibration::{self, Extrinsics, Intrinsics};
use super::channel::{ChannelDescriptor, ChannelRegistry};
use super::image::{CameraImage, ImageData};
use super::param_desc::ParamDesc;
use crate::params::{ParamKind, ParamType, ParamValue};
use crate::{CameraError, CameraErrorCode, CameraResult};
use async_trait::async_trait;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const AUTO_PREFIX: &str = "Auto";

/// Parameter table of a camera driver.
///
/// Usually generated with [`camera_params!`](crate::camera_params).
pub trait Parameters: Send + Sync {
    /// Descriptors of all parameters, without values.
    fn descriptors(&self) -> Vec<ParamDesc>;

    /// Read the current value of a parameter.
    fn read(&self, name: &str) -> CameraResult<ParamValue>;

    /// Check that a value converts into the parameter's Rust type without writing it.
    fn check(&self, name: &str, value: &ParamValue) -> CameraResult;

    /// Write a value that has already been validated against the parameter's descriptor.
    fn write(&mut self, name: &str, value: ParamValue) -> CameraResult;
}

/// Device-specific part of a camera.
///
/// [`Camera`] takes care of connection state, channel bookkeeping and parameter validation;
/// drivers only talk to the device.
#[async_trait]
pub trait CameraDriver: Parameters + Debug {
    /// Manufacturer name.
    fn vendor(&self) -> &str;

    /// Camera model name.
    fn model(&self) -> &str;

    /// Serial number, usually known only while connected.
    fn serial_number(&self) -> Option<String>;

    /// Names of all channels this camera can provide in its current state.
    fn channels(&self) -> Vec<Cow<'static, str>>;

    /// Channels activated on the first connect.
    fn default_channels(&self) -> Vec<Cow<'static, str>>;

    /// Open the device.
    async fn connect(&mut self) -> CameraResult;

    /// Close the device.
    async fn disconnect(&mut self) -> CameraResult;

    /// Acquire the next frame.
    async fn update(&mut self) -> CameraResult;

    /// Compute the image of an active channel from the last acquired frame.
    fn calc_channel(&mut self, channel: &ChannelDescriptor) -> CameraResult<ImageData>;

    /// Prepare the device for delivering a channel.
    async fn activate_channel(&mut self, channel: &ChannelDescriptor) -> CameraResult {
        let _ = channel;
        Ok(())
    }

    /// Stop delivering a channel.
    async fn deactivate_channel(&mut self, channel: &ChannelDescriptor) -> CameraResult {
        let _ = channel;
        Ok(())
    }
}

/// A camera session: a driver plus connection state, active channels and frame bookkeeping.
#[derive(Debug)]
pub struct Camera {
    driver: Box<dyn CameraDriver>,
    connected: bool,
    active_channels: Vec<ChannelDescriptor>,
    selected_channel: Option<ChannelDescriptor>,
    channels_at_disconnect: Option<Vec<Cow<'static, str>>>,
    frame_number: u64,
    timestamp: Option<SystemTime>,
    calibration_dir: Option<PathBuf>,
    intrinsics: HashMap<String, Intrinsics>,
    extrinsics: HashMap<(String, String), Extrinsics>,
}

fn find<'desc>(descriptors: &'desc [ParamDesc], name: &str) -> CameraResult<&'desc ParamDesc> {
    descriptors
        .iter()
        .find(|desc| desc.name == name)
        .ok_or_else(|| CameraError::unknown_parameter(name))
}

fn is_auto_switch(desc: &ParamDesc) -> bool {
    desc.ty == ParamType::Bool && desc.name.starts_with(AUTO_PREFIX)
}

fn auto_switch_name(name: &str) -> String {
    format!("{AUTO_PREFIX}{name}")
}

impl Camera {
    /// Wrap a driver into a disconnected camera.
    pub fn new(driver: impl CameraDriver + 'static) -> Self {
        Self::from_boxed(Box::new(driver))
    }

    /// Wrap an already boxed driver.
    pub fn from_boxed(driver: Box<dyn CameraDriver>) -> Self {
        Self {
            driver,
            connected: false,
            active_channels: Vec::new(),
            selected_channel: None,
            channels_at_disconnect: None,
            frame_number: 0,
            timestamp: None,
            calibration_dir: None,
            intrinsics: HashMap::new(),
            extrinsics: HashMap::new(),
        }
    }

    /// Set the directory calibration files are loaded from.
    pub fn with_calibration_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.set_calibration_dir(dir);
        self
    }

    /// Set the directory calibration files are loaded from and drop cached calibrations.
    pub fn set_calibration_dir(&mut self, dir: impl Into<PathBuf>) {
        self.calibration_dir = Some(dir.into());
        self.intrinsics.clear();
        self.extrinsics.clear();
    }

    /// Directory calibration files are loaded from.
    pub fn calibration_dir(&self) -> Option<&Path> {
        self.calibration_dir.as_deref()
    }

    /// Display name: vendor followed by model.
    pub fn name(&self) -> String {
        format!("{} {}", self.driver.vendor(), self.driver.model())
    }

    /// Manufacturer name.
    pub fn vendor(&self) -> &str {
        self.driver.vendor()
    }

    /// Camera model name.
    pub fn model(&self) -> &str {
        self.driver.model()
    }

    /// Serial number, if the driver knows it.
    pub fn serial_number(&self) -> Option<String> {
        self.driver.serial_number()
    }

    /// Whether the camera is connected.
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Number of frames acquired since the last connect.
    pub const fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Acquisition time of the current frame.
    pub const fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }

    fn ensure_connected(&self) -> CameraResult {
        if self.connected {
            Ok(())
        } else {
            Err(CameraError::NOT_CONNECTED)
        }
    }

    /// Connect to the device.
    ///
    /// Restores the channels that were active at the last disconnect, or activates the
    /// driver's default channels on the first connect.
    #[tracing::instrument(skip(self), fields(camera = %self.name()), err)]
    pub async fn connect(&mut self) -> CameraResult {
        if self.connected {
            tracing::warn!("Camera is already connected");
            return Ok(());
        }

        self.driver.connect().await?;
        self.connected = true;
        self.frame_number = 0;
        self.timestamp = None;
        self.intrinsics.clear();
        self.extrinsics.clear();

        let channels = self
            .channels_at_disconnect
            .take()
            .unwrap_or_else(|| self.driver.default_channels());
        for channel in channels {
            if let Err(err) = self.activate_channel(&channel).await {
                tracing::warn!(%channel, %err, "Could not activate channel");
            }
        }

        tracing::info!(serial = ?self.serial_number(), "Connected");
        Ok(())
    }

    /// Disconnect from the device.
    ///
    /// On failure the camera stays connected.
    #[tracing::instrument(skip(self), fields(camera = %self.name()), err)]
    pub async fn disconnect(&mut self) -> CameraResult {
        if !self.connected {
            return Ok(());
        }

        self.driver.disconnect().await?;
        self.connected = false;
        self.channels_at_disconnect = Some(
            self.active_channels
                .drain(..)
                .map(|channel| channel.name)
                .collect(),
        );
        self.selected_channel = None;

        tracing::info!("Disconnected");
        Ok(())
    }

    /// Acquire the next frame.
    pub async fn update(&mut self) -> CameraResult {
        self.ensure_connected()?;
        self.driver.update().await?;
        self.frame_number += 1;
        self.timestamp = Some(SystemTime::now());
        tracing::trace!(frame_number = self.frame_number, "Updated");
        Ok(())
    }

    /// Compute the image of an active channel from the current frame.
    pub fn calc_channel(&mut self, name: &str) -> CameraResult<CameraImage> {
        self.ensure_connected()?;
        let channel = self.supported_channel(name)?;
        if !self.is_channel_active(name) {
            return Err(CameraError::new(
                CameraErrorCode::CHANNEL_NOT_ACTIVE,
                format_args!("Channel {name:?} is not active"),
            ));
        }

        let data = self.driver.calc_channel(&channel)?;
        if data.image_type() != channel.image_type {
            return Err(CameraError::invalid_operation(format_args!(
                "Driver produced a {} image for {name} which has type {}",
                data.image_type(),
                channel.image_type
            )));
        }

        Ok(CameraImage {
            channel,
            frame_number: self.frame_number,
            timestamp: self.timestamp.unwrap_or_else(SystemTime::now),
            data,
        })
    }

    /// Channels the camera can provide.
    pub fn channels(&self) -> Vec<ChannelDescriptor> {
        self.driver
            .channels()
            .iter()
            .filter_map(|name| match ChannelRegistry::lookup(name) {
                Ok(channel) => Some(channel),
                Err(err) => {
                    tracing::error!(%err, "Driver lists an unregistered channel");
                    None
                }
            })
            .collect()
    }

    fn supported_channel(&self, name: &str) -> CameraResult<ChannelDescriptor> {
        if self.driver.channels().iter().any(|channel| channel == name) {
            ChannelRegistry::lookup(name)
        } else {
            Err(CameraError::unknown_channel(name))
        }
    }

    /// Channels currently active, in activation order.
    pub fn active_channels(&self) -> &[ChannelDescriptor] {
        &self.active_channels
    }

    /// Whether a channel is active.
    pub fn is_channel_active(&self, name: &str) -> bool {
        self.active_channels
            .iter()
            .any(|channel| channel.name == name)
    }

    /// The selected channel, used by consumers that show one channel at a time.
    pub const fn selected_channel(&self) -> Option<&ChannelDescriptor> {
        self.selected_channel.as_ref()
    }

    /// Activate a channel. Does nothing if it is already active.
    #[tracing::instrument(skip(self), fields(camera = %self.name()), err)]
    pub async fn activate_channel(&mut self, name: &str) -> CameraResult {
        self.ensure_connected()?;
        let channel = self.supported_channel(name)?;
        if self.is_channel_active(name) {
            return Ok(());
        }

        self.driver.activate_channel(&channel).await?;
        if self.selected_channel.is_none() {
            self.selected_channel = Some(channel.clone());
        }
        self.active_channels.push(channel);
        tracing::debug!("Channel activated");
        Ok(())
    }

    /// Deactivate a channel. Does nothing if it is not active.
    ///
    /// If the channel was selected, the first remaining active channel becomes selected.
    #[tracing::instrument(skip(self), fields(camera = %self.name()), err)]
    pub async fn deactivate_channel(&mut self, name: &str) -> CameraResult {
        self.ensure_connected()?;
        let channel = self.supported_channel(name)?;
        if !self.is_channel_active(name) {
            return Ok(());
        }

        self.driver.deactivate_channel(&channel).await?;
        self.active_channels.retain(|active| active.name != name);
        if self
            .selected_channel
            .as_ref()
            .is_some_and(|selected| selected.name == name)
        {
            self.selected_channel = self.active_channels.first().cloned();
        }
        tracing::debug!("Channel deactivated");
        Ok(())
    }

    /// Select an active channel.
    pub fn select_channel(&mut self, name: &str) -> CameraResult {
        let channel = self
            .active_channels
            .iter()
            .find(|channel| channel.name == name)
            .cloned()
            .ok_or_else(|| {
                CameraError::new(
                    CameraErrorCode::CHANNEL_NOT_ACTIVE,
                    format_args!("Cannot select inactive channel {name:?}"),
                )
            })?;
        self.selected_channel = Some(channel);
        Ok(())
    }

    fn auto_enabled(&self, descriptors: &[ParamDesc], name: &str) -> bool {
        let auto_name = auto_switch_name(name);
        descriptors.iter().any(|desc| {
            desc.name == auto_name
                && desc.ty == ParamType::Bool
                && desc.readable_when.allows(self.connected)
        }) && matches!(self.driver.read(&auto_name), Ok(ParamValue::Bool(true)))
    }

    fn resolve(&self, descriptors: &[ParamDesc], desc: &ParamDesc) -> ParamDesc {
        let mut desc = desc.clone().resolve(self.connected);
        if desc.readable {
            match self.driver.read(&desc.name) {
                Ok(value) => desc.value = Some(value),
                Err(err) => tracing::warn!(name = %desc.name, %err, "Failed to read parameter"),
            }
        }
        if desc.writable && self.connected && self.auto_enabled(descriptors, &desc.name) {
            desc.writable = false;
        }
        desc
    }

    /// All parameters with their current values where readable.
    pub fn parameters(&self) -> Vec<ParamDesc> {
        let descriptors = self.driver.descriptors();
        descriptors
            .iter()
            .map(|desc| self.resolve(&descriptors, desc))
            .collect()
    }

    /// A single parameter with its current value if readable.
    pub fn parameter(&self, name: &str) -> CameraResult<ParamDesc> {
        let descriptors = self.driver.descriptors();
        let desc = find(&descriptors, name)?;
        Ok(self.resolve(&descriptors, desc))
    }

    /// Read a parameter as a Rust value.
    pub fn parameter_value<T: ParamKind>(&self, name: &str) -> CameraResult<T> {
        let descriptors = self.driver.descriptors();
        let desc = find(&descriptors, name)?;
        if !desc.readable_when.allows(self.connected) {
            return Err(CameraError::new(
                CameraErrorCode::PARAMETER_NOT_READABLE,
                format_args!(
                    "{name} is not readable while {}",
                    self.connection_state_name()
                ),
            ));
        }
        T::from_value(self.driver.read(name)?)
    }

    const fn connection_state_name(&self) -> &'static str {
        if self.connected {
            "connected"
        } else {
            "disconnected"
        }
    }

    /// Set a single parameter.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<ParamValue>) -> CameraResult {
        self.set_parameters([(name, value.into())])
    }

    /// Set several parameters at once.
    ///
    /// All values are validated before any of them is written. `Auto*` switches are written
    /// first, so a manual value can be set together with turning its automatic control off.
    /// Turning automatic control on while setting the manual value in the same call is rejected.
    #[tracing::instrument(skip_all, fields(camera = %self.name()), err)]
    pub fn set_parameters<K: AsRef<str>, V: Into<ParamValue>>(
        &mut self,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> CameraResult {
        let descriptors = self.driver.descriptors();

        let mut batch = Vec::new();
        for (name, value) in values {
            let name = name.as_ref();
            let desc = find(&descriptors, name)?.clone().resolve(self.connected);
            if !desc.writable {
                return Err(CameraError::new(
                    CameraErrorCode::PARAMETER_NOT_WRITABLE,
                    format_args!(
                        "{name} is not writable while {}",
                        self.connection_state_name()
                    ),
                ));
            }
            let value = desc.validate(value)?;
            self.driver.check(name, &value)?;
            batch.push((desc, value));
        }

        for (desc, _) in &batch {
            let auto_name = auto_switch_name(&desc.name);
            if !descriptors
                .iter()
                .any(|other| other.name == auto_name && other.ty == ParamType::Bool)
            {
                continue;
            }
            match batch.iter().find(|(other, _)| other.name == auto_name) {
                Some((_, ParamValue::Bool(true))) => {
                    return Err(CameraError::new(
                        CameraErrorCode::SETTINGS_COMBINATION_NOT_SUPPORTED,
                        format_args!("Cannot set {} while enabling {auto_name}", desc.name),
                    ));
                }
                Some(_) => {}
                None if self.auto_enabled(&descriptors, &desc.name) => {
                    return Err(CameraError::new(
                        CameraErrorCode::PARAMETER_NOT_WRITABLE,
                        format_args!(
                            "{} is controlled automatically while {auto_name} is enabled",
                            desc.name
                        ),
                    ));
                }
                None => {}
            }
        }

        batch.sort_by_key(|(desc, _)| !is_auto_switch(desc));

        for (desc, value) in batch {
            tracing::debug!(name = %desc.name, %value, "Setting parameter");
            self.driver.write(&desc.name, value)?;
        }
        Ok(())
    }

    fn calibration_path(&self, file_name: impl FnOnce(&str, &str) -> String) -> CameraResult<PathBuf> {
        let dir = self.calibration_dir.as_deref().ok_or_else(|| {
            CameraError::new(
                CameraErrorCode::CALIBRATION_NOT_FOUND,
                "No calibration directory configured",
            )
        })?;
        let serial = self.serial_number().ok_or_else(|| {
            CameraError::new(
                CameraErrorCode::NOT_CONNECTED,
                "Serial number is unknown, connect the camera first",
            )
        })?;
        Ok(dir.join(file_name(self.model(), &serial)))
    }

    /// Intrinsic calibration of a channel.
    pub fn load_intrinsics(&mut self, channel: &str) -> CameraResult<Intrinsics> {
        let _ = self.supported_channel(channel)?;
        if let Some(intrinsics) = self.intrinsics.get(channel) {
            return Ok(*intrinsics);
        }
        let path = self.calibration_path(|model, serial| {
            calibration::intrinsics_file_name(model, serial, channel)
        })?;
        let intrinsics = calibration::load::<Intrinsics>(&path)?;
        _ = self.intrinsics.insert(channel.to_owned(), intrinsics);
        Ok(intrinsics)
    }

    /// Transformation from the coordinate system of one channel into another's.
    ///
    /// Falls back to inverting the stored reverse transformation.
    pub fn load_extrinsics(&mut self, from: &str, to: &str) -> CameraResult<Extrinsics> {
        let _ = self.supported_channel(from)?;
        let _ = self.supported_channel(to)?;
        let key = (from.to_owned(), to.to_owned());
        if let Some(extrinsics) = self.extrinsics.get(&key) {
            return Ok(*extrinsics);
        }
        let path = self.calibration_path(|model, serial| {
            calibration::extrinsics_file_name(model, serial, from, to)
        })?;
        let extrinsics = match calibration::load::<Extrinsics>(&path) {
            Err(err) if err.code == CameraErrorCode::CALIBRATION_NOT_FOUND => {
                let reverse_path = self.calibration_path(|model, serial| {
                    calibration::extrinsics_file_name(model, serial, to, from)
                })?;
                calibration::load::<Extrinsics>(&reverse_path)
                    .map_err(|_reverse_err| err)?
                    .inverse()
            }
            result => result?,
        };
        _ = self.extrinsics.insert(key, extrinsics);
        Ok(extrinsics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::channel::names;
    use crate::api::{AccessState, Constraint, Unit};
    use crate::param_enum;
    use macro_rules_attribute::apply;
    use ndarray::Array2;

    #[apply(param_enum)]
    enum Mode {
        Fast,
        Precise,
    }

    #[derive(Debug)]
    struct MockCamera {
        open: bool,
        fail_connect: bool,
        fail_disconnect: bool,
        frames: u8,
        exposure: f64,
        auto_exposure: bool,
        gain: i32,
        mode: Mode,
        port: u16,
        offset: u8,
    }

    impl Default for MockCamera {
        fn default() -> Self {
            Self {
                open: false,
                fail_connect: false,
                fail_disconnect: false,
                frames: 0,
                exposure: 10.0,
                auto_exposure: false,
                gain: 0,
                mode: Mode::Fast,
                port: 1,
                offset: 0,
            }
        }
    }

    impl MockCamera {
        fn exposure(&self) -> CameraResult<f64> {
            Ok(self.exposure)
        }

        fn set_exposure(&mut self, exposure: f64) -> CameraResult {
            self.exposure = exposure;
            Ok(())
        }

        fn exposure_range(&self) -> Constraint {
            Constraint::range(1.0, 100.0)
        }

        fn auto_exposure(&self) -> CameraResult<bool> {
            Ok(self.auto_exposure)
        }

        fn set_auto_exposure(&mut self, auto_exposure: bool) -> CameraResult {
            self.auto_exposure = auto_exposure;
            Ok(())
        }

        fn gain(&self) -> CameraResult<i32> {
            Ok(self.gain)
        }

        fn set_gain(&mut self, gain: i32) -> CameraResult {
            self.gain = gain;
            Ok(())
        }

        fn gain_range(&self) -> Constraint {
            Constraint::range(0, 10)
        }

        fn mode(&self) -> CameraResult<Mode> {
            Ok(self.mode)
        }

        fn set_mode(&mut self, mode: Mode) -> CameraResult {
            self.mode = mode;
            Ok(())
        }

        fn modes(&self) -> Constraint {
            Constraint::variants::<Mode>()
        }

        fn serial(&self) -> CameraResult<String> {
            Ok("0042".to_owned())
        }

        fn port(&self) -> CameraResult<u16> {
            Ok(self.port)
        }

        fn set_port(&mut self, port: u16) -> CameraResult {
            self.port = port;
            Ok(())
        }

        fn offset(&self) -> CameraResult<u8> {
            Ok(self.offset)
        }

        fn set_offset(&mut self, offset: u8) -> CameraResult {
            self.offset = offset;
            Ok(())
        }
    }

    crate::camera_params! {
        impl Parameters for MockCamera {
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
            "Gain": i32 => gain / set_gain {
                read: Connected,
                write: Connected,
                constraint: gain_range,
            }
            "Mode": Mode => mode / set_mode {
                read: Connected,
                write: Connected,
                constraint: modes,
            }
            "Serial": String => serial {
                read: Connected,
                write: Never,
            }
            "Port": u16 => port / set_port {
                read: Always,
                write: Disconnected,
            }
            "Offset": u8 => offset / set_offset {
                read: Connected,
                write: Connected,
            }
        }
    }

    #[async_trait]
    impl CameraDriver for MockCamera {
        fn vendor(&self) -> &str {
            "Acme"
        }

        fn model(&self) -> &str {
            "Mock"
        }

        fn serial_number(&self) -> Option<String> {
            self.open.then(|| "0042".to_owned())
        }

        fn channels(&self) -> Vec<Cow<'static, str>> {
            vec![names::INTENSITY.into(), names::Z_IMAGE.into()]
        }

        fn default_channels(&self) -> Vec<Cow<'static, str>> {
            vec![names::INTENSITY.into()]
        }

        async fn connect(&mut self) -> CameraResult {
            if self.fail_connect {
                return Err(CameraError::connection_failed("no device on port"));
            }
            self.open = true;
            Ok(())
        }

        async fn disconnect(&mut self) -> CameraResult {
            if self.fail_disconnect {
                return Err(CameraError::invalid_operation("device is busy"));
            }
            self.open = false;
            Ok(())
        }

        async fn update(&mut self) -> CameraResult {
            self.frames += 1;
            Ok(())
        }

        fn calc_channel(&mut self, channel: &ChannelDescriptor) -> CameraResult<ImageData> {
            Ok(match &*channel.name {
                names::INTENSITY => ImageData::Byte(Array2::from_elem((2, 3), self.frames)),
                _ => ImageData::Float(Array2::from_elem((2, 3), f32::from(self.frames))),
            })
        }
    }

    async fn connected() -> eyre::Result<Camera> {
        let mut camera = Camera::new(MockCamera::default());
        camera.connect().await?;
        Ok(camera)
    }

    #[tokio::test]
    async fn connect_activates_default_channels() -> eyre::Result<()> {
        let camera = connected().await?;
        assert!(camera.is_connected());
        assert_eq!(camera.name(), "Acme Mock");
        assert_eq!(camera.serial_number().as_deref(), Some("0042"));
        assert_eq!(camera.active_channels().len(), 1);
        assert_eq!(
            camera.selected_channel().map(|channel| &*channel.name),
            Some(names::INTENSITY)
        );
        assert_eq!(camera.channels().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn failed_connect_leaves_camera_disconnected() {
        let mut camera = Camera::new(MockCamera {
            fail_connect: true,
            ..MockCamera::default()
        });
        let err = camera.connect().await.expect_err("driver refuses");
        assert_eq!(err.code, CameraErrorCode::CONNECTION_FAILED);
        assert!(!camera.is_connected());
        assert!(camera.active_channels().is_empty());
    }

    #[tokio::test]
    async fn update_requires_connection() {
        let mut camera = Camera::new(MockCamera::default());
        assert_eq!(camera.update().await, Err(CameraError::NOT_CONNECTED));
        assert_eq!(
            camera.calc_channel(names::INTENSITY).map(|_| ()),
            Err(CameraError::NOT_CONNECTED)
        );
    }

    #[tokio::test]
    async fn images_are_tagged_with_the_frame() -> eyre::Result<()> {
        let mut camera = connected().await?;
        camera.update().await?;
        camera.update().await?;
        let image = camera.calc_channel(names::INTENSITY)?;
        assert_eq!(image.frame_number, 2);
        assert_eq!(Some(image.timestamp), camera.timestamp());
        assert_eq!(image.size(), (3, 2));
        assert_eq!(image.data, ImageData::Byte(Array2::from_elem((2, 3), 2)));
        Ok(())
    }

    #[tokio::test]
    async fn channels_must_be_supported_and_active() -> eyre::Result<()> {
        let mut camera = connected().await?;
        camera.update().await?;
        assert_eq!(
            camera.calc_channel(names::Z_IMAGE).map(|_| ()).map_err(|err| err.code),
            Err(CameraErrorCode::CHANNEL_NOT_ACTIVE)
        );
        assert_eq!(
            camera.calc_channel(names::COLOR).map(|_| ()).map_err(|err| err.code),
            Err(CameraErrorCode::CHANNEL_NOT_SUPPORTED)
        );
        assert_eq!(
            camera.activate_channel(names::COLOR).await.map_err(|err| err.code),
            Err(CameraErrorCode::CHANNEL_NOT_SUPPORTED)
        );

        camera.activate_channel(names::Z_IMAGE).await?;
        camera.activate_channel(names::Z_IMAGE).await?;
        assert_eq!(camera.active_channels().len(), 2);
        assert_eq!(
            camera.calc_channel(names::Z_IMAGE)?.image_type(),
            crate::api::ImageType::Float
        );
        Ok(())
    }

    #[tokio::test]
    async fn deactivating_the_selected_channel_moves_the_selection() -> eyre::Result<()> {
        let mut camera = connected().await?;
        camera.activate_channel(names::Z_IMAGE).await?;
        assert!(camera.select_channel(names::COLOR).is_err());
        camera.deactivate_channel(names::INTENSITY).await?;
        assert_eq!(
            camera.selected_channel().map(|channel| &*channel.name),
            Some(names::Z_IMAGE)
        );
        camera.deactivate_channel(names::Z_IMAGE).await?;
        assert_eq!(camera.selected_channel(), None);
        Ok(())
    }

    #[tokio::test]
    async fn reconnect_restores_active_channels() -> eyre::Result<()> {
        let mut camera = connected().await?;
        camera.activate_channel(names::Z_IMAGE).await?;
        camera.deactivate_channel(names::INTENSITY).await?;
        camera.update().await?;
        camera.disconnect().await?;
        assert!(camera.active_channels().is_empty());

        camera.connect().await?;
        assert_eq!(camera.frame_number(), 0);
        assert!(camera.is_channel_active(names::Z_IMAGE));
        assert!(!camera.is_channel_active(names::INTENSITY));
        assert_eq!(
            camera.selected_channel().map(|channel| &*channel.name),
            Some(names::Z_IMAGE)
        );
        Ok(())
    }

    #[tokio::test]
    async fn failed_disconnect_keeps_the_session() -> eyre::Result<()> {
        let mut camera = Camera::new(MockCamera {
            fail_disconnect: true,
            ..MockCamera::default()
        });
        camera.connect().await?;
        camera.update().await?;

        let err = camera.disconnect().await.expect_err("driver refuses");
        assert_eq!(err.code, CameraErrorCode::INVALID_OPERATION);
        assert!(camera.is_connected());
        assert!(camera.is_channel_active(names::INTENSITY));
        assert_eq!(
            camera.selected_channel().map(|channel| &*channel.name),
            Some(names::INTENSITY)
        );
        assert_eq!(camera.frame_number(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn connecting_twice_changes_nothing() -> eyre::Result<()> {
        let mut camera = connected().await?;
        camera.activate_channel(names::Z_IMAGE).await?;
        camera.update().await?;

        camera.connect().await?;
        assert!(camera.is_connected());
        assert_eq!(camera.frame_number(), 1);
        assert_eq!(camera.active_channels().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn access_follows_connection_state() -> eyre::Result<()> {
        let mut camera = Camera::new(MockCamera::default());

        let exposure = camera.parameter("Exposure")?;
        assert!(!exposure.readable && !exposure.writable);
        assert_eq!(exposure.value, None);
        assert_eq!(exposure.unit, Some(Unit::Milliseconds));
        assert_eq!(exposure.description, "Exposure time.");
        assert_eq!(
            camera.parameter_value::<f64>("Exposure").map_err(|err| err.code),
            Err(CameraErrorCode::PARAMETER_NOT_READABLE)
        );

        camera.set_parameter("Port", 7)?;
        assert_eq!(camera.parameter_value::<u16>("Port")?, 7);

        camera.connect().await?;
        assert_eq!(
            camera.set_parameter("Port", 8).map_err(|err| err.code),
            Err(CameraErrorCode::PARAMETER_NOT_WRITABLE)
        );
        assert_eq!(
            camera.set_parameter("Serial", "1").map_err(|err| err.code),
            Err(CameraErrorCode::PARAMETER_NOT_WRITABLE)
        );
        let serial = camera.parameter("Serial")?;
        assert_eq!(serial.readable_when, AccessState::Connected);
        assert_eq!(serial.value_as_string(), "0042");
        assert_eq!(
            camera.parameter("Brightness").map_err(|err| err.code),
            Err(CameraErrorCode::PARAMETER_NOT_SUPPORTED)
        );
        Ok(())
    }

    #[tokio::test]
    async fn values_are_converted_and_validated() -> eyre::Result<()> {
        let mut camera = connected().await?;
        camera.set_parameter("Exposure", "25")?;
        assert_eq!(camera.parameter_value::<f64>("Exposure")?, 25.0);
        camera.set_parameter("Mode", "precise")?;
        assert_eq!(camera.parameter_value::<Mode>("Mode")?, Mode::Precise);
        assert_eq!(
            camera.set_parameter("Exposure", 250).map_err(|err| err.code),
            Err(CameraErrorCode::INVALID_VALUE)
        );
        assert_eq!(
            camera.set_parameter("Gain", "loud").map_err(|err| err.code),
            Err(CameraErrorCode::INVALID_VALUE)
        );
        assert_eq!(camera.parameters().len(), 7);
        Ok(())
    }

    #[tokio::test]
    async fn automatic_control_locks_the_manual_value() -> eyre::Result<()> {
        let mut camera = connected().await?;
        camera.set_parameter("AutoExposure", true)?;
        assert!(!camera.parameter("Exposure")?.writable);
        assert_eq!(
            camera.set_parameter("Exposure", 5).map_err(|err| err.code),
            Err(CameraErrorCode::PARAMETER_NOT_WRITABLE)
        );

        // Manual value listed before the switch still works: switches are applied first.
        camera.set_parameters([
            ("Exposure", ParamValue::from(5)),
            ("AutoExposure", ParamValue::from(false)),
        ])?;
        assert_eq!(camera.parameter_value::<f64>("Exposure")?, 5.0);
        assert!(!camera.parameter_value::<bool>("AutoExposure")?);

        assert_eq!(
            camera
                .set_parameters([
                    ("AutoExposure", ParamValue::from(true)),
                    ("Exposure", ParamValue::from(7)),
                ])
                .map_err(|err| err.code),
            Err(CameraErrorCode::SETTINGS_COMBINATION_NOT_SUPPORTED)
        );
        assert!(!camera.parameter_value::<bool>("AutoExposure")?);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_batches_change_nothing() -> eyre::Result<()> {
        let mut camera = connected().await?;
        let err = camera
            .set_parameters([("Gain", ParamValue::from(3)), ("Exposure", ParamValue::from(0.5))])
            .expect_err("exposure is below the range");
        assert_eq!(err.code, CameraErrorCode::INVALID_VALUE);
        assert_eq!(camera.parameter_value::<i32>("Gain")?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn values_outside_the_rust_type_reject_the_whole_batch() -> eyre::Result<()> {
        let mut camera = connected().await?;
        let err = camera
            .set_parameters([("Gain", ParamValue::from(3)), ("Offset", ParamValue::from(300))])
            .expect_err("300 does not fit into a byte");
        assert_eq!(err.code, CameraErrorCode::INVALID_VALUE);
        assert_eq!(camera.parameter_value::<i32>("Gain")?, 0);
        assert_eq!(camera.parameter_value::<u8>("Offset")?, 0);

        camera.set_parameters([("Gain", ParamValue::from(3)), ("Offset", ParamValue::from(200))])?;
        assert_eq!(camera.parameter_value::<u8>("Offset")?, 200);
        Ok(())
    }

    #[tokio::test]
    async fn calibration_is_loaded_per_serial_and_channel() -> eyre::Result<()> {
        let dir = std::env::temp_dir().join(format!("metricam-calibration-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        std::fs::write(
            dir.join("Mock_0042_Intensity.intrinsics.json"),
            r#"{"width": 3, "height": 2, "fx": 2, "fy": 2, "cx": 1.5, "cy": 1}"#,
        )?;
        std::fs::write(
            dir.join("Mock_0042_ZImage_Intensity.extrinsics.json"),
            r#"{"rotation": [[1, 0, 0], [0, 1, 0], [0, 0, 1]], "translation": [0.5, 0, 0]}"#,
        )?;

        let mut camera = Camera::new(MockCamera::default()).with_calibration_dir(&dir);
        assert_eq!(
            camera.load_intrinsics(names::INTENSITY).map_err(|err| err.code),
            Err(CameraErrorCode::NOT_CONNECTED)
        );
        camera.connect().await?;

        let intrinsics = camera.load_intrinsics(names::INTENSITY)?;
        assert_eq!((intrinsics.width, intrinsics.fx), (3, 2.0));
        assert_eq!(
            camera.load_intrinsics(names::Z_IMAGE).map_err(|err| err.code),
            Err(CameraErrorCode::CALIBRATION_NOT_FOUND)
        );

        let forward = camera.load_extrinsics(names::Z_IMAGE, names::INTENSITY)?;
        assert_eq!(forward.translation, [0.5, 0.0, 0.0]);
        let backward = camera.load_extrinsics(names::INTENSITY, names::Z_IMAGE)?;
        assert_eq!(backward.transform([0.5, 0.0, 0.0]), [0.0, 0.0, 0.0]);

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
