//! JSON configuration of cameras and engines.

use crate::api::{AccessState, Camera};
use crate::management::CameraManagement;
use crate::params::ParamValue;
use crate::CameraResult;
use eyre::WrapErr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings of a single camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CameraConfig {
    /// Registered camera type name, see [`CameraManagement::available_types`].
    #[serde(rename = "type")]
    pub camera_type: String,
    /// Directory with calibration files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration_dir: Option<PathBuf>,
    /// Channels to activate after connecting; the first one is selected.
    ///
    /// Empty keeps the camera's own choice.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,
    /// Parameter values, applied in the given order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, ParamValue>,
}

impl CameraConfig {
    /// Config for a camera type with everything else left at defaults.
    pub fn new(camera_type: impl Into<String>) -> Self {
        Self {
            camera_type: camera_type.into(),
            calibration_dir: None,
            channels: Vec::new(),
            parameters: IndexMap::new(),
        }
    }

    /// Create a camera and apply the settings that can be applied before connecting.
    pub fn create(&self, management: &CameraManagement) -> CameraResult<Camera> {
        let mut camera = management.create(&self.camera_type)?;
        if let Some(dir) = &self.calibration_dir {
            camera.set_calibration_dir(dir);
        }
        self.apply_parameters(&mut camera)?;
        Ok(camera)
    }

    /// Apply the settings that belong to the camera's current connection state.
    ///
    /// While disconnected, these are the parameters writable only while disconnected. While
    /// connected, all other parameters and the channel selection.
    #[tracing::instrument(skip_all, fields(camera = %camera.name()), err)]
    pub async fn apply(&self, camera: &mut Camera) -> CameraResult {
        self.apply_parameters(camera)?;
        if !camera.is_connected() || self.channels.is_empty() {
            return Ok(());
        }

        for channel in &self.channels {
            camera.activate_channel(channel).await?;
        }
        let unlisted = camera
            .active_channels()
            .iter()
            .filter(|active| !self.channels.iter().any(|name| *name == active.name))
            .map(|active| active.name.clone())
            .collect::<Vec<_>>();
        for channel in unlisted {
            camera.deactivate_channel(&channel).await?;
        }
        if let Some(first) = self.channels.first() {
            camera.select_channel(first)?;
        }
        Ok(())
    }

    fn apply_parameters(&self, camera: &mut Camera) -> CameraResult {
        let connected = camera.is_connected();
        let mut batch = Vec::new();
        for (name, value) in &self.parameters {
            let before_connect = camera.parameter(name)?.writable_when == AccessState::Disconnected;
            if before_connect != connected {
                batch.push((name.as_str(), value.clone()));
            }
        }
        if batch.is_empty() {
            return Ok(());
        }
        camera.set_parameters(batch)
    }
}

/// Settings of a multi-camera [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Cameras in the order they are added to the engine.
    pub cameras: Vec<CameraConfig>,
}

impl EngineConfig {
    /// Parse a config from JSON text.
    pub fn from_json(json: &str) -> eyre::Result<Self> {
        serde_json::from_str(json).wrap_err("Invalid engine configuration")
    }

    /// Load a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&json).wrap_err_with(|| format!("Failed to load {}", path.display()))
    }
}
