//! Running several cameras side by side.

use crate::api::{Camera, CameraImage};
use crate::config::{CameraConfig, EngineConfig};
use crate::management::CameraManagement;
use crate::{CameraError, CameraResult};
use futures::future::join_all;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Notification sent after a camera acquired a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEvent {
    /// Index of the camera in the engine.
    pub camera: usize,
    /// Frame number of that camera.
    pub frame_number: u64,
}

#[derive(Debug)]
struct Slot {
    camera: Camera,
    config: Option<CameraConfig>,
}

/// A set of cameras that are connected, updated and read together.
#[derive(Debug)]
pub struct Engine {
    slots: Vec<Slot>,
    events: broadcast::Sender<FrameEvent>,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            events: broadcast::channel(EVENT_CAPACITY).0,
        }
    }
}

impl Engine {
    /// Empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create all cameras of a config.
    ///
    /// Each camera's config is applied again after every successful [`Engine::connect_all`].
    pub fn from_config(management: &CameraManagement, config: &EngineConfig) -> CameraResult<Self> {
        let mut engine = Self::new();
        for camera_config in &config.cameras {
            engine.slots.push(Slot {
                camera: camera_config.create(management)?,
                config: Some(camera_config.clone()),
            });
        }
        Ok(engine)
    }

    /// Add a camera. Returns its index.
    pub fn add(&mut self, camera: Camera) -> usize {
        self.slots.push(Slot {
            camera,
            config: None,
        });
        self.slots.len() - 1
    }

    /// Number of cameras.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the engine has no cameras.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Camera at the given index.
    pub fn camera(&self, index: usize) -> Option<&Camera> {
        self.slots.get(index).map(|slot| &slot.camera)
    }

    /// Mutable camera at the given index.
    pub fn camera_mut(&mut self, index: usize) -> Option<&mut Camera> {
        self.slots.get_mut(index).map(|slot| &mut slot.camera)
    }

    /// All cameras in insertion order.
    pub fn cameras(&self) -> impl Iterator<Item = &Camera> {
        self.slots.iter().map(|slot| &slot.camera)
    }

    /// Receive a [`FrameEvent`] for every frame acquired by [`Engine::update_all`].
    pub fn subscribe(&self) -> broadcast::Receiver<FrameEvent> {
        self.events.subscribe()
    }

    /// Connect all cameras concurrently and apply their configs.
    ///
    /// Returns one result per camera, in insertion order.
    #[tracing::instrument(skip(self), fields(cameras = self.slots.len()))]
    pub async fn connect_all(&mut self) -> Vec<CameraResult> {
        join_all(self.slots.iter_mut().map(|slot| async move {
            let result = async {
                slot.camera.connect().await?;
                if let Some(config) = &slot.config {
                    config.apply(&mut slot.camera).await?;
                }
                Ok::<_, CameraError>(())
            }
            .await;
            if let Err(err) = &result {
                tracing::error!(camera = %slot.camera.name(), %err, "Failed to connect");
            }
            result
        }))
        .await
    }

    /// Disconnect all cameras concurrently.
    #[tracing::instrument(skip(self), fields(cameras = self.slots.len()))]
    pub async fn disconnect_all(&mut self) -> Vec<CameraResult> {
        join_all(self.slots.iter_mut().map(|slot| async move {
            let result = slot.camera.disconnect().await;
            if let Err(err) = &result {
                tracing::error!(camera = %slot.camera.name(), %err, "Failed to disconnect");
            }
            result
        }))
        .await
    }

    /// Acquire a frame on every connected camera concurrently.
    ///
    /// Disconnected cameras report [`CameraError::NOT_CONNECTED`].
    pub async fn update_all(&mut self) -> Vec<CameraResult> {
        let results = join_all(self.slots.iter_mut().map(|slot| slot.camera.update())).await;
        for (index, (slot, result)) in self.slots.iter().zip(&results).enumerate() {
            match result {
                Ok(()) => {
                    // No receivers is fine.
                    _ = self.events.send(FrameEvent {
                        camera: index,
                        frame_number: slot.camera.frame_number(),
                    });
                }
                Err(err) if *err == CameraError::NOT_CONNECTED => {}
                Err(err) => tracing::warn!(camera = %slot.camera.name(), %err, "Update failed"),
            }
        }
        results
    }

    /// Images of a channel from every connected camera that has it active.
    ///
    /// Pairs are `(camera index, image)`. Cameras that fail to compute the image are skipped.
    pub fn frames(&mut self, channel: &str) -> Vec<(usize, CameraImage)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter(|(_, slot)| {
                slot.camera.is_connected() && slot.camera.is_channel_active(channel)
            })
            .filter_map(|(index, slot)| match slot.camera.calc_channel(channel) {
                Ok(image) => Some((index, image)),
                Err(err) => {
                    tracing::warn!(
                        camera = %slot.camera.name(),
                        %channel,
                        %err,
                        "Failed to compute image"
                    );
                    None
                }
            })
            .collect()
    }
}
