use crate::{CameraError, CameraResult};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::{LazyLock, PoisonError, RwLock};

/// Pixel layout of the images a channel produces.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum ImageType {
    /// 8-bit RGB.
    Color,
    /// 8-bit single plane.
    Byte,
    /// 16-bit single plane.
    UShort,
    /// 32-bit float single plane, e.g. distances in meters.
    Float,
    /// Three 32-bit floats per pixel.
    Point3f,
}

/// A named data stream a camera can produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    /// Channel name, e.g. [`names::INTENSITY`].
    pub name: Cow<'static, str>,
    /// Image layout of the channel.
    pub image_type: ImageType,
}

impl ChannelDescriptor {
    /// Create a new descriptor.
    pub fn new(name: impl Into<Cow<'static, str>>, image_type: ImageType) -> Self {
        Self {
            name: name.into(),
            image_type,
        }
    }
}

/// Names of well-known channels.
pub mod names {
    /// Colour image.
    pub const COLOR: &str = "Color";
    /// Grey-scale intensity image.
    pub const INTENSITY: &str = "Intensity";
    /// Depth along the optical axis.
    pub const Z_IMAGE: &str = "ZImage";
    /// Radial distance.
    pub const DISTANCE: &str = "Distance";
    /// Amplitude of a time-of-flight signal.
    pub const AMPLITUDE: &str = "Amplitude";
    /// Cartesian 3-D points.
    pub const POINT_3D_IMAGE: &str = "Point3DImage";
    /// Left image of a stereo pair.
    pub const LEFT: &str = "Left";
    /// Right image of a stereo pair.
    pub const RIGHT: &str = "Right";
    /// Stereo disparity.
    pub const DISPARITY: &str = "Disparity";
    /// Per-pixel confidence.
    pub const CONFIDENCE: &str = "Confidence";
    /// Per-pixel confidence as reported by the device.
    pub const RAW_CONFIDENCE: &str = "RawConfidence";
    /// Red colour plane.
    pub const RED: &str = "Red";
    /// Green colour plane.
    pub const GREEN: &str = "Green";
    /// Blue colour plane.
    pub const BLUE: &str = "Blue";
}

const WELL_KNOWN: &[(&str, ImageType)] = &[
    (names::COLOR, ImageType::Color),
    (names::INTENSITY, ImageType::Byte),
    (names::Z_IMAGE, ImageType::Float),
    (names::DISTANCE, ImageType::Float),
    (names::AMPLITUDE, ImageType::Float),
    (names::POINT_3D_IMAGE, ImageType::Point3f),
    (names::LEFT, ImageType::Byte),
    (names::RIGHT, ImageType::Byte),
    (names::DISPARITY, ImageType::Float),
    (names::CONFIDENCE, ImageType::Float),
    (names::RAW_CONFIDENCE, ImageType::UShort),
    (names::RED, ImageType::Byte),
    (names::GREEN, ImageType::Byte),
    (names::BLUE, ImageType::Byte),
];

/// Mapping from channel names to their descriptors.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    channels: FnvHashMap<Cow<'static, str>, ChannelDescriptor>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        let mut registry = Self {
            channels: FnvHashMap::default(),
        };
        for &(name, image_type) in WELL_KNOWN {
            _ = registry
                .channels
                .insert(name.into(), ChannelDescriptor::new(name, image_type));
        }
        registry
    }
}

static GLOBAL: LazyLock<RwLock<ChannelRegistry>> = LazyLock::new(RwLock::default);

impl ChannelRegistry {
    /// Registry containing all well-known channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by [`Camera`](crate::api::Camera).
    pub fn global() -> &'static RwLock<Self> {
        &GLOBAL
    }

    /// Look up a channel in the process-wide registry.
    pub fn lookup(name: &str) -> CameraResult<ChannelDescriptor> {
        GLOBAL
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .descriptor(name)
    }

    /// Register a channel in the process-wide registry.
    pub fn register_global(
        name: impl Into<Cow<'static, str>>,
        image_type: ImageType,
    ) -> CameraResult<ChannelDescriptor> {
        GLOBAL
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(name, image_type)
    }

    /// Register a custom channel.
    ///
    /// Registering a known name again with the same image type returns the existing descriptor.
    #[tracing::instrument(level = "debug", skip(self, name))]
    pub fn register(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        image_type: ImageType,
    ) -> CameraResult<ChannelDescriptor> {
        let name = name.into();
        if let Some(existing) = self.channels.get(&name) {
            return if existing.image_type == image_type {
                Ok(existing.clone())
            } else {
                Err(CameraError::invalid_value(format_args!(
                    "Channel {name:?} is already registered with image type {}",
                    existing.image_type
                )))
            };
        }
        let descriptor = ChannelDescriptor::new(name.clone(), image_type);
        _ = self.channels.insert(name, descriptor.clone());
        tracing::debug!(name = %descriptor.name, "Registered custom channel");
        Ok(descriptor)
    }

    /// Look up a channel by name.
    pub fn descriptor(&self, name: &str) -> CameraResult<ChannelDescriptor> {
        self.channels
            .get(name)
            .cloned()
            .ok_or_else(|| CameraError::unknown_channel(name))
    }

    /// Whether a channel with the given name is known.
    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// All registered channels, sorted by name.
    pub fn channels(&self) -> Vec<ChannelDescriptor> {
        let mut channels = self.channels.values().cloned().collect::<Vec<_>>();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        channels
    }
}
