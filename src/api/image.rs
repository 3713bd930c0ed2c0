use super::channel::{ChannelDescriptor, ImageType};
use ndarray::{Array2, Array3, Axis};
use std::time::SystemTime;

const PLANE_AXIS: Axis = Axis(2);

/// Pixel data of a channel image.
///
/// Arrays are indexed `[y, x]` (and `[y, x, plane]` for multi-plane data).
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    /// 8-bit RGB, three planes.
    Color(Array3<u8>),
    /// 8-bit single plane.
    Byte(Array2<u8>),
    /// 16-bit single plane.
    UShort(Array2<u16>),
    /// 32-bit float single plane.
    Float(Array2<f32>),
    /// Three 32-bit floats per pixel.
    Point3f(Array3<f32>),
}

impl ImageData {
    /// Layout of this image.
    pub const fn image_type(&self) -> ImageType {
        match self {
            Self::Color(_) => ImageType::Color,
            Self::Byte(_) => ImageType::Byte,
            Self::UShort(_) => ImageType::UShort,
            Self::Float(_) => ImageType::Float,
            Self::Point3f(_) => ImageType::Point3f,
        }
    }

    /// `(width, height)` in pixels.
    pub fn size(&self) -> (usize, usize) {
        let (height, width) = match self {
            Self::Color(data) => (data.len_of(Axis(0)), data.len_of(Axis(1))),
            Self::Point3f(data) => (data.len_of(Axis(0)), data.len_of(Axis(1))),
            Self::Byte(data) => data.dim(),
            Self::UShort(data) => data.dim(),
            Self::Float(data) => data.dim(),
        };
        (width, height)
    }

    /// Number of values per pixel.
    pub fn planes(&self) -> usize {
        match self {
            Self::Color(data) => data.len_of(PLANE_AXIS),
            Self::Point3f(data) => data.len_of(PLANE_AXIS),
            Self::Byte(_) | Self::UShort(_) | Self::Float(_) => 1,
        }
    }
}

/// An image calculated for one channel of one frame.
#[derive(Debug, Clone, PartialEq, derive_more::Deref)]
pub struct CameraImage {
    /// Channel the image belongs to.
    pub channel: ChannelDescriptor,
    /// Number of the frame the image was calculated from.
    pub frame_number: u64,
    /// Capture time of that frame.
    pub timestamp: SystemTime,
    /// Pixel data.
    #[deref]
    pub data: ImageData,
}
