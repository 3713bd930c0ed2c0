use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;

/// Numeric error code carried by every [`CameraError`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraErrorCode(u16);

impl TryFrom<u16> for CameraErrorCode {
    type Error = eyre::Error;

    /// Accepts `0` and the codes from `0x400` to `0xFFF`.
    fn try_from(raw: u16) -> eyre::Result<Self> {
        if raw != 0 && !(BASE..=MAX).contains(&raw) {
            eyre::bail!("{raw:#X} is not a camera error code ({BASE:#X}..={MAX:#X})");
        }
        Ok(Self(raw))
    }
}

// Generic codes start at `BASE`, SDK statuses are mapped from `DRIVER_BASE` up to `MAX`.
const BASE: u16 = 0x400;
const DRIVER_BASE: u16 = 0x500;
const MAX: u16 = 0xFFF;

impl CameraErrorCode {
    /// Error code for a vendor SDK status, offset into the driver range.
    ///
    /// Panics for driver codes above `0xAFF`.
    ///
    /// The uEye driver maps its `UEyeStatus` values this way, keeping the SDK's number so it
    /// can be looked up in the vendor documentation.
    ///
    /// ```
    /// use metricam::{CameraError, CameraErrorCode};
    ///
    /// fn sdk_error(status: u16) -> CameraError {
    ///     let code = CameraErrorCode::new_for_driver(status);
    ///     CameraError::new(code, format_args!("SDK status {status}"))
    /// }
    ///
    /// assert_eq!(sdk_error(122).code.as_driver_error(), Ok(122));
    /// assert_eq!(CameraErrorCode::NOT_CONNECTED.as_driver_error(), Err(0x407));
    /// ```
    pub const fn new_for_driver(status: u16) -> Self {
        assert!(status <= MAX - DRIVER_BASE, "SDK status does not fit the driver range");
        Self(DRIVER_BASE + status)
    }

    /// SDK status behind a driver error, or the raw code as `Err` for the generic codes.
    pub const fn as_driver_error(self) -> Result<u16, u16> {
        match self.0.checked_sub(DRIVER_BASE) {
            Some(status) => Ok(status),
            None => Err(self.0),
        }
    }

    /// Get the raw error code.
    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// Camera error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("Camera error {code}: {message}")]
pub struct CameraError {
    /// Error number.
    pub code: CameraErrorCode,
    /// Error message.
    pub message: Cow<'static, str>,
}

impl CameraError {
    /// Create a new `CameraError` from given error code and a message.
    pub fn new(code: CameraErrorCode, message: impl std::fmt::Display) -> Self {
        Self {
            code,
            message: message.to_string().into(),
        }
    }
}

/// Result type for camera operations.
pub type CameraResult<T = ()> = Result<T, CameraError>;

macro_rules! camera_error_codes {
    ($(#[doc = $doc:literal] $name:ident = $value:literal,)*) => {
        impl CameraErrorCode {
            $(
                #[doc = $doc]
                pub const $name: Self = Self($value);
            )*
        }

        impl std::fmt::Debug for CameraErrorCode {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match *self {
                    $(
                        Self::$name => f.write_str(stringify!($name)),
                    )*
                    _ => match self.as_driver_error() {
                        Ok(driver_code) => write!(f, "DRIVER_ERROR[{driver_code}]"),
                        Err(raw_code) => write!(f, "{raw_code:#X}"),
                    },
                }
            }
        }

        impl std::fmt::Display for CameraErrorCode {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Debug::fmt(self, f)
            }
        }

        impl CameraError {
            $(
                #[doc = $doc]
                pub const $name: Self = Self {
                    code: CameraErrorCode::$name,
                    message: Cow::Borrowed(camera_error_codes!(@msg $name $doc)),
                };
            )*
        }
    };

    (@msg OK $doc:literal) => ("");
    (@msg $name:ident $doc:literal) => ($doc);
}

camera_error_codes! {
    #[doc = "Success"]
    OK = 0,
    #[doc = "Property or method not implemented"]
    NOT_IMPLEMENTED = 0x400,
    #[doc = "Invalid value"]
    INVALID_VALUE = 0x401,
    #[doc = "A value has not been set"]
    VALUE_NOT_SET = 0x402,
    #[doc = "The camera is not connected"]
    NOT_CONNECTED = 0x407,
    #[doc = "The requested operation can not be undertaken at this time"]
    INVALID_OPERATION = 0x40B,
    #[doc = "Connecting to the camera failed"]
    CONNECTION_FAILED = 0x410,
    #[doc = "The camera does not support this parameter"]
    PARAMETER_NOT_SUPPORTED = 0x411,
    #[doc = "The parameter can not be read in the current camera state"]
    PARAMETER_NOT_READABLE = 0x412,
    #[doc = "The parameter can not be written in the current camera state"]
    PARAMETER_NOT_WRITABLE = 0x413,
    #[doc = "The requested combination of settings is not supported"]
    SETTINGS_COMBINATION_NOT_SUPPORTED = 0x414,
    #[doc = "The camera does not provide this channel"]
    CHANNEL_NOT_SUPPORTED = 0x420,
    #[doc = "The channel is not active"]
    CHANNEL_NOT_ACTIVE = 0x421,
    #[doc = "No calibration data found"]
    CALIBRATION_NOT_FOUND = 0x430,
}

impl CameraError {
    /// Create a new "invalid operation" error with the specified message.
    pub fn invalid_operation(message: impl std::fmt::Display) -> Self {
        Self::new(CameraErrorCode::INVALID_OPERATION, message)
    }

    /// Create a new "invalid value" error with the specified message.
    pub fn invalid_value(message: impl std::fmt::Display) -> Self {
        Self::new(CameraErrorCode::INVALID_VALUE, message)
    }

    /// Create a new "connection failed" error with the specified message.
    pub fn connection_failed(message: impl std::fmt::Display) -> Self {
        Self::new(CameraErrorCode::CONNECTION_FAILED, message)
    }

    /// Create a "parameter not supported" error for the given parameter name.
    pub fn unknown_parameter(name: &str) -> Self {
        Self::new(
            CameraErrorCode::PARAMETER_NOT_SUPPORTED,
            format_args!("Parameter {name:?} is not supported by this camera"),
        )
    }

    /// Create a "parameter not writable" error for a parameter without a setter.
    pub fn read_only(name: &str) -> Self {
        Self::new(
            CameraErrorCode::PARAMETER_NOT_WRITABLE,
            format_args!("Parameter {name:?} is read-only"),
        )
    }

    pub(crate) fn unknown_channel(name: &str) -> Self {
        Self::new(
            CameraErrorCode::CHANNEL_NOT_SUPPORTED,
            format_args!("Channel {name:?} is not supported"),
        )
    }

    /// Whether this error is a driver-specific one.
    pub const fn is_driver_error(&self) -> bool {
        self.code.as_driver_error().is_ok()
    }
}
