//! Loosely typed parameter values and their conversions to and from Rust types.

use crate::{CameraError, CameraResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Type tag of a parameter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum ParamType {
    /// `true` / `false`.
    Bool,
    /// Signed integer.
    Int,
    /// Floating point number.
    Float,
    /// Free text or the name of an enum variant.
    Text,
}

/// A parameter value as it crosses the uniform parameter API.
///
/// Values coming from configuration files or user input are often not of the exact type a
/// parameter expects (e.g. `"12"` for an integer); see [`ParamValue::coerce`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_more::From)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<i32> for ParamValue {
    fn from(i: i32) -> Self {
        Self::Int(i.into())
    }
}

impl From<u32> for ParamValue {
    fn from(i: u32) -> Self {
        Self::Int(i.into())
    }
}

impl From<f32> for ParamValue {
    fn from(f: f32) -> Self {
        Self::Float(f.into())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => b.fmt(f),
            Self::Int(i) => i.fmt(f),
            Self::Float(x) => x.fmt(f),
            Self::Text(s) => s.fmt(f),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

impl ParamValue {
    /// Type tag of this value.
    pub const fn ty(&self) -> ParamType {
        match self {
            Self::Bool(_) => ParamType::Bool,
            Self::Int(_) => ParamType::Int,
            Self::Float(_) => ParamType::Float,
            Self::Text(_) => ParamType::Text,
        }
    }

    /// Convert this value to the given type.
    ///
    /// Supported conversions:
    /// - text to bool (`true` / `false` in any casing), int or float by parsing;
    /// - int to float;
    /// - float to int when the value is integral;
    /// - anything to text.
    #[allow(clippy::as_conversions, clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn coerce(self, ty: ParamType) -> CameraResult<Self> {
        if self.ty() == ty {
            return Ok(self);
        }
        let converted = match (&self, ty) {
            (Self::Int(i), ParamType::Float) => Some(Self::Float(*i as f64)),
            (Self::Float(x), ParamType::Int)
                if x.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(x) =>
            {
                Some(Self::Int(*x as i64))
            }
            (Self::Text(s), ParamType::Bool) => parse_bool(s.trim()).map(Self::Bool),
            (Self::Text(s), ParamType::Int) => s.trim().parse().ok().map(Self::Int),
            (Self::Text(s), ParamType::Float) => s.trim().parse().ok().map(Self::Float),
            (_, ParamType::Text) => Some(Self::Text(self.to_string())),
            _ => None,
        };
        converted.ok_or_else(|| {
            CameraError::invalid_value(format_args!(
                "Cannot convert {self:?} ({}) to {ty}",
                self.ty()
            ))
        })
    }

    /// Numeric view of the value, if it has one.
    #[allow(clippy::as_conversions, clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(x) => Some(*x),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }

    /// Compare two values of compatible type.
    ///
    /// Integers are compared exactly, mixed numbers as floats, text lexicographically.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }

    /// Whether two values denote the same setting.
    ///
    /// Text is compared case-insensitively, floats with a relative epsilon.
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.eq_ignore_ascii_case(b),
            (Self::Float(_), _) | (_, Self::Float(_)) => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => (a - b).abs() <= f64::EPSILON * a.abs().max(1.0),
                _ => false,
            },
            _ => self == other,
        }
    }
}

/// Rust types that can be stored in a [`ParamValue`].
pub trait ParamKind: Sized {
    /// Type tag used by descriptors of this kind.
    const TYPE: ParamType;

    /// Wrap into a loosely typed value.
    fn into_value(self) -> ParamValue;

    /// Extract from a loosely typed value, converting where possible.
    fn from_value(value: ParamValue) -> CameraResult<Self>;
}

fn type_mismatch(value: &ParamValue, ty: ParamType) -> CameraError {
    CameraError::invalid_value(format_args!("Expected a {ty} value, got {value:?}"))
}

impl ParamKind for bool {
    const TYPE: ParamType = ParamType::Bool;

    fn into_value(self) -> ParamValue {
        ParamValue::Bool(self)
    }

    fn from_value(value: ParamValue) -> CameraResult<Self> {
        match value.coerce(Self::TYPE)? {
            ParamValue::Bool(b) => Ok(b),
            other => Err(type_mismatch(&other, Self::TYPE)),
        }
    }
}

impl ParamKind for String {
    const TYPE: ParamType = ParamType::Text;

    fn into_value(self) -> ParamValue {
        ParamValue::Text(self)
    }

    fn from_value(value: ParamValue) -> CameraResult<Self> {
        match value.coerce(Self::TYPE)? {
            ParamValue::Text(s) => Ok(s),
            other => Err(type_mismatch(&other, Self::TYPE)),
        }
    }
}

impl ParamKind for f64 {
    const TYPE: ParamType = ParamType::Float;

    fn into_value(self) -> ParamValue {
        ParamValue::Float(self)
    }

    fn from_value(value: ParamValue) -> CameraResult<Self> {
        match value.coerce(Self::TYPE)? {
            ParamValue::Float(x) => Ok(x),
            other => Err(type_mismatch(&other, Self::TYPE)),
        }
    }
}

impl ParamKind for f32 {
    const TYPE: ParamType = ParamType::Float;

    fn into_value(self) -> ParamValue {
        ParamValue::Float(self.into())
    }

    #[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
    fn from_value(value: ParamValue) -> CameraResult<Self> {
        f64::from_value(value).map(|x| x as Self)
    }
}

macro_rules! int_param_kind {
    ($($ty:ty),*) => {
        $(
            impl ParamKind for $ty {
                const TYPE: ParamType = ParamType::Int;

                fn into_value(self) -> ParamValue {
                    ParamValue::Int(self.into())
                }

                fn from_value(value: ParamValue) -> CameraResult<Self> {
                    match value.coerce(Self::TYPE)? {
                        ParamValue::Int(i) => Self::try_from(i).map_err(|err| {
                            CameraError::invalid_value(format_args!(
                                "{i} does not fit into {}: {err}",
                                stringify!($ty)
                            ))
                        }),
                        other => Err(type_mismatch(&other, Self::TYPE)),
                    }
                }
            }
        )*
    };
}

int_param_kind!(u8, u16, u32, i16, i32);

impl ParamKind for i64 {
    const TYPE: ParamType = ParamType::Int;

    fn into_value(self) -> ParamValue {
        ParamValue::Int(self)
    }

    fn from_value(value: ParamValue) -> CameraResult<Self> {
        match value.coerce(Self::TYPE)? {
            ParamValue::Int(i) => Ok(i),
            other => Err(type_mismatch(&other, Self::TYPE)),
        }
    }
}

/// Enums whose variants are exposed as a list of named settings.
///
/// Implemented by [`param_enum`](crate::param_enum).
pub trait ParamEnum: ParamKind + Copy + 'static {
    /// All variants in declaration order.
    const VARIANTS: &'static [Self];

    /// Name of the variant as shown to users.
    fn name(self) -> &'static str;
}

/// Look up an enum variant from a value holding its name (in any casing).
pub fn enum_from_value<E: ParamEnum>(value: ParamValue) -> CameraResult<E> {
    let name = String::from_value(value)?;
    E::VARIANTS
        .iter()
        .copied()
        .find(|variant| variant.name().eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| {
            CameraError::invalid_value(format_args!(
                "{name:?} is not one of {:?}",
                E::VARIANTS.iter().map(|v| v.name()).collect::<Vec<_>>()
            ))
        })
}

/// Declare an enum whose variants are selectable by name through the parameter API.
///
/// ```
/// use macro_rules_attribute::apply;
/// use metricam::param_enum;
///
/// #[apply(param_enum)]
/// pub enum Flash {
///     Off,
///     On,
/// }
/// ```
#[macro_export]
macro_rules! param_enum {
    (
        $(#[$attr:meta])*
        $pub:vis enum $name:ident {
            $(
                $(#[$variant_attr:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $pub enum $name {
            $(
                $(#[$variant_attr])*
                $variant,
            )*
        }

        impl $crate::params::ParamEnum for $name {
            const VARIANTS: &'static [Self] = &[$(Self::$variant),*];

            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)*
                }
            }
        }

        impl $crate::params::ParamKind for $name {
            const TYPE: $crate::params::ParamType = $crate::params::ParamType::Text;

            fn into_value(self) -> $crate::params::ParamValue {
                $crate::params::ParamValue::Text(
                    $crate::params::ParamEnum::name(self).to_owned(),
                )
            }

            fn from_value(value: $crate::params::ParamValue) -> $crate::CameraResult<Self> {
                $crate::params::enum_from_value(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::params::ParamEnum::name(*self))
            }
        }
    };
}
