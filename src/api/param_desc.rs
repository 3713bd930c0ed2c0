use crate::params::{ParamEnum, ParamKind, ParamType, ParamValue};
use crate::{CameraError, CameraResult};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Connection states in which a parameter may be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessState {
    /// Never accessible.
    Never,
    /// Only while the camera is connected.
    Connected,
    /// Only while the camera is disconnected.
    Disconnected,
    /// In any state.
    Always,
}

impl AccessState {
    /// Whether access is allowed in the given connection state.
    pub const fn allows(self, connected: bool) -> bool {
        match self {
            Self::Never => false,
            Self::Connected => connected,
            Self::Disconnected => !connected,
            Self::Always => true,
        }
    }
}

/// Physical unit of a parameter value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum Unit {
    /// Milliseconds.
    #[display("ms")]
    Milliseconds,
    /// Microseconds.
    #[display("µs")]
    Microseconds,
    /// Seconds.
    #[display("s")]
    Seconds,
    /// Hertz.
    #[display("Hz")]
    Hertz,
    /// Megahertz.
    #[display("MHz")]
    Megahertz,
    /// Decibel.
    #[display("dB")]
    Decibel,
    /// Percent.
    #[display("%")]
    Percent,
    /// Pixels.
    #[display("px")]
    Pixel,
    /// Millimeters.
    #[display("mm")]
    Millimeter,
    /// Meters.
    #[display("m")]
    Meter,
    /// Degrees Celsius.
    #[display("°C")]
    Celsius,
}

/// Restriction on the values a parameter accepts.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum Constraint {
    /// Any value of the right type.
    #[default]
    Free,
    /// Inclusive range.
    Range {
        /// Smallest accepted value.
        min: ParamValue,
        /// Largest accepted value.
        max: ParamValue,
    },
    /// Explicit list of accepted values.
    List(Vec<ParamValue>),
}

impl Constraint {
    /// Inclusive range `min..=max`.
    pub fn range<T: ParamKind>(min: T, max: T) -> Self {
        Self::Range {
            min: min.into_value(),
            max: max.into_value(),
        }
    }

    /// List of allowed values.
    pub fn list<T: ParamKind>(values: impl IntoIterator<Item = T>) -> Self {
        Self::List(values.into_iter().map(ParamKind::into_value).collect())
    }

    /// List of all variant names of an enum.
    pub fn variants<E: ParamEnum>() -> Self {
        Self::list(E::VARIANTS.iter().copied())
    }

    /// Check a value that already has the descriptor's type.
    ///
    /// List entries are returned in their canonical spelling.
    fn check(&self, value: ParamValue) -> CameraResult<ParamValue> {
        match self {
            Self::Free => Ok(value),
            Self::Range { min, max } => {
                let in_range = value.compare(min).is_some_and(|ord| ord.is_ge())
                    && value.compare(max).is_some_and(|ord| ord.is_le());
                if in_range {
                    Ok(value)
                } else {
                    Err(CameraError::invalid_value(format_args!(
                        "{value} is out of range [{min}, {max}]"
                    )))
                }
            }
            Self::List(allowed) => allowed
                .iter()
                .find(|candidate| candidate.matches(&value))
                .cloned()
                .ok_or_else(|| {
                    CameraError::invalid_value(format_args!(
                        "{value} is not one of [{}]",
                        allowed
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                }),
        }
    }
}

/// Description of a single camera setting.
///
/// Drivers produce descriptors without values and with `readable` / `writable` unset;
/// [`Camera`](crate::api::Camera) resolves both flags against the current connection state and
/// fills the value in whenever the parameter is readable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDesc {
    /// Unique parameter name, e.g. `Exposure`.
    pub name: Cow<'static, str>,
    /// Human readable description.
    pub description: Cow<'static, str>,
    /// Value type.
    pub ty: ParamType,
    /// Unit of the value, if it has one.
    pub unit: Option<Unit>,
    /// States in which the parameter may be read.
    pub readable_when: AccessState,
    /// States in which the parameter may be written.
    pub writable_when: AccessState,
    /// Accepted values.
    pub constraint: Constraint,
    /// Current value.
    pub value: Option<ParamValue>,
    /// Whether the parameter can be read right now.
    pub readable: bool,
    /// Whether the parameter can be written right now.
    pub writable: bool,
}

impl ParamDesc {
    /// New descriptor for a parameter of type `T`, readable and writable while connected.
    pub fn new<T: ParamKind>(
        name: impl Into<Cow<'static, str>>,
        description: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ty: T::TYPE,
            unit: None,
            readable_when: AccessState::Connected,
            writable_when: AccessState::Connected,
            constraint: Constraint::Free,
            value: None,
            readable: false,
            writable: false,
        }
    }

    /// Set the states in which the parameter may be read.
    pub const fn with_read_access(mut self, state: AccessState) -> Self {
        self.readable_when = state;
        self
    }

    /// Set the states in which the parameter may be written.
    pub const fn with_write_access(mut self, state: AccessState) -> Self {
        self.writable_when = state;
        self
    }

    /// Set the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Set the constraint.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = constraint;
        self
    }

    /// Lower and upper bound for range parameters.
    pub const fn range(&self) -> Option<(&ParamValue, &ParamValue)> {
        match &self.constraint {
            Constraint::Range { min, max } => Some((min, max)),
            _ => None,
        }
    }

    /// Allowed values for list parameters.
    pub fn allowed_values(&self) -> Option<&[ParamValue]> {
        match &self.constraint {
            Constraint::List(values) => Some(values),
            _ => None,
        }
    }

    /// Convert a value to this parameter's type and check it against the constraint.
    pub fn validate(&self, value: impl Into<ParamValue>) -> CameraResult<ParamValue> {
        value
            .into()
            .coerce(self.ty)
            .and_then(|value| self.constraint.check(value))
            .map_err(|err| {
                CameraError::new(err.code, format_args!("{}: {}", self.name, err.message))
            })
    }

    /// Typed view of the current value.
    pub fn typed_value<T: ParamKind>(&self) -> CameraResult<T> {
        let value = self.value.clone().ok_or_else(|| {
            CameraError::new(
                crate::CameraErrorCode::VALUE_NOT_SET,
                format_args!("{} has no value", self.name),
            )
        })?;
        T::from_value(value)
    }

    /// Current value formatted for display, empty if there is none.
    pub fn value_as_string(&self) -> String {
        self.value
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    pub(crate) fn resolve(mut self, connected: bool) -> Self {
        self.readable = self.readable_when.allows(connected);
        self.writable = self.writable_when.allows(connected);
        self
    }
}

impl fmt::Display for ParamDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = ", self.name)?;
        match &self.value {
            Some(value) => write!(f, "{value}")?,
            None => f.write_str("?")?,
        }
        if let Some(unit) = self.unit {
            write!(f, " {unit}")?;
        }
        match &self.constraint {
            Constraint::Free => Ok(()),
            Constraint::Range { min, max } => write!(f, " [{min}..{max}]"),
            Constraint::List(values) => {
                f.write_str(" {")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("}")
            }
        }
    }
}
