/// Declare the parameter table of a camera driver.
///
/// Generates a [`Parameters`](crate::api::Parameters) implementation from one entry per
/// parameter. Each entry names the parameter, its Rust type, the getter (and, for writable
/// parameters, the setter after a `/`), the connection states gating read and write access,
/// and optionally a unit and a method returning the current [`Constraint`](crate::api::Constraint).
/// Doc comments on an entry become the parameter description.
///
/// Getters have the signature `fn(&self) -> CameraResult<T>`, setters
/// `fn(&mut self, T) -> CameraResult`, constraint methods `fn(&self) -> Constraint`.
///
/// ```
/// use metricam::api::Constraint;
/// use metricam::CameraResult;
///
/// #[derive(Debug, Default)]
/// struct Projector {
///     brightness: i32,
/// }
///
/// impl Projector {
///     fn brightness(&self) -> CameraResult<i32> {
///         Ok(self.brightness)
///     }
///
///     fn set_brightness(&mut self, brightness: i32) -> CameraResult {
///         self.brightness = brightness;
///         Ok(())
///     }
///
///     fn brightness_range(&self) -> Constraint {
///         Constraint::range(0, 255)
///     }
/// }
///
/// metricam::camera_params! {
///     impl Parameters for Projector {
///         /// Projector brightness.
///         "Brightness": i32 => brightness / set_brightness {
///             read: Always,
///             write: Connected,
///             constraint: brightness_range,
///         }
///     }
/// }
/// ```
#[macro_export]
macro_rules! camera_params {
    (@write $this:ident, $value:ident, $name:literal, $ty:ty) => {
        Err($crate::CameraError::read_only($name))
    };

    (@write $this:ident, $value:ident, $name:literal, $ty:ty, $setter:ident) => {
        $this.$setter(<$ty as $crate::params::ParamKind>::from_value($value)?)
    };

    (
        impl Parameters for $driver:ty {
            $(
                $(#[doc = $doc:literal])*
                $name:literal: $ty:ty => $getter:ident $(/ $setter:ident)? {
                    read: $read:ident,
                    write: $write:ident
                    $(, unit: $unit:ident)?
                    $(, constraint: $constraint:ident)?
                    $(,)?
                }
            )*
        }
    ) => {
        impl $crate::api::Parameters for $driver {
            fn descriptors(&self) -> Vec<$crate::api::ParamDesc> {
                vec![
                    $(
                        $crate::api::ParamDesc::new::<$ty>($name, concat!($($doc),*).trim())
                            .with_read_access($crate::api::AccessState::$read)
                            .with_write_access($crate::api::AccessState::$write)
                            $(.with_unit($crate::api::Unit::$unit))?
                            $(.with_constraint(self.$constraint()))?
                    ),*
                ]
            }

            fn read(&self, name: &str) -> $crate::CameraResult<$crate::params::ParamValue> {
                match name {
                    $(
                        $name => self.$getter().map($crate::params::ParamKind::into_value),
                    )*
                    _ => Err($crate::CameraError::unknown_parameter(name)),
                }
            }

            fn check(
                &self,
                name: &str,
                value: &$crate::params::ParamValue,
            ) -> $crate::CameraResult {
                match name {
                    $(
                        $name => <$ty as $crate::params::ParamKind>::from_value(value.clone()).map(drop),
                    )*
                    _ => Err($crate::CameraError::unknown_parameter(name)),
                }
            }

            fn write(
                &mut self,
                name: &str,
                value: $crate::params::ParamValue,
            ) -> $crate::CameraResult {
                match name {
                    $(
                        $name => $crate::camera_params!(@write self, value, $name, $ty $(, $setter)?),
                    )*
                    _ => Err($crate::CameraError::unknown_parameter(name)),
                }
            }
        }
    };
}
