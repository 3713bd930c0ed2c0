//! Registry of camera types that can be created by name at runtime.

use crate::api::{Camera, CameraDriver};
use crate::{CameraError, CameraErrorCode, CameraResult};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A camera driver that can be registered with [`CameraManagement`].
pub trait CameraType: CameraDriver + Default + 'static {
    /// Name the type is registered and created under.
    const NAME: &'static str;
}

type Factory = Arc<dyn Fn() -> Camera + Send + Sync>;

#[derive(Clone, derive_more::Debug)]
struct Registration {
    name: Cow<'static, str>,
    #[debug(skip)]
    factory: Factory,
}

// Keyed by lowercase name.
type Registrations = BTreeMap<String, Registration>;

/// Builder for [`CameraManagement`].
#[derive(Debug, Default)]
pub struct CameraManagementBuilder {
    types: Registrations,
}

impl CameraManagementBuilder {
    /// Register a camera type under its [`CameraType::NAME`].
    pub fn with<T: CameraType>(self) -> Self {
        self.with_factory(T::NAME, || Camera::new(T::default()))
    }

    /// Register a custom factory.
    ///
    /// # Panics
    ///
    /// If a type with the same name (ignoring case) is already registered.
    pub fn with_factory(
        mut self,
        name: impl Into<Cow<'static, str>>,
        factory: impl Fn() -> Camera + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        let key = name.to_lowercase();
        assert!(
            !self.types.contains_key(&key),
            "Camera type {name:?} is registered twice"
        );
        tracing::debug!(%name, "Registered camera type");
        _ = self.types.insert(
            key,
            Registration {
                name,
                factory: Arc::new(factory),
            },
        );
        self
    }

    /// Finish registration.
    pub fn finish(self) -> CameraManagement {
        CameraManagement {
            types: Arc::new(self.types),
        }
    }
}

/// Set of known camera types.
#[derive(Debug, Clone, Default)]
pub struct CameraManagement {
    types: Arc<Registrations>,
}

impl CameraManagement {
    /// Start registering camera types.
    pub fn builder() -> CameraManagementBuilder {
        CameraManagementBuilder::default()
    }

    /// All camera types bundled with this crate.
    pub fn with_builtin() -> Self {
        let builder = Self::builder();
        #[cfg(feature = "ueye")]
        let builder = builder.with::<crate::ueye::UEyeCamera>();
        builder.finish()
    }

    /// Names of the registered types, sorted case-insensitively.
    pub fn available_types(&self) -> Vec<&str> {
        self.types
            .values()
            .map(|registration| &*registration.name)
            .collect()
    }

    /// Whether a type with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(&name.to_lowercase())
    }

    /// Create a disconnected camera of the given type.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub fn create(&self, name: &str) -> CameraResult<Camera> {
        let registration = self.types.get(&name.to_lowercase()).ok_or_else(|| {
            CameraError::new(
                CameraErrorCode::NOT_IMPLEMENTED,
                format_args!("Unknown camera type {name:?}"),
            )
        })?;
        Ok((registration.factory)())
    }
}
