//! Tool execution for Parley.
//!
//! The [`ToolExecutor`] runs a batch of model-issued calls against the
//! backends registered in a [`BackendRegistry`], one backend per
//! [`ToolKind`](parley_core::ToolKind). In-process tools are served by the
//! [`NativeBackend`], which ships with a calculator and a mock `get_weather`.

pub mod calculator;
pub mod executor;
pub mod native;
pub mod registry;
pub mod weather_lookup;

use std::sync::Arc;

pub use executor::{PreparationError, PreparedCall, ToolExecutor, parse_arguments};
pub use native::{NativeBackend, NativeFunction};
pub use registry::BackendRegistry;

/// The native backend with every built-in function registered.
pub fn builtin_native_backend() -> NativeBackend {
    NativeBackend::new()
        .with(Arc::new(calculator::Calculator))
        .with(Arc::new(weather_lookup::WeatherLookup))
}

/// A backend registry holding the built-in native backend.
pub fn default_backends() -> BackendRegistry {
    BackendRegistry::new().with(Arc::new(builtin_native_backend()))
}
