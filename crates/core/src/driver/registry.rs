//! Registered drivers and dependency-closure resolution.

use super::{ConfiguredDriver, OverriddenDriver, SharedDriver};
use crate::settings::ToolSettings;
use crate::{Error, Result};
use indexmap::IndexMap;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Drivers available to a run, by name.
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: HashMap<String, SharedDriver>,
}

impl DriverRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding one [`ConfiguredDriver`] per settings table.
    #[must_use]
    pub fn from_settings(settings: &ToolSettings) -> Self {
        let mut registry = Self::new();
        registry.apply_settings(settings);
        registry
    }

    /// Register a driver, replacing any driver of the same name.
    pub fn register(&mut self, driver: SharedDriver) {
        let name = driver.name().to_string();
        if self.drivers.insert(name.clone(), driver).is_some() {
            tracing::debug!(driver = %name, "Replaced registered driver");
        }
    }

    /// Apply `[drivers.<name>]` tables: overlay registered drivers, define
    /// the rest from settings alone.
    pub fn apply_settings(&mut self, settings: &ToolSettings) {
        for (name, driver_settings) in &settings.drivers {
            let driver: SharedDriver = match self.drivers.get(name) {
                Some(existing) => Arc::new(OverriddenDriver::new(
                    Arc::clone(existing),
                    driver_settings,
                )),
                None => Arc::new(ConfiguredDriver::from_settings(name, driver_settings)),
            };
            self.drivers.insert(name.clone(), driver);
        }
    }

    /// Look up a driver.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDriver`] if `name` is not registered.
    pub fn get(&self, name: &str) -> Result<SharedDriver> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownDriver {
                name: name.to_string(),
            })
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Registered driver names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve `roots` and everything they depend on, breadth-first.
    ///
    /// The result is unique and in discovery order: roots first, then their
    /// dependencies. Configure in reverse order to handle dependencies first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDriver`] for any unregistered name.
    pub fn resolve_closure<S: AsRef<str>>(
        &self,
        roots: &[S],
    ) -> Result<IndexMap<String, SharedDriver>> {
        let mut resolved = IndexMap::new();
        let mut queue: VecDeque<String> = roots.iter().map(|r| r.as_ref().to_string()).collect();

        while let Some(name) = queue.pop_front() {
            if resolved.contains_key(&name) {
                continue;
            }
            let driver = self.get(&name)?;
            queue.extend(driver.dependencies());
            resolved.insert(name, driver);
        }

        Ok(resolved)
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ConfigStrategy, DriverMetadata};
    use crate::settings::DriverSettings;

    fn registry() -> DriverRegistry {
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(ConfiguredDriver::new(
            DriverMetadata::new("jest").with_dependencies(["babel"]),
        )));
        registry.register(Arc::new(ConfiguredDriver::new(
            DriverMetadata::new("babel").with_dependencies(["browserslist"]),
        )));
        registry.register(Arc::new(ConfiguredDriver::new(DriverMetadata::new(
            "browserslist",
        ))));
        registry.register(Arc::new(ConfiguredDriver::new(
            DriverMetadata::new("eslint").with_dependencies(["babel"]),
        )));
        registry
    }

    #[test]
    fn test_closure_is_breadth_first_and_unique() {
        let closure = registry().resolve_closure(&["jest", "eslint"]).unwrap();
        let names: Vec<&str> = closure.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["jest", "eslint", "babel", "browserslist"]);
    }

    #[test]
    fn test_closure_unknown_dependency() {
        let mut registry = registry();
        registry.register(Arc::new(ConfiguredDriver::new(
            DriverMetadata::new("webpack").with_dependencies(["missing"]),
        )));

        let Err(err) = registry.resolve_closure(&["webpack"]) else {
            panic!("expected an unknown driver error");
        };
        assert!(matches!(err, Error::UnknownDriver { name } if name == "missing"));
    }

    #[test]
    fn test_apply_settings_overrides_and_defines() {
        let mut settings = ToolSettings::default();
        settings.drivers.insert(
            "jest".into(),
            DriverSettings {
                config_strategy: Some(ConfigStrategy::None),
                ..DriverSettings::default()
            },
        );
        settings.drivers.insert(
            "tsc".into(),
            DriverSettings {
                bin: Some("tsc".into()),
                ..DriverSettings::default()
            },
        );

        let mut registry = registry();
        registry.apply_settings(&settings);

        let jest = registry.get("jest").unwrap();
        assert_eq!(jest.metadata().config_strategy, ConfigStrategy::None);
        assert_eq!(jest.dependencies(), vec!["babel"]);
        assert!(registry.contains("tsc"));
    }
}
