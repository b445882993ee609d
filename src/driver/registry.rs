//! Language → driver factory mapping.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{CppDriver, Driver, DriverConfig};

/// Languages with a built-in driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    /// C++ (serial, OpenMP, MPI, Kokkos, CUDA, HIP).
    Cpp,
}

impl Language {
    /// Every language with a built-in driver.
    pub const ALL: [Language; 1] = [Language::Cpp];

    /// Identifier used in corpus documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
        }
    }

    /// Factory for this language's driver.
    pub fn factory(&self, driver_root: PathBuf) -> DriverFactory {
        match self {
            Language::Cpp => Box::new(move |config: DriverConfig| {
                Box::new(CppDriver::new(config, driver_root.clone())) as Box<dyn Driver>
            }),
        }
    }
}

/// Constructs a driver for one prompt.
pub type DriverFactory = Box<dyn Fn(DriverConfig) -> Box<dyn Driver> + Send + Sync>;

/// Maps language identifiers to driver factories.
#[derive(Default)]
pub struct DriverRegistry {
    factories: BTreeMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in language.
    ///
    /// `driver_root` is the directory holding the benchmark driver sources.
    pub fn builtin(driver_root: impl Into<PathBuf>) -> Self {
        let driver_root = driver_root.into();
        let mut registry = Self::new();
        for language in Language::ALL {
            registry.register(language.as_str(), language.factory(driver_root.clone()));
        }
        registry
    }

    /// Registers (or replaces) the factory for a language.
    pub fn register(&mut self, language: impl Into<String>, factory: DriverFactory) {
        self.factories.insert(language.into(), factory);
    }

    /// Creates a driver, or `None` if the language is not registered.
    pub fn create(&self, language: &str, config: DriverConfig) -> Option<Box<dyn Driver>> {
        self.factories.get(language).map(|factory| factory(config))
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("languages", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParallelismModel;

    #[test]
    fn test_builtin_registry() {
        let registry = DriverRegistry::builtin("drivers");
        assert_eq!(format!("{:?}", registry), r#"DriverRegistry { languages: ["cpp"] }"#);

        let driver = registry
            .create("cpp", DriverConfig::new(ParallelismModel::Serial))
            .unwrap();
        assert_eq!(driver.language(), "cpp");
        assert!(registry
            .create("rust", DriverConfig::new(ParallelismModel::Serial))
            .is_none());
    }
}
