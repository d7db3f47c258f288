pub mod config;
pub mod errors;
pub mod infrastructure;
pub mod logging;

// Re-export commonly used items for convenience
pub use config::InjectiveConfig;
pub use errors::{ConfigError, InjectError, LoaderError};
pub use infrastructure::{
    instance, CreationKind, CreationMetadata, Dependencies, Export, FileLoader, Injector,
    InjectorStats, Instance, Location, MemoryLoader, ModuleLoader, PathResolver, Produced,
    RawModule, Resolved, SELF_REFERENCE,
};
