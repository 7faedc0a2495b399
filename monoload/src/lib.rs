pub mod events;
pub mod loader;
pub mod logging;
pub mod source;
pub mod state;

pub use loader::Loader;
pub use source::LoadSource;
pub use state::LifecycleState;

// Always expose testing module (integration tests need it)
pub mod testing;
