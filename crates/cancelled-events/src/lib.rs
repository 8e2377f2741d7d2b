/*
[INPUT]:  Public API exports for cancelled-events crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod destination;
pub mod effect;
pub mod reducer;
pub mod store;
pub mod view;

// Re-export main types for convenience
pub use config::DemoConfig;
pub use destination::{DestinationKind, DestinationState, PresentationAction};
pub use effect::{Effect, JobError, SpawnScope};
pub use reducer::{Action, RootState, StableReducer};
pub use store::{LifecycleEvent, LifecycleEventKind, Store, StoreHandle};
pub use view::ViewHost;
