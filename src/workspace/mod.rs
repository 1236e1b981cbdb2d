pub mod discovery;
pub mod manager;
pub mod storage_size;
pub mod validate;

pub use discovery::discover;
pub use manager::{CloseAllReport, WorkspaceManager};
pub use validate::{normalize, WorkspaceId, DEFAULT_WORKSPACE};
