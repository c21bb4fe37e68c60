pub mod coordinator;
pub mod handlers;
pub mod sweeper;

pub use coordinator::{ResumeStore, UploadRequest};
pub use sweeper::spawn_sweeper;
