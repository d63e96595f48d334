//! m4b engine
//!
//! Audiobook conversion job engine: validates and admits conversion
//! requests, drives the external transcoder under bounded concurrency, and
//! commits finished audiobooks into the library atomically.

pub mod args;
pub mod commit;
pub mod cover;
pub mod engine;
pub mod events;
pub mod job;
pub mod limiter;
pub mod locks;
pub mod progress;
pub mod reaper;
pub mod registry;
pub mod runner;
pub mod status_server;
pub mod store;
pub mod validate;

pub use m4b_engine_config as config;
pub use m4b_engine_config::Config;

pub use args::{build_chapter_metadata, build_conversion_plan, ConversionPlan, SideFile};
pub use commit::{cleanup_temp_files, finalize_conversion, CommitError, CommitSettings};
pub use engine::{ConversionEngine, ConversionRequest, EngineSettings};
pub use events::{EngineEvent, EventPublisher};
pub use job::{Job, JobPaths, JobStatus, JobStatusView, SourceFile};
pub use limiter::{derive_slots, ConversionSlots, SlotToken};
pub use locks::DirectoryLockSet;
pub use progress::ProgressParser;
pub use reaper::{sweep_stale_jobs, ReaperContext, ReaperSettings, TIMEOUT_ERROR};
pub use registry::JobRegistry;
pub use runner::{
    check_transcoder_available, run_transcode, CancelSignal, ProcessError, RunOutcome,
};
pub use status_server::{create_status_router, run_status_server, EngineSnapshot, ServerError};
pub use store::{ConversionCommit, LibraryStore, MemoryStore, StoreError};
pub use validate::{validate_sources, ValidationError};
