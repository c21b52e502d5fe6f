pub mod bus;
pub mod collab;
pub mod debug_flags;
pub mod error;
pub mod hooks;
pub mod savestate;
pub mod variants;
pub mod video;

pub use bus::BusTarget;
pub use error::{VideoError, VideoResult};
pub use hooks::{Hook, HookRegistry};
pub use savestate::VideoSaveState;
pub use video::{VideoConfig, VideoHooks, VideoSystem};
