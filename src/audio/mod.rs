pub mod controller;
pub mod playback;
pub mod playlist;
pub mod prepare;
pub mod processing;

pub use controller::{
    PlaybackConfig, PlaybackController, PlaybackEvent, PlaybackListener, PlaybackRun,
    SessionReport, SessionStatus, StopHandle,
};
pub use playback::{CpalDevice, PlaybackDevice, SharedDevice};
pub use playlist::{release, Playlist};
pub use prepare::{prepare, PrepareOptions};
