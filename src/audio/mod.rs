pub mod backend;
pub mod duplexer;
pub mod file;
pub mod track;

pub use backend::{AudioBackend, AudioBackendFactory, AudioFrame, AudioInput, CaptureConfig, TrackSource};
pub use duplexer::{CaptureDuplexer, FinalizedTracks};
pub use file::WavFileBackend;
