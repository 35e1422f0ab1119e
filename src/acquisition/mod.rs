//! Frame acquisition
//!
//! A background thread pulls frames from a [`FrameStream`] and hands the
//! newest one to consumer threads through [`FrameGrabber`].

pub mod engine;
pub mod stream;

pub use engine::{FrameGrabber, GrabberStats, LinkState};
pub use stream::{BlobStream, Frame, FrameStream};
