//! Pipeline entry points.
//!
//! - `Poller::poll`: one fetch → scan → claim → notify cycle

pub mod poll;

pub use poll::{PollReport, Poller};
