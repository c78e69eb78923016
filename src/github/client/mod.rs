//! Everything needed to talk to GitHub: the raw [`Transport`](transport::Transport) and the retrying
//! [`RequestExecutor`](executor::RequestExecutor) built on top of it.

pub mod executor;
pub mod transport;
