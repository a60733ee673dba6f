//! # Rover Driver
//!
//! 链路核心：一个后台 IO 线程独占线路通道，对外提供非阻塞的
//! 命令入队、路径跟随控制和无锁状态快照。
//!
//! ```text
//! 调用线程                         IO 线程
//! RoverLink ──ControlRequest──▶ io_loop ──▶ WireChannel
//!     ▲                            │
//!     └────── ArcSwap 快照 ◀───────┘
//! ```
//!
//! 详见 [`RoverLink`] 与 [`LinkBuilder`]。

pub mod builder;
pub mod config;
pub mod error;
pub mod follower;
pub mod link;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod state;

pub use builder::LinkBuilder;
pub use config::LinkConfig;
pub use error::LinkError;
pub use follower::{PathFollower, Step};
pub use link::RoverLink;
pub use metrics::{LinkMetrics, MetricsSnapshot};
pub use pipeline::ControlRequest;
pub use queue::{DispatchQueue, PushOutcome};
pub use state::{ConnectionState, LinkContext, LinkStatus, PathActivity};
