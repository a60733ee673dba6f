//! 共享状态上下文
//!
//! IO 线程是唯一写者，调用线程通过 `ArcSwap` 无锁读取快照。
//! 位姿是唯一的例外：由外部位姿源（调用方）写入，IO 线程只读。

use arc_swap::ArcSwap;
use rover_protocol::{RobotPose, SensorFrame};
use std::sync::Arc;

/// 连接状态机
///
/// ```text
/// Disconnected → Connecting → Connected
///      ▲             │            │
///      └─────────────┴────────────┘ (拨号失败 / 链路丢失)
/// ```
///
/// 退避等待期间状态回到 `Disconnected`；是否有重试在排队
/// 看 [`LinkStatus::consecutive_failures`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// 通道未建立（初始状态或等待重连）
    #[default]
    Disconnected,
    /// 正在拨号
    Connecting,
    /// 通道已建立
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        };
        f.write_str(text)
    }
}

/// 连接状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub state: ConnectionState,
    /// 连续拨号失败次数（成功建立后归零；非零表示正在等待重试）
    pub consecutive_failures: u32,
}

/// 路径跟随进度快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathActivity {
    pub active: bool,
    /// 当前段起点在路径中的下标
    pub next_index: usize,
    /// 路径总点数
    pub len: usize,
}

/// 共享状态上下文
///
/// 所有字段的写入都是整体替换（store），读者拿到的永远是一份
/// 自洽的快照，不存在半更新状态。
pub struct LinkContext {
    /// 连接状态
    pub status: ArcSwap<LinkStatus>,
    /// 最近一帧有效变化的传感器数据
    pub telemetry: ArcSwap<SensorFrame>,
    /// 最近收到的状态行（固件的非 JSON 消息）
    pub status_line: ArcSwap<String>,
    /// 小车位姿（外部位姿源写入，IO 线程只读）
    pub pose: ArcSwap<RobotPose>,
    /// 路径跟随进度
    pub path: ArcSwap<PathActivity>,
}

impl LinkContext {
    pub fn new() -> Self {
        Self {
            status: ArcSwap::from_pointee(LinkStatus::default()),
            telemetry: ArcSwap::from_pointee(SensorFrame::default()),
            status_line: ArcSwap::from_pointee(String::new()),
            pose: ArcSwap::from_pointee(RobotPose::default()),
            path: ArcSwap::from_pointee(PathActivity::default()),
        }
    }

    /// 更新连接状态（IO 线程专用）
    pub(crate) fn set_status(&self, state: ConnectionState, consecutive_failures: u32) {
        self.status.store(Arc::new(LinkStatus {
            state,
            consecutive_failures,
        }));
    }

    /// 更新路径进度（IO 线程专用）
    pub(crate) fn set_path(&self, activity: PathActivity) {
        self.path.store(Arc::new(activity));
    }
}

impl Default for LinkContext {
    fn default() -> Self {
        Self::new()
    }
}
