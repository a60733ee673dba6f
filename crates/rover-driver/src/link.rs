//! 链路句柄
//!
//! 对外的 [`RoverLink`]：封装后台 IO 线程、控制通道和状态快照读取。

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::metrics::{LinkMetrics, MetricsSnapshot};
use crate::pipeline::{ControlRequest, io_loop};
use crate::state::{LinkContext, LinkStatus, PathActivity};
use crossbeam_channel::Sender;
use rover_protocol::{PathPoint, RobotPose, SensorFrame};
use rover_wire::WireConnector;
use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::error;

/// 控制通道容量
///
/// 只承载控制请求的瞬时突发；命令的真正积压由 IO 线程内的
/// 调度队列管理。
const CONTROL_CHANNEL_CAPACITY: usize = 32;

/// 带超时的线程 join
///
/// 标准库的 `join` 没有超时版本：交给一个看门狗线程代为 join，
/// 结果经 mpsc 回传，超时就放弃等待。
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (done_tx, done_rx) = mpsc::channel();
        spawn(move || {
            let _ = done_tx.send(self.join());
        });

        match done_rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "IO thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "IO thread panicked during join",
            ))),
        }
    }
}

/// 小车链路（对外 API）
///
/// 由 [`LinkBuilder`](crate::LinkBuilder) 构造。所有方法都是非阻塞的：
/// 命令进入 IO 线程的调度队列，状态读取走无锁快照。
pub struct RoverLink {
    /// 控制请求通道
    ///
    /// 需要在 Drop 时**提前关闭通道**（在 join IO 线程之前），
    /// 否则 `io_loop` 永远收不到 `Disconnected` 而导致退出卡住。
    ctrl_tx: ManuallyDrop<Sender<ControlRequest>>,
    ctx: Arc<LinkContext>,
    metrics: Arc<LinkMetrics>,
    io_thread: Option<JoinHandle<()>>,
}

impl RoverLink {
    /// 启动 IO 线程（由 Builder 调用）
    pub(crate) fn start(
        connector: impl WireConnector + Send + 'static,
        endpoint: String,
        config: LinkConfig,
    ) -> Self {
        let (ctrl_tx, ctrl_rx) = crossbeam_channel::bounded(CONTROL_CHANNEL_CAPACITY);
        let ctx = Arc::new(LinkContext::new());
        let metrics = Arc::new(LinkMetrics::new());

        let ctx_clone = ctx.clone();
        let metrics_clone = metrics.clone();
        let io_thread = spawn(move || {
            io_loop(connector, endpoint, ctrl_rx, ctx_clone, metrics_clone, config);
        });

        Self {
            ctrl_tx: ManuallyDrop::new(ctrl_tx),
            ctx,
            metrics,
            io_thread: Some(io_thread),
        }
    }

    fn request(&self, request: ControlRequest) -> Result<(), LinkError> {
        self.ctrl_tx.try_send(request).map_err(|e| match e {
            crossbeam_channel::TrySendError::Full(_) => LinkError::ChannelFull,
            crossbeam_channel::TrySendError::Disconnected(_) => LinkError::ChannelClosed,
        })
    }

    /// 入队一条命令令牌
    ///
    /// 排队顺序即发送顺序；相邻的运动命令可能被更新的运动命令
    /// 合并，运动命令受最小发送间隔节流。
    ///
    /// # 错误
    /// - [`LinkError::ChannelFull`]: 控制通道瞬时满
    /// - [`LinkError::ChannelClosed`]: IO 线程已退出
    pub fn send_command(&self, token: impl Into<String>) -> Result<(), LinkError> {
        self.request(ControlRequest::Enqueue(token.into()))
    }

    /// 开始跟随路径
    ///
    /// 空路径是 no-op。已有路径在跟随时会被新路径替换。
    pub fn start_path(&self, points: Vec<PathPoint>) -> Result<(), LinkError> {
        self.request(ControlRequest::StartPath(points))
    }

    /// 停止路径跟随并停车
    pub fn stop_path(&self) -> Result<(), LinkError> {
        self.request(ControlRequest::StopPath)
    }

    /// 推送最新位姿（外部位姿源调用）
    ///
    /// 无锁整体替换，路径跟随的下一拍即可见。
    pub fn update_pose(&self, pose: RobotPose) {
        self.ctx.pose.store(Arc::new(pose));
    }

    /// 连接状态快照
    pub fn status(&self) -> LinkStatus {
        **self.ctx.status.load()
    }

    /// 通道当前是否建立
    pub fn is_connected(&self) -> bool {
        self.status().state == crate::state::ConnectionState::Connected
    }

    /// 最近一帧有效变化的遥测数据（无锁快照）
    pub fn telemetry(&self) -> SensorFrame {
        **self.ctx.telemetry.load()
    }

    /// 最近收到的状态行
    pub fn last_status_line(&self) -> String {
        self.ctx.status_line.load().as_ref().clone()
    }

    /// 路径跟随进度快照
    pub fn path_activity(&self) -> PathActivity {
        **self.ctx.path.load()
    }

    /// 性能指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl Drop for RoverLink {
    fn drop(&mut self) {
        // 关键：必须在 join 之前真正 drop 掉 Sender，
        // 否则接收端不会 Disconnected
        unsafe {
            ManuallyDrop::drop(&mut self.ctrl_tx);
        }

        let join_timeout = Duration::from_secs(2);
        if let Some(handle) = self.io_thread.take()
            && handle.join_timeout(join_timeout).is_err()
        {
            error!(
                "IO thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_wire::mock::MockWire;

    #[test]
    fn test_link_start_and_drop() {
        let wire = MockWire::new();
        let link = RoverLink::start(
            wire.connector(),
            "mock://rover".to_string(),
            LinkConfig::default(),
        );

        // drop 应该正常退出，IO 线程被 join
        drop(link);
    }

    #[test]
    fn test_send_command_queued() {
        let wire = MockWire::new();
        let link = RoverLink::start(
            wire.connector(),
            "mock://rover".to_string(),
            LinkConfig::default(),
        );

        assert!(link.send_command("avoidance_on").is_ok());

        // 等待 IO 线程建立连接并发送
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            if wire.sent().iter().any(|t| t == "avoidance_on") {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("Command was not sent within 2s, sent: {:?}", wire.sent());
    }

    #[test]
    fn test_default_snapshots() {
        let wire = MockWire::new();
        let link = RoverLink::start(
            wire.connector(),
            "mock://rover".to_string(),
            LinkConfig::default(),
        );

        let frame = link.telemetry();
        assert_eq!(frame.distance, 0.0);
        assert!(!link.path_activity().active);
        assert_eq!(link.last_status_line(), "");
    }
}
