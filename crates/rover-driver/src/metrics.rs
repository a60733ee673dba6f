//! 链路性能指标
//!
//! 原子计数器，IO 线程写入，调用线程随时快照。

use std::sync::atomic::{AtomicU64, Ordering};

/// 链路指标（原子计数器）
#[derive(Debug, Default)]
pub struct LinkMetrics {
    /// 成功建立的连接数
    pub connects: AtomicU64,
    /// 失败的拨号次数
    pub dial_failures: AtomicU64,
    /// 成功发送的命令数
    pub tx_sent: AtomicU64,
    /// 入队时被尾部合并掉的运动命令数
    pub tx_coalesced: AtomicU64,
    /// 队列满时被丢弃的最旧命令数
    pub tx_dropped: AtomicU64,
    /// 发送失败后回插队头的次数
    pub tx_requeued: AtomicU64,
    /// 发出的保活 ping 数
    pub keepalive_pings: AtomicU64,
    /// 收到的遥测帧总数
    pub telemetry_frames: AtomicU64,
    /// 其中有效变化帧数（跨过显著性阈值）
    pub telemetry_significant: AtomicU64,
    /// 收到的状态行数（非 JSON 消息）
    pub status_lines: AtomicU64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取所有计数器的一致性快照
    ///
    /// 各计数器独立读取，不保证跨计数器原子性，监控场景下足够。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            dial_failures: self.dial_failures.load(Ordering::Relaxed),
            tx_sent: self.tx_sent.load(Ordering::Relaxed),
            tx_coalesced: self.tx_coalesced.load(Ordering::Relaxed),
            tx_dropped: self.tx_dropped.load(Ordering::Relaxed),
            tx_requeued: self.tx_requeued.load(Ordering::Relaxed),
            keepalive_pings: self.keepalive_pings.load(Ordering::Relaxed),
            telemetry_frames: self.telemetry_frames.load(Ordering::Relaxed),
            telemetry_significant: self.telemetry_significant.load(Ordering::Relaxed),
            status_lines: self.status_lines.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照（普通整数，可自由拷贝）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connects: u64,
    pub dial_failures: u64,
    pub tx_sent: u64,
    pub tx_coalesced: u64,
    pub tx_dropped: u64,
    pub tx_requeued: u64,
    pub keepalive_pings: u64,
    pub telemetry_frames: u64,
    pub telemetry_significant: u64,
    pub status_lines: u64,
}
