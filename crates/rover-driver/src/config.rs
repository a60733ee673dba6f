//! 链路配置
//!
//! 所有时序参数集中在 [`LinkConfig`]，IO 线程启动后不再变更。

use std::time::Duration;

/// 链路配置
///
/// # Example
///
/// ```
/// use rover_driver::LinkConfig;
/// use std::time::Duration;
///
/// // 使用默认配置
/// let config = LinkConfig::default();
/// assert_eq!(config.movement_throttle, Duration::from_millis(50));
///
/// // 自定义部分参数
/// let config = LinkConfig {
///     keepalive_interval: Duration::from_secs(10),
///     ..LinkConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    /// 拨号超时
    pub connect_timeout: Duration,
    /// 重连退避基准延迟
    pub reconnect_base_delay: Duration,
    /// 重连退避增长因子
    pub reconnect_growth: f64,
    /// 重连退避延迟上限
    pub reconnect_max_delay: Duration,
    /// 运动命令最小发送间隔
    pub movement_throttle: Duration,
    /// 保活 ping 间隔
    pub keepalive_interval: Duration,
    /// 遥测轮询间隔（周期性发送 `data`）
    pub telemetry_poll_interval: Duration,
    /// 路径跟随节拍
    pub path_tick: Duration,
    /// 调度队列容量（满时丢弃最旧命令）
    pub queue_capacity: usize,
    /// 单次接收窗口（IO 循环的节拍来源）
    pub receive_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_growth: 1.5,
            reconnect_max_delay: Duration::from_secs(5),
            movement_throttle: Duration::from_millis(50),
            keepalive_interval: Duration::from_secs(30),
            telemetry_poll_interval: Duration::from_secs(1),
            path_tick: Duration::from_millis(200),
            queue_capacity: 256,
            receive_timeout: Duration::from_millis(20),
        }
    }
}

impl LinkConfig {
    /// 计算第 `failures + 1` 次拨号前的退避延迟
    ///
    /// `failures` 是此前连续失败的次数：首次重试（failures = 0）等待
    /// 基准延迟，之后按增长因子指数放大，封顶于 `reconnect_max_delay`。
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        let base = self.reconnect_base_delay.as_secs_f64();
        let scaled = base * self.reconnect_growth.powi(failures as i32);
        let capped = scaled.min(self.reconnect_max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}
