//! 链路构建器
//!
//! endpoint 格式在这里校验：IO 线程的重试循环只面对瞬态传输错误，
//! 配置错误在进入后台线程之前就被拒绝。

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::link::RoverLink;
use rover_wire::{TcpConnector, WireConnector, validate_endpoint};
use std::time::Duration;

/// [`RoverLink`] 构建器
///
/// # Example
///
/// ```no_run
/// use rover_driver::LinkBuilder;
/// use std::time::Duration;
///
/// let link = LinkBuilder::new("tcp://192.168.4.1:8266")
///     .keepalive_interval(Duration::from_secs(10))
///     .build()
///     .unwrap();
/// ```
pub struct LinkBuilder {
    endpoint: String,
    config: LinkConfig,
}

impl LinkBuilder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            config: LinkConfig::default(),
        }
    }

    /// 整体替换配置
    pub fn config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// 拨号超时
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// 重连退避参数（基准延迟与上限）
    pub fn reconnect_delays(mut self, base: Duration, max: Duration) -> Self {
        self.config.reconnect_base_delay = base;
        self.config.reconnect_max_delay = max;
        self
    }

    /// 运动命令最小发送间隔
    pub fn movement_throttle(mut self, throttle: Duration) -> Self {
        self.config.movement_throttle = throttle;
        self
    }

    /// 保活 ping 间隔
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.config.keepalive_interval = interval;
        self
    }

    /// 遥测轮询间隔
    pub fn telemetry_poll_interval(mut self, interval: Duration) -> Self {
        self.config.telemetry_poll_interval = interval;
        self
    }

    /// 路径跟随节拍
    pub fn path_tick(mut self, tick: Duration) -> Self {
        self.config.path_tick = tick;
        self
    }

    /// 调度队列容量
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// 用默认的 TCP 后端构建链路
    ///
    /// # 错误
    /// - [`LinkError::InvalidEndpoint`]: endpoint 缺少 scheme 或地址为空
    pub fn build(self) -> Result<RoverLink, LinkError> {
        let connector = TcpConnector::new().with_connect_timeout(self.config.connect_timeout);
        self.build_with(connector)
    }

    /// 用自定义传输后端构建链路
    ///
    /// 测试用 mock 后端，或未来的其他传输实现。
    pub fn build_with(
        self,
        connector: impl WireConnector + Send + 'static,
    ) -> Result<RoverLink, LinkError> {
        validate_endpoint(&self.endpoint)
            .map_err(|e| LinkError::InvalidEndpoint(e.to_string()))?;
        Ok(RoverLink::start(connector, self.endpoint, self.config))
    }
}
