//! # Rover SDK
//!
//! 小车遥控链路的统一入口，按层次重导出：
//!
//! - [`client`]：强类型客户端（大多数用户从这里开始）
//! - [`driver`]：链路核心（自定义配置、指标、路径跟随）
//! - [`wire`]：传输抽象（自定义后端）
//! - [`protocol`]：命令令牌、遥测帧与四向几何
//!
//! # Example
//!
//! ```no_run
//! use rover_sdk::prelude::*;
//!
//! rover_sdk::init_logging();
//!
//! let client = RoverClient::connect("tcp://192.168.4.1:8266").unwrap();
//! client.drive(MoveDirection::Forward).unwrap();
//! ```

pub use rover_client as client;
pub use rover_driver as driver;
pub use rover_protocol as protocol;
pub use rover_wire as wire;

/// 常用类型一站式导入
pub mod prelude {
    pub use rover_client::{RoverClient, RoverObserver};
    pub use rover_driver::{LinkBuilder, LinkConfig, LinkError, LinkStatus, MetricsSnapshot};
    pub use rover_protocol::{
        Heading, MoveDirection, PathPoint, RobotPose, SensorFrame, TelemetryMessage,
    };
}

/// 初始化日志（tracing + `log` 桥接）
///
/// 过滤规则来自 `RUST_LOG` 环境变量，默认 `info`。
/// 重复调用安全：后续调用是 no-op。
pub fn init_logging() {
    // 使用 log 宏的依赖也汇入 tracing 管道
    let _ = tracing_log::LogTracer::init();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_logging_is_idempotent() {
        super::init_logging();
        super::init_logging();
        tracing::info!("logging initialized twice without panic");
    }

    #[test]
    fn test_prelude_reexports() {
        use super::prelude::*;
        let pose = RobotPose::default();
        assert_eq!(pose.heading, Heading::East);
        let _ = MoveDirection::Forward.token();
    }
}
