//! 客户端接口模块
//!
//! 在 `rover-driver` 的链路句柄之上提供强类型命令接口：
//! - [`RoverClient`]：命令端（写），所有操作非阻塞
//! - [`RoverObserver`]：观察端（读），可克隆后交给监控线程
//!
//! 命令端与观察端共享同一条链路，读写分离只是接口收窄，
//! 没有额外的同步开销。

use rover_driver::{LinkBuilder, LinkError, MetricsSnapshot, PathActivity, RoverLink};
use rover_protocol::{MoveDirection, PathPoint, RobotPose, SensorFrame, command};
use std::sync::Arc;
use tracing::debug;

pub use rover_driver::{LinkConfig, LinkStatus};
pub use rover_protocol::Heading;

/// 小车客户端（命令端）
///
/// # Example
///
/// ```no_run
/// use rover_client::RoverClient;
/// use rover_protocol::MoveDirection;
///
/// let client = RoverClient::connect("tcp://192.168.4.1:8266").unwrap();
/// client.drive(MoveDirection::Forward).unwrap();
/// client.set_motor_speed(180).unwrap();
/// client.halt().unwrap();
/// ```
pub struct RoverClient {
    link: Arc<RoverLink>,
}

impl RoverClient {
    /// 用默认配置连接到指定 endpoint
    ///
    /// 立即返回；实际拨号和重连由后台 IO 线程负责。
    ///
    /// # 错误
    /// - [`LinkError::InvalidEndpoint`]: endpoint 格式非法
    pub fn connect(endpoint: impl Into<String>) -> Result<Self, LinkError> {
        let link = LinkBuilder::new(endpoint).build()?;
        Ok(Self::from_link(link))
    }

    /// 从已构建的链路句柄创建客户端
    ///
    /// 测试或需要自定义 [`LinkConfig`] / 传输后端时使用。
    pub fn from_link(link: RoverLink) -> Self {
        Self {
            link: Arc::new(link),
        }
    }

    /// 获取观察端（可克隆，随处读取状态快照）
    pub fn observer(&self) -> RoverObserver {
        RoverObserver {
            link: self.link.clone(),
        }
    }

    // ============================================================
    // 运动命令
    // ============================================================

    /// 按指定方向行驶
    ///
    /// 运动命令受调度队列的节流与尾部合并约束：快速连续调用时
    /// 只有最新的方向会被发出。
    pub fn drive(&self, direction: MoveDirection) -> Result<(), LinkError> {
        self.link.send_command(direction.token())
    }

    /// 停车
    pub fn halt(&self) -> Result<(), LinkError> {
        self.drive(MoveDirection::Stop)
    }

    /// 设置电机速度（0-255）
    pub fn set_motor_speed(&self, speed: u8) -> Result<(), LinkError> {
        self.link.send_command(command::speed_token(speed))
    }

    /// 开关自动避障
    pub fn set_avoidance(&self, enabled: bool) -> Result<(), LinkError> {
        self.link.send_command(command::avoidance_token(enabled))
    }

    /// 花式动作：转圈
    pub fn circle(&self) -> Result<(), LinkError> {
        self.link.send_command(command::TOKEN_CIRCLE)
    }

    /// 花式动作：舞蹈
    pub fn dance(&self) -> Result<(), LinkError> {
        self.link.send_command(command::TOKEN_DANCE)
    }

    /// 立即请求一帧遥测（正常情况下后台每秒轮询一次）
    pub fn request_telemetry(&self) -> Result<(), LinkError> {
        self.link.send_command(command::TOKEN_DATA)
    }

    /// 发送原始命令令牌（逃生舱）
    ///
    /// 固件新增命令尚未有类型化接口时使用；令牌原样入队。
    pub fn send_raw(&self, token: impl Into<String>) -> Result<(), LinkError> {
        let token = token.into();
        debug!("Raw command: {}", token);
        self.link.send_command(token)
    }

    // ============================================================
    // 路径跟随
    // ============================================================

    /// 开始跟随路径（空路径为 no-op）
    pub fn follow_path(&self, points: Vec<PathPoint>) -> Result<(), LinkError> {
        self.link.start_path(points)
    }

    /// 停止路径跟随并停车
    pub fn stop_following(&self) -> Result<(), LinkError> {
        self.link.stop_path()
    }

    /// 推送最新位姿（外部位姿源调用，路径跟随依赖）
    pub fn update_pose(&self, pose: RobotPose) {
        self.link.update_pose(pose);
    }

    // ============================================================
    // 状态读取（命令端也可以直接读）
    // ============================================================

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn telemetry(&self) -> SensorFrame {
        self.link.telemetry()
    }

    pub fn status(&self) -> LinkStatus {
        self.link.status()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.link.metrics()
    }
}

/// 小车观察端（只读）
///
/// 克隆开销是一次 `Arc` 计数；所有读取都是无锁快照。
#[derive(Clone)]
pub struct RoverObserver {
    link: Arc<RoverLink>,
}

impl RoverObserver {
    /// 连接状态快照
    pub fn status(&self) -> LinkStatus {
        self.link.status()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// 最近一帧有效变化的遥测数据
    pub fn telemetry(&self) -> SensorFrame {
        self.link.telemetry()
    }

    /// 最近收到的状态行
    pub fn last_status_line(&self) -> String {
        self.link.last_status_line()
    }

    /// 路径跟随进度
    pub fn path_activity(&self) -> PathActivity {
        self.link.path_activity()
    }

    /// 链路性能指标
    pub fn metrics(&self) -> MetricsSnapshot {
        self.link.metrics()
    }
}
