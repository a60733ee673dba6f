//! 出站命令令牌定义
//!
//! 链路的出站方向是纯文本令牌。令牌分为两类：
//!
//! - **Movement**：固定的九个方向/停止令牌，受节流与合并策略约束
//! - **Other**：其余所有令牌（模式切换、参数化命令、遥测请求等）
//!
//! 分类结果决定调度队列的行为（见 `rover-driver`），因此分类函数
//! 必须与固件识别的令牌集合严格一致。

use std::fmt;

/// 遥测请求令牌（固件收到后回发一帧 JSON 遥测）
pub const TOKEN_DATA: &str = "data";

/// 保活令牌（固件侧直接忽略，仅用于探测链路存活）
pub const TOKEN_PING: &str = "ping";

/// 预置动作：绕圈
pub const TOKEN_CIRCLE: &str = "circle";

/// 预置动作：摇摆演示
pub const TOKEN_DANCE: &str = "dance";

/// 移动命令（固定集合）
///
/// 九个离散的方向令牌，与固件的电机控制命令一一对应。
/// `Stop` 也属于移动类：它与方向令牌竞争同一个执行通道，
/// 因此同样参与节流与合并。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    ForwardLeft,
    ForwardRight,
    BackwardLeft,
    BackwardRight,
}

impl MoveDirection {
    /// 全部移动令牌（分类与测试共用）
    pub const ALL: [MoveDirection; 9] = [
        MoveDirection::Forward,
        MoveDirection::Backward,
        MoveDirection::Left,
        MoveDirection::Right,
        MoveDirection::Stop,
        MoveDirection::ForwardLeft,
        MoveDirection::ForwardRight,
        MoveDirection::BackwardLeft,
        MoveDirection::BackwardRight,
    ];

    /// 返回线路令牌
    pub fn token(self) -> &'static str {
        match self {
            MoveDirection::Forward => "forward",
            MoveDirection::Backward => "backward",
            MoveDirection::Left => "left",
            MoveDirection::Right => "right",
            MoveDirection::Stop => "stop",
            MoveDirection::ForwardLeft => "forward-left",
            MoveDirection::ForwardRight => "forward-right",
            MoveDirection::BackwardLeft => "backward-left",
            MoveDirection::BackwardRight => "backward-right",
        }
    }

    /// 从令牌解析（未知令牌返回 `None`）
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.token() == token)
    }
}

impl fmt::Display for MoveDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// 命令分类
///
/// 调度队列按分类决定节流与合并行为（见 `rover-driver::queue`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    /// 移动命令（可被更新的移动意图合并）
    Movement,
    /// 其他命令（严格 FIFO，不参与合并）
    Other,
}

impl CommandClass {
    /// 对任意令牌分类
    ///
    /// 只有 [`MoveDirection`] 的九个令牌是 Movement，其余一律 Other。
    /// 注意 `speed:<n>` 虽然影响电机，但不是方向意图，属于 Other。
    pub fn of(token: &str) -> Self {
        if MoveDirection::from_token(token).is_some() {
            CommandClass::Movement
        } else {
            CommandClass::Other
        }
    }
}

/// 构造速度令牌 `speed:<0-255>`
///
/// 取值范围由 `u8` 编码，调用方无需再做范围检查。
pub fn speed_token(speed: u8) -> String {
    format!("speed:{speed}")
}

/// 构造避障开关令牌
pub fn avoidance_token(enable: bool) -> &'static str {
    if enable { "avoidance_on" } else { "avoidance_off" }
}
