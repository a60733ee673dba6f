//! 路径点、位姿与四向朝向几何
//!
//! 小车只在赛道网格上做轴对齐运动，因此朝向被建模为四个基数方向的
//! 枚举而不是连续角度——非法朝向在类型上不可表示，路径跟随逻辑里
//! 也就不存在"意外角度"的分支。
//!
//! 坐标约定（与赛道地图一致）：x 轴向东，y 轴向北，单位 cm。
//! 0° 朝 +x，90° 朝 +y，逆时针增长。

use crate::ProtocolError;
use crate::command::MoveDirection;
use serde::{Deserialize, Serialize};

/// 赛道相对坐标路径点（cm）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
}

impl PathPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 四向朝向（基数方向）
///
/// 变体按度数命名语义：East=0°、North=90°、West=180°、South=270°。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Heading {
    /// 0°，朝 +x
    #[default]
    East,
    /// 90°，朝 +y
    North,
    /// 180°，朝 -x
    West,
    /// 270°，朝 -y
    South,
}

impl Heading {
    /// 返回度数（0/90/180/270）
    pub fn degrees(self) -> u16 {
        match self {
            Heading::East => 0,
            Heading::North => 90,
            Heading::West => 180,
            Heading::South => 270,
        }
    }

    /// 从度数构造
    ///
    /// 外部位姿源（仿真器、里程计）以度数上报时用此入口收窄；
    /// 非四向角度返回 [`ProtocolError::InvalidHeading`]。
    pub fn try_from_degrees(degrees: u16) -> Result<Self, ProtocolError> {
        match degrees {
            0 => Ok(Heading::East),
            90 => Ok(Heading::North),
            180 => Ok(Heading::West),
            270 => Ok(Heading::South),
            _ => Err(ProtocolError::InvalidHeading { degrees }),
        }
    }

    /// 计算转到 `target` 所需的朝向差（度，恒为 0/90/180/270）
    pub fn delta_to(self, target: Heading) -> u16 {
        (360 + target.degrees() - self.degrees()) % 360
    }
}

/// 小车位姿
///
/// 由外部位姿源维护并推送，链路核心只读取。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotPose {
    pub x: f64,
    pub y: f64,
    pub heading: Heading,
}

/// 计算从 `from` 指向 `to` 的目标朝向
///
/// 只支持四向运动：位移的主轴（分量绝对值较大者）决定方向。
/// 对角线段不单独建模，按主轴退化处理。
pub fn target_heading(from: PathPoint, to: PathPoint) -> Heading {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dx.abs() > dy.abs() {
        if dx > 0.0 { Heading::East } else { Heading::West }
    } else if dy > 0.0 {
        Heading::North
    } else {
        Heading::South
    }
}

/// 根据朝向差选择离散命令
///
/// - 0° → `forward`（直行）
/// - 90° → `right`（右转）
/// - 270° → `left`（左转）
/// - 180° → `stop`（掉头需要先停车，没有单条命令能表达 U 形转向）
///
/// 四向模型下不存在其他差值，match 穷尽即是证明。
pub fn steer(current: Heading, target: Heading) -> MoveDirection {
    match current.delta_to(target) {
        0 => MoveDirection::Forward,
        90 => MoveDirection::Right,
        270 => MoveDirection::Left,
        _ => MoveDirection::Stop, // 180
    }
}
