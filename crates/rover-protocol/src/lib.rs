//! # Rover Protocol
//!
//! 小车链路协议定义（无传输依赖）
//!
//! ## 模块
//!
//! - `command`: 出站命令令牌（移动 / 模式 / 参数化命令）
//! - `telemetry`: 入站消息解码（传感器帧或状态行）
//! - `nav`: 路径点、位姿与四向朝向几何
//!
//! ## 线路格式
//!
//! 出站方向是纯文本令牌（如 `forward`、`speed:128`、`data`），
//! 入站方向是 JSON 对象（遥测）或任意字符串（状态行）。
//! 本模块只负责词汇表和解码规则，不关心消息如何到达。

pub mod command;
pub mod nav;
pub mod telemetry;

// 重新导出常用类型
pub use command::*;
pub use nav::*;
pub use telemetry::*;

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 非法朝向角度（只支持 0/90/180/270）
    #[error("Invalid heading: {degrees} (expected one of 0, 90, 180, 270)")]
    InvalidHeading { degrees: u16 },
}
