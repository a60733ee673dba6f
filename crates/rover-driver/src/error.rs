//! 链路层错误类型定义

use rover_protocol::ProtocolError;
use rover_wire::WireError;
use thiserror::Error;

/// 链路层错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    /// 传输层错误
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// 协议错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 控制通道已关闭（IO 线程退出）
    #[error("Control channel closed")]
    ChannelClosed,

    /// 控制通道已满
    #[error("Control channel full")]
    ChannelFull,

    /// endpoint 不满足最小格式要求
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}
