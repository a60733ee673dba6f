//! # Rover Wire Adapter Layer
//!
//! 传输抽象层，提供统一的线路通道接口。
//!
//! 链路核心（`rover-driver`）只通过 [`WireChannel`] / [`WireConnector`]
//! 两个 trait 接触传输：前者是一条已建立的双向文本通道，后者负责按
//! endpoint 拨号。生产后端是行分隔的 TCP（[`TcpConnector`]），测试用
//! mock 后端（`mock` feature）完全脱离网络。

use std::time::Duration;
use thiserror::Error;

pub mod tcp;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use tcp::{TcpConnector, TcpLineChannel};

/// 传输层统一错误类型
///
/// 除 [`WireError::InvalidEndpoint`] 外都是瞬态传输故障，由上层的
/// 重连策略消化；`InvalidEndpoint` 是配置错误，重试没有意义。
#[derive(Error, Debug)]
pub enum WireError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// 接收窗口内没有消息（正常现象，驱动以此作为循环节拍）
    #[error("Receive timeout")]
    Timeout,
    /// 对端关闭了连接
    #[error("Channel closed by peer")]
    Closed,
    /// 拨号失败（含连接超时）
    #[error("Connect failed: {0}")]
    ConnectFailed(String),
    /// endpoint 不满足最小格式要求
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl WireError {
    /// 是否为配置级错误（不应进入重试循环）
    pub fn is_config_error(&self) -> bool {
        matches!(self, WireError::InvalidEndpoint(_))
    }
}

/// endpoint 最小格式检查
///
/// 只做"非空且带 scheme 分隔符"的判定，不解析主机合法性——
/// 主机不可达属于瞬态网络错误，交给重连循环处理。
pub fn validate_endpoint(endpoint: &str) -> Result<(), WireError> {
    let Some((scheme, rest)) = endpoint.split_once("://") else {
        return Err(WireError::InvalidEndpoint(format!(
            "missing scheme separator in {endpoint:?}"
        )));
    };
    if scheme.is_empty() || rest.is_empty() {
        return Err(WireError::InvalidEndpoint(format!(
            "empty scheme or address in {endpoint:?}"
        )));
    }
    Ok(())
}

/// 已建立的双向文本通道
///
/// 消息以单行文本为单位：出站令牌一行一条，入站遥测/状态一行一条。
pub trait WireChannel {
    /// 发送一条消息
    fn send(&mut self, message: &str) -> Result<(), WireError>;

    /// 接收一条消息（带超时，超时返回 [`WireError::Timeout`]）
    fn receive(&mut self) -> Result<String, WireError>;

    /// 设置接收超时
    fn set_receive_timeout(&mut self, _timeout: Duration) {}

    /// 非阻塞探测：有消息返回 `Some`，超时返回 `None`
    fn try_receive(&mut self) -> Result<Option<String>, WireError> {
        self.set_receive_timeout(Duration::ZERO);
        match self.receive() {
            Ok(message) => Ok(Some(message)),
            Err(WireError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// 拨号器：按 endpoint 建立新通道
///
/// 连接管理器在每次（重）连时调用 `open`，因此实现必须可以被
/// 反复调用，每次返回一条全新的通道。
pub trait WireConnector {
    fn open(&mut self, endpoint: &str) -> Result<Box<dyn WireChannel + Send>, WireError>;
}
