//! Mock 传输后端（测试专用，无网络依赖）
//!
//! 驱动层的集成测试需要演练拨号失败、对端关闭、发送失败等
//! 真实网络上难以稳定复现的场景。`MockWire` 是测试侧的控制句柄，
//! 与 connector/channel 共享同一份脚本状态：
//!
//! ```text
//! 测试线程                    IO 线程
//! MockWire ──┐            ┌── MockConnector::open()
//!            ├─ 共享状态 ─┤
//! 注入/断言 ─┘            └── MockChannel::send()/receive()
//! ```

use crate::{WireChannel, WireConnector, WireError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockShared {
    /// 已通过 channel 发出的消息（按发送顺序）
    sent: Mutex<Vec<String>>,
    /// 等待被 receive 取走的入站消息
    inbound: Mutex<VecDeque<String>>,
    /// 剩余的拨号失败次数（先失败后成功，用于演练退避）
    fail_opens_remaining: AtomicU32,
    /// 下一次 send 是否注入失败
    fail_next_send: AtomicBool,
    /// 对端是否已关闭（receive 返回 Closed）
    peer_closed: AtomicBool,
    /// 累计拨号次数
    opens: AtomicU64,
}

/// 测试侧控制句柄
#[derive(Clone)]
pub struct MockWire {
    shared: Arc<MockShared>,
}

impl MockWire {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(MockShared::default()),
        }
    }

    /// 取得交给驱动的拨号器
    pub fn connector(&self) -> MockConnector {
        MockConnector {
            shared: self.shared.clone(),
        }
    }

    /// 让接下来的 `n` 次拨号失败
    pub fn fail_opens(&self, n: u32) {
        self.shared.fail_opens_remaining.store(n, Ordering::SeqCst);
    }

    /// 注入一次发送失败
    pub fn fail_next_send(&self) {
        self.shared.fail_next_send.store(true, Ordering::SeqCst);
    }

    /// 模拟对端关闭（下一次 receive 返回 Closed）
    pub fn close_peer(&self) {
        self.shared.peer_closed.store(true, Ordering::SeqCst);
    }

    /// 注入一条入站消息
    pub fn push_inbound(&self, line: impl Into<String>) {
        self.shared.inbound.lock().unwrap().push_back(line.into());
    }

    /// 已发出的消息快照
    pub fn sent(&self) -> Vec<String> {
        self.shared.sent.lock().unwrap().clone()
    }

    /// 清空已发送记录（方便分阶段断言）
    pub fn clear_sent(&self) {
        self.shared.sent.lock().unwrap().clear();
    }

    /// 累计拨号次数
    pub fn opens(&self) -> u64 {
        self.shared.opens.load(Ordering::SeqCst)
    }
}

impl Default for MockWire {
    fn default() -> Self {
        Self::new()
    }
}

/// Mock 拨号器
pub struct MockConnector {
    shared: Arc<MockShared>,
}

impl WireConnector for MockConnector {
    fn open(&mut self, _endpoint: &str) -> Result<Box<dyn WireChannel + Send>, WireError> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);

        let remaining = self.shared.fail_opens_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.shared.fail_opens_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(WireError::ConnectFailed("scripted open failure".into()));
        }

        // 新通道视为一条全新连接：对端关闭标记复位
        self.shared.peer_closed.store(false, Ordering::SeqCst);
        Ok(Box::new(MockChannel {
            shared: self.shared.clone(),
        }))
    }
}

/// Mock 通道
pub struct MockChannel {
    shared: Arc<MockShared>,
}

impl WireChannel for MockChannel {
    fn send(&mut self, message: &str) -> Result<(), WireError> {
        if self.shared.peer_closed.load(Ordering::SeqCst) {
            return Err(WireError::Closed);
        }
        if self.shared.fail_next_send.swap(false, Ordering::SeqCst) {
            return Err(WireError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted send failure",
            )));
        }
        self.shared.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }

    fn receive(&mut self) -> Result<String, WireError> {
        if let Some(line) = self.shared.inbound.lock().unwrap().pop_front() {
            return Ok(line);
        }
        if self.shared.peer_closed.load(Ordering::SeqCst) {
            return Err(WireError::Closed);
        }
        Err(WireError::Timeout)
    }

    fn set_receive_timeout(&mut self, _timeout: Duration) {
        // mock 永远立即返回，超时语义由 Timeout 错误承担
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_open_failures() {
        let wire = MockWire::new();
        wire.fail_opens(2);
        let mut connector = wire.connector();

        assert!(connector.open("mock://rover").is_err());
        assert!(connector.open("mock://rover").is_err());
        assert!(connector.open("mock://rover").is_ok());
        assert_eq!(wire.opens(), 3);
    }

    #[test]
    fn test_send_receive_and_inspection() {
        let wire = MockWire::new();
        let mut channel = wire.connector().open("mock://rover").unwrap();

        channel.send("forward").unwrap();
        channel.send("data").unwrap();
        assert_eq!(wire.sent(), vec!["forward", "data"]);

        wire.push_inbound("status line");
        assert_eq!(channel.receive().unwrap(), "status line");
        assert!(matches!(channel.receive(), Err(WireError::Timeout)));
    }

    #[test]
    fn test_scripted_send_failure_is_one_shot() {
        let wire = MockWire::new();
        let mut channel = wire.connector().open("mock://rover").unwrap();

        wire.fail_next_send();
        assert!(channel.send("forward").is_err());
        assert!(channel.send("forward").is_ok());
    }

    #[test]
    fn test_peer_close() {
        let wire = MockWire::new();
        let mut channel = wire.connector().open("mock://rover").unwrap();

        wire.close_peer();
        assert!(matches!(channel.receive(), Err(WireError::Closed)));
        assert!(matches!(channel.send("x"), Err(WireError::Closed)));

        // 重新拨号后恢复
        let mut fresh = wire.connector().open("mock://rover").unwrap();
        assert!(fresh.send("x").is_ok());
    }
}
