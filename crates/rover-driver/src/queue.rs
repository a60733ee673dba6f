//! 命令调度队列
//!
//! 严格 FIFO，外加两条规则：
//! - **尾部合并**：距上一条运动命令发出还不足一个节流窗口、且队尾
//!   又是未发送的运动命令时，新运动命令覆盖队尾——高频输入下只有
//!   最新意图存活。窗口外的两条运动命令是两次独立意图，各自保留。
//! - **有界丢弃**：队列满时丢弃最旧的命令，保证断连期间不会无限积压
//!
//! 队列本身不带时钟：是否处于节流窗口内由调用方（IO 循环）判定后
//! 随入队传入。IO 循环在出队侧还会按同一窗口对运动命令限速，
//! 重连后冲刷积压时不会突发。

use rover_protocol::CommandClass;
use std::collections::VecDeque;

/// 入队结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// 正常追加
    Queued,
    /// 覆盖了队尾的运动命令
    Coalesced,
    /// 追加成功，但挤掉了最旧的命令
    DroppedOldest,
}

/// 有界 FIFO 命令队列
pub struct DispatchQueue {
    items: VecDeque<String>,
    capacity: usize,
}

impl DispatchQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 入队一条命令
    ///
    /// `in_throttle_window`：距上一条运动命令发出是否不足一个节流
    /// 窗口，只影响尾部合并的判定。
    pub fn push(&mut self, token: String, in_throttle_window: bool) -> PushOutcome {
        if in_throttle_window
            && CommandClass::of(&token) == CommandClass::Movement
            && let Some(tail) = self.items.back_mut()
            && CommandClass::of(tail) == CommandClass::Movement
        {
            *tail = token;
            return PushOutcome::Coalesced;
        }

        if self.items.len() >= self.capacity {
            self.items.pop_front();
            self.items.push_back(token);
            return PushOutcome::DroppedOldest;
        }

        self.items.push_back(token);
        PushOutcome::Queued
    }

    /// 查看队头命令的类别（不出队）
    pub fn front_class(&self) -> Option<CommandClass> {
        self.items.front().map(|token| CommandClass::of(token))
    }

    /// 取出队头命令
    pub fn pop(&mut self) -> Option<String> {
        self.items.pop_front()
    }

    /// 发送失败时把命令放回队头，下次重试
    pub fn requeue_front(&mut self, token: String) {
        self.items.push_front(token);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
