//! 路径跟随控制器
//!
//! 每个节拍消费一段路径：取 `path[index] → path[index+1]` 的方向，
//! 与外部位姿源反馈的**朝向**做差，输出一条离散运动命令并把下标
//! 推进一段。控制器不读位置、不做闭环估计，位姿反馈滞后时照样
//! 按段推进。
//!
//! 掉头（朝向差 180°）是唯一的例外：输出 `stop` 且**不**推进下标。
//! 离散命令集里没有掉头动作，停车后等位姿源反馈新朝向，下一拍对
//! 同一段退化为一次 90° 转向。

use rover_protocol::{Heading, MoveDirection, PathPoint, nav};
use tracing::debug;

/// 单拍输出
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// 本拍应发送的运动命令
    Command(MoveDirection),
    /// 路径已走完
    Finished,
}

/// 路径跟随器
///
/// `index` 指向当前段的起点；最后一个路径点之后没有段，
/// 空路径和单点路径都立即完成。
pub struct PathFollower {
    path: Vec<PathPoint>,
    index: usize,
}

impl PathFollower {
    pub fn new(path: Vec<PathPoint>) -> Self {
        Self { path, index: 0 }
    }

    /// 当前段起点在路径中的下标
    pub fn next_index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// 执行一个控制节拍
    pub fn step(&mut self, heading: Heading) -> Step {
        if self.index + 1 >= self.path.len() {
            return Step::Finished;
        }

        let from = self.path[self.index];
        let to = self.path[self.index + 1];
        let want = nav::target_heading(from, to);
        let command = nav::steer(heading, want);

        if command == MoveDirection::Stop {
            // 掉头段不消费：停车后等新朝向，下一拍重试同一段
            debug!("Reversal at segment {}, holding index", self.index);
        } else {
            self.index += 1;
        }
        Step::Command(command)
    }
}
