//! IO 循环模块
//!
//! 单个后台线程独占线路通道，串行处理四件事：
//!
//! 1. 控制请求（入队命令、启停路径跟随）
//! 2. 连接维护（拨号、指数退避重连、保活 ping）
//! 3. 入站遥测（JSON 解码、显著性过滤、状态快照提交）
//! 4. 命令调度（FIFO 出队、运动节流、失败回插队头）
//!
//! 通道接收的超时窗口就是循环节拍：没有入站数据时，每个窗口
//! 结束后检查一轮截止时间。除位姿外的所有共享状态只由本线程写入。

use crate::config::LinkConfig;
use crate::follower::{PathFollower, Step};
use crate::metrics::LinkMetrics;
use crate::queue::{DispatchQueue, PushOutcome};
use crate::state::{ConnectionState, LinkContext, PathActivity};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use rover_protocol::{CommandClass, MoveDirection, PathPoint, command, telemetry};
use rover_wire::{WireChannel, WireConnector};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 控制线程发给 IO 线程的请求
pub enum ControlRequest {
    /// 入队一条命令令牌
    Enqueue(String),
    /// 开始跟随路径（空路径为 no-op）
    StartPath(Vec<PathPoint>),
    /// 停止路径跟随并停车
    StopPath,
}

/// IO 循环的全部可变状态
///
/// 单线程独占，无同步开销；抽成结构体是为了让辅助函数的参数
/// 列表保持可读。
struct LoopState {
    queue: DispatchQueue,
    follower: Option<PathFollower>,
    /// 上一帧传感器数据（显著性比较基准）
    prev_frame: Option<telemetry::SensorFrame>,
    /// 连续拨号失败次数
    failures: u32,
    /// 下一次允许拨号的时间
    next_dial: Instant,
    /// 上一条运动命令的发出时间（节流基准）
    last_movement_tx: Option<Instant>,
    last_keepalive: Instant,
    /// `None` 表示立即轮询
    last_poll: Option<Instant>,
    /// `None` 表示立即执行一拍
    last_path_tick: Option<Instant>,
}

impl LoopState {
    fn new(config: &LinkConfig) -> Self {
        Self {
            queue: DispatchQueue::new(config.queue_capacity),
            follower: None,
            prev_frame: None,
            failures: 0,
            next_dial: Instant::now(),
            last_movement_tx: None,
            last_keepalive: Instant::now(),
            last_poll: None,
            last_path_tick: None,
        }
    }
}

/// IO 线程主循环
///
/// # 参数
/// - `connector`: 拨号器（被本线程独占）
/// - `endpoint`: 目标 endpoint（Builder 已校验格式）
/// - `ctrl_rx`: 控制请求通道，断开即退出
/// - `ctx`: 共享状态上下文
/// - `metrics`: 性能指标
/// - `config`: 链路配置
pub fn io_loop(
    mut connector: impl WireConnector,
    endpoint: String,
    ctrl_rx: Receiver<ControlRequest>,
    ctx: Arc<LinkContext>,
    metrics: Arc<LinkMetrics>,
    config: LinkConfig,
) {
    let mut state = LoopState::new(&config);
    let mut channel: Option<Box<dyn WireChannel + Send>> = None;

    loop {
        // ============================================================
        // 1. 排空控制请求（非阻塞）
        // ============================================================
        loop {
            match ctrl_rx.try_recv() {
                Ok(request) => handle_request(request, &mut state, &ctx, &metrics, &config),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    trace!("IO thread: control channel disconnected, exiting");
                    ctx.set_status(ConnectionState::Disconnected, state.failures);
                    return;
                },
            }
        }

        // ============================================================
        // 2. 连接维护：断开时等退避窗口，然后拨号
        // ============================================================
        let Some(ch) = channel.as_mut() else {
            let now = Instant::now();
            if now < state.next_dial {
                // 退避等待期间保持对控制请求的响应
                let wait = (state.next_dial - now).min(Duration::from_millis(50));
                match ctrl_rx.recv_timeout(wait) {
                    Ok(request) => handle_request(request, &mut state, &ctx, &metrics, &config),
                    Err(RecvTimeoutError::Timeout) => {},
                    Err(RecvTimeoutError::Disconnected) => {
                        trace!("IO thread: control channel disconnected, exiting");
                        ctx.set_status(ConnectionState::Disconnected, state.failures);
                        return;
                    },
                }
                continue;
            }

            ctx.set_status(ConnectionState::Connecting, state.failures);
            match connector.open(&endpoint) {
                Ok(mut fresh) => {
                    fresh.set_receive_timeout(config.receive_timeout);
                    channel = Some(fresh);
                    metrics.connects.fetch_add(1, Ordering::Relaxed);
                    state.failures = 0;
                    state.last_keepalive = Instant::now();
                    state.last_poll = None;
                    state.last_movement_tx = None;
                    ctx.set_status(ConnectionState::Connected, 0);
                    info!("Link established: {}", endpoint);
                },
                Err(e) if e.is_config_error() => {
                    // Builder 已校验 endpoint，这里只可能是配置被绕过
                    error!("IO thread: unrecoverable endpoint error: {}", e);
                    ctx.set_status(ConnectionState::Disconnected, state.failures);
                    return;
                },
                Err(e) => {
                    metrics.dial_failures.fetch_add(1, Ordering::Relaxed);
                    schedule_retry(&mut state, &config);
                    warn!(
                        "Dial failed ({} consecutive): {}, retrying in {:?}",
                        state.failures,
                        e,
                        state.next_dial - Instant::now()
                    );
                    ctx.set_status(ConnectionState::Disconnected, state.failures);
                },
            }
            continue;
        };

        // ============================================================
        // 3. 接收一条入站消息（接收窗口即循环节拍）
        // ============================================================
        match ch.receive() {
            Ok(line) => ingest(&line, &ctx, &metrics, &mut state),
            Err(rover_wire::WireError::Timeout) => {},
            Err(e) => {
                warn!("Link lost: {}", e);
                channel = None;
                on_link_down(&mut state, &ctx, &config);
                continue;
            },
        }

        // ============================================================
        // 4. 截止时间检查：保活、遥测轮询、路径节拍
        // ============================================================
        if state.last_keepalive.elapsed() >= config.keepalive_interval {
            // ping 绕过调度队列：它探测的就是通道本身，
            // 排在积压命令后面会让探测结果失真
            match ch.send(command::TOKEN_PING) {
                Ok(()) => {
                    metrics.keepalive_pings.fetch_add(1, Ordering::Relaxed);
                    state.last_keepalive = Instant::now();
                    trace!("Keepalive ping sent");
                },
                Err(e) => {
                    warn!("Keepalive failed: {}", e);
                    channel = None;
                    on_link_down(&mut state, &ctx, &config);
                    continue;
                },
            }
        }

        if state.last_poll.is_none_or(|t| t.elapsed() >= config.telemetry_poll_interval) {
            enqueue(&mut state, &metrics, &config, command::TOKEN_DATA.to_string());
            state.last_poll = Some(Instant::now());
        }

        if state.follower.is_some()
            && state.last_path_tick.is_none_or(|t| t.elapsed() >= config.path_tick)
        {
            path_tick(&mut state, &ctx, &metrics, &config);
            state.last_path_tick = Some(Instant::now());
        }

        // ============================================================
        // 5. 调度队列出队发送（FIFO + 运动节流）
        // ============================================================
        while let Some(class) = state.queue.front_class() {
            if class == CommandClass::Movement
                && let Some(last) = state.last_movement_tx
                && last.elapsed() < config.movement_throttle
            {
                // 队头被节流挡住时整条队列等待，保持 FIFO
                break;
            }

            let Some(token) = state.queue.pop() else {
                break;
            };
            match ch.send(&token) {
                Ok(()) => {
                    metrics.tx_sent.fetch_add(1, Ordering::Relaxed);
                    if class == CommandClass::Movement {
                        state.last_movement_tx = Some(Instant::now());
                    }
                    trace!("TX: {}", token);
                },
                Err(e) => {
                    warn!("Send failed, requeueing {:?}: {}", token, e);
                    state.queue.requeue_front(token);
                    metrics.tx_requeued.fetch_add(1, Ordering::Relaxed);
                    channel = None;
                    on_link_down(&mut state, &ctx, &config);
                    break;
                },
            }
        }
    }
}

/// 处理一条控制请求
fn handle_request(
    request: ControlRequest,
    state: &mut LoopState,
    ctx: &LinkContext,
    metrics: &LinkMetrics,
    config: &LinkConfig,
) {
    match request {
        ControlRequest::Enqueue(token) => enqueue(state, metrics, config, token),
        ControlRequest::StartPath(points) => {
            if points.is_empty() {
                debug!("Ignoring empty path");
                return;
            }
            info!("Path following started: {} waypoints", points.len());
            ctx.set_path(PathActivity {
                active: true,
                next_index: 0,
                len: points.len(),
            });
            state.follower = Some(PathFollower::new(points));
            state.last_path_tick = None;
        },
        ControlRequest::StopPath => {
            if state.follower.take().is_some() {
                info!("Path following stopped");
                ctx.set_path(PathActivity::default());
                enqueue(state, metrics, config, MoveDirection::Stop.token().to_string());
            }
        },
    }
}

/// 入队并记录结果指标
///
/// 尾部合并只在节流窗口内发生：距上一条运动命令发出不足一个窗口
/// 时，快速连发的运动命令只保留最新意图；窗口外（包括断连期间）
/// 的命令各自入队。
fn enqueue(state: &mut LoopState, metrics: &LinkMetrics, config: &LinkConfig, token: String) {
    let in_window = state
        .last_movement_tx
        .is_some_and(|t| t.elapsed() < config.movement_throttle);
    match state.queue.push(token, in_window) {
        PushOutcome::Queued => {},
        PushOutcome::Coalesced => {
            metrics.tx_coalesced.fetch_add(1, Ordering::Relaxed);
        },
        PushOutcome::DroppedOldest => {
            metrics.tx_dropped.fetch_add(1, Ordering::Relaxed);
            warn!("Dispatch queue full, dropped oldest command");
        },
    }
}

/// 连接丢失后的清理与重试调度
///
/// 路径跟随依赖连续的命令流，断连即取消；调度队列保留，
/// 重连后从失败的那条命令继续。
fn on_link_down(state: &mut LoopState, ctx: &LinkContext, config: &LinkConfig) {
    if state.follower.take().is_some() {
        warn!("Path following cancelled: link down");
        ctx.set_path(PathActivity::default());
    }
    state.prev_frame = None;
    schedule_retry(state, config);
    ctx.set_status(ConnectionState::Disconnected, state.failures);
}

/// 按当前失败计数安排下一次拨号
fn schedule_retry(state: &mut LoopState, config: &LinkConfig) {
    let delay = config.backoff_delay(state.failures);
    state.failures += 1;
    state.next_dial = Instant::now() + delay;
}

/// 解码入站消息并提交状态
fn ingest(line: &str, ctx: &LinkContext, metrics: &LinkMetrics, state: &mut LoopState) {
    match telemetry::decode(line) {
        telemetry::TelemetryMessage::Sensor(frame) => {
            metrics.telemetry_frames.fetch_add(1, Ordering::Relaxed);
            let significant = match &state.prev_frame {
                None => true,
                Some(prev) => frame.significant_change(prev),
            };
            if significant {
                ctx.telemetry.store(Arc::new(frame));
                metrics.telemetry_significant.fetch_add(1, Ordering::Relaxed);
                trace!(
                    "SensorFrame committed: distance={:.1}cm, battery={:.2}V, temp={:.1}°C",
                    frame.distance, frame.battery, frame.temperature
                );
            }
            state.prev_frame = Some(frame);
        },
        telemetry::TelemetryMessage::Status(text) => {
            metrics.status_lines.fetch_add(1, Ordering::Relaxed);
            debug!("Rover status: {}", text);
            ctx.status_line.store(Arc::new(text));
        },
    }
}

/// 执行一个路径跟随节拍
///
/// 只读取位姿快照中的朝向：路径按段消费，不依赖位置反馈。
fn path_tick(state: &mut LoopState, ctx: &LinkContext, metrics: &LinkMetrics, config: &LinkConfig) {
    let Some(follower) = state.follower.as_mut() else {
        return;
    };

    let heading = ctx.pose.load().heading;
    match follower.step(heading) {
        Step::Command(direction) => {
            ctx.set_path(PathActivity {
                active: true,
                next_index: follower.next_index(),
                len: follower.len(),
            });
            enqueue(state, metrics, config, direction.token().to_string());
        },
        Step::Finished => {
            info!("Path complete");
            state.follower = None;
            ctx.set_path(PathActivity::default());
            enqueue(state, metrics, config, MoveDirection::Stop.token().to_string());
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> LoopState {
        LoopState::new(&LinkConfig::default())
    }

    #[test]
    fn test_first_frame_is_always_significant() {
        let ctx = LinkContext::new();
        let metrics = LinkMetrics::new();
        let mut state = test_state();

        ingest(
            r#"{"distance": 12.0, "battery": 7.4, "temperature": 25.0}"#,
            &ctx,
            &metrics,
            &mut state,
        );

        assert_eq!(metrics.snapshot().telemetry_significant, 1);
        assert_eq!(ctx.telemetry.load().distance, 12.0);
    }

    #[test]
    fn test_insignificant_frame_not_committed() {
        let ctx = LinkContext::new();
        let metrics = LinkMetrics::new();
        let mut state = test_state();

        ingest(
            r#"{"distance": 12.0, "battery": 7.4, "temperature": 25.0}"#,
            &ctx,
            &metrics,
            &mut state,
        );
        // 全部变化都在阈值内
        ingest(
            r#"{"distance": 12.3, "battery": 7.42, "temperature": 25.2}"#,
            &ctx,
            &metrics,
            &mut state,
        );

        let snap = metrics.snapshot();
        assert_eq!(snap.telemetry_frames, 2);
        assert_eq!(snap.telemetry_significant, 1);
        assert_eq!(ctx.telemetry.load().distance, 12.0);
    }

    #[test]
    fn test_significance_compares_against_last_frame_not_last_commit() {
        let ctx = LinkContext::new();
        let metrics = LinkMetrics::new();
        let mut state = test_state();

        ingest(
            r#"{"distance": 12.0, "battery": 7.4, "temperature": 25.0}"#,
            &ctx,
            &metrics,
            &mut state,
        );
        // 每帧相对上一帧漂移 0.3cm，相对首帧早已超过 0.5cm
        ingest(
            r#"{"distance": 12.3, "battery": 7.4, "temperature": 25.0}"#,
            &ctx,
            &metrics,
            &mut state,
        );
        ingest(
            r#"{"distance": 12.6, "battery": 7.4, "temperature": 25.0}"#,
            &ctx,
            &metrics,
            &mut state,
        );

        // 比较基准是上一帧而不是上次提交，缓慢漂移不触发提交
        assert_eq!(metrics.snapshot().telemetry_significant, 1);
        assert_eq!(state.prev_frame.unwrap().distance, 12.6);
    }

    #[test]
    fn test_status_line_passthrough() {
        let ctx = LinkContext::new();
        let metrics = LinkMetrics::new();
        let mut state = test_state();

        ingest("motor calibration done", &ctx, &metrics, &mut state);

        assert_eq!(metrics.snapshot().status_lines, 1);
        assert_eq!(ctx.status_line.load().as_str(), "motor calibration done");
        // 状态行不影响遥测基准
        assert!(state.prev_frame.is_none());
    }

    #[test]
    fn test_schedule_retry_increments_after_computing_delay() {
        let config = LinkConfig::default();
        let mut state = test_state();

        // 首次失败：延迟按 failures=0 计算（基准 1s），然后计数变 1
        schedule_retry(&mut state, &config);
        assert_eq!(state.failures, 1);
        let first_delay = state.next_dial - Instant::now();
        assert!(first_delay <= Duration::from_secs(1));
        assert!(first_delay > Duration::from_millis(900));

        // 第四次失败：min(1s * 1.5^3, 5s) = 3.375s
        schedule_retry(&mut state, &config);
        schedule_retry(&mut state, &config);
        schedule_retry(&mut state, &config);
        assert_eq!(state.failures, 4);
        let fourth_delay = state.next_dial - Instant::now();
        assert!(fourth_delay <= Duration::from_millis(3375));
        assert!(fourth_delay > Duration::from_millis(3200));
    }

    #[test]
    fn test_link_down_cancels_path_keeps_queue() {
        let config = LinkConfig::default();
        let ctx = LinkContext::new();
        let metrics = LinkMetrics::new();
        let mut state = test_state();

        state.follower = Some(PathFollower::new(vec![PathPoint::new(10.0, 0.0)]));
        ctx.set_path(PathActivity {
            active: true,
            next_index: 0,
            len: 1,
        });
        enqueue(&mut state, &metrics, &config, "speed:100".to_string());

        on_link_down(&mut state, &ctx, &config);

        assert!(state.follower.is_none());
        assert!(!ctx.path.load().active);
        assert_eq!(state.queue.len(), 1);
        assert_eq!(ctx.status.load().state, ConnectionState::Disconnected);
        assert!(ctx.status.load().consecutive_failures > 0);
        // 断连清空显著性基准：重连后的首帧必须提交
        assert!(state.prev_frame.is_none());
    }

    #[test]
    fn test_stop_path_enqueues_single_stop() {
        let config = LinkConfig::default();
        let ctx = LinkContext::new();
        let metrics = LinkMetrics::new();
        let mut state = test_state();

        state.follower = Some(PathFollower::new(vec![PathPoint::new(10.0, 0.0)]));

        handle_request(ControlRequest::StopPath, &mut state, &ctx, &metrics, &config);
        assert_eq!(state.queue.len(), 1);
        assert_eq!(state.queue.pop().as_deref(), Some("stop"));

        // 没有激活的路径时，StopPath 不产生命令
        handle_request(ControlRequest::StopPath, &mut state, &ctx, &metrics, &config);
        assert!(state.queue.is_empty());
    }

    #[test]
    fn test_empty_path_is_noop() {
        let config = LinkConfig::default();
        let ctx = LinkContext::new();
        let metrics = LinkMetrics::new();
        let mut state = test_state();

        handle_request(
            ControlRequest::StartPath(Vec::new()),
            &mut state,
            &ctx,
            &metrics,
            &config,
        );

        assert!(state.follower.is_none());
        assert!(!ctx.path.load().active);
        assert!(state.queue.is_empty());
    }

    #[test]
    fn test_enqueue_coalesces_only_inside_throttle_window() {
        let config = LinkConfig::default();
        let metrics = LinkMetrics::new();
        let mut state = test_state();

        // 还没发过运动命令：两条运动命令各自入队
        enqueue(&mut state, &metrics, &config, "forward".to_string());
        enqueue(&mut state, &metrics, &config, "left".to_string());
        assert_eq!(state.queue.len(), 2);
        assert_eq!(metrics.snapshot().tx_coalesced, 0);

        // 刚发出一条运动命令（窗口内）：新运动命令覆盖队尾
        state.queue.clear();
        state.last_movement_tx = Some(Instant::now());
        enqueue(&mut state, &metrics, &config, "forward".to_string());
        enqueue(&mut state, &metrics, &config, "left".to_string());
        assert_eq!(state.queue.len(), 1);
        assert_eq!(state.queue.pop().as_deref(), Some("left"));
        assert_eq!(metrics.snapshot().tx_coalesced, 1);
    }
}
