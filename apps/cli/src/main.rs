//! rover-cli: 小车链路的命令行遥控与监控工具

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use rover_sdk::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "rover", version, about = "Remote control and monitor for the rover link")]
struct Cli {
    /// 目标 endpoint，例如 tcp://192.168.4.1:8266
    #[arg(short, long, global = true, default_value = "tcp://192.168.4.1:8266")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 发送一条运动命令，保持一段时间后停车
    Drive {
        direction: Direction,

        /// 电机速度（0-255）
        #[arg(short, long)]
        speed: Option<u8>,

        /// 保持时长（毫秒）
        #[arg(short, long, default_value_t = 500)]
        duration_ms: u64,
    },

    /// 实时打印遥测与链路状态（Ctrl-C 退出）
    Monitor,

    /// 跟随 JSON 文件中的路径（Ctrl-C 中途停止）
    Follow {
        /// 路径文件，格式 `[{"x": 0.0, "y": 0.0}, ...]`，单位 cm
        path_file: String,
    },

    /// 花式动作
    Stunt { stunt: Stunt },
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    ForwardLeft,
    ForwardRight,
    BackwardLeft,
    BackwardRight,
    Stop,
}

impl From<Direction> for MoveDirection {
    fn from(value: Direction) -> Self {
        match value {
            Direction::Forward => MoveDirection::Forward,
            Direction::Backward => MoveDirection::Backward,
            Direction::Left => MoveDirection::Left,
            Direction::Right => MoveDirection::Right,
            Direction::ForwardLeft => MoveDirection::ForwardLeft,
            Direction::ForwardRight => MoveDirection::ForwardRight,
            Direction::BackwardLeft => MoveDirection::BackwardLeft,
            Direction::BackwardRight => MoveDirection::BackwardRight,
            Direction::Stop => MoveDirection::Stop,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Stunt {
    Circle,
    Dance,
}

/// 注册 Ctrl-C 处理并返回运行标志
fn running_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;
    Ok(running)
}

/// 等待链路建立（交互命令在连上之前没有意义）
fn wait_connected(client: &RoverClient, running: &AtomicBool) -> Result<()> {
    info!("Connecting...");
    while !client.is_connected() {
        if !running.load(Ordering::SeqCst) {
            bail!("Interrupted before the link was established");
        }
        spin_sleep::sleep(Duration::from_millis(50));
    }
    info!("Link established");
    Ok(())
}

fn cmd_drive(
    client: &RoverClient,
    running: &AtomicBool,
    direction: Direction,
    speed: Option<u8>,
    duration_ms: u64,
) -> Result<()> {
    wait_connected(client, running)?;

    if let Some(speed) = speed {
        client.set_motor_speed(speed)?;
    }
    client.drive(direction.into())?;

    let mut remaining = duration_ms;
    while remaining > 0 && running.load(Ordering::SeqCst) {
        let step = remaining.min(50);
        spin_sleep::sleep(Duration::from_millis(step));
        remaining -= step;
    }

    client.halt()?;
    // 给调度队列留出节流窗口把 stop 发出去
    spin_sleep::sleep(Duration::from_millis(100));
    Ok(())
}

fn cmd_monitor(client: &RoverClient, running: &AtomicBool) -> Result<()> {
    let observer = client.observer();

    while running.load(Ordering::SeqCst) {
        let status = observer.status();
        let frame = observer.telemetry();
        let metrics = observer.metrics();

        println!(
            "[{}] distance={:.1}cm battery={:.2}V temp={:.1}°C avoidance={} speed={} \
             | tx={} rx={} significant={}",
            status.state,
            frame.distance,
            frame.battery,
            frame.temperature,
            frame.avoidance,
            frame.speed,
            metrics.tx_sent,
            metrics.telemetry_frames,
            metrics.telemetry_significant,
        );

        let line = observer.last_status_line();
        if !line.is_empty() {
            println!("  status: {}", line);
        }

        spin_sleep::sleep(Duration::from_millis(1000));
    }
    Ok(())
}

fn cmd_follow(client: &RoverClient, running: &AtomicBool, path_file: &str) -> Result<()> {
    let raw = std::fs::read_to_string(path_file)
        .with_context(|| format!("Failed to read path file {path_file}"))?;
    let points: Vec<PathPoint> =
        serde_json::from_str(&raw).context("Path file must be a JSON array of {x, y} points")?;

    if points.is_empty() {
        bail!("Path file contains no waypoints");
    }

    wait_connected(client, running)?;
    info!("Following path: {} waypoints", points.len());
    client.follow_path(points)?;

    let observer = client.observer();
    while running.load(Ordering::SeqCst) {
        let activity = observer.path_activity();
        if !activity.active {
            println!("Path complete");
            return Ok(());
        }
        println!("waypoint {}/{}", activity.next_index, activity.len);
        spin_sleep::sleep(Duration::from_millis(500));
    }

    // Ctrl-C：停车后退出
    client.stop_following()?;
    spin_sleep::sleep(Duration::from_millis(100));
    Ok(())
}

fn cmd_stunt(client: &RoverClient, running: &AtomicBool, stunt: Stunt) -> Result<()> {
    wait_connected(client, running)?;
    match stunt {
        Stunt::Circle => client.circle()?,
        Stunt::Dance => client.dance()?,
    }
    spin_sleep::sleep(Duration::from_millis(100));
    Ok(())
}

fn main() -> Result<()> {
    rover_sdk::init_logging();

    let cli = Cli::parse();
    let running = running_flag()?;

    let client = RoverClient::connect(&cli.endpoint)
        .with_context(|| format!("Invalid endpoint {:?}", cli.endpoint))?;

    match cli.command {
        Commands::Drive {
            direction,
            speed,
            duration_ms,
        } => cmd_drive(&client, &running, direction, speed, duration_ms),
        Commands::Monitor => cmd_monitor(&client, &running),
        Commands::Follow { path_file } => cmd_follow(&client, &running, &path_file),
        Commands::Stunt { stunt } => cmd_stunt(&client, &running, stunt),
    }
}
