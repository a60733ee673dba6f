//! 入站消息解码
//!
//! 小车的入站方向只有两种形态：
//!
//! 1. **遥测帧**：一个 JSON 对象，必含 `distance` / `battery` / `temperature`
//!    三个键（`avoidance` / `speed` 可选）
//! 2. **状态行**：其余任何 payload（包括解析失败的 JSON），
//!    作为人类可读字符串原样透出
//!
//! 解码永不报错：格式不对就是状态行。这保证畸形 payload 不可能
//! 让摄取路径抛出异常。
//!
//! # 显著性过滤
//!
//! 传感器在噪声底附近抖动（超声波 ±0.2cm、电压 ±0.01V 量级），
//! 如果每帧都发布会让下游无意义地重算。只有至少一个字段越过
//! 各自阈值时才替换已发布的帧，见 [`SensorFrame::significant_change`]。

use serde::{Deserialize, Serialize};

/// 距离显著性阈值（cm）
pub const DISTANCE_EPSILON_CM: f64 = 0.5;
/// 电压显著性阈值（V）
pub const BATTERY_EPSILON_V: f64 = 0.05;
/// 温度显著性阈值（°C）
pub const TEMPERATURE_EPSILON_C: f64 = 0.5;

/// 传感器帧
///
/// 不可变值对象：每次接受更新时整体替换，绝不做字段级原地修改。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorFrame {
    /// 超声波测距（cm）
    pub distance: f64,
    /// 电池电压（V）
    pub battery: f64,
    /// 温度（°C）
    pub temperature: f64,
    /// 避障模式是否开启
    #[serde(default)]
    pub avoidance: bool,
    /// 当前电机速度（0-255）
    #[serde(default)]
    pub speed: u8,
}

impl SensorFrame {
    /// 判断相对 `prev` 是否有显著变化
    ///
    /// 至少一个数值字段越过阈值，或任一布尔/离散字段不同，即视为显著。
    /// 亚阈值抖动返回 `false`，调用方应保留旧帧（幂等）。
    pub fn significant_change(&self, prev: &SensorFrame) -> bool {
        (self.distance - prev.distance).abs() > DISTANCE_EPSILON_CM
            || (self.battery - prev.battery).abs() > BATTERY_EPSILON_V
            || (self.temperature - prev.temperature).abs() > TEMPERATURE_EPSILON_C
            || self.avoidance != prev.avoidance
            || self.speed != prev.speed
    }
}

/// 解码后的入站消息
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryMessage {
    /// 结构化遥测帧
    Sensor(SensorFrame),
    /// 人类可读状态行（原样透出）
    Status(String),
}

/// 解码一条入站 payload
///
/// 先尝试按遥测帧解析；任何失败（非 JSON、缺必需键、类型不符）
/// 都退化为状态行。此函数是全函数（total），不返回错误。
pub fn decode(payload: &str) -> TelemetryMessage {
    // serde 的字段默认值只覆盖可选键；必需键缺失会解析失败，
    // 正好实现"必须同时出现 distance/battery/temperature"的判定
    match serde_json::from_str::<SensorFrame>(payload) {
        Ok(frame) => TelemetryMessage::Sensor(frame),
        Err(_) => TelemetryMessage::Status(payload.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_sensor_frame() {
        let msg = decode(r#"{"distance": 42.5, "battery": 7.4, "temperature": 23.1, "avoidance": true, "speed": 128}"#);
        assert_eq!(
            msg,
            TelemetryMessage::Sensor(SensorFrame {
                distance: 42.5,
                battery: 7.4,
                temperature: 23.1,
                avoidance: true,
                speed: 128,
            })
        );
    }

    #[test]
    fn test_decode_optional_fields_default() {
        // avoidance 与 speed 在线上可以省略
        let msg = decode(r#"{"distance": 10.0, "battery": 7.0, "temperature": 20.0}"#);
        match msg {
            TelemetryMessage::Sensor(frame) => {
                assert!(!frame.avoidance);
                assert_eq!(frame.speed, 0);
            },
            other => panic!("Expected sensor frame, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_missing_required_key_is_status() {
        // 缺少 temperature，不是合法遥测帧
        let payload = r#"{"distance": 10.0, "battery": 7.0}"#;
        assert_eq!(decode(payload), TelemetryMessage::Status(payload.to_string()));
    }

    #[test]
    fn test_decode_malformed_json_is_status() {
        assert_eq!(
            decode("Obstacle detected!"),
            TelemetryMessage::Status("Obstacle detected!".to_string())
        );
        assert_eq!(decode("{not json"), TelemetryMessage::Status("{not json".to_string()));
    }

    #[test]
    fn test_significant_change_thresholds() {
        let base = SensorFrame {
            distance: 50.0,
            battery: 7.4,
            temperature: 25.0,
            avoidance: false,
            speed: 100,
        };

        // 亚阈值抖动：全部不显著
        let mut jitter = base;
        jitter.distance += 0.4;
        jitter.battery += 0.04;
        jitter.temperature -= 0.4;
        assert!(!jitter.significant_change(&base));

        // 任意单字段越过阈值即显著
        let mut far = base;
        far.distance += 0.6;
        assert!(far.significant_change(&base));

        let mut volt = base;
        volt.battery -= 0.06;
        assert!(volt.significant_change(&base));

        let mut temp = base;
        temp.temperature += 0.6;
        assert!(temp.significant_change(&base));
    }

    #[test]
    fn test_discrete_fields_always_significant() {
        let base = SensorFrame::default();

        let mut avoid = base;
        avoid.avoidance = true;
        assert!(avoid.significant_change(&base));

        let mut speed = base;
        speed.speed = 1;
        assert!(speed.significant_change(&base));
    }

    #[test]
    fn test_identical_frame_not_significant() {
        let frame = SensorFrame {
            distance: 12.0,
            battery: 8.0,
            temperature: 30.0,
            avoidance: true,
            speed: 200,
        };
        assert!(!frame.significant_change(&frame));
    }
}
