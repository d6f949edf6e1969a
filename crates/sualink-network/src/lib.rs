//! # sualink-network
//!
//! MQTT 전송 어댑터.
//! `sualink-core`의 `Transport` 포트를 rumqttc로 구현한다.
//! WebSocket(ws/wss)과 TCP(mqtt/mqtts) 브로커 주소를 지원하며,
//! keepalive/연결 타임아웃/재연결 간격은 연결 옵션으로 전달받는다.

pub mod mqtt_client;

pub use mqtt_client::MqttTransport;
