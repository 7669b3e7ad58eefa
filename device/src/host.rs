use std::time::Duration;

use anyhow::Context;
use dashboard_common::{
    path_for, topic_for, RemoteValue, PATH_LED_STATUS, PATH_SENSOR_HUMIDITY,
    PATH_SENSOR_TEMPERATURE,
};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tracing::{info, warn};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);
    let namespace = std::env::var("DASHBOARD_NAMESPACE")
        .map(|value| value.trim_matches('/').to_string())
        .unwrap_or_else(|_| "esp32sensorproject".to_string());
    let interval_secs = std::env::var("DEVICE_PUBLISH_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(5);

    let mut mqtt_options = MqttOptions::new("sensor-device-sim", mqtt_host, mqtt_port);

    if let Ok(user) = std::env::var("MQTT_USER") {
        let pass = std::env::var("MQTT_PASS").unwrap_or_default();
        mqtt_options.set_credentials(user, pass);
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);

    mqtt.subscribe(topic_for(&namespace, PATH_LED_STATUS), QoS::AtLeastOnce)
        .await
        .context("failed to subscribe to LED status")?;

    let led_namespace = namespace.clone();
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if path_for(&led_namespace, &message.topic) == Some(PATH_LED_STATUS) {
                        let on = RemoteValue::decode(&message.payload).as_switch();
                        info!("LED switched {}", if on { "on" } else { "off" });
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => info!("device connected"),
                Ok(_) => {}
                Err(err) => {
                    warn!("device mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });

    info!("device simulator publishing every {interval_secs}s under '{namespace}'");

    let mut tick: u64 = 0;
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;
        tick = tick.saturating_add(1);

        let (temperature, humidity) = simulated_reading(tick);

        mqtt.publish(
            topic_for(&namespace, PATH_SENSOR_TEMPERATURE),
            QoS::AtLeastOnce,
            true,
            temperature.encode(),
        )
        .await
        .context("failed to publish temperature")?;
        mqtt.publish(
            topic_for(&namespace, PATH_SENSOR_HUMIDITY),
            QoS::AtLeastOnce,
            true,
            humidity.encode(),
        )
        .await
        .context("failed to publish humidity")?;
    }
}

/// A DHT22-like pair: temperature as a float, humidity as a whole percent.
fn simulated_reading(tick: u64) -> (RemoteValue, RemoteValue) {
    let temperature = 21.0 + (tick % 8) as f64 * 0.35;
    let humidity = 45 + (tick % 10) as i64;
    (
        RemoteValue::Float((temperature * 100.0).round() / 100.0),
        RemoteValue::Integer(humidity),
    )
}
