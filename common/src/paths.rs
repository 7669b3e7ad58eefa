pub const PATH_LED_STATUS: &str = "Led/status";
pub const PATH_SENSOR_TEMPERATURE: &str = "Sensor/temperature";
pub const PATH_SENSOR_HUMIDITY: &str = "Sensor/humidity";

/// Maps a database path onto the broker topic that carries it.
pub fn topic_for(namespace: &str, path: &str) -> String {
    if namespace.is_empty() {
        path.to_string()
    } else {
        format!("{namespace}/{path}")
    }
}

/// Inverse of [`topic_for`]. Topics outside the namespace yield `None`.
pub fn path_for<'a>(namespace: &str, topic: &'a str) -> Option<&'a str> {
    if namespace.is_empty() {
        return Some(topic);
    }
    topic
        .strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|path| !path.is_empty())
}

/// A namespace or path segment may not carry MQTT wildcards or empty levels.
pub fn is_valid_path(path: &str) -> bool {
    !path.is_empty()
        && !path.contains(['+', '#', '\0'])
        && path.split('/').all(|segment| !segment.is_empty())
}
