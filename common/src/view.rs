use std::{
    fmt,
    time::{Duration, Instant},
};

use serde::{Serialize, Serializer};

use crate::state::DashboardState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(hex: u32) -> Self {
        Self {
            r: (hex >> 16) as u8,
            g: (hex >> 8) as u8,
            b: hex as u8,
        }
    }

    /// Linear blend; `t` is clamped to `0.0..=1.0`.
    pub fn lerp(self, other: Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |from: u8, to: u8| -> u8 {
            let value = from as f32 + (to as f32 - from as f32) * t;
            value.round() as u8
        };
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }

    pub fn hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

pub const STATUS_OK: Color = Color::rgb(0x10B981);
pub const STATUS_BAD: Color = Color::rgb(0xEF4444);
pub const TEMPERATURE_ACCENT: Color = Color::rgb(0xEF4444);
pub const HUMIDITY_ACCENT: Color = Color::rgb(0x06B6D4);
pub const LED_ON: Color = Color::rgb(0xFBBF24);
pub const LED_OFF: Color = Color::rgb(0x9CA3AF);
pub const LED_CARD_ON: Color = Color::rgb(0xFEF3C7);
pub const CARD: Color = Color::rgb(0xFFFFFF);

pub const LED_TWEEN: Duration = Duration::from_millis(300);

pub fn led_accent(on: bool) -> Color {
    if on {
        LED_ON
    } else {
        LED_OFF
    }
}

/// Animates the LED accent towards a target colour over a fixed duration.
/// Retargeting mid-flight starts from the colour currently shown.
#[derive(Debug, Clone, Copy)]
pub struct ColorTween {
    from: Color,
    to: Color,
    started: Option<Instant>,
    duration: Duration,
}

impl ColorTween {
    pub fn new(initial: Color, duration: Duration) -> Self {
        Self {
            from: initial,
            to: initial,
            started: None,
            duration,
        }
    }

    pub fn target(&self) -> Color {
        self.to
    }

    pub fn retarget(&mut self, target: Color, now: Instant) {
        if target == self.to {
            return;
        }
        self.from = self.sample(now);
        self.to = target;
        self.started = Some(now);
    }

    pub fn sample(&self, now: Instant) -> Color {
        let Some(started) = self.started else {
            return self.to;
        };
        if self.duration.is_zero() {
            return self.to;
        }
        let elapsed = now.saturating_duration_since(started);
        let progress = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        self.from.lerp(self.to, progress)
    }

    pub fn is_running(&self, now: Instant) -> bool {
        self.started
            .is_some_and(|started| now.saturating_duration_since(started) < self.duration)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBanner {
    pub dot: Color,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadoutCard {
    pub icon: &'static str,
    pub title: &'static str,
    pub value: String,
    pub unit: &'static str,
    pub accent: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchRow {
    pub icon: &'static str,
    pub label: &'static str,
    pub state_text: String,
    pub checked: bool,
    pub accent: Color,
    pub background: Color,
}

/// Everything a surface needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub status: StatusBanner,
    pub readouts: [ReadoutCard; 2],
    pub led: SwitchRow,
    pub footer: &'static str,
}

impl DashboardView {
    /// View with the LED accent already settled on its target colour.
    pub fn from_state(state: &DashboardState) -> Self {
        Self::build(state, led_accent(state.led_on))
    }

    pub fn build(state: &DashboardState, led_color: Color) -> Self {
        let connected = state.status.is_connected();
        let state_text = match &state.led_fault {
            Some(_) => "Error".to_string(),
            None if state.led_on => "ON".to_string(),
            None => "OFF".to_string(),
        };

        Self {
            title: "🏠 Smart Home",
            subtitle: "IoT Dashboard",
            status: StatusBanner {
                dot: if connected { STATUS_OK } else { STATUS_BAD },
                text: state.status.to_string(),
            },
            readouts: [
                ReadoutCard {
                    icon: "🌡️",
                    title: "Temperature",
                    value: state.temperature.text().to_string(),
                    unit: "°C",
                    accent: TEMPERATURE_ACCENT,
                },
                ReadoutCard {
                    icon: "💧",
                    title: "Humidity",
                    value: state.humidity.text().to_string(),
                    unit: "%",
                    accent: HUMIDITY_ACCENT,
                },
            ],
            led: SwitchRow {
                icon: "💡",
                label: "LED Control",
                state_text,
                checked: state.led_on,
                accent: led_color,
                background: if state.led_on { LED_CARD_ON } else { CARD },
            },
            footer: "ESP32 IoT Dashboard",
        }
    }
}

impl fmt::Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} · {}", self.title, self.subtitle)?;
        writeln!(f, "● {} [{}]", self.status.text, self.status.dot.hex())?;
        for card in &self.readouts {
            writeln!(
                f,
                "{} {:<12} {} {}",
                card.icon, card.title, card.value, card.unit
            )?;
        }
        let switch = if self.led.checked { "[ ●]" } else { "[● ]" };
        writeln!(
            f,
            "{} {:<12} {} {} [{}]",
            self.led.icon,
            self.led.label,
            self.led.state_text,
            switch,
            self.led.accent.hex()
        )?;
        write!(f, "{}", self.footer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ErrorPropagation,
        state::{Action, Field},
        value::RemoteValue,
        DatabaseError,
    };
    use pretty_assertions::assert_eq;

    fn push(state: &mut DashboardState, field: Field, value: RemoteValue) {
        state.apply(
            Action::ValueChanged { field, value },
            ErrorPropagation::default(),
        );
    }

    #[test]
    fn initial_view_shows_sentinels_and_red_dot() {
        let view = DashboardView::from_state(&DashboardState::default());

        assert_eq!(view.status.text, "Connecting…");
        assert_eq!(view.status.dot, STATUS_BAD);
        assert_eq!(view.readouts[0].value, "--");
        assert_eq!(view.readouts[1].value, "--");
        assert_eq!(view.led.state_text, "OFF");
        assert_eq!(view.led.accent, LED_OFF);
        assert_eq!(view.led.background, CARD);
    }

    #[test]
    fn connected_view_renders_units_and_led() {
        let mut state = DashboardState::default();
        push(&mut state, Field::Temperature, RemoteValue::Float(23.7));
        push(&mut state, Field::Humidity, RemoteValue::Integer(55));
        push(&mut state, Field::Led, RemoteValue::Bool(true));
        let view = DashboardView::from_state(&state);

        assert_eq!(view.status.dot, STATUS_OK);
        assert_eq!(
            format!("{} {}", view.readouts[0].value, view.readouts[0].unit),
            "23.7 °C"
        );
        assert_eq!(
            format!("{} {}", view.readouts[1].value, view.readouts[1].unit),
            "55 %"
        );
        assert_eq!(view.led.state_text, "ON");
        assert!(view.led.checked);
        assert_eq!(view.led.background, LED_CARD_ON);
    }

    #[test]
    fn led_fault_is_shown_on_the_switch_row() {
        let mut state = DashboardState::default();
        state.apply(
            Action::DeliveryFailed {
                field: Field::Led,
                error: DatabaseError::Cancelled {
                    path: "Led/status".to_string(),
                },
            },
            ErrorPropagation::default(),
        );

        assert_eq!(DashboardView::from_state(&state).led.state_text, "Error");
    }

    #[test]
    fn text_rendering_lists_every_row() {
        let mut state = DashboardState::default();
        push(&mut state, Field::Temperature, RemoteValue::Float(23.7));
        let text = DashboardView::from_state(&state).to_string();

        assert!(text.contains("● Connected [#10B981]"));
        assert!(text.contains("Temperature  23.7 °C"));
        assert!(text.contains("Humidity     -- %"));
        assert!(text.contains("LED Control  OFF [● ]"));
    }

    #[test]
    fn colors_blend_and_format() {
        assert_eq!(LED_ON.hex(), "#FBBF24");
        assert_eq!(LED_OFF.lerp(LED_ON, 0.0), LED_OFF);
        assert_eq!(LED_OFF.lerp(LED_ON, 1.0), LED_ON);
        assert_eq!(LED_OFF.lerp(LED_ON, 7.0), LED_ON);
        assert_eq!(
            Color::rgb(0x000000).lerp(Color::rgb(0xFF6420), 0.5),
            Color::rgb(0x803210)
        );
    }

    #[test]
    fn tween_runs_for_its_duration() {
        let start = Instant::now();
        let mut tween = ColorTween::new(LED_OFF, LED_TWEEN);
        assert_eq!(tween.sample(start), LED_OFF);
        assert!(!tween.is_running(start));

        tween.retarget(LED_ON, start);
        assert_eq!(tween.sample(start), LED_OFF);
        let midway = start + Duration::from_millis(150);
        assert!(tween.is_running(midway));
        assert_ne!(tween.sample(midway), LED_OFF);
        assert_ne!(tween.sample(midway), LED_ON);
        assert_eq!(tween.sample(start + LED_TWEEN), LED_ON);
        assert!(!tween.is_running(start + LED_TWEEN));
    }

    #[test]
    fn retargeting_mid_flight_starts_from_current_colour() {
        let start = Instant::now();
        let mut tween = ColorTween::new(LED_OFF, LED_TWEEN);
        tween.retarget(LED_ON, start);

        let midway = start + Duration::from_millis(150);
        let shown = tween.sample(midway);
        tween.retarget(LED_OFF, midway);

        assert_eq!(tween.sample(midway), shown);
        assert_eq!(tween.target(), LED_OFF);
        assert_eq!(tween.sample(midway + LED_TWEEN), LED_OFF);
    }
}
