const UNKNOWN_DURATION: &str = "--:--";

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub elapsed_label: String,
    pub total_label: String,
    pub percent: f64,
}

impl ProgressReport {
    pub fn label(&self) -> String {
        format!("{} / {}", self.elapsed_label, self.total_label)
    }
}

pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return String::from("0:00");
    }
    let whole = seconds.trunc() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

pub fn known_duration(duration: Option<f64>) -> Option<f64> {
    duration.filter(|value| value.is_finite() && *value > 0.0)
}

pub fn report(current: f64, duration: Option<f64>) -> ProgressReport {
    let elapsed_label = format_time(current);
    match known_duration(duration) {
        Some(total) => {
            let elapsed = if current.is_finite() { current.max(0.0) } else { 0.0 };
            ProgressReport {
                elapsed_label,
                total_label: format_time(total),
                percent: (elapsed / total * 100.0).clamp(0.0, 100.0),
            }
        }
        None => ProgressReport {
            elapsed_label,
            total_label: String::from(UNKNOWN_DURATION),
            percent: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_minutes_and_padded_seconds() {
        let report = report(65.0, Some(185.0));
        assert_eq!(report.label(), "1:05 / 3:05");
        assert!((report.percent - 65.0 / 185.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn truncates_fractional_seconds() {
        assert_eq!(format_time(59.99), "0:59");
        assert_eq!(format_time(600.4), "10:00");
    }

    #[test]
    fn unknown_duration_uses_placeholder() {
        for duration in [None, Some(f64::NAN), Some(f64::INFINITY), Some(0.0)] {
            let report = report(12.0, duration);
            assert_eq!(report.label(), "0:12 / --:--");
            assert_eq!(report.percent, 0.0);
        }
    }

    #[test]
    fn garbage_elapsed_renders_zero() {
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(-3.0), "0:00");
    }

    proptest::proptest! {
        #[test]
        fn percent_stays_in_range(current in 0.0f64..10_000.0, total in 0.001f64..10_000.0) {
            let report = report(current, Some(total));
            proptest::prop_assert!((0.0..=100.0).contains(&report.percent));
        }
    }
}
