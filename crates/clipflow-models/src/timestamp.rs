//! Timestamp formatting for segment display.

/// Format seconds as `MM:SS`, truncating fractional seconds.
///
/// Minutes are not wrapped into hours, so a 75 minute offset renders as `75:00`.
///
/// # Examples
/// ```
/// use clipflow_models::timestamp::format_mm_ss;
/// assert_eq!(format_mm_ss(65.9), "01:05");
/// assert_eq!(format_mm_ss(0.0), "00:00");
/// ```
pub fn format_mm_ss(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}
