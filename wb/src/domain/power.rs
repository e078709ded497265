//! FTP-relative power arithmetic
//!
//! Targets travel the bus as a percentage of FTP and are turned into watts at
//! the Bridge; measurements travel as watts plus the same percentage.

/// FTP assumed for a trainer that never received a `set_ftp`
pub const DEFAULT_FTP_WATTS: u32 = 100;

/// Resolve a registry lookup to a usable, non-zero FTP
pub fn effective_ftp(ftp: Option<u32>) -> u32 {
    match ftp {
        Some(watts) if watts > 0 => watts,
        _ => DEFAULT_FTP_WATTS,
    }
}

/// Absolute watts for a percent-of-FTP target
pub fn target_watts(ftp: u32, target_power_percent: u32) -> f64 {
    f64::from(ftp) * f64::from(target_power_percent) / 100.0
}

/// Measured power as a rounded percentage of FTP
///
/// `ftp` must be non-zero; pass it through [`effective_ftp`] first.
pub fn percent_of_ftp(power_watts: f64, ftp: u32) -> i64 {
    (100.0 * power_watts / f64::from(ftp)).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_effective_ftp_defaults() {
        assert_eq!(effective_ftp(None), 100);
        assert_eq!(effective_ftp(Some(0)), 100);
        assert_eq!(effective_ftp(Some(250)), 250);
    }

    #[test]
    fn test_target_watts() {
        assert_eq!(target_watts(250, 80), 200.0);
        assert_eq!(target_watts(DEFAULT_FTP_WATTS, 65), 65.0);
        assert_eq!(target_watts(300, 0), 0.0);
        // Uncapped above threshold
        assert_eq!(target_watts(200, 150), 300.0);
    }

    #[test]
    fn test_percent_of_ftp_rounds() {
        assert_eq!(percent_of_ftp(200.0, 200), 100);
        assert_eq!(percent_of_ftp(0.0, 200), 0);
        // 100 * 101 / 300 = 33.67
        assert_eq!(percent_of_ftp(101.0, 300), 34);
        // 100 * 100 / 300 = 33.33
        assert_eq!(percent_of_ftp(100.0, 300), 33);
        assert_eq!(percent_of_ftp(95.0, effective_ftp(None)), 95);
    }

    proptest! {
        #[test]
        fn prop_percent_of_ftp_is_nearest_integer(power in 0u32..3000, ftp in 1u32..1000) {
            let exact = 100.0 * f64::from(power) / f64::from(ftp);
            let percent = percent_of_ftp(f64::from(power), ftp);
            prop_assert!((percent as f64 - exact).abs() <= 0.5);
        }

        #[test]
        fn prop_target_then_measure_recovers_percent(ftp in 1u32..1000, percent in 0u32..200) {
            let watts = target_watts(ftp, percent);
            prop_assert_eq!(percent_of_ftp(watts, ftp), i64::from(percent));
        }
    }
}
