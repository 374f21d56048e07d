//! Size-scaled extraction deadlines
//!
//! Small files get a fixed base budget; larger files earn extra time per
//! additional MiB, capped at the configured ceiling.

use std::time::Duration;

const MIB: usize = 1024 * 1024;

/// Files up to this size get the base budget
pub const BASE_SIZE: usize = 10 * MIB;
/// Budget for files up to [`BASE_SIZE`]
pub const BASE_DEADLINE: Duration = Duration::from_secs(5);
/// Extra time per whole MiB above [`BASE_SIZE`]
pub const PER_MIB: Duration = Duration::from_millis(500);

/// Deadline for a file of `size` bytes, never above `ceiling`
pub fn deadline_for_size(size: usize, ceiling: Duration) -> Duration {
    let extra_mib = size.saturating_sub(BASE_SIZE) / MIB;
    let extra = PER_MIB.saturating_mul(u32::try_from(extra_mib).unwrap_or(u32::MAX));
    BASE_DEADLINE.saturating_add(extra).min(ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CEILING: Duration = Duration::from_secs(60);

    #[test]
    fn test_small_files_get_base_deadline() {
        assert_eq!(deadline_for_size(1, CEILING), Duration::from_secs(5));
        assert_eq!(deadline_for_size(10 * MIB, CEILING), Duration::from_secs(5));
    }

    #[test]
    fn test_scales_per_whole_mib() {
        assert_eq!(deadline_for_size(20 * MIB, CEILING), Duration::from_secs(10));
        assert_eq!(deadline_for_size(11 * MIB - 1, CEILING), Duration::from_secs(5));
        assert_eq!(deadline_for_size(11 * MIB, CEILING), Duration::from_millis(5500));
    }

    #[test]
    fn test_capped_at_ceiling() {
        assert_eq!(deadline_for_size(1024 * MIB, CEILING), CEILING);
        assert_eq!(
            deadline_for_size(20 * MIB, Duration::from_secs(8)),
            Duration::from_secs(8)
        );
        assert_eq!(deadline_for_size(1, Duration::from_secs(2)), Duration::from_secs(2));
    }
}
