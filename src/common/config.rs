//! Configuration constants for walpool.

/// Default page size in bytes (4KB).
///
/// 4096 matches the OS page size on most systems and the common database
/// default. Pools may be created with any power-of-two size between
/// [`MIN_PAGE_SIZE`] and [`MAX_PAGE_SIZE`].
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Smallest page size a pool may be created with.
pub const MIN_PAGE_SIZE: usize = 512;

/// Largest page size a pool may be created with (64KB).
pub const MAX_PAGE_SIZE: usize = 64 * 1024;

/// Returns true if `page_size` is acceptable for a new pool.
pub fn page_size_is_valid(page_size: usize) -> bool {
    page_size.is_power_of_two() && (MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_page_size_is_power_of_two() {
        assert!(DEFAULT_PAGE_SIZE.is_power_of_two());
        assert_eq!(DEFAULT_PAGE_SIZE, 4096);
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(page_size_is_valid(MIN_PAGE_SIZE));
        assert!(page_size_is_valid(MAX_PAGE_SIZE));
        assert!(page_size_is_valid(DEFAULT_PAGE_SIZE));

        assert!(!page_size_is_valid(MIN_PAGE_SIZE / 2));
        assert!(!page_size_is_valid(MAX_PAGE_SIZE * 2));
        assert!(!page_size_is_valid(5000)); // not a power of two
        assert!(!page_size_is_valid(0));
    }
}
