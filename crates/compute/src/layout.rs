//! Launch geometry for workgroup dispatch.

/// Logical threads in one device workgroup.
pub const THREADS_PER_GROUP: usize = 256;

/// Number of workgroups of `group_size` threads needed to cover `items`.
/// Always at least one.
#[must_use]
pub const fn group_count(items: usize, group_size: usize) -> usize {
    let groups = items.div_ceil(group_size);
    if groups == 0 {
        1
    } else {
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_count_rounds_up() {
        assert_eq!(group_count(0, THREADS_PER_GROUP), 1);
        assert_eq!(group_count(1, THREADS_PER_GROUP), 1);
        assert_eq!(group_count(256, THREADS_PER_GROUP), 1);
        assert_eq!(group_count(257, THREADS_PER_GROUP), 2);
        assert_eq!(group_count(640 * 480, THREADS_PER_GROUP), 1200);
    }
}
