//! Object names derived from a channel's base name

use crate::error::{StreamError, StreamResult};
use crate::platform::{get_current_pid, monotonic_millis};
use common::consts::{
    DEFAULT_NAME_TAG, LOCAL_SCOPE_PREFIX, MAPPING_SUFFIX, READER_SIGNAL_SUFFIX,
    WRITER_SIGNAL_SUFFIX,
};
use std::sync::atomic::{AtomicU64, Ordering};

/// Longest file name the shm root accepts.
const NAME_MAX: usize = 255;

static NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a base name unique within this process's lifetime.
///
/// `Local_COMPUTE_<pid>_<monotonic ms>_<counter>`
pub fn default_base_name() -> String {
    let sequence = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "{LOCAL_SCOPE_PREFIX}{DEFAULT_NAME_TAG}{}_{}_{}",
        get_current_pid(),
        monotonic_millis(),
        sequence
    )
}

/// Reject base names that cannot name an object in the shm root.
pub fn validate_base_name(base: &str) -> StreamResult<()> {
    let longest_suffix = MAPPING_SUFFIX
        .len()
        .max(READER_SIGNAL_SUFFIX.len())
        .max(WRITER_SIGNAL_SUFFIX.len());

    if base.is_empty()
        || base.contains(['/', '\0'])
        || base == "."
        || base == ".."
        || base.len() + longest_suffix > NAME_MAX
    {
        return Err(StreamError::InvalidName {
            name: base.to_string(),
        });
    }
    Ok(())
}

/// Name of the data mapping (`B_M`)
pub fn mapping_name(base: &str) -> String {
    format!("{base}{MAPPING_SUFFIX}")
}

/// Name of the signal the writer raises for readers (`B_R`)
pub fn reader_signal_name(base: &str) -> String {
    format!("{base}{READER_SIGNAL_SUFFIX}")
}

/// Name of the signal readers raise for the writer (`B_W`)
pub fn writer_signal_name(base: &str) -> String {
    format!("{base}{WRITER_SIGNAL_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_object_names() {
        assert_eq!(mapping_name("jobs"), "jobs_M");
        assert_eq!(reader_signal_name("jobs"), "jobs_R");
        assert_eq!(writer_signal_name("jobs"), "jobs_W");
    }

    #[test]
    fn test_default_names_are_unique() {
        let names: HashSet<String> = (0..100).map(|_| default_base_name()).collect();
        assert_eq!(names.len(), 100);
    }

    #[test]
    fn test_default_name_shape() {
        let name = default_base_name();
        let prefix = format!("{LOCAL_SCOPE_PREFIX}{DEFAULT_NAME_TAG}{}_", get_current_pid());
        assert!(name.starts_with(&prefix), "unexpected name {name}");
        assert_eq!(name[prefix.len()..].split('_').count(), 2);
        assert!(validate_base_name(&name).is_ok());
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_base_name("controller_to_worker").is_ok());
        assert!(validate_base_name("").is_err());
        assert!(validate_base_name("a/b").is_err());
        assert!(validate_base_name("nul\0byte").is_err());
        assert!(validate_base_name("..").is_err());
        assert!(validate_base_name(&"x".repeat(NAME_MAX)).is_err());
    }
}
