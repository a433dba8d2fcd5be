//! Unit tests for Reason and ReasonKind

use core_types::{Reason, ReasonKind};

#[cfg(test)]
mod reason_kind_tests {
    use super::*;

    #[test]
    fn test_reason_kind_equality() {
        assert_eq!(ReasonKind::Error, ReasonKind::Error);
        assert_ne!(ReasonKind::Error, ReasonKind::Panic);
    }

    #[test]
    fn test_reason_kind_debug() {
        let debug_str = format!("{:?}", ReasonKind::TypeError);
        assert!(debug_str.contains("TypeError"));
    }
}

#[cfg(test)]
mod reason_tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct DiskFull {
        path: String,
    }

    impl fmt::Display for DiskFull {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "disk full while writing {}", self.path)
        }
    }

    impl std::error::Error for DiskFull {}

    #[test]
    fn test_reason_new_is_error_kind() {
        let reason = Reason::new("bad");
        assert_eq!(reason.kind(), ReasonKind::Error);
        assert_eq!(reason.message(), "bad");
    }

    #[test]
    fn test_reason_display() {
        let reason = Reason::type_error("chaining cycle detected");
        assert_eq!(reason.to_string(), "TypeError: chaining cycle detected");
    }

    #[test]
    fn test_reason_from_error_keeps_source_value() {
        let reason = Reason::from_error(DiskFull {
            path: "/var/log/app.log".to_string(),
        });

        assert_eq!(reason.message(), "disk full while writing /var/log/app.log");
        let original = reason.payload::<DiskFull>().unwrap();
        assert_eq!(original.path, "/var/log/app.log");
    }

    #[test]
    fn test_reason_payload_wrong_type_is_none() {
        let reason = Reason::with_payload("typed", 42_i64);
        assert_eq!(reason.payload::<i64>(), Some(&42));
        assert!(reason.payload::<i32>().is_none());
    }

    #[test]
    fn test_reason_from_static_str_panic() {
        let result = std::panic::catch_unwind(|| panic!("boom"));
        let reason = Reason::from_panic(result.unwrap_err());
        assert_eq!(reason.kind(), ReasonKind::Panic);
        assert_eq!(reason.message(), "boom");
    }

    #[test]
    fn test_reason_clone_is_equal() {
        let reason = Reason::with_payload("shared", vec![1, 2, 3]);
        let copy = reason.clone();
        assert_eq!(reason, copy);
        assert_eq!(copy.payload::<Vec<i32>>(), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn test_reason_debug_hides_payload() {
        let reason = Reason::with_payload("opaque", 5_u8);
        let debug_str = format!("{:?}", reason);
        assert!(debug_str.contains("opaque"));
        assert!(debug_str.contains("..."));
    }

    #[test]
    fn test_reason_is_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&Reason::new("x"));
    }
}
