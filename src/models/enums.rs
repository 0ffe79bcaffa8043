use serde::{Deserialize, Serialize};

use crate::errors::DataError;

/// Macro to generate enum with as_str + std::str::FromStr pattern. The
/// serde rename keeps the stored JSON representation identical to
/// `as_str()`, which the store's field-equality conditions depend on.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DataError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DataError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(UserRole {
    Admin => "ADMIN",
    Doctor => "DOCTOR",
    Staff => "STAFF",
});

str_enum!(VisitStatus {
    Queued => "QUEUED",
    InProgress => "IN_PROGRESS",
    Done => "DONE",
});

impl VisitStatus {
    /// The only legal successor in the strictly ordered state machine,
    /// if any.
    pub fn next(&self) -> Option<VisitStatus> {
        match self {
            VisitStatus::Queued => Some(VisitStatus::InProgress),
            VisitStatus::InProgress => Some(VisitStatus::Done),
            VisitStatus::Done => None,
        }
    }
}

str_enum!(VisitKind {
    Consult => "CONSULT",
    Review => "REVIEW",
});

str_enum!(PresetKind {
    Medicine => "MEDICINE",
    Rx => "RX",
});

str_enum!(PaymentMode {
    Cash => "CASH",
    Upi => "UPI",
    Card => "CARD",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn visit_status_round_trip() {
        for (variant, s) in [
            (VisitStatus::Queued, "QUEUED"),
            (VisitStatus::InProgress, "IN_PROGRESS"),
            (VisitStatus::Done, "DONE"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(VisitStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn visit_status_successors() {
        assert_eq!(VisitStatus::Queued.next(), Some(VisitStatus::InProgress));
        assert_eq!(VisitStatus::InProgress.next(), Some(VisitStatus::Done));
        assert_eq!(VisitStatus::Done.next(), None);
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = VisitStatus::from_str("CANCELLED").unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[test]
    fn serde_form_matches_as_str() {
        let json = serde_json::to_string(&VisitStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        let back: VisitStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, VisitStatus::InProgress);
    }
}
