// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the anonmatch bot.
//!
//! Defines the error type, the domain vocabulary (users, states, filters,
//! sessions, transport events) and the adapter traits every backend
//! implements. Nothing in this crate performs I/O.

pub mod community;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Action, AnonmatchError, Rejection};
pub use types::{
    AdapterType, HealthStatus, InboundEvent, InboundKind, MatchOutcome, MessageId,
    OutboundMessage, SearchFilter, SessionId, UserId, UserState,
};

pub use traits::{
    ChannelAdapter, CommunityStore, ContentClassifier, OtpMailer, PluginAdapter, StorageAdapter,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_are_not_transient() {
        assert!(!AnonmatchError::Banned.is_transient());
        assert!(!AnonmatchError::PartnerGone.is_transient());
        assert!(
            !AnonmatchError::CircuitOpen {
                name: "moderation".into()
            }
            .is_transient()
        );
        assert!(
            AnonmatchError::Storage {
                source: Box::new(std::io::Error::other("disk")),
            }
            .is_transient()
        );
        assert!(
            AnonmatchError::Timeout {
                duration: std::time::Duration::from_secs(5)
            }
            .is_transient()
        );
    }

    #[test]
    fn rejection_maps_to_error_kind() {
        let err: AnonmatchError = Rejection::RateLimited.into();
        assert!(matches!(
            err,
            AnonmatchError::RateLimited {
                action: Action::Search
            }
        ));
        assert_eq!(AnonmatchError::from(Rejection::Banned).kind(), "banned");
    }

    #[test]
    fn circuit_open_message_names_the_breaker() {
        let err = AnonmatchError::CircuitOpen {
            name: "sightengine".into(),
        };
        assert_eq!(err.to_string(), "circuit breaker [sightengine] is open");
    }

    #[test]
    fn adapter_type_round_trips_through_display() {
        use std::str::FromStr;
        for variant in [
            AdapterType::Channel,
            AdapterType::Storage,
            AdapterType::Moderation,
            AdapterType::Mailer,
            AdapterType::Observability,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn action_labels_are_snake_case() {
        assert_eq!(Action::Search.to_string(), "search");
        assert_eq!(Action::Report.to_string(), "report");
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_channel_adapter<T: ChannelAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_classifier<T: ContentClassifier>() {}
        fn _assert_mailer<T: OtpMailer>() {}
        fn _assert_community<T: CommunityStore>() {}
    }
}
