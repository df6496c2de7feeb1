use chrono::NaiveDate;
use proptest::prelude::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use haven_engine::bus::MessageBus;
use haven_engine::clock::{Clock, FixedClock};
use haven_engine::config::Config;
use haven_engine::oracle::ResponseOracle;
use haven_engine::reasoning::Advisor;
use haven_engine::session::{
    normalize_input, ConversationSession, Greeting, SessionContext, SessionLimits, SessionStatus,
};
use haven_engine::storage::MemoryStore;
use haven_engine::usage_ledger::UsageLedger;
use sdk::{GoalTag, UserProfile};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn start_session(limits: SessionLimits) -> ConversationSession {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
    ));
    let ledger = UsageLedger::new(Arc::new(MemoryStore::new()), clock.clone());
    let ctx = SessionContext {
        advisor: Arc::new(Advisor::offline()),
        bus: Arc::new(MessageBus::new()),
        clock,
    };
    ConversationSession::start(ctx, &ledger, limits, UserProfile::default(), Greeting::Welcome).await
}

fn profile_strategy() -> impl Strategy<Value = UserProfile> {
    (
        prop::option::of(any::<bool>()),
        prop_oneof![
            Just(String::new()),
            Just("Yes, significantly".to_string()),
            Just("A little".to_string()),
        ],
        prop_oneof![Just(String::new()), Just("Uncertain".to_string())],
        any::<bool>(),
    )
        .prop_map(|(has_debt, debt_stress, income_stability, breathing)| UserProfile {
            has_debt,
            debt_stress,
            income_stability,
            goals: if breathing {
                vec![GoalTag::Breathing]
            } else {
                Vec::new()
            },
            ..Default::default()
        })
}

// Identical input always yields identical output, and never an empty reply
proptest! {
    #[test]
    fn test_oracle_is_deterministic_and_total(
        text in ".{0,200}",
        profile in profile_strategy(),
    ) {
        let oracle = ResponseOracle::new();
        let first = oracle.respond(&text, &profile);
        let second = ResponseOracle::new().respond(&text, &profile);

        prop_assert_eq!(&first, &second);
        prop_assert!(!first.trim().is_empty());
    }
}

// Truncation happens before trimming, so over-long input stores the same
// content as its prefix
proptest! {
    #[test]
    fn test_truncation_idempotence(
        text in "[a-zA-Z é]{1,80}",
        max_chars in 1usize..40,
    ) {
        let prefix: String = text.chars().take(max_chars).collect();
        prop_assert_eq!(normalize_input(&text, max_chars), normalize_input(&prefix, max_chars));
        prop_assert!(normalize_input(&text, max_chars).chars().count() <= max_chars);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // Successful submissions never shrink the transcript or exceed the limit;
    // an ended session rejects everything and stays unchanged
    #[test]
    fn test_quota_monotonicity(
        max_messages in 3usize..24,
        inputs in prop::collection::vec("[a-z ]{0,12}", 1..30),
    ) {
        runtime().block_on(async {
            let limits = SessionLimits { max_chars: 500, max_messages };
            let mut session = start_session(limits).await;
            let cancel = CancellationToken::new();
            let mut last_len = session.messages().len();

            for input in &inputs {
                let was_ended = session.status() == SessionStatus::Ended;
                let before = session.messages().to_vec();

                let result = session.submit_message(input, &cancel).await;

                if was_ended {
                    prop_assert!(result.is_err());
                    prop_assert_eq!(session.messages(), before.as_slice());
                }

                let len = session.messages().len();
                prop_assert!(len >= last_len);
                prop_assert!(len <= max_messages);
                if len + 2 > max_messages {
                    prop_assert_eq!(session.status(), SessionStatus::Ended);
                }
                last_len = len;
            }
            Ok(())
        })?;
    }
}

proptest! {
    #[test]
    fn test_config_limits_round_trip(
        max_chars in 1usize..2000,
        max_messages in 3usize..100,
        max_chats_per_day in 1u32..50,
        log_level in "error|warn|info|debug|trace",
    ) {
        let toml = format!(
            "[core]\nlog_level = \"{}\"\n\n[storage]\nbackend = \"memory\"\n\n[limits]\nmax_chars = {}\nmax_messages = {}\nmax_chats_per_day = {}\n",
            log_level, max_chars, max_messages, max_chats_per_day
        );

        let config = Config::from_toml_str(&toml).unwrap();
        let serialized = toml::to_string(&config).unwrap();
        let reparsed = Config::from_toml_str(&serialized).unwrap();

        prop_assert_eq!(reparsed.limits.max_chars, max_chars);
        prop_assert_eq!(reparsed.limits.max_messages, max_messages);
        prop_assert_eq!(reparsed.limits.max_chats_per_day, max_chats_per_day);
        prop_assert_eq!(reparsed.core.log_level, log_level);
    }
}
