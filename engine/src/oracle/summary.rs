//! Deterministic conversation summary

use chrono::NaiveDate;
use sdk::{Message, MessageRole, SummaryText, UserProfile};

/// Characters of the opening question quoted in the summary
pub const TOPIC_PREVIEW_CHARS: usize = 100;

/// Topic used when the user never wrote anything
pub const DEFAULT_TOPIC: &str = "your finances";

const KEY_INSIGHT: &str =
    "Taking time to think through decisions — instead of just reacting — puts you ahead.";
const ACTION_ITEM: &str = "This week: Write down the one financial thing on your mind most. Getting it out of your head is the first step.";
const ENCOURAGEMENT: &str = "You're asking the right questions. That's progress.";

/// Builds the takeaway block for a transcript
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryOracle;

impl SummaryOracle {
    pub fn new() -> Self {
        Self
    }

    /// The first user message, previewed, or the default topic
    pub fn main_topic(messages: &[Message]) -> String {
        let Some(first) = messages.iter().find(|m| m.role == MessageRole::User) else {
            return DEFAULT_TOPIC.to_string();
        };
        if first.content.is_empty() {
            return DEFAULT_TOPIC.to_string();
        }

        let mut preview: String = first.content.chars().take(TOPIC_PREVIEW_CHARS).collect();
        if first.content.chars().count() > TOPIC_PREVIEW_CHARS {
            preview.push_str("...");
        }
        preview
    }

    /// Summarize a transcript held on `date`
    ///
    /// The profile is accepted for parity with the reasoning service; the
    /// offline template does not personalize.
    pub fn summarize(
        &self,
        messages: &[Message],
        _profile: &UserProfile,
        date: NaiveDate,
    ) -> SummaryText {
        let topic = Self::main_topic(messages);

        SummaryText::new(format!(
            "**Conversation Summary**\n\
             *{date}*\n\
             \n\
             **What we discussed:**\n\
             {topic}\n\
             \n\
             **Key insight:**\n\
             {KEY_INSIGHT}\n\
             \n\
             **Your action item:**\n\
             {ACTION_ITEM}\n\
             \n\
             **Remember:**\n\
             {ENCOURAGEMENT}",
            date = date.format("%Y-%m-%d"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_summary_sections() {
        let messages = vec![
            Message::advisor("Hi!"),
            Message::user("Help me understand my debt"),
            Message::advisor("Sure"),
            Message::user("Second question"),
        ];

        let summary = SummaryOracle::new().summarize(&messages, &UserProfile::default(), date());
        let text = summary.as_str();

        assert!(text.starts_with("**Conversation Summary**\n*2026-10-19*\n"));
        assert!(text.contains("**What we discussed:**\nHelp me understand my debt\n"));
        assert!(!text.contains("Second question"));
        for heading in ["**Key insight:**", "**Your action item:**", "**Remember:**"] {
            assert!(text.contains(heading), "missing {}", heading);
        }
    }

    #[test]
    fn test_long_topic_is_previewed() {
        let long = "é".repeat(150);
        let messages = vec![Message::user(long)];

        let topic = SummaryOracle::main_topic(&messages);
        assert_eq!(topic.chars().count(), TOPIC_PREVIEW_CHARS + 3);
        assert!(topic.ends_with("..."));

        let exact = "a".repeat(TOPIC_PREVIEW_CHARS);
        assert_eq!(SummaryOracle::main_topic(&[Message::user(exact.clone())]), exact);
    }

    #[test]
    fn test_no_user_messages_uses_default_topic() {
        let messages = vec![Message::advisor("Hi!")];
        assert_eq!(SummaryOracle::main_topic(&messages), DEFAULT_TOPIC);
        assert_eq!(SummaryOracle::main_topic(&[]), DEFAULT_TOPIC);
    }

    #[test]
    fn test_summary_is_deterministic() {
        let messages = vec![Message::user("How am I doing?")];
        let oracle = SummaryOracle::new();
        let profile = UserProfile::default();
        assert_eq!(
            oracle.summarize(&messages, &profile, date()),
            oracle.summarize(&messages, &profile, date())
        );
    }
}
