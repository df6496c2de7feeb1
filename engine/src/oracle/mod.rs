//! Offline advisor
//!
//! Deterministic stand-ins for the reasoning service. The response oracle
//! routes a user utterance through an ordered rule table; the first rule
//! whose keywords appear in the lowercased text renders the reply. Text that
//! matches nothing gets a clarifying question.
//!
//! Both oracles are total: they always return non-empty text and never touch
//! the network, so a conversation can always make progress.

use sdk::{GoalTag, UserProfile};

pub mod summary;

pub use summary::SummaryOracle;

/// Canned openers offered on an empty chat
///
/// Each one routes to a different rule of the standard table.
pub const QUICK_PROMPTS: [&str; 4] = [
    "How am I doing this month?",
    "Help me understand my debt",
    "What should I focus on first?",
    "Is this purchase worth it?",
];

/// Reply used when no rule matches
pub const CLARIFYING_REPLY: &str = "I want to make sure I'm helpful here. Could you tell me more about what's prompting this question? The more specific, the more relevant I can be to your actual situation.";

/// Renders a reply for a matched rule
pub type Template = fn(&UserProfile) -> String;

/// One entry of the routing table
#[derive(Debug, Clone, Copy)]
pub struct ResponseRule {
    /// Identifier used in logs and tests
    pub name: &'static str,

    /// Lowercase substrings; any one of them selects this rule
    pub keywords: &'static [&'static str],

    pub template: Template,
}

impl ResponseRule {
    pub const fn new(name: &'static str, keywords: &'static [&'static str], template: Template) -> Self {
        Self {
            name,
            keywords,
            template,
        }
    }

    /// Whether this rule applies to already-lowercased text
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|keyword| lowered.contains(keyword))
    }

    pub fn render(&self, profile: &UserProfile) -> String {
        (self.template)(profile)
    }
}

/// Standard routing table, highest priority first
pub const STANDARD_RULES: [ResponseRule; 4] = [
    ResponseRule::new("debt", &["debt", "owe"], debt_reply),
    ResponseRule::new("priorities", &["first", "focus", "start"], priorities_reply),
    ResponseRule::new("purchase", &["purchase", "buy", "worth"], purchase_reply),
    ResponseRule::new("check_in", &["month", "doing", "how"], check_in_reply),
];

fn debt_reply(profile: &UserProfile) -> String {
    let stress = if profile.reports_high_debt_stress() {
        " — and you mentioned it's been causing real stress"
    } else {
        ""
    };

    format!(
        "I hear that debt is on your mind{}. Here's what helps: focus on one card at a time, \
         usually the highest interest rate first. Even $25 extra per month makes a difference. \
         What's the one debt that bothers you most?",
        stress
    )
}

fn priorities_reply(profile: &UserProfile) -> String {
    let advice = if profile.has_stressful_debt() {
        "Given your debt is causing stress, I'd start there — but build a tiny $500 buffer \
         first so surprises don't create new debt."
    } else {
        "The foundation: small emergency buffer → high-interest debt → expand buffer → then investing."
    };

    format!("Good question. {} What feels most urgent right now?", advice)
}

fn purchase_reply(profile: &UserProfile) -> String {
    let follow_up = if profile.has_goal(GoalTag::Breathing) {
        "You mentioned wanting breathing room — does this support that, or work against it?"
    } else {
        "What's your gut telling you?"
    };

    format!(
        "When thinking through a purchase: \"Will I still be glad I bought this in 2 weeks?\" \
         If yes, does it fit the budget without stress? {}",
        follow_up
    )
}

fn check_in_reply(profile: &UserProfile) -> String {
    let mut reply = String::from(
        "Without your actual numbers connected, here's what matters: Are you ending each month \
         with something left over, even $50? That's the foundation.",
    );
    if profile.has_uncertain_income() {
        reply.push_str(" With uncertain income, even a small buffer matters more than optimizing.");
    }
    reply.push_str(" How does a typical month look?");
    reply
}

/// Keyword-routed reply generator
#[derive(Debug, Clone)]
pub struct ResponseOracle {
    rules: Vec<ResponseRule>,
}

impl ResponseOracle {
    /// Oracle with the standard routing table
    pub fn new() -> Self {
        Self::with_rules(STANDARD_RULES.to_vec())
    }

    /// Oracle with a custom routing table, evaluated in order
    pub fn with_rules(rules: Vec<ResponseRule>) -> Self {
        Self { rules }
    }

    /// Append a rule with the lowest priority
    pub fn push_rule(&mut self, rule: ResponseRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[ResponseRule] {
        &self.rules
    }

    /// First rule that applies to `text`, if any
    pub fn route(&self, text: &str) -> Option<&ResponseRule> {
        let lowered = text.to_lowercase();
        self.rules.iter().find(|rule| rule.matches(&lowered))
    }

    /// Reply to `text` for the given profile
    pub fn respond(&self, text: &str, profile: &UserProfile) -> String {
        let reply = match self.route(text) {
            Some(rule) => {
                tracing::debug!("Oracle rule matched: {}", rule.name);
                rule.render(profile)
            }
            None => String::new(),
        };

        // A custom template may render nothing; never hand back an empty reply
        if reply.trim().is_empty() {
            CLARIFYING_REPLY.to_string()
        } else {
            reply
        }
    }
}

impl Default for ResponseOracle {
    fn default() -> Self {
        Self::new()
    }
}
