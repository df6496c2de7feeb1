//! User profile collected during onboarding
//!
//! The advisor core treats the profile as read-only context. Fields mirror
//! the onboarding answers and default to empty so partially completed
//! onboarding still deserializes.

use serde::{Deserialize, Serialize};

/// Answer that marks debt as a serious source of stress
pub const HIGH_DEBT_STRESS: &str = "Yes, significantly";

/// Income stability answer that calls for a buffer-first tone
pub const UNCERTAIN_INCOME: &str = "Uncertain";

/// Goals a user can pick during onboarding (up to three)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GoalTag {
    /// Getting out of debt
    Debt,
    /// Building an emergency cushion
    Emergency,
    /// Saving for something specific
    Saving,
    /// The kids' future
    Kids,
    /// Retiring someday without panic
    Retire,
    /// Just... breathing room
    Breathing,
    /// Growing wealth long term
    Wealth,
    /// Something else
    Other,
}

/// Onboarding answers used to personalize advisor replies
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub work: String,
    pub income_stability: String,
    pub income: String,
    pub savings: String,
    pub has_debt: Option<bool>,
    pub debt_types: Vec<String>,
    pub debt_stress: String,
    pub goals: Vec<GoalTag>,
    pub dependents: bool,
    pub dependent_count: String,
    pub life_events: Vec<String>,
    pub decision_comfort: String,
    pub change_wish: String,
    pub anything_else: String,
}

impl UserProfile {
    /// First name to greet the user with, if one was given
    pub fn display_name(&self) -> Option<&str> {
        let name = self.name.trim();
        (!name.is_empty()).then_some(name)
    }

    pub fn has_goal(&self, goal: GoalTag) -> bool {
        self.goals.contains(&goal)
    }

    pub fn reports_high_debt_stress(&self) -> bool {
        self.debt_stress == HIGH_DEBT_STRESS
    }

    /// The user has debt and answered the debt-stress question at all
    pub fn has_stressful_debt(&self) -> bool {
        self.has_debt == Some(true) && !self.debt_stress.is_empty()
    }

    pub fn has_uncertain_income(&self) -> bool {
        self.income_stability == UNCERTAIN_INCOME
    }
}
