use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefereeRole {
    Main,
    Assistant,
    Var,
    Waiting,
}

impl RefereeRole {
    pub const ALL: [RefereeRole; 4] = [
        RefereeRole::Main,
        RefereeRole::Assistant,
        RefereeRole::Var,
        RefereeRole::Waiting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RefereeRole::Main => "MAIN",
            RefereeRole::Assistant => "ASSISTANT",
            RefereeRole::Var => "VAR",
            RefereeRole::Waiting => "WAITING",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RefereeRole::Main => "주심",
            RefereeRole::Assistant => "부심",
            RefereeRole::Var => "VAR",
            RefereeRole::Waiting => "대기심",
        }
    }

    /// Column in `referee_team_stats` holding this role's count.
    pub(crate) fn count_column(self) -> &'static str {
        match self {
            RefereeRole::Main => "role_main",
            RefereeRole::Assistant => "role_assistant",
            RefereeRole::Var => "role_var",
            RefereeRole::Waiting => "role_waiting",
        }
    }
}

impl FromStr for RefereeRole {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        RefereeRole::ALL
            .into_iter()
            .find(|role| role.as_str() == raw.trim())
            .ok_or_else(|| UnknownVariant {
                kind: "role",
                value: raw.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Live => "LIVE",
            MatchStatus::Finished => "FINISHED",
            MatchStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for MatchStatus {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "SCHEDULED" => Ok(MatchStatus::Scheduled),
            "LIVE" => Ok(MatchStatus::Live),
            "FINISHED" => Ok(MatchStatus::Finished),
            "CANCELLED" => Ok(MatchStatus::Cancelled),
            other => Err(UnknownVariant {
                kind: "match status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Visible,
    Hidden,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Visible => "VISIBLE",
            ReviewStatus::Hidden => "HIDDEN",
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "VISIBLE" => Ok(ReviewStatus::Visible),
            "HIDDEN" => Ok(ReviewStatus::Hidden),
            other => Err(UnknownVariant {
                kind: "review status",
                value: other.to_string(),
            }),
        }
    }
}

macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse::<$ty>()
                    .map_err(|err| FromSqlError::Other(Box::new(err)))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

sql_text_enum!(RefereeRole);
sql_text_enum!(MatchStatus);
sql_text_enum!(ReviewStatus);

/// Per-role assignment counts for one referee/team pair.
///
/// Stored as `Option<RoleCounts>` on [`RefereeTeamStat`]: `None` means the pair has no
/// assignments at all, which is distinct from a record of zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
    #[serde(rename = "MAIN")]
    pub main: u32,
    #[serde(rename = "ASSISTANT")]
    pub assistant: u32,
    #[serde(rename = "VAR")]
    pub var: u32,
    #[serde(rename = "WAITING")]
    pub waiting: u32,
}

impl RoleCounts {
    pub fn get(&self, role: RefereeRole) -> u32 {
        match role {
            RefereeRole::Main => self.main,
            RefereeRole::Assistant => self.assistant,
            RefereeRole::Var => self.var,
            RefereeRole::Waiting => self.waiting,
        }
    }

    pub fn total(&self) -> u32 {
        self.main + self.assistant + self.var + self.waiting
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Builds counts from the four nullable columns; all NULL yields the "no assignments" marker.
    pub(crate) fn from_columns(
        main: Option<u32>,
        assistant: Option<u32>,
        var: Option<u32>,
        waiting: Option<u32>,
    ) -> Option<Self> {
        if main.is_none() && assistant.is_none() && var.is_none() && waiting.is_none() {
            return None;
        }
        Some(Self {
            main: main.unwrap_or(0),
            assistant: assistant.unwrap_or(0),
            var: var.unwrap_or(0),
            waiting: waiting.unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardCounts {
    pub home_yellow_cards: u32,
    pub home_red_cards: u32,
    pub away_yellow_cards: u32,
    pub away_red_cards: u32,
}

impl CardCounts {
    pub fn new(home_yellow: u32, home_red: u32, away_yellow: u32, away_red: u32) -> Self {
        Self {
            home_yellow_cards: home_yellow,
            home_red_cards: home_red,
            away_yellow_cards: away_yellow,
            away_red_cards: away_red,
        }
    }

    pub fn delta_to(&self, next: &CardCounts) -> CardDelta {
        CardDelta {
            home_yellow: i64::from(next.home_yellow_cards) - i64::from(self.home_yellow_cards),
            home_red: i64::from(next.home_red_cards) - i64::from(self.home_red_cards),
            away_yellow: i64::from(next.away_yellow_cards) - i64::from(self.away_yellow_cards),
            away_red: i64::from(next.away_red_cards) - i64::from(self.away_red_cards),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == CardCounts::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardDelta {
    pub home_yellow: i64,
    pub home_red: i64,
    pub away_yellow: i64,
    pub away_red: i64,
}

impl CardDelta {
    pub fn is_zero(&self) -> bool {
        self.home_yellow == 0 && self.home_red == 0 && self.away_yellow == 0 && self.away_red == 0
    }
}

/// Season, league and both teams of a match: everything a sync needs to locate its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchContext {
    pub match_id: String,
    pub season_id: String,
    pub league_id: String,
    pub home_team_id: String,
    pub away_team_id: String,
}

impl MatchContext {
    pub fn team_ids(&self) -> [&str; 2] {
        [self.home_team_id.as_str(), self.away_team_id.as_str()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub id: String,
    pub match_id: String,
    pub referee_id: String,
    pub role: RefereeRole,
    pub cards: CardCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefereeRoleStat {
    pub referee_id: String,
    pub season_id: String,
    pub league_id: String,
    pub role: RefereeRole,
    pub match_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefereeTeamStat {
    pub referee_id: String,
    pub team_id: String,
    pub total_assignments: u32,
    pub role_counts: Option<RoleCounts>,
    pub total_yellow_cards: u32,
    pub total_red_cards: u32,
    pub fan_average_rating: f64,
    pub fan_rating_count: u32,
}

impl RefereeTeamStat {
    pub fn role_count(&self, role: RefereeRole) -> u32 {
        self.role_counts.map_or(0, |counts| counts.get(role))
    }

    /// Role counts sum to the assignment total.
    pub fn is_consistent(&self) -> bool {
        self.role_counts.map_or(0, |counts| counts.total()) == self.total_assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_wire_names() {
        assert_eq!("MAIN".parse::<RefereeRole>(), Ok(RefereeRole::Main));
        assert_eq!(" VAR ".parse::<RefereeRole>(), Ok(RefereeRole::Var));
        assert!("main".parse::<RefereeRole>().is_err());
        let role: RefereeRole = serde_json::from_str("\"WAITING\"").unwrap();
        assert_eq!(role, RefereeRole::Waiting);
    }

    #[test]
    fn card_delta_is_signed_per_field() {
        let old = CardCounts::new(2, 1, 0, 0);
        let new = CardCounts::new(1, 1, 3, 0);
        let delta = old.delta_to(&new);
        assert_eq!(delta.home_yellow, -1);
        assert_eq!(delta.home_red, 0);
        assert_eq!(delta.away_yellow, 3);
        assert!(!delta.is_zero());
        assert!(new.delta_to(&new).is_zero());
    }

    #[test]
    fn role_counts_all_null_is_no_assignments() {
        assert_eq!(RoleCounts::from_columns(None, None, None, None), None);
        let counts = RoleCounts::from_columns(Some(0), Some(2), None, Some(1)).unwrap();
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.get(RefereeRole::Var), 0);
    }
}
