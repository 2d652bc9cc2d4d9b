//! Persisted entities: point events, time-usage events, ranking state and
//! user settings.
//!
//! Field names on the wire follow the stored JSON layout (`type`,
//! `weekNumber`, `metadata`) so that exported snapshots and remote rows
//! share a single shape.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::WeekCalendar;
use crate::error::ValidationError;

/// Closed set of reward/penalty categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Handwriting,
    #[serde(rename = "exam_top5")]
    ExamTop5,
    SubjectProgress,
    TotalProgress,
    ErrorCollection,
    ErrorPractice,
    TeacherComplaint,
    BonusFreeTime,
    SpecialReward,
}

impl PointKind {
    pub const ALL: [PointKind; 9] = [
        PointKind::Handwriting,
        PointKind::ExamTop5,
        PointKind::SubjectProgress,
        PointKind::TotalProgress,
        PointKind::ErrorCollection,
        PointKind::ErrorPractice,
        PointKind::TeacherComplaint,
        PointKind::BonusFreeTime,
        PointKind::SpecialReward,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PointKind::Handwriting => "handwriting",
            PointKind::ExamTop5 => "exam_top5",
            PointKind::SubjectProgress => "subject_progress",
            PointKind::TotalProgress => "total_progress",
            PointKind::ErrorCollection => "error_collection",
            PointKind::ErrorPractice => "error_practice",
            PointKind::TeacherComplaint => "teacher_complaint",
            PointKind::BonusFreeTime => "bonus_free_time",
            PointKind::SpecialReward => "special_reward",
        }
    }

    /// Human-readable label, used as the default record description.
    pub fn label(&self) -> &'static str {
        match self {
            PointKind::Handwriting => "Excellent handwriting",
            PointKind::ExamTop5 => "Top 5 in class (single subject)",
            PointKind::SubjectProgress => "Subject rank improved",
            PointKind::TotalProgress => "Class rank improved",
            PointKind::ErrorCollection => "Mistake notebook entry",
            PointKind::ErrorPractice => "Mistake follow-up practice",
            PointKind::TeacherComplaint => "Teacher complaint",
            PointKind::BonusFreeTime => "Two-week streak bonus",
            PointKind::SpecialReward => "Special reward",
        }
    }

    pub fn is_progress(&self) -> bool {
        matches!(self, PointKind::SubjectProgress | PointKind::TotalProgress)
    }
}

impl fmt::Display for PointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PointKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        PointKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "kind".into(),
                message: format!("unknown point kind '{s}'"),
            })
    }
}

/// The two rank-based kinds and which slot of [`RankingState`] they track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    Subject,
    TotalClass,
}

impl ProgressKind {
    pub fn point_kind(&self) -> PointKind {
        match self {
            ProgressKind::Subject => PointKind::SubjectProgress,
            ProgressKind::TotalClass => PointKind::TotalProgress,
        }
    }

    pub fn current_rank(&self, state: &RankingState) -> u32 {
        match self {
            ProgressKind::Subject => state.subject_rank,
            ProgressKind::TotalClass => state.total_class_rank,
        }
    }

    pub fn apply(&self, state: &mut RankingState, new_rank: u32) {
        match self {
            ProgressKind::Subject => state.subject_rank = new_rank,
            ProgressKind::TotalClass => state.total_class_rank = new_rank,
        }
    }
}

impl FromStr for ProgressKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subject" | "subject_progress" => Ok(ProgressKind::Subject),
            "total" | "total_class" | "total_progress" => Ok(ProgressKind::TotalClass),
            other => Err(ValidationError::InvalidValue {
                field: "progress".into(),
                message: format!("unknown progress kind '{other}'"),
            }),
        }
    }
}

/// Kind-specific facts captured alongside a point record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "detail", rename_all = "snake_case")]
pub enum PointDetails {
    #[default]
    Plain,
    /// Rank movement behind a progress award.
    Progress { old_rank: u32, new_rank: u32 },
    /// Practice round behind an error-practice award.
    Practice { correct: u32, total: u32 },
}

/// One reward or penalty event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PointKind,
    pub value: i64,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "metadata", default)]
    pub details: PointDetails,
    pub timestamp: DateTime<Utc>,
    /// ISO week of `timestamp`, frozen when the record is created.
    #[serde(rename = "weekNumber")]
    pub week_number: u32,
}

impl PointRecord {
    /// Build a record stamped at `timestamp`, freezing its week number.
    pub fn new(
        kind: PointKind,
        value: i64,
        description: impl Into<String>,
        details: PointDetails,
        timestamp: DateTime<Utc>,
        calendar: &WeekCalendar,
    ) -> Self {
        Self {
            id: format!("point-{}", Uuid::new_v4()),
            kind,
            value,
            description: description.into(),
            details,
            timestamp,
            week_number: calendar.week_number(timestamp),
        }
    }
}

/// Leisure categories the weekly allowance is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeKind {
    Game,
    Entertainment,
}

impl TimeKind {
    pub const ALL: [TimeKind; 2] = [TimeKind::Game, TimeKind::Entertainment];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeKind::Game => "game",
            TimeKind::Entertainment => "entertainment",
        }
    }
}

impl fmt::Display for TimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "game" => Ok(TimeKind::Game),
            "entertainment" => Ok(TimeKind::Entertainment),
            other => Err(ValidationError::InvalidValue {
                field: "kind".into(),
                message: format!("unknown time kind '{other}'"),
            }),
        }
    }
}

/// One block of consumed leisure time.
///
/// The week is not stored; consumers derive it from `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeUsageRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TimeKind,
    pub minutes: u32,
    #[serde(default)]
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl TimeUsageRecord {
    pub fn new(
        kind: TimeKind,
        minutes: u32,
        description: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("time-{}", Uuid::new_v4()),
            kind,
            minutes,
            description: description.into(),
            timestamp,
        }
    }
}

/// Current reference ranks. Mutated in place, never versioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingState {
    #[serde(rename = "subjectRanking")]
    pub subject_rank: u32,
    #[serde(rename = "totalClassRanking")]
    pub total_class_rank: u32,
    #[serde(rename = "totalGradeRanking")]
    pub total_grade_rank: u32,
}

impl Default for RankingState {
    fn default() -> Self {
        Self {
            subject_rank: 10,
            total_class_rank: 10,
            total_grade_rank: 50,
        }
    }
}

impl RankingState {
    /// Ranks are 1-based positions.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, rank) in [
            ("subjectRanking", self.subject_rank),
            ("totalClassRanking", self.total_class_rank),
            ("totalGradeRanking", self.total_grade_rank),
        ] {
            if rank == 0 {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    message: "rank must be a positive integer".into(),
                });
            }
        }
        Ok(())
    }
}

/// User preferences. Also carries the owner identity used for remote rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_student_name")]
    pub student_name: String,
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
}

fn default_student_name() -> String {
    "Student".into()
}
fn default_true() -> bool {
    true
}
fn default_theme() -> String {
    "light".into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            student_name: default_student_name(),
            notifications: true,
            theme: default_theme(),
            student_id: None,
        }
    }
}

/// Identity and ordering shared by every record kind the merge step handles.
pub trait SyncRecord: Clone {
    fn id(&self) -> &str;
    fn timestamp(&self) -> DateTime<Utc>;
}

impl SyncRecord for PointRecord {
    fn id(&self) -> &str {
        &self.id
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl SyncRecord for TimeUsageRecord {
    fn id(&self) -> &str {
        &self.id
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
