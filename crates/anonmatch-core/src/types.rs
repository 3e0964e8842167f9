// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the matching core.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Stable 64-bit user identifier assigned by the transport.
pub type UserId = i64;

/// Monotonically assigned chat session identifier.
pub type SessionId = i64;

/// Earliest accepted entry year for a student profile.
pub const MIN_ENTRY_YEAR: i32 = 2015;

/// Transport-level identifier of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Storage,
    Moderation,
    Mailer,
    Observability,
}

// --- Profile vocabulary ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Gender {
    #[strum(to_string = "M", serialize = "Laki-laki", serialize = "L")]
    #[serde(rename = "M")]
    Male,
    #[strum(to_string = "F", serialize = "Perempuan", serialize = "P")]
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    /// Human-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Male => "Laki-laki",
            Gender::Female => "Perempuan",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Gender::Male => "👨",
            Gender::Female => "👩",
        }
    }
}

/// The closed set of eight departments.
///
/// `Display` yields the full name stored in the database; `FromStr` also
/// accepts the short code used in commands and callback payloads.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Department {
    #[strum(to_string = "Teknik Sipil", serialize = "ts")]
    #[serde(rename = "Teknik Sipil")]
    TeknikSipil,
    #[strum(to_string = "Teknik Mesin", serialize = "tm")]
    #[serde(rename = "Teknik Mesin")]
    TeknikMesin,
    #[strum(to_string = "Teknik Elektro", serialize = "te")]
    #[serde(rename = "Teknik Elektro")]
    TeknikElektro,
    #[strum(to_string = "Teknik Informatika & Komputer", serialize = "tik")]
    #[serde(rename = "Teknik Informatika & Komputer")]
    TeknikInformatika,
    #[strum(to_string = "Teknik Grafika & Penerbitan", serialize = "tgp")]
    #[serde(rename = "Teknik Grafika & Penerbitan")]
    TeknikGrafika,
    #[strum(to_string = "Akuntansi", serialize = "ak")]
    #[serde(rename = "Akuntansi")]
    Akuntansi,
    #[strum(to_string = "Administrasi Niaga", serialize = "an")]
    #[serde(rename = "Administrasi Niaga")]
    AdministrasiNiaga,
    #[strum(to_string = "Pascasarjana", serialize = "pasca")]
    #[serde(rename = "Pascasarjana")]
    Pascasarjana,
}

impl Department {
    pub const ALL: [Department; 8] = [
        Department::TeknikSipil,
        Department::TeknikMesin,
        Department::TeknikElektro,
        Department::TeknikInformatika,
        Department::TeknikGrafika,
        Department::Akuntansi,
        Department::AdministrasiNiaga,
        Department::Pascasarjana,
    ];

    /// Short code used in callback payloads (fits the 64-byte limit).
    pub fn code(&self) -> &'static str {
        match self {
            Department::TeknikSipil => "ts",
            Department::TeknikMesin => "tm",
            Department::TeknikElektro => "te",
            Department::TeknikInformatika => "tik",
            Department::TeknikGrafika => "tgp",
            Department::Akuntansi => "ak",
            Department::AdministrasiNiaga => "an",
            Department::Pascasarjana => "pasca",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Department::TeknikSipil => "🏗️",
            Department::TeknikMesin => "⚙️",
            Department::TeknikElektro => "⚡",
            Department::TeknikInformatika => "💻",
            Department::TeknikGrafika => "🎨",
            Department::Akuntansi => "📊",
            Department::AdministrasiNiaga => "📈",
            Department::Pascasarjana => "🎓",
        }
    }
}

/// Returns true if `year` lies in `[MIN_ENTRY_YEAR, current year]`.
pub fn is_valid_entry_year(year: i32, now: DateTime<Utc>) -> bool {
    (MIN_ENTRY_YEAR..=now.year()).contains(&year)
}

// --- Users ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Option<String>,
    pub verified: bool,
    pub banned: bool,
    pub gender: Option<Gender>,
    pub department: Option<Department>,
    pub entry_year: Option<i32>,
    pub display_name: Option<String>,
    pub report_count: i64,
    pub total_chats: i64,
    pub karma: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Verified with gender and department set.
    pub fn is_profile_complete(&self) -> bool {
        self.verified && self.gender.is_some() && self.department.is_some()
    }

    pub fn match_profile(&self) -> MatchProfile {
        MatchProfile {
            gender: self.gender,
            department: self.department,
            entry_year: self.entry_year,
        }
    }
}

/// The subset of a profile the matcher compares filters against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchProfile {
    pub gender: Option<Gender>,
    pub department: Option<Department>,
    pub entry_year: Option<i32>,
}

/// Partner preferences. Every empty field means "any".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_year: Option<i32>,
}

impl SearchFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_any(&self) -> bool {
        self.department.is_none() && self.gender.is_none() && self.entry_year.is_none()
    }

    /// Every non-empty field must equal the profile's value.
    pub fn accepts(&self, profile: &MatchProfile) -> bool {
        fn field_ok<T: PartialEq>(want: Option<T>, have: Option<T>) -> bool {
            match want {
                None => true,
                Some(w) => have == Some(w),
            }
        }
        field_ok(self.department, profile.department)
            && field_ok(self.gender, profile.gender)
            && field_ok(self.entry_year, profile.entry_year)
    }

    /// State payload encoding. The empty filter encodes to an empty string.
    pub fn to_payload(&self) -> String {
        if self.is_any() {
            return String::new();
        }
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Inverse of [`to_payload`](Self::to_payload); unreadable payloads decode to "any".
    pub fn from_payload(payload: &str) -> Self {
        if payload.trim().is_empty() {
            return Self::any();
        }
        serde_json::from_str(payload).unwrap_or_default()
    }
}

// --- Conversational state ---

/// Per-user conversational state tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserState {
    #[default]
    #[strum(to_string = "none", serialize = "")]
    None,
    AwaitingEmail,
    AwaitingOtp,
    AwaitingGender,
    AwaitingYear,
    AwaitingDepartment,
    Searching,
    InChat,
    AwaitingConfession,
    AwaitingReport,
    AwaitingWhisper,
    InCircle,
    AwaitingRoomName,
    AwaitingRoomDesc,
}

impl UserState {
    /// Onboarding steps that run before the profile is complete.
    pub fn is_onboarding(&self) -> bool {
        matches!(
            self,
            UserState::AwaitingEmail
                | UserState::AwaitingOtp
                | UserState::AwaitingGender
                | UserState::AwaitingYear
                | UserState::AwaitingDepartment
        )
    }
}

/// A user's state tag together with its payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    pub state: UserState,
    pub payload: String,
}

// --- Pool and sessions ---

/// A seeker waiting in the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub user_id: UserId,
    pub filter: SearchFilter,
    /// Snapshot of the seeker's own profile taken at enqueue time.
    pub profile: MatchProfile,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: SessionId,
    pub user1: UserId,
    pub user2: UserId,
    pub active: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ChatSession {
    /// The other participant, or `None` if `user` is not part of this session.
    pub fn partner_of(&self, user: UserId) -> Option<UserId> {
        if self.user1 == user {
            Some(self.user2)
        } else if self.user2 == user {
            Some(self.user1)
        } else {
            None
        }
    }
}

/// The result of ending an active session.
#[derive(Debug, Clone, PartialEq)]
pub struct EndedSession {
    pub session_id: SessionId,
    pub user1: UserId,
    pub user2: UserId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl EndedSession {
    pub fn duration(&self) -> chrono::Duration {
        (self.ended_at - self.started_at).max(chrono::Duration::zero())
    }

    pub fn partner_of(&self, user: UserId) -> Option<UserId> {
        if self.user1 == user {
            Some(self.user2)
        } else if self.user2 == user {
            Some(self.user1)
        } else {
            None
        }
    }
}

/// Outcome of a search request.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched {
        partner_id: UserId,
        session_id: SessionId,
    },
    /// Seeker was added to the pool; carries the pool size after insertion.
    Enqueued { position: usize },
    Rejected(crate::error::Rejection),
}

// --- Abuse ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub reporter_id: UserId,
    pub reported_id: UserId,
    pub reason: String,
    pub session_id: Option<SessionId>,
    pub evidence: String,
    pub created_at: DateTime<Utc>,
}

/// Result of persisting a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOutcome {
    pub report_count: i64,
    pub banned: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationCode {
    pub user_id: UserId,
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Achievement {
    pub user_id: UserId,
    pub key: String,
    pub earned_at: DateTime<Utc>,
}

// --- Transport events ---

/// A media reference carried by an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPayload {
    pub file_id: String,
    pub caption: Option<String>,
    /// Sender asked for a view-once delivery.
    pub ephemeral: bool,
}

impl MediaPayload {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            caption: None,
            ephemeral: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundKind {
    Command { name: String, args: String },
    Text(String),
    Photo(MediaPayload),
    Video(MediaPayload),
    Voice(MediaPayload),
    VideoNote(MediaPayload),
    Animation(MediaPayload),
    Sticker(MediaPayload),
    Document(MediaPayload),
    Callback { callback_id: String, data: String },
    Unsupported,
}

impl InboundKind {
    /// Label used for metrics and evidence frames.
    pub fn label(&self) -> &'static str {
        match self {
            InboundKind::Command { .. } => "command",
            InboundKind::Text(_) => "text",
            InboundKind::Photo(_) => "photo",
            InboundKind::Video(_) => "video",
            InboundKind::Voice(_) => "voice",
            InboundKind::VideoNote(_) => "video_note",
            InboundKind::Animation(_) => "animation",
            InboundKind::Sticker(_) => "sticker",
            InboundKind::Document(_) => "document",
            InboundKind::Callback { .. } => "callback",
            InboundKind::Unsupported => "unsupported",
        }
    }
}

/// An inbound event received from a channel adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Transport-unique id; redeliveries of the same update share it.
    pub event_id: String,
    pub user_id: UserId,
    pub message_id: Option<MessageId>,
    pub kind: InboundKind,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Formatting {
    #[default]
    Plain,
    Html,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundContent {
    Text(String),
    Photo { file_id: String, caption: Option<String> },
    Video { file_id: String, caption: Option<String> },
    Voice { file_id: String },
    VideoNote { file_id: String },
    Animation { file_id: String },
    Sticker { file_id: String },
    Document { file_id: String, caption: Option<String> },
}

/// An inline button; `data` is the callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }
}

/// An outbound message to be sent via a channel adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub user_id: UserId,
    pub content: OutboundContent,
    pub formatting: Formatting,
    pub keyboard: Option<Keyboard>,
}

impl OutboundMessage {
    pub fn text(user_id: UserId, text: impl Into<String>) -> Self {
        Self {
            user_id,
            content: OutboundContent::Text(text.into()),
            formatting: Formatting::Plain,
            keyboard: None,
        }
    }

    pub fn html(user_id: UserId, text: impl Into<String>) -> Self {
        Self {
            user_id,
            content: OutboundContent::Text(text.into()),
            formatting: Formatting::Html,
            keyboard: None,
        }
    }

    pub fn media(user_id: UserId, content: OutboundContent) -> Self {
        Self {
            user_id,
            content,
            formatting: Formatting::Html,
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    /// Text body or caption, if any.
    pub fn body(&self) -> Option<&str> {
        match &self.content {
            OutboundContent::Text(t) => Some(t),
            OutboundContent::Photo { caption, .. }
            | OutboundContent::Video { caption, .. }
            | OutboundContent::Document { caption, .. } => caption.as_deref(),
            _ => None,
        }
    }
}

/// Classifier decision for a piece of media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Safe,
    Unsafe { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn profile(g: Gender, d: Department, y: i32) -> MatchProfile {
        MatchProfile {
            gender: Some(g),
            department: Some(d),
            entry_year: Some(y),
        }
    }

    #[test]
    fn empty_filter_accepts_everyone() {
        let f = SearchFilter::any();
        assert!(f.accepts(&profile(Gender::Male, Department::Akuntansi, 2020)));
        assert!(f.accepts(&MatchProfile::default()));
    }

    #[test]
    fn filter_requires_every_set_field() {
        let f = SearchFilter {
            gender: Some(Gender::Female),
            entry_year: Some(2022),
            department: None,
        };
        assert!(f.accepts(&profile(Gender::Female, Department::TeknikMesin, 2022)));
        assert!(!f.accepts(&profile(Gender::Female, Department::TeknikMesin, 2021)));
        assert!(!f.accepts(&profile(Gender::Male, Department::TeknikMesin, 2022)));
        assert!(!f.accepts(&MatchProfile::default()));
    }

    #[test]
    fn filter_payload_encoding() {
        assert_eq!(SearchFilter::any().to_payload(), "");
        let f = SearchFilter {
            department: Some(Department::TeknikInformatika),
            gender: None,
            entry_year: None,
        };
        let payload = f.to_payload();
        assert!(payload.contains("Teknik Informatika & Komputer"));
        assert_eq!(SearchFilter::from_payload(&payload), f);
        assert_eq!(SearchFilter::from_payload("not json"), SearchFilter::any());
    }

    #[test]
    fn state_none_parses_from_empty_and_displays_as_none() {
        assert_eq!(UserState::from_str("").unwrap(), UserState::None);
        assert_eq!(UserState::from_str("none").unwrap(), UserState::None);
        assert_eq!(UserState::None.to_string(), "none");
        assert_eq!(UserState::InChat.to_string(), "in_chat");
        assert_eq!(
            UserState::from_str("awaiting_room_desc").unwrap(),
            UserState::AwaitingRoomDesc
        );
    }

    #[test]
    fn department_parses_name_and_code() {
        assert_eq!(
            Department::from_str("tik").unwrap(),
            Department::TeknikInformatika
        );
        assert_eq!(
            Department::from_str("Administrasi Niaga").unwrap(),
            Department::AdministrasiNiaga
        );
        for d in Department::ALL {
            assert_eq!(Department::from_str(d.code()).unwrap(), d);
            assert_eq!(Department::from_str(&d.to_string()).unwrap(), d);
        }
    }

    #[test]
    fn gender_accepts_labels() {
        assert_eq!(Gender::from_str("Perempuan").unwrap(), Gender::Female);
        assert_eq!(Gender::from_str("m").unwrap(), Gender::Male);
        assert_eq!(Gender::Male.to_string(), "M");
    }

    #[test]
    fn entry_year_bounds() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert!(is_valid_entry_year(MIN_ENTRY_YEAR, now));
        assert!(!is_valid_entry_year(MIN_ENTRY_YEAR - 1, now));
        assert!(is_valid_entry_year(2026, now));
        assert!(!is_valid_entry_year(2027, now));
    }

    #[test]
    fn partner_of_is_symmetric() {
        let s = ChatSession {
            id: 1,
            user1: 10,
            user2: 20,
            active: true,
            started_at: Utc::now(),
            ended_at: None,
        };
        assert_eq!(s.partner_of(10), Some(20));
        assert_eq!(s.partner_of(20), Some(10));
        assert_eq!(s.partner_of(30), None);
    }

    #[test]
    fn ended_session_duration_is_never_negative() {
        let t = Utc::now();
        let e = EndedSession {
            session_id: 1,
            user1: 1,
            user2: 2,
            started_at: t,
            ended_at: t - chrono::Duration::seconds(5),
        };
        assert_eq!(e.duration(), chrono::Duration::zero());
    }
}
