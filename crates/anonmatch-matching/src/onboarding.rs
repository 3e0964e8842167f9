// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Email verification and profile completion.
//!
//! `none -> awaiting_email -> awaiting_otp -> awaiting_gender ->
//! awaiting_year -> awaiting_department -> none`. The same gender, year and
//! department steps are reused by `/edit`, with `edit` as the state payload.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use tokio::time::Instant;
use tracing::{info, warn};

use anonmatch_config::model::VerificationConfig;
use anonmatch_core::types::{is_valid_entry_year, Department, Gender, User, VerificationCode};
use anonmatch_core::{Action, AnonmatchError, OtpMailer, StorageAdapter, UserId, UserState};

use crate::validation::normalize_email;

/// State payload marking the profile steps as an edit of a complete profile.
pub const EDIT_PAYLOAD: &str = "edit";

const ADJECTIVES: [&str; 20] = [
    "Mysterious", "Silent", "Shadow", "Hidden", "Phantom", "Secret", "Unknown", "Masked",
    "Invisible", "Anonymous", "Cosmic", "Stellar", "Neon", "Cyber", "Digital", "Mystic", "Dark",
    "Light", "Swift", "Bold",
];

const ANIMALS: [&str; 20] = [
    "Fox", "Wolf", "Eagle", "Owl", "Tiger", "Panther", "Hawk", "Raven", "Phoenix", "Dragon",
    "Falcon", "Bear", "Lion", "Deer", "Cobra", "Jaguar", "Lynx", "Viper", "Crane", "Shark",
];

/// A decimal code of `length` digits. Leading zeros are kept.
pub fn generate_otp(length: u32) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Adjective, animal and a number in `1..=999`, e.g. `SilentOwl42`.
pub fn generate_display_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let animal = ANIMALS[rng.gen_range(0..ANIMALS.len())];
    let number = rng.gen_range(1..=999);
    format!("{adjective}{animal}{number}")
}

#[derive(Debug, Default)]
struct OtpAttempts {
    failures: u32,
    locked_until: Option<Instant>,
}

pub struct Onboarding {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    mailer: Arc<dyn OtpMailer + Send + Sync>,
    config: VerificationConfig,
    attempts: DashMap<UserId, OtpAttempts>,
}

impl Onboarding {
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        mailer: Arc<dyn OtpMailer + Send + Sync>,
        config: VerificationConfig,
    ) -> Self {
        Self {
            storage,
            mailer,
            config,
            attempts: DashMap::new(),
        }
    }

    /// Creates the user on first contact. Idempotent.
    pub async fn register(&self, user: UserId) -> Result<User, AnonmatchError> {
        self.storage.create_user(user).await
    }

    /// Asks for the campus email.
    pub async fn begin_registration(&self, user: UserId) -> Result<(), AnonmatchError> {
        self.storage.create_user(user).await?;
        self.storage
            .set_state(user, UserState::AwaitingEmail, "")
            .await
    }

    /// Validates the address, stores a fresh code and mails it.
    pub async fn initiate_verification(
        &self,
        user: UserId,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AnonmatchError> {
        let email = normalize_email(email)?;
        let code = generate_otp(self.config.otp_length);
        let expires_at = now + chrono::Duration::minutes(i64::from(self.config.otp_expiry_minutes));

        self.storage
            .save_verification_code(&VerificationCode {
                user_id: user,
                email: email.clone(),
                code: code.clone(),
                expires_at,
                used: false,
            })
            .await?;
        self.storage.set_email(user, &email).await?;
        self.storage
            .set_state(user, UserState::AwaitingOtp, &email)
            .await?;

        if let Err(e) = self
            .mailer
            .send_otp(&email, &code, self.config.otp_expiry_minutes)
            .await
        {
            warn!(user_id = user, error = %e, "failed to send OTP email");
            return Err(e);
        }
        info!(user_id = user, "OTP sent");
        Ok(())
    }

    /// Checks `code`. Returns `Ok(false)` for a wrong or expired code; too
    /// many failures lock the user out with [`Action::Otp`].
    pub async fn verify_otp(
        &self,
        user: UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AnonmatchError> {
        if self.is_locked(user) {
            anonmatch_prometheus::record_otp_verification("locked");
            return Err(AnonmatchError::RateLimited {
                action: Action::Otp,
            });
        }

        let consumed = self
            .storage
            .consume_verification_code(user, code.trim(), now)
            .await?;
        let Some(consumed) = consumed else {
            self.record_failure(user);
            anonmatch_prometheus::record_otp_verification("invalid");
            return Ok(false);
        };

        self.attempts.remove(&user);
        self.storage.set_verified(user, &consumed.email).await?;
        self.storage
            .set_state(user, UserState::AwaitingGender, "")
            .await?;
        anonmatch_prometheus::record_otp_verification("success");
        info!(user_id = user, "user verified");
        Ok(true)
    }

    fn lockout(&self) -> Duration {
        Duration::from_secs(u64::from(self.config.lockout_minutes) * 60)
    }

    fn is_locked(&self, user: UserId) -> bool {
        let now = Instant::now();
        let expired = match self.attempts.get(&user) {
            Some(a) => match a.locked_until {
                Some(until) if until > now => return true,
                Some(_) => true,
                None => false,
            },
            None => false,
        };
        if expired {
            self.attempts.remove(&user);
        }
        false
    }

    fn record_failure(&self, user: UserId) {
        let lockout = self.lockout();
        let mut attempts = self.attempts.entry(user).or_default();
        attempts.failures += 1;
        if attempts.failures >= self.config.max_attempts {
            attempts.locked_until = Some(Instant::now() + lockout);
            warn!(user_id = user, attempts = attempts.failures, "OTP lockout triggered");
        }
    }

    /// Profile step 1. Keeps the state payload so edits stay edits.
    pub async fn set_gender(&self, user: UserId, gender: Gender) -> Result<(), AnonmatchError> {
        let payload = self.storage.get_state(user).await?.payload;
        self.storage.set_gender(user, gender).await?;
        self.storage
            .set_state(user, UserState::AwaitingYear, &payload)
            .await
    }

    /// Profile step 2.
    pub async fn set_entry_year(
        &self,
        user: UserId,
        year: i32,
        now: DateTime<Utc>,
    ) -> Result<(), AnonmatchError> {
        if !is_valid_entry_year(year, now) {
            return Err(AnonmatchError::invalid(
                "entry_year",
                format!(
                    "must be between {} and the current year",
                    anonmatch_core::types::MIN_ENTRY_YEAR
                ),
            ));
        }
        let payload = self.storage.get_state(user).await?.payload;
        self.storage.set_entry_year(user, year).await?;
        self.storage
            .set_state(user, UserState::AwaitingDepartment, &payload)
            .await
    }

    /// Profile step 3. Assigns the display handle on first completion and
    /// returns it; edits keep the existing handle and return `None`.
    pub async fn set_department(
        &self,
        user: UserId,
        department: Department,
    ) -> Result<Option<String>, AnonmatchError> {
        self.storage.set_department(user, department).await?;
        let name = generate_display_name();
        let assigned = self.storage.assign_display_name(user, &name).await?;
        self.storage.set_state(user, UserState::None, "").await?;
        if assigned {
            info!(user_id = user, "profile completed");
        }
        Ok(assigned.then_some(name))
    }

    /// Re-enters the profile steps for a complete profile.
    pub async fn begin_edit(&self, user: UserId) -> Result<(), AnonmatchError> {
        let Some(u) = self.storage.get_user(user).await? else {
            return Err(AnonmatchError::NotVerified);
        };
        if !u.is_profile_complete() {
            return Err(AnonmatchError::ProfileIncomplete);
        }
        self.storage
            .set_state(user, UserState::AwaitingGender, EDIT_PAYLOAD)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_storage;
    use anonmatch_test_utils::MockMailer;

    async fn fixture() -> (
        Onboarding,
        Arc<MockMailer>,
        Arc<dyn StorageAdapter + Send + Sync>,
        tempfile::TempDir,
    ) {
        let (storage, dir) = setup_storage().await;
        let mailer = Arc::new(MockMailer::new());
        let onboarding = Onboarding::new(storage.clone(), mailer.clone(), VerificationConfig::default());
        (onboarding, mailer, storage, dir)
    }

    #[test]
    fn otp_has_requested_length_and_digits() {
        for len in [4, 6, 8] {
            let code = generate_otp(len);
            assert_eq!(code.len(), len as usize);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn display_name_shape() {
        for _ in 0..50 {
            let name = generate_display_name();
            let digits: String = name.chars().filter(|c| c.is_ascii_digit()).collect();
            let n: u32 = digits.parse().unwrap();
            assert!((1..=999).contains(&n));
            assert!(ADJECTIVES.iter().any(|a| name.starts_with(a)));
        }
    }

    #[tokio::test]
    async fn full_verification_flow() {
        let (ob, mailer, storage, _dir) = fixture().await;
        let now = Utc::now();
        ob.begin_registration(1).await.unwrap();
        assert_eq!(storage.get_state(1).await.unwrap().state, UserState::AwaitingEmail);

        ob.initiate_verification(1, "Budi@MHSW.pnj.ac.id", now).await.unwrap();
        let state = storage.get_state(1).await.unwrap();
        assert_eq!(state.state, UserState::AwaitingOtp);
        assert_eq!(state.payload, "budi@mhsw.pnj.ac.id");

        let (to, code) = mailer.last_sent().unwrap();
        assert_eq!(to, "budi@mhsw.pnj.ac.id");
        assert!(ob.verify_otp(1, &code, now).await.unwrap());
        assert!(!ob.verify_otp(1, &code, now).await.unwrap(), "codes are single-use");
        assert_eq!(storage.get_state(1).await.unwrap().state, UserState::AwaitingGender);

        ob.set_gender(1, Gender::Female).await.unwrap();
        assert_eq!(storage.get_state(1).await.unwrap().state, UserState::AwaitingYear);
        assert!(ob.set_entry_year(1, 2014, now).await.is_err());
        ob.set_entry_year(1, 2023, now).await.unwrap();
        assert_eq!(
            storage.get_state(1).await.unwrap().state,
            UserState::AwaitingDepartment
        );
        let handle = ob.set_department(1, Department::TeknikElektro).await.unwrap();
        assert!(handle.is_some());

        let user = storage.get_user(1).await.unwrap().unwrap();
        assert!(user.is_profile_complete());
        assert_eq!(user.display_name, handle);
        assert_eq!(storage.get_state(1).await.unwrap().state, UserState::None);
    }

    #[tokio::test]
    async fn rejects_foreign_domains() {
        let (ob, mailer, _storage, _dir) = fixture().await;
        ob.register(1).await.unwrap();
        let err = ob
            .initiate_verification(1, "x@gmail.com", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AnonmatchError::InvalidInput { .. }));
        assert!(mailer.last_sent().is_none());
    }

    #[tokio::test]
    async fn reissue_invalidates_older_code() {
        let (ob, mailer, _storage, _dir) = fixture().await;
        let now = Utc::now();
        ob.register(1).await.unwrap();
        ob.initiate_verification(1, "a@stu.pnj.ac.id", now).await.unwrap();
        let (_, first) = mailer.last_sent().unwrap();
        ob.initiate_verification(1, "a@stu.pnj.ac.id", now).await.unwrap();
        let (_, second) = mailer.last_sent().unwrap();
        if first != second {
            assert!(!ob.verify_otp(1, &first, now).await.unwrap());
        }
        assert!(ob.verify_otp(1, &second, now).await.unwrap());
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let (ob, mailer, _storage, _dir) = fixture().await;
        let now = Utc::now();
        ob.register(1).await.unwrap();
        ob.initiate_verification(1, "a@stu.pnj.ac.id", now).await.unwrap();
        let (_, code) = mailer.last_sent().unwrap();
        let later = now + chrono::Duration::minutes(11);
        assert!(!ob.verify_otp(1, &code, later).await.unwrap());
    }

    #[tokio::test]
    async fn repeated_failures_lock_out() {
        let (ob, mailer, _storage, _dir) = fixture().await;
        let now = Utc::now();
        ob.register(1).await.unwrap();
        ob.initiate_verification(1, "a@stu.pnj.ac.id", now).await.unwrap();
        let (_, code) = mailer.last_sent().unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        for _ in 0..5 {
            assert!(!ob.verify_otp(1, wrong, now).await.unwrap());
        }
        let err = ob.verify_otp(1, &code, now).await.unwrap_err();
        assert!(matches!(err, AnonmatchError::RateLimited { action: Action::Otp }));
    }

    #[tokio::test]
    async fn edit_keeps_display_name() {
        let (ob, _mailer, storage, _dir) = fixture().await;
        let now = Utc::now();
        storage.create_user(1).await.unwrap();
        assert!(matches!(ob.begin_edit(1).await, Err(AnonmatchError::ProfileIncomplete)));

        storage.set_verified(1, "a@pnj.ac.id").await.unwrap();
        ob.set_gender(1, Gender::Male).await.unwrap();
        ob.set_entry_year(1, 2020, now).await.unwrap();
        let first = ob.set_department(1, Department::Akuntansi).await.unwrap();

        ob.begin_edit(1).await.unwrap();
        let state = storage.get_state(1).await.unwrap();
        assert_eq!(state.state, UserState::AwaitingGender);
        assert_eq!(state.payload, EDIT_PAYLOAD);
        ob.set_gender(1, Gender::Female).await.unwrap();
        assert_eq!(storage.get_state(1).await.unwrap().payload, EDIT_PAYLOAD);
        ob.set_entry_year(1, 2021, now).await.unwrap();
        assert_eq!(ob.set_department(1, Department::TeknikMesin).await.unwrap(), None);

        let user = storage.get_user(1).await.unwrap().unwrap();
        assert_eq!(user.display_name, first);
        assert_eq!(user.gender, Some(Gender::Female));
        assert_eq!(user.department, Some(Department::TeknikMesin));
    }
}
