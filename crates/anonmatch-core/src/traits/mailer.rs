// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of one-time verification codes.

use async_trait::async_trait;

use crate::error::AnonmatchError;
use crate::traits::adapter::PluginAdapter;

#[async_trait]
pub trait OtpMailer: PluginAdapter {
    /// Sends `code` to `email`. `expiry_minutes` is shown to the recipient.
    async fn send_otp(
        &self,
        email: &str,
        code: &str,
        expiry_minutes: u32,
    ) -> Result<(), AnonmatchError>;
}
