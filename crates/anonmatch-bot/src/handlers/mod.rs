// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command, text and callback handlers grouped by feature.

pub mod broadcast;
pub mod chat;
pub mod confessions;
pub mod onboarding;
