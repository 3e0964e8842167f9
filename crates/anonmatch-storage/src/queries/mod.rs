// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per table family.

pub mod abuse;
pub mod achievements;
pub mod community;
pub mod queue;
pub mod rooms;
pub mod sessions;
pub mod users;
pub mod verification;
