// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content classifier trait consulted before media is relayed.

use async_trait::async_trait;

use crate::error::AnonmatchError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Verdict;

#[async_trait]
pub trait ContentClassifier: PluginAdapter {
    /// False when the classifier has no credentials; the gate then passes everything.
    fn is_enabled(&self) -> bool;

    /// Classifies the media at `url`.
    async fn classify(&self, url: &str) -> Result<Verdict, AnonmatchError>;
}
