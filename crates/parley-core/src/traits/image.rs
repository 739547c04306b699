// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image adapter traits (generation and description).

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;

#[async_trait]
pub trait ImageGenerationAdapter: PluginAdapter {
    /// Generates an image for `prompt` and returns PNG bytes.
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ParleyError>;
}

/// Describes inbound images so they can enter the text pipeline.
#[async_trait]
pub trait VisionAdapter: PluginAdapter {
    async fn describe(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, ParleyError>;
}
