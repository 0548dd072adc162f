// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod authorization;
mod logging;
mod resolution;

pub use authorization::{AuthorizationConfig, AuthorizationConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use resolution::{ResolutionConfig, ResolutionConfigLayer, ResolutionStrategyKind};
