//! Parallel processor tiers with their pricing and expected latency.
//!
//! Tiers trade cost and latency for research depth. The table here is
//! display data only: it feeds the estimates returned by `deep_research`
//! and `task_status` and the bound on `quick_research`'s wait.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A Parallel Task API processor tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Processor {
    Lite,
    Base,
    Core,
    Core2x,
    Pro,
    Ultra,
    Ultra2x,
    Ultra4x,
    Ultra8x,
}

impl Default for Processor {
    fn default() -> Self {
        Self::Pro
    }
}

impl Processor {
    /// Every tier, cheapest first.
    pub const ALL: [Processor; 9] = [
        Self::Lite,
        Self::Base,
        Self::Core,
        Self::Core2x,
        Self::Pro,
        Self::Ultra,
        Self::Ultra2x,
        Self::Ultra4x,
        Self::Ultra8x,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lite => "lite",
            Self::Base => "base",
            Self::Core => "core",
            Self::Core2x => "core2x",
            Self::Pro => "pro",
            Self::Ultra => "ultra",
            Self::Ultra2x => "ultra2x",
            Self::Ultra4x => "ultra4x",
            Self::Ultra8x => "ultra8x",
        }
    }

    /// Cost in US dollars per 1,000 queries.
    pub fn cost_per_1k_usd(&self) -> u32 {
        match self {
            Self::Lite => 5,
            Self::Base => 10,
            Self::Core => 30,
            Self::Core2x => 60,
            Self::Pro => 100,
            Self::Ultra => 300,
            Self::Ultra2x => 600,
            Self::Ultra4x => 1_200,
            Self::Ultra8x => 2_400,
        }
    }

    /// Expected latency range in seconds, `(min, max)`.
    pub fn latency_secs(&self) -> (u64, u64) {
        match self {
            Self::Lite => (5, 60),
            Self::Base => (15, 100),
            Self::Core | Self::Core2x => (60, 300),
            Self::Pro => (180, 540),
            Self::Ultra | Self::Ultra2x => (300, 1_500),
            Self::Ultra4x | Self::Ultra8x => (480, 1_800),
        }
    }

    /// Upper end of the expected latency range.
    pub fn max_latency(&self) -> Duration {
        Duration::from_secs(self.latency_secs().1)
    }

    /// Human-readable duration estimate, e.g. `"5-60s"` or `"3-9min"`.
    pub fn expected_duration(&self) -> String {
        let (min, max) = self.latency_secs();
        if max < 120 {
            format!("{}-{}s", min, max)
        } else {
            format!("{}-{}min", min / 60, max / 60)
        }
    }

    /// Formatted cost, e.g. `"$1,200"`.
    pub fn cost_display(&self) -> String {
        let cost = self.cost_per_1k_usd();
        if cost >= 1_000 {
            format!("${},{:03}", cost / 1_000, cost % 1_000)
        } else {
            format!("${}", cost)
        }
    }

    /// Comma-separated list of valid tier names, for error messages.
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a tier name is not one of [`Processor::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown processor '{0}'")]
pub struct UnknownProcessor(pub String);

impl FromStr for Processor {
    type Err = UnknownProcessor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| UnknownProcessor(s.to_string()))
    }
}
