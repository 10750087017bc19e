//! One unit of farmable land

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Growth stage reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u8")]
pub enum GrowthStage {
    Empty,
    Growing,
    Mature,
    Withered,
}

impl TryFrom<u8> for GrowthStage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GrowthStage::Empty),
            1 => Ok(GrowthStage::Growing),
            2 => Ok(GrowthStage::Mature),
            3 => Ok(GrowthStage::Withered),
            other => Err(format!("unknown growth stage {other}")),
        }
    }
}

/// Cached state of a single plot
///
/// Mutated only by the session's confirmed-response/push path; loops read
/// snapshots and never write.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Plot {
    /// Position in the farm, unique per farmer
    pub index: u32,

    /// Crop identifier; `None` means the plot is bare
    #[serde(default)]
    pub crop: Option<u32>,

    /// Growth stage
    pub stage: GrowthStage,

    /// Needs watering
    #[serde(default)]
    pub dry: bool,

    /// Has weeds
    #[serde(default)]
    pub weeds: bool,

    /// Has pests
    #[serde(default)]
    pub pests: bool,

    /// Planting time as reported by the backend (epoch seconds)
    #[serde(default)]
    pub planted_at: Option<i64>,
}

impl Plot {
    /// Planting time as a wall-clock timestamp, when the backend sent one
    pub fn planted_time(&self) -> Option<DateTime<Utc>> {
        self.planted_at.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}
