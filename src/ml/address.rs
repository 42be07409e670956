//! Address frequency maps used for the address score feature.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::persistence::{CURRENT_VERSION, Versioned, default_version};

/// Historical occurrence counts per administrative level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressFrequencyMaps {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Region (시/도) counts
    #[serde(default)]
    pub si: HashMap<String, f64>,
    /// Sub-region (시/군/구) counts
    #[serde(default)]
    pub gungu: HashMap<String, f64>,
    /// Sub-sub-region (읍/면/동) counts
    #[serde(default)]
    pub dong: HashMap<String, f64>,
}

impl Versioned for AddressFrequencyMaps {
    const KIND: &'static str = "address frequency maps";

    fn version(&self) -> u32 {
        self.version
    }
}

impl AddressFrequencyMaps {
    pub fn new(
        si: HashMap<String, f64>,
        gungu: HashMap<String, f64>,
        dong: HashMap<String, f64>,
    ) -> Self {
        Self {
            version: CURRENT_VERSION,
            si,
            gungu,
            dong,
        }
    }

    /// Sum of the three level counts; unknown keys count as 0.
    pub fn score(&self, si: &str, gungu: &str, dong: &str) -> f64 {
        let si_freq = self.si.get(si).copied().unwrap_or(0.0);
        let gungu_freq = self.gungu.get(gungu).copied().unwrap_or(0.0);
        let dong_freq = self.dong.get(dong).copied().unwrap_or(0.0);
        si_freq + gungu_freq + dong_freq
    }

    /// Total number of keys across all levels.
    pub fn key_count(&self) -> usize {
        self.si.len() + self.gungu.len() + self.dong.len()
    }
}
