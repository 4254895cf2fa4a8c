// ── Spotlight reconstruction ──
//
// Spotlight zones can address hundreds of LEDs but the controller only
// reports a fixed 40-slot view. A plan map says which physical LED each
// reported slot belongs to; these functions move colors between the two.

use oelo_api::Rgb;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// LED count assumed for a zone unless configured otherwise.
pub const DEFAULT_MAX_LEDS: usize = 500;

/// 1-based LEDs lit by a spotlight plan unless configured otherwise.
pub const DEFAULT_SPOTLIGHT_LIGHTS: [usize; 40] = [
    1, 2, 3, 4, 8, 9, 10, 11, 21, 22, 23, 24, 25, 35, 36, 37, 38, 59, 60, 61, 62, 67, 68, 69, 70,
    93, 94, 95, 112, 113, 114, 115, 132, 133, 134, 135, 153, 154, 155, 156,
];

/// Ordered 0-based LED indices, one per reported slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpotlightPlanMap(Vec<usize>);

impl SpotlightPlanMap {
    /// Wrap 0-based indices as given. Order is preserved; bounds are
    /// checked when the map is used.
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    /// Build from 1-based LED numbers: deduplicated, sorted and checked
    /// against `total_leds`.
    pub fn from_one_based(
        lights: impl IntoIterator<Item = usize>,
        total_leds: usize,
    ) -> Result<Self, CoreError> {
        let mut indices = Vec::new();
        for light in lights {
            if light == 0 || light > total_leds {
                return Err(CoreError::InvalidPlanMap {
                    index: light,
                    total: total_leds,
                });
            }
            indices.push(light - 1);
        }
        indices.sort_unstable();
        indices.dedup();
        Ok(Self(indices))
    }

    /// Parse a comma-separated list of 1-based LED numbers (`"1,2,3,8"`).
    pub fn parse(raw: &str, total_leds: usize) -> Result<Self, CoreError> {
        let lights = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<usize>().map_err(|_| CoreError::Config {
                    message: format!("'{part}' is not an LED number"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_one_based(lights, total_leds)
    }

    /// The map for [`DEFAULT_SPOTLIGHT_LIGHTS`], dropping lights beyond
    /// `total_leds`.
    pub fn default_for(total_leds: usize) -> Self {
        Self(
            DEFAULT_SPOTLIGHT_LIGHTS
                .iter()
                .filter(|&&light| light <= total_leds)
                .map(|light| light - 1)
                .collect(),
        )
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fail with `InvalidPlanMap` on the first index outside `[0, total_leds)`.
    pub fn validate(&self, total_leds: usize) -> Result<(), CoreError> {
        match self.0.iter().find(|&&index| index >= total_leds) {
            Some(&index) => Err(CoreError::InvalidPlanMap {
                index,
                total: total_leds,
            }),
            None => Ok(()),
        }
    }

    /// 1-based form, as written in configuration.
    pub fn to_one_based_string(&self) -> String {
        self.0
            .iter()
            .map(|i| (i + 1).to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Expand a truncated slot list into a full `total_leds` buffer.
///
/// Slot `i` lands on LED `map[i]`; every other LED is off. Map entries with
/// no corresponding slot are off as well.
pub fn reconstruct(
    truncated: &[Rgb],
    map: &SpotlightPlanMap,
    total_leds: usize,
) -> Result<Vec<Rgb>, CoreError> {
    map.validate(total_leds)?;
    let mut buffer = vec![Rgb::OFF; total_leds];
    for (slot, &led) in map.indices().iter().enumerate() {
        if let Some(target) = buffer.get_mut(led) {
            *target = truncated.get(slot).copied().unwrap_or(Rgb::OFF);
        }
    }
    Ok(buffer)
}

/// Inverse of [`reconstruct`]: read the mapped LEDs back out, one slot per
/// map entry. LEDs beyond the buffer read as off.
pub fn compress(buffer: &[Rgb], map: &SpotlightPlanMap) -> Vec<Rgb> {
    map.indices()
        .iter()
        .map(|&led| buffer.get(led).copied().unwrap_or(Rgb::OFF))
        .collect()
}
