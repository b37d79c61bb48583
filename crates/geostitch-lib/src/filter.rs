//! Sliver and stub removal

use crate::{CategoryConfig, HasChain};

/// Drops closed chains with a tiny area and open chains with a tiny length
///
/// A closed chain is always measured by area, whatever its category, so a small
/// coastline island is dropped like a small water ring. Values equal to a threshold
/// are kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmallFeatureFilter {
    pub area_threshold_m2: f64,
    pub min_length_km: f64,
}

impl Default for SmallFeatureFilter {
    fn default() -> Self {
        Self::from_category(&CategoryConfig::default())
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl SmallFeatureFilter {
    pub fn new(area_threshold_m2: f64, min_length_km: f64) -> Self {
        Self {
            area_threshold_m2,
            min_length_km,
        }
    }

    pub fn from_category(config: &CategoryConfig) -> Self {
        Self::new(config.area_threshold_m2, config.min_length_km)
    }

    /// Whether an item survives the filter
    pub fn keeps<T: HasChain>(&self, item: &T) -> bool {
        let chain = item.chain();
        if chain.is_closed() {
            chain.approx_area_m2() >= self.area_threshold_m2
        } else {
            chain.approx_length_km() >= self.min_length_km
        }
    }

    /// Keep only the items that pass, preserving order
    pub fn apply<T: HasChain>(&self, items: Vec<T>) -> Vec<T> {
        let before = items.len();
        let kept: Vec<T> = items.into_iter().filter(|item| self.keeps(item)).collect();
        if kept.len() != before {
            tracing::debug!(
                "Dropped {} of {} features below area {} m² / length {} km",
                before - kept.len(),
                before,
                self.area_threshold_m2,
                self.min_length_km
            );
        }
        kept
    }
}
