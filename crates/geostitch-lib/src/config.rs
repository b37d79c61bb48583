//! Run configuration
//!
//! Thresholds and merge behaviour are configured per [`FeatureCategory`]; categories
//! without an explicit entry fall back to [`Config::default_category`].

use crate::{FeatureCategory, FeatureKind, reduce};
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which fragments are considered mergeable with each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ComparisonKey {
    /// Every fragment of the category forms one comparison class
    Category,
    /// Fragments are grouped by category and level (e.g. road level) before merging
    CategoryAndLevel,
}

/// Per-category thresholds and switches
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CategoryConfig {
    /// Target length of divided line segments, in kilometers
    pub length_threshold_km: f64,
    /// Slack for the final divided segment, in kilometers
    pub tolerance_km: f64,
    /// Rings with a smaller area are dropped, in square meters
    pub area_threshold_m2: f64,
    /// Open chains with a smaller length are dropped, in kilometers
    pub min_length_km: f64,
    /// Partition key used before merging
    pub comparison_key: ComparisonKey,
    /// Emit inner relation rings as standalone island features
    pub extract_islands: bool,
    /// Keep unclosed ring chains in the rejected output for inspection
    pub retain_unclosed: bool,
    /// Re-split merged lines longer than `length_threshold_km`
    pub divide: bool,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            length_threshold_km: 100.0,
            tolerance_km: 20.0,
            area_threshold_m2: 200.0 * 200.0,
            min_length_km: 0.0,
            comparison_key: ComparisonKey::Category,
            extract_islands: false,
            retain_unclosed: true,
            divide: false,
        }
    }
}

/// Configuration for one reconstruction run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Worker count for the parallel reducer. `None` uses the rayon pool size. Either
    /// way the count is capped at [`reduce::MAX_WORKERS`].
    pub workers: Option<usize>,
    /// Settings for categories without an explicit entry
    pub default_category: CategoryConfig,
    /// Explicit per-category settings
    pub categories: HashMap<FeatureCategory, CategoryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let mut categories = HashMap::new();
        for category in FeatureCategory::ALL {
            let mut settings = CategoryConfig::default();
            match category {
                FeatureCategory::Water => settings.extract_islands = true,
                FeatureCategory::Highway
                | FeatureCategory::HighwayInDesert
                | FeatureCategory::Railway => {
                    settings.comparison_key = ComparisonKey::CategoryAndLevel
                }
                _ => {}
            }
            // Among line categories only coastline islands are measured by area;
            // roundabouts and loop routes stay whatever their size
            if category.kind() == FeatureKind::Line && category != FeatureCategory::Coastline {
                settings.area_threshold_m2 = 0.0;
            }
            if settings != CategoryConfig::default() {
                categories.insert(category, settings);
            }
        }
        Self {
            workers: None,
            default_category: CategoryConfig::default(),
            categories,
        }
    }
}

impl Config {
    /// Settings for a category
    pub fn category(&self, category: FeatureCategory) -> &CategoryConfig {
        self.categories
            .get(&category)
            .unwrap_or(&self.default_category)
    }

    /// Replace the settings of one category
    pub fn with_category(mut self, category: FeatureCategory, settings: CategoryConfig) -> Self {
        self.categories.insert(category, settings);
        self
    }

    /// Effective worker count for the parallel reducer
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(rayon::current_num_threads)
            .clamp(1, reduce::MAX_WORKERS)
    }
}
