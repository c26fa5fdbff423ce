//! Configuration for a lending book.
//!
//! This module provides [`BookConfig`], which carries the LTV bounds, the
//! attribution cap, the per-key entry bound and the [`CostModel`] used to
//! charge a match walk against its work budget.

use serde::Deserialize;

use crate::error::Error;
use crate::types::Ltv;
use crate::Result;

/// Fixed-point scale for rates and LTVs (1e18 = 100%)
pub const WAD: u64 = 1_000_000_000_000_000_000;

/// Default lowest accepted LTV (1%)
pub const DEFAULT_MIN_LTV: Ltv = WAD / 100;

/// Default highest accepted LTV (95%)
pub const DEFAULT_MAX_SAFE_LTV: Ltv = WAD / 100 * 95;

/// Default maximum number of counterparties reported per match
pub const DEFAULT_ATTRIBUTION_CAP: usize = 10;

/// Default maximum number of entries resting at one key
pub const DEFAULT_MAX_ENTRIES_PER_KEY: usize = 64;

/// Work units charged against a match budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Charged once per node visited by the walk
    pub node_visit: u64,
    /// Charged once per entry fill
    pub fill: u64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            node_visit: 1,
            fill: 1,
        }
    }
}

/// Configuration for a [`LendingBook`](crate::orderbook::LendingBook)
///
/// # Example
///
/// ```rust
/// use lending_orderbook::config::{BookConfig, WAD};
///
/// let config = BookConfig::default()
///     .with_attribution_cap(4)
///     .with_ltv_bounds(WAD / 10, WAD / 10 * 9);
///
/// assert_eq!(config.attribution_cap(), 4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    /// Maximum attributed counterparties per match (K)
    attribution_cap: usize,

    /// Lowest LTV accepted on insert
    min_ltv: Ltv,

    /// Highest LTV accepted on insert
    max_safe_ltv: Ltv,

    /// Bound on entries resting at one key
    max_entries_per_key: usize,

    /// Budget charges for the match walk
    cost_model: CostModel,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            attribution_cap: DEFAULT_ATTRIBUTION_CAP,
            min_ltv: DEFAULT_MIN_LTV,
            max_safe_ltv: DEFAULT_MAX_SAFE_LTV,
            max_entries_per_key: DEFAULT_MAX_ENTRIES_PER_KEY,
            cost_model: CostModel::default(),
        }
    }
}

impl BookConfig {
    /// Load a configuration from JSON
    ///
    /// Missing fields take their defaults. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] on malformed input and [`Error::Config`] if the
    /// values are inconsistent.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BookConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for inconsistent values
    pub fn validate(&self) -> Result<()> {
        if self.attribution_cap == 0 {
            return Err(Error::Config("attribution_cap must be non-zero".into()));
        }
        if self.max_entries_per_key == 0 {
            return Err(Error::Config("max_entries_per_key must be non-zero".into()));
        }
        if self.min_ltv == 0 {
            return Err(Error::Config("min_ltv must be non-zero".into()));
        }
        if self.min_ltv > self.max_safe_ltv {
            return Err(Error::Config(format!(
                "min_ltv {} exceeds max_safe_ltv {}",
                self.min_ltv, self.max_safe_ltv
            )));
        }
        if self.max_safe_ltv > WAD {
            return Err(Error::Config(format!(
                "max_safe_ltv {} exceeds 100%",
                self.max_safe_ltv
            )));
        }
        Ok(())
    }

    /// Set the attribution cap
    #[must_use]
    pub fn with_attribution_cap(mut self, cap: usize) -> Self {
        self.attribution_cap = cap;
        self
    }

    /// Set the accepted LTV range (inclusive)
    #[must_use]
    pub fn with_ltv_bounds(mut self, min_ltv: Ltv, max_safe_ltv: Ltv) -> Self {
        self.min_ltv = min_ltv;
        self.max_safe_ltv = max_safe_ltv;
        self
    }

    /// Set the per-key entry bound
    #[must_use]
    pub fn with_max_entries_per_key(mut self, max: usize) -> Self {
        self.max_entries_per_key = max;
        self
    }

    /// Set the budget cost model
    #[must_use]
    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    /// Get the attribution cap
    pub fn attribution_cap(&self) -> usize {
        self.attribution_cap
    }

    /// Get the lowest accepted LTV
    pub fn min_ltv(&self) -> Ltv {
        self.min_ltv
    }

    /// Get the highest accepted LTV
    pub fn max_safe_ltv(&self) -> Ltv {
        self.max_safe_ltv
    }

    /// Get the per-key entry bound
    pub fn max_entries_per_key(&self) -> usize {
        self.max_entries_per_key
    }

    /// Get the budget cost model
    pub fn cost_model(&self) -> CostModel {
        self.cost_model
    }
}
