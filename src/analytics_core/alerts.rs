//! Alert firing decisions
//!
//! Two firing modes, either of which is sufficient: an absolute target
//! price, or a percentage drop measured against the same 30-day floor the
//! discount classifier uses. A definition satisfying both conditions
//! still produces exactly one fire event per evaluation pass.

use super::types::{AlertDefinition, AlertFireEvent, FireReason};

#[derive(Debug)]
pub enum AlertError {
    /// Definition has neither a target price nor a drop percentage.
    /// Policy error, not a crash: callers log and skip.
    NoFiringMode(i64),
}

impl std::fmt::Display for AlertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertError::NoFiringMode(id) => {
                write!(f, "alert definition {} has no firing mode configured", id)
            }
        }
    }
}

impl std::error::Error for AlertError {}

pub struct AlertEvaluator;

impl AlertEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether a definition fires at the current best price.
    ///
    /// `floor_30d` is the product-level 30-day floor (minimum observed
    /// price across the product's active listings); when absent the drop
    /// mode cannot be evaluated and only the target mode applies.
    pub fn evaluate(
        &self,
        definition: &AlertDefinition,
        best_price: f64,
        floor_30d: Option<f64>,
        now: i64,
    ) -> Result<Option<AlertFireEvent>, AlertError> {
        if definition.target_price.is_none() && definition.drop_percentage.is_none() {
            return Err(AlertError::NoFiringMode(definition.id));
        }

        if let Some(target) = definition.target_price {
            if best_price <= target {
                return Ok(Some(self.fire(definition, best_price, FireReason::TargetReached, now)));
            }
        }

        if let (Some(drop_pct), Some(floor)) = (definition.drop_percentage, floor_30d) {
            if floor > 0.0 {
                let drop = (floor - best_price) / floor * 100.0;
                if drop >= drop_pct {
                    return Ok(Some(self.fire(
                        definition,
                        best_price,
                        FireReason::PercentageDrop,
                        now,
                    )));
                }
            }
        }

        Ok(None)
    }

    fn fire(
        &self,
        definition: &AlertDefinition,
        price: f64,
        reason: FireReason,
        now: i64,
    ) -> AlertFireEvent {
        AlertFireEvent {
            definition_id: definition.id,
            product_id: definition.product_id,
            observed_price: price,
            reason,
            fired_at: now,
        }
    }
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new()
    }
}
