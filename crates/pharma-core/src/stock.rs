//! # Stock Arithmetic
//!
//! Every medicine keeps its on-hand quantity in its **first** (smallest) unit.
//! Document lines may use any of the medicine's three unit slots, so each line
//! is converted before it touches stock.
//!
//! ## Conversion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Medicine BC1: first=TAB, second=BOX (×10), third=CRT (×100)           │
//! │                                                                         │
//! │    5 BOX  ──► 5 × 10  = 50 TAB                                         │
//! │    2 CRT  ──► 2 × 100 = 200 TAB                                        │
//! │    3 TAB  ──► 3 TAB                                                     │
//! │    1 BTL  ──► UnknownUnit                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Moves
//! A [`StockMove`] is one line's effect. An `Out` that cannot be covered is
//! `InsufficientStock`.
//!
//! ## Undo
//! Undoing works on the first-unit quantity that was recorded when the move
//! was applied, never on the line's entered unit. A medicine's ratios may have
//! changed since, and the amount taken back must equal the amount put in.
//! An undo that would go negative is `NegativeStock` and can be overridden.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::Id;
use crate::QTY_EPSILON;

// =============================================================================
// Direction
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn flipped(self) -> Direction {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }

    fn sign(self) -> f64 {
        match self {
            Direction::In => 1.0,
            Direction::Out => -1.0,
        }
    }
}

// =============================================================================
// Stock Profile
// =============================================================================

/// The slice of a medicine the stock keeper works with.
#[derive(Debug, Clone, PartialEq)]
pub struct StockProfile {
    pub medicine_id: Id,
    pub barcode: String,
    pub on_hand: f64,
    pub first_unit_id: Id,
    pub second_unit_id: Option<Id>,
    pub second_to_first: f64,
    pub third_unit_id: Option<Id>,
    pub third_to_first: f64,
}

impl StockProfile {
    /// Converts `qty` of `unit_id` into first-unit quantity.
    ///
    /// ## Example
    /// ```rust
    /// use pharma_core::stock::StockProfile;
    ///
    /// let profile = StockProfile {
    ///     medicine_id: 1,
    ///     barcode: "BC1".into(),
    ///     on_hand: 0.0,
    ///     first_unit_id: 10,
    ///     second_unit_id: Some(11),
    ///     second_to_first: 10.0,
    ///     third_unit_id: None,
    ///     third_to_first: 0.0,
    /// };
    /// assert_eq!(profile.to_first_unit(11, "BOX", 5.0).unwrap(), 50.0);
    /// assert!(profile.to_first_unit(12, "BTL", 1.0).is_err());
    /// ```
    pub fn to_first_unit(&self, unit_id: Id, unit_name: &str, qty: f64) -> CoreResult<f64> {
        match self.ratio_of(unit_id) {
            Some(ratio) => Ok(qty * ratio),
            None => Err(CoreError::UnknownUnit {
                barcode: self.barcode.clone(),
                unit: unit_name.to_string(),
            }),
        }
    }

    /// Converts a first-unit quantity back into `unit_id`. `None` when the
    /// unit is not one of this medicine's slots.
    pub fn from_first_unit(&self, unit_id: Id, qty_first: f64) -> Option<f64> {
        self.ratio_of(unit_id).map(|ratio| qty_first / ratio)
    }

    fn ratio_of(&self, unit_id: Id) -> Option<f64> {
        if unit_id == self.first_unit_id {
            Some(1.0)
        } else if self.second_unit_id == Some(unit_id) && self.second_to_first > 0.0 {
            Some(self.second_to_first)
        } else if self.third_unit_id == Some(unit_id) && self.third_to_first > 0.0 {
            Some(self.third_to_first)
        } else {
            None
        }
    }

    /// Fails with `InsufficientStock` when `qty` of `unit_id` exceeds on-hand.
    pub fn check(&self, unit_id: Id, unit_name: &str, qty: f64) -> CoreResult<f64> {
        let requested = self.to_first_unit(unit_id, unit_name, qty)?;
        if requested > self.on_hand + QTY_EPSILON {
            return Err(CoreError::InsufficientStock {
                barcode: self.barcode.clone(),
                available: self.on_hand,
                requested,
            });
        }
        Ok(requested)
    }

    /// Applies a move to this profile and returns the signed first-unit delta.
    ///
    /// ## Rules
    /// - `In` always succeeds
    /// - `Out` is checked (`InsufficientStock`)
    pub fn apply(&mut self, mv: &StockMove) -> CoreResult<f64> {
        let qty_first = match mv.direction {
            Direction::Out => self.check(mv.unit_id, &mv.unit_name, mv.qty)?,
            Direction::In => self.to_first_unit(mv.unit_id, &mv.unit_name, mv.qty)?,
        };

        let delta = qty_first * mv.direction.sign();
        self.on_hand += delta;
        Ok(delta)
    }

    /// Takes back a recorded move of `qty_first` first-unit quantity and
    /// returns the signed delta.
    ///
    /// ## Arguments
    /// * `direction` - direction of the move being undone
    /// * `qty_first` - quantity recorded when the move was applied
    /// * `allow_negative` - lets undoing an `In` drive on-hand below zero
    pub fn undo(&mut self, direction: Direction, qty_first: f64, allow_negative: bool) -> CoreResult<f64> {
        let undo = direction.flipped();
        if undo == Direction::Out && qty_first > self.on_hand + QTY_EPSILON && !allow_negative {
            return Err(CoreError::NegativeStock {
                barcode: self.barcode.clone(),
                available: self.on_hand,
                requested: qty_first,
            });
        }

        let delta = qty_first * undo.sign();
        self.on_hand += delta;
        Ok(delta)
    }
}

// =============================================================================
// Stock Move
// =============================================================================

/// One line's effect on one medicine's stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMove {
    pub medicine_id: Id,
    pub unit_id: Id,
    pub unit_name: String,
    /// Quantity as entered on the line, in `unit_name`.
    pub qty: f64,
    pub direction: Direction,
}

impl StockMove {
    pub fn new(medicine_id: Id, unit_id: Id, unit_name: &str, qty: f64, direction: Direction) -> Self {
        StockMove {
            medicine_id,
            unit_id,
            unit_name: unit_name.to_string(),
            qty,
            direction,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
