//! Stock keeper.
//!
//! Applies and reverses the stock moves of a stored document inside the
//! caller's write session. Every applied move leaves a history row; a
//! reversal takes back exactly the recorded rows and then removes them, so
//! the history always sums to the on-hand quantity whatever happened to the
//! medicine's units in between.

use std::collections::HashSet;

use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use pharma_core::{CoreError, DocumentKind, DocumentModel, Id, StockProfile, QTY_EPSILON};
use pharma_db::{DbError, HistoryEntry, MedicineRepository, RecordedMove};

pub struct StockKeeper;

impl StockKeeper {
    /// Applies every move of `document`.
    ///
    /// ## Errors
    /// * `InsufficientStock` - an `Out` line exceeds on-hand
    /// * `BadPayload` - a line's unit is not one of the medicine's units
    pub async fn apply<D: DocumentModel>(
        conn: &mut SqliteConnection,
        kind: DocumentKind,
        document: &D,
        actor: Id,
    ) -> ApiResult<()> {
        for mv in document.stock_moves() {
            let mut medicines = MedicineRepository::new(&mut *conn);
            let mut profile = Self::profile(&mut medicines, mv.medicine_id).await?;
            let before = profile.on_hand;
            let delta = profile.apply(&mv)?;
            Self::write(&mut medicines, &profile, before, delta, false, actor).await?;

            medicines
                .record_history(&HistoryEntry {
                    medicine_id: mv.medicine_id,
                    document_kind: kind.as_str(),
                    document_id: document.id(),
                    document_number: document.number(),
                    direction: mv.direction,
                    qty: delta.abs(),
                    entered_qty: mv.qty,
                    unit_name: &mv.unit_name,
                    business_date: document.business_date(),
                })
                .await?;
        }
        Ok(())
    }

    /// Takes back every recorded move of a document and drops its history
    /// rows.
    ///
    /// ## Arguments
    /// * `allow_negative` - administrator override; undoing an inbound move
    ///   that drives on-hand below zero is otherwise a `Conflict`
    pub async fn reverse(
        conn: &mut SqliteConnection,
        kind: DocumentKind,
        document_id: Id,
        actor: Id,
        allow_negative: bool,
    ) -> ApiResult<()> {
        let mut medicines = MedicineRepository::new(&mut *conn);
        let recorded = medicines.document_moves(kind.as_str(), document_id).await?;

        for mv in recorded.iter().rev() {
            let mut profile = Self::profile(&mut medicines, mv.medicine_id).await?;
            let before = profile.on_hand;
            let delta = profile.undo(mv.direction, mv.qty, allow_negative)?;
            Self::write(&mut medicines, &profile, before, delta, allow_negative, actor).await?;
        }

        let removed = medicines.delete_history(kind.as_str(), document_id).await?;
        debug!(kind = %kind, id = document_id, rows = removed, "Stock moves reversed");
        Ok(())
    }

    /// On-hand of every medicine a stored document moved, taken before the
    /// document is replaced.
    pub async fn snapshot(
        conn: &mut SqliteConnection,
        kind: DocumentKind,
        document_id: Id,
    ) -> ApiResult<Vec<StockProfile>> {
        let mut medicines = MedicineRepository::new(&mut *conn);
        let recorded: Vec<RecordedMove> =
            medicines.document_moves(kind.as_str(), document_id).await?;

        let mut seen = HashSet::new();
        let mut profiles = Vec::new();
        for mv in recorded {
            if seen.insert(mv.medicine_id) {
                profiles.push(Self::profile(&mut medicines, mv.medicine_id).await?);
            }
        }
        Ok(profiles)
    }

    /// Checks the net effect of a replacement against a [`snapshot`].
    ///
    /// A medicine may dip below zero between the reversal and the new
    /// application. Only the final quantity counts: it fails with
    /// `NegativeStock` when it is below zero and lower than before, unless
    /// `allow_negative` is set.
    ///
    /// [`snapshot`]: StockKeeper::snapshot
    pub async fn settle(
        conn: &mut SqliteConnection,
        before: &[StockProfile],
        allow_negative: bool,
    ) -> ApiResult<()> {
        let mut medicines = MedicineRepository::new(&mut *conn);
        for previous in before {
            let after = Self::profile(&mut medicines, previous.medicine_id).await?.on_hand;
            let dropped = previous.on_hand - after;

            if after < -QTY_EPSILON && dropped > QTY_EPSILON {
                if !allow_negative {
                    return Err(CoreError::NegativeStock {
                        barcode: previous.barcode.clone(),
                        available: previous.on_hand,
                        requested: dropped,
                    }
                    .into());
                }
                warn!(barcode = %previous.barcode, on_hand = after, "Stock forced below zero");
            }
        }
        Ok(())
    }

    async fn profile(medicines: &mut MedicineRepository<'_>, id: Id) -> ApiResult<StockProfile> {
        medicines
            .stock_profile(id)
            .await?
            .ok_or_else(|| DbError::not_found("Medicine", id).into())
    }

    /// Writes one checked delta to the row.
    async fn write(
        medicines: &mut MedicineRepository<'_>,
        profile: &StockProfile,
        before: f64,
        delta: f64,
        allow_negative: bool,
        actor: Id,
    ) -> ApiResult<()> {
        let on_hand = medicines
            .adjust_stock(profile.medicine_id, delta, allow_negative, actor)
            .await?
            // The row changed between the read and the write.
            .ok_or_else(|| {
                ApiError::from(CoreError::InsufficientStock {
                    barcode: profile.barcode.clone(),
                    available: before,
                    requested: delta.abs(),
                })
            })?;

        if on_hand < 0.0 && delta < 0.0 {
            warn!(
                barcode = %profile.barcode,
                on_hand = on_hand,
                delta = delta,
                "Stock forced below zero"
            );
        }
        Ok(())
    }
}
