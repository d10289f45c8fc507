use crate::error::ProcessingError;
use crate::model::Transaction;
use crate::storage::TransactionSource;
use common::scoring::ScoringConfig;
use tracing::{trace, warn};

/// Trailing hours fetched per key, wide enough for every indicator reading that key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindows {
    pub user_hours: i64,
    pub card_hours: i64,
    pub device_hours: i64,
}

const VELOCITY_USER_HOURS: i64 = 24;
const VELOCITY_CARD_HOURS: i64 = 2;
const VELOCITY_DEVICE_HOURS: i64 = 1;

impl ContextWindows {
    pub fn from_config(config: &ScoringConfig) -> Self {
        let user_hours = [
            VELOCITY_USER_HOURS,
            config.geographic.window_hours,
            config.amount.window_hours,
            config.collusion.window_days * 24,
            config.account_takeover.history_days * 24,
        ]
        .into_iter()
        .max()
        .unwrap_or(VELOCITY_USER_HOURS);

        Self {
            user_hours,
            card_hours: VELOCITY_CARD_HOURS.max(config.card_testing.window_hours),
            device_hours: VELOCITY_DEVICE_HOURS.max(config.fraud_ring.window_days * 24),
        }
    }
}

/// Prior transactions of the same user, card and device, newest first.
///
/// Only transactions strictly before the scored one are kept; ties on the
/// timestamp are ordered by identifier so concurrent events stay deterministic.
#[derive(Debug, Clone, Default)]
pub struct HistoricalContext {
    pub user: Vec<Transaction>,
    pub card: Vec<Transaction>,
    pub device: Vec<Transaction>,
}

impl HistoricalContext {
    pub fn new(
        transaction: &Transaction,
        user: Vec<Transaction>,
        card: Vec<Transaction>,
        device: Vec<Transaction>,
    ) -> Self {
        Self {
            user: prior_to(transaction, user),
            card: prior_to(transaction, card),
            device: prior_to(transaction, device),
        }
    }

    pub async fn fetch(
        source: &dyn TransactionSource,
        transaction: &Transaction,
        windows: ContextWindows,
    ) -> Result<Self, ProcessingError> {
        let until = transaction.timestamp;
        let (user, card, device) = tokio::try_join!(
            source.windowed_by_user(&transaction.user_id, until, windows.user_hours),
            source.windowed_by_card(&transaction.card_last4, until, windows.card_hours),
            source.windowed_by_device(&transaction.device_id, until, windows.device_hours),
        )
        .map_err(ProcessingError::Source)?;

        let mut context = Self::new(transaction, user, card, device);
        for window in [&mut context.user, &mut context.card, &mut context.device] {
            keep_valid(&transaction.transaction_id, window);
        }

        trace!(
            transaction_id = %transaction.transaction_id,
            user = context.user.len(),
            card = context.card.len(),
            device = context.device.len(),
            "Fetched historical context"
        );
        Ok(context)
    }
}

/// A malformed neighbour must not block scoring of the transactions around it.
fn keep_valid(transaction_id: &str, window: &mut Vec<Transaction>) {
    window.retain(|record| match record.validate() {
        Ok(()) => true,
        Err(reason) => {
            warn!(
                transaction_id,
                record = %record.transaction_id,
                reason = %reason,
                "Ignoring invalid context record"
            );
            false
        }
    });
}

fn prior_to(transaction: &Transaction, window: Vec<Transaction>) -> Vec<Transaction> {
    let mut prior: Vec<Transaction> = window
        .into_iter()
        .filter(|t| is_before(t, transaction))
        .collect();
    prior.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.transaction_id.cmp(&a.transaction_id))
    });
    prior
}

fn is_before(candidate: &Transaction, transaction: &Transaction) -> bool {
    candidate.transaction_id != transaction.transaction_id
        && (candidate.timestamp, &candidate.transaction_id)
            < (transaction.timestamp, &transaction.transaction_id)
}
