//! Reward ledger
//!
//! Per-identity wallets with a canonical base balance and rate-derived views
//! in every other currency. Each operation is one read-modify-write on a
//! single map entry, so concurrent credits for different sessions never lose
//! an update. Failed operations leave the wallet untouched.

use crate::common::types::{now, Currency, Identity, WalletProfile};
use crate::config::{LedgerConfig, RateTable};
use crate::errors::LedgerError;
use crate::metrics::PlatformMetrics;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const EXPERIENCE_PER_LEVEL: u64 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Earn,
    Claim,
    Convert,
    BetWin,
    BetLose,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Earn => write!(f, "earn"),
            TransactionKind::Claim => write!(f, "claim"),
            TransactionKind::Convert => write!(f, "convert"),
            TransactionKind::BetWin => write!(f, "bet_win"),
            TransactionKind::BetLose => write!(f, "bet_lose"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
    Pending,
    Failed,
}

/// Immutable ledger record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub kind: TransactionKind,
    pub amount: f64,
    /// Currency symbol, or "FROM → TO" for conversions
    pub currency: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// Short hex digest of the record
    pub reference: String,
    pub status: TransactionStatus,
}

impl Transaction {
    fn completed(kind: TransactionKind, amount: f64, currency: impl Into<String>, description: String) -> Self {
        Self::with_status(kind, amount, currency, description, TransactionStatus::Completed)
    }

    fn failed(kind: TransactionKind, amount: f64, currency: impl Into<String>, description: String) -> Self {
        Self::with_status(kind, amount, currency, description, TransactionStatus::Failed)
    }

    fn with_status(
        kind: TransactionKind,
        amount: f64,
        currency: impl Into<String>,
        description: String,
        status: TransactionStatus,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let currency = currency.into();
        let timestamp = now();
        let reference = reference_digest(&id, kind, amount, &currency, &timestamp);
        Self {
            id,
            kind,
            amount,
            currency,
            description,
            timestamp,
            reference,
            status,
        }
    }
}

fn reference_digest(id: &str, kind: TransactionKind, amount: f64, currency: &str, timestamp: &DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(kind.to_string().as_bytes());
    hasher.update(amount.to_le_bytes());
    hasher.update(currency.as_bytes());
    hasher.update(timestamp.timestamp_millis().to_le_bytes());
    format!("0x{}", hex::encode(&hasher.finalize()[..8]))
}

/// Wallet state. `balances[Jup]` always equals `base_balance`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Wallet {
    pub identity: Identity,
    pub display_name: String,
    pub avatar: String,
    pub base_balance: f64,
    pub balances: BTreeMap<Currency, f64>,
    pub pending_rewards: f64,
    pub total_earned: f64,
    pub experience: u64,
    pub level: u32,
}

impl Wallet {
    fn open(profile: &WalletProfile, rates: &RateTable) -> Self {
        let mut wallet = Self {
            identity: profile.identity.clone(),
            display_name: profile.display_name.clone(),
            avatar: profile.avatar.clone(),
            base_balance: profile.base_balance,
            balances: BTreeMap::new(),
            pending_rewards: 0.0,
            total_earned: 0.0,
            experience: 0,
            level: 1,
        };
        wallet.recompute_derived(rates);
        wallet
    }

    pub fn balance(&self, currency: Currency) -> f64 {
        self.balances.get(&currency).copied().unwrap_or(0.0)
    }

    fn recompute_derived(&mut self, rates: &RateTable) {
        for currency in Currency::ALL {
            self.balances.insert(currency, self.base_balance * rates.rate(currency));
        }
    }

    fn set_balance(&mut self, currency: Currency, amount: f64) {
        self.balances.insert(currency, amount);
        if currency == Currency::Jup {
            self.base_balance = amount;
        }
    }

    fn add_experience(&mut self, points: u64) {
        self.experience += points;
        self.level = (self.experience / EXPERIENCE_PER_LEVEL + 1) as u32;
    }
}

struct WalletEntry {
    wallet: Wallet,
    /// Oldest first
    log: Vec<Transaction>,
}

impl WalletEntry {
    fn append(&mut self, transaction: Transaction) -> Transaction {
        self.log.push(transaction.clone());
        transaction
    }
}

/// Multi-currency reward ledger
pub struct RewardLedger {
    wallets: DashMap<Identity, WalletEntry>,
    config: LedgerConfig,
    metrics: Arc<PlatformMetrics>,
}

impl RewardLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_metrics(config, Arc::new(PlatformMetrics::new()))
    }

    pub fn with_metrics(config: LedgerConfig, metrics: Arc<PlatformMetrics>) -> Self {
        Self {
            wallets: DashMap::new(),
            config,
            metrics,
        }
    }

    pub fn rates(&self) -> &RateTable {
        &self.config.rates
    }

    /// amount * rate(from) / rate(to)
    pub fn convert_amount(&self, amount: f64, from: Currency, to: Currency) -> f64 {
        amount * self.config.rates.rate(from) / self.config.rates.rate(to)
    }

    /// Connect a wallet. Reconnecting returns the existing wallet unchanged.
    pub fn open_wallet(&self, profile: &WalletProfile) -> Wallet {
        let entry = self.wallets.entry(profile.identity.clone()).or_insert_with(|| {
            info!(identity = %profile.identity, balance = profile.base_balance, "Wallet opened");
            WalletEntry {
                wallet: Wallet::open(profile, &self.config.rates),
                log: Vec::new(),
            }
        });
        entry.wallet.clone()
    }

    /// Credit round(raw_score * multiplier) base units as an `earn` record
    pub fn credit_reward(&self, identity: &Identity, raw_score: u32) -> Result<Transaction, LedgerError> {
        let reward = (raw_score as f64 * self.config.reward_multiplier).round();
        let mut entry = self.entry_mut(identity)?;

        let wallet = &mut entry.wallet;
        wallet.base_balance += reward;
        wallet.recompute_derived(&self.config.rates);
        wallet.total_earned += reward;
        wallet.pending_rewards += reward;
        wallet.add_experience(raw_score as u64);

        let transaction = Transaction::completed(
            TransactionKind::Earn,
            reward,
            Currency::Jup.symbol(),
            format!("Earned {} {} from a score of {}", reward, Currency::Jup, raw_score),
        );
        self.metrics.record_reward();
        debug!(%identity, raw_score, reward, balance = entry.wallet.base_balance, "Reward credited");
        Ok(entry.append(transaction))
    }

    /// Move pending rewards into the base balance. `None` when nothing is pending.
    pub fn claim_pending(&self, identity: &Identity) -> Result<Option<Transaction>, LedgerError> {
        let mut entry = self.entry_mut(identity)?;
        let pending = entry.wallet.pending_rewards;
        if pending == 0.0 {
            return Ok(None);
        }

        let wallet = &mut entry.wallet;
        wallet.base_balance += pending;
        wallet.pending_rewards = 0.0;
        wallet.recompute_derived(&self.config.rates);

        let transaction = Transaction::completed(
            TransactionKind::Claim,
            pending,
            Currency::Jup.symbol(),
            format!("{} {} claimed into the wallet", pending, Currency::Jup),
        );
        info!(%identity, amount = pending, "Pending rewards claimed");
        Ok(Some(entry.append(transaction)))
    }

    /// Convert `amount` of `from` into `to` at the fixed rates
    pub fn convert(
        &self,
        identity: &Identity,
        from: Currency,
        to: Currency,
        amount: f64,
    ) -> Result<Transaction, LedgerError> {
        if from == to {
            return Err(LedgerError::SameCurrency(from));
        }
        let mut entry = self.entry_mut(identity)?;
        let available = entry.wallet.balance(from);
        if !(amount.is_finite() && amount > 0.0) || amount > available {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let converted = self.convert_amount(amount, from, to);
        let wallet = &mut entry.wallet;
        wallet.set_balance(from, available - amount);
        let credited = wallet.balance(to) + converted;
        wallet.set_balance(to, credited);

        let transaction = Transaction::completed(
            TransactionKind::Convert,
            amount,
            format!("{} → {}", from, to),
            format!("Converted {} {} to {:.6} {}", amount, from, converted, to),
        );
        info!(%identity, %from, %to, amount, converted, "Currency converted");
        Ok(entry.append(transaction))
    }

    /// Settle a room wager: credit on a win, debit on a loss. A loss the
    /// wallet can no longer cover leaves the balance alone but is still
    /// logged, as a failed `bet_lose`.
    pub fn settle_wager(&self, identity: &Identity, wager: f64, won: bool) -> Result<Transaction, LedgerError> {
        if !(wager.is_finite() && wager > 0.0) {
            return Err(LedgerError::InvalidAmount(wager));
        }
        let mut entry = self.entry_mut(identity)?;

        let (kind, delta) = if won {
            (TransactionKind::BetWin, wager)
        } else {
            let available = entry.wallet.base_balance;
            if wager > available {
                entry.append(Transaction::failed(
                    TransactionKind::BetLose,
                    wager,
                    Currency::Jup.symbol(),
                    format!("Lost a wager of {} {} the wallet could not cover", wager, Currency::Jup),
                ));
                warn!(%identity, wager, available, "Lost wager exceeds the balance");
                return Err(LedgerError::InsufficientFunds {
                    requested: wager,
                    available,
                });
            }
            (TransactionKind::BetLose, -wager)
        };

        let wallet = &mut entry.wallet;
        wallet.base_balance += delta;
        wallet.recompute_derived(&self.config.rates);

        let verb = if won { "Won" } else { "Lost" };
        let transaction = Transaction::completed(
            kind,
            wager,
            Currency::Jup.symbol(),
            format!("{} a wager of {} {}", verb, wager, Currency::Jup),
        );
        info!(%identity, wager, won, balance = entry.wallet.base_balance, "Wager settled");
        Ok(entry.append(transaction))
    }

    pub fn wallet(&self, identity: &Identity) -> Option<Wallet> {
        self.wallets.get(identity).map(|e| e.wallet.clone())
    }

    pub fn balance(&self, identity: &Identity, currency: Currency) -> Option<f64> {
        self.wallets.get(identity).map(|e| e.wallet.balance(currency))
    }

    pub fn base_balance(&self, identity: &Identity) -> Option<f64> {
        self.wallets.get(identity).map(|e| e.wallet.base_balance)
    }

    /// Transaction history, newest first
    pub fn transactions(&self, identity: &Identity) -> Vec<Transaction> {
        self.wallets
            .get(identity)
            .map(|e| e.log.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    fn entry_mut(
        &self,
        identity: &Identity,
    ) -> Result<dashmap::mapref::one::RefMut<'_, Identity, WalletEntry>, LedgerError> {
        self.wallets
            .get_mut(identity)
            .ok_or_else(|| LedgerError::WalletNotFound(identity.to_string()))
    }
}
