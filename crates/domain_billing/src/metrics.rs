//! Metrics rollup
//!
//! Portfolio figures are recomputed from the stored invoices, payments and
//! loads on every call. Sums scan result sets capped at
//! [`RollupConfig::batch_limit`] records; amounts in different currencies
//! are added nominally, with a per-currency breakdown alongside.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, instrument};

use core_kernel::{BrokerId, Clock, Currency, Period};

use crate::broker::{BrokerCondition, BrokerStatus};
use crate::error::BillingResult;
use crate::invoice::{Invoice, InvoiceCondition, InvoiceSortKey, InvoiceStatus};
use crate::ledger::BATCH_LIMIT;
use crate::load::{LoadCondition, LoadStatus};
use crate::payment::{Payment, PaymentCondition, PaymentSortKey};
use crate::ports::{require, Stores};
use crate::query::{broker_names, overdue_filter, Filter, Sort, Window};
use crate::reconciliation::unbilled_filter;

/// Rollup window sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Records read per scan
    pub batch_limit: u64,
    pub top_debtors: usize,
    /// Trailing days in the payments-per-day series, today included
    pub payment_days: u32,
    /// Trailing months in the revenue series, current month included
    pub revenue_months: u32,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            batch_limit: BATCH_LIMIT,
            top_debtors: 10,
            payment_days: 30,
            revenue_months: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebtorSummary {
    pub broker_id: BrokerId,
    pub broker_name: String,
    pub debt: Decimal,
    pub invoice_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAmount {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyAmount {
    /// `YYYY-MM`
    pub month: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: InvoiceStatus,
    pub count: u64,
}

/// Portfolio-level figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetrics {
    /// Remaining balance over unsettled invoices
    pub total_debt: Decimal,
    pub debt_by_currency: BTreeMap<Currency, Decimal>,
    /// Remaining balance over past-due unsettled invoices
    pub overdue_amount: Decimal,
    pub paid_this_month: Decimal,
    pub paid_last_month: Decimal,
    pub total_invoices: u64,
    pub overdue_invoices: u64,
    pub pending_invoices: u64,
    pub active_brokers: u64,
    pub total_loads: u64,
    /// Loads in `delivered`
    pub completed_loads: u64,
    pub top_debtors: Vec<DebtorSummary>,
    pub payments_by_day: Vec<DailyAmount>,
    pub invoices_by_status: Vec<StatusCount>,
    pub revenue_by_month: Vec<MonthlyAmount>,
    pub generated_at: DateTime<Utc>,
}

/// Figures for one broker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerStats {
    pub broker_id: BrokerId,
    pub total_debt: Decimal,
    pub overdue_amount: Decimal,
    pub paid_this_month: Decimal,
    pub total_invoices: u64,
    pub unpaid_invoices: u64,
    pub overdue_invoices: u64,
    pub total_loads: u64,
    pub unbilled_loads: u64,
    pub last_payment_date: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct MetricsRollup {
    stores: Stores,
    clock: Arc<dyn Clock>,
    config: RollupConfig,
}

impl MetricsRollup {
    pub fn new(stores: Stores, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(stores, clock, RollupConfig::default())
    }

    pub fn with_config(stores: Stores, clock: Arc<dyn Clock>, config: RollupConfig) -> Self {
        Self { stores, clock, config }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> BillingResult<DashboardMetrics> {
        let now = self.clock.now();

        let open = self.unsettled_invoices(Filter::all()).await?;
        let mut debt_by_currency: BTreeMap<Currency, Decimal> = BTreeMap::new();
        for invoice in &open {
            *debt_by_currency.entry(invoice.currency()).or_default() += invoice.remaining().amount();
        }
        let total_debt: Decimal = debt_by_currency.values().copied().sum();
        let overdue_amount: Decimal = open
            .iter()
            .filter(|i| i.is_overdue(now))
            .map(|i| i.remaining().amount())
            .sum();

        let this_month = Period::month_of(now);
        let last_month = Period::previous_month_of(now);
        let paid_this_month = self.payments_total(Filter::all(), this_month).await?;
        let paid_last_month = self.payments_total(Filter::all(), last_month).await?;

        let invoices = &self.stores.invoices;
        let total_invoices = invoices.count(&Filter::all()).await?;
        let overdue_invoices = invoices.count(&overdue_filter(now)).await?;
        let pending_invoices = invoices
            .count(&Filter::all().with(InvoiceCondition::StatusIn(vec![InvoiceStatus::Pending])))
            .await?;

        let mut invoices_by_status = Vec::with_capacity(InvoiceStatus::ALL.len());
        for status in InvoiceStatus::ALL {
            let count = invoices
                .count(&Filter::all().with(InvoiceCondition::StatusIn(vec![status])))
                .await?;
            invoices_by_status.push(StatusCount { status, count });
        }

        let active_brokers = self
            .stores
            .brokers
            .count(&Filter::all().with(BrokerCondition::Status(BrokerStatus::Active)))
            .await?;
        let total_loads = self.stores.loads.count(&Filter::all()).await?;
        let completed_loads = self
            .stores
            .loads
            .count(&Filter::all().with(LoadCondition::StatusIn(vec![LoadStatus::Delivered])))
            .await?;

        let top_debtors = self.top_debtors(&open).await?;
        let payments_by_day = self.payments_by_day(now).await?;
        let revenue_by_month = self.revenue_by_month(now).await?;

        debug!(open = open.len(), %total_debt, "dashboard computed");
        Ok(DashboardMetrics {
            total_debt,
            debt_by_currency,
            overdue_amount,
            paid_this_month,
            paid_last_month,
            total_invoices,
            overdue_invoices,
            pending_invoices,
            active_brokers,
            total_loads,
            completed_loads,
            top_debtors,
            payments_by_day,
            invoices_by_status,
            revenue_by_month,
            generated_at: now,
        })
    }

    #[instrument(skip(self), fields(broker_id = %broker_id))]
    pub async fn broker_stats(&self, broker_id: BrokerId) -> BillingResult<BrokerStats> {
        require(self.stores.brokers.as_ref(), broker_id).await?;
        let now = self.clock.now();
        let by_broker = || Filter::all().with(InvoiceCondition::Broker(broker_id));

        let open = self.unsettled_invoices(by_broker()).await?;
        let total_debt: Decimal = open.iter().map(|i| i.remaining().amount()).sum();
        let overdue: Vec<&Invoice> = open.iter().filter(|i| i.is_overdue(now)).collect();
        let overdue_amount: Decimal = overdue.iter().map(|i| i.remaining().amount()).sum();

        let payments = Filter::all().with(PaymentCondition::Broker(broker_id));
        let paid_this_month = self
            .payments_total(payments.clone(), Period::month_of(now))
            .await?;
        let last_payment_date = self
            .stores
            .payments
            .find_many(&payments, Sort::desc(PaymentSortKey::PaymentDate), Window::first(1))
            .await?
            .first()
            .map(|p| p.payment_date);

        let total_invoices = self.stores.invoices.count(&by_broker()).await?;
        let total_loads = self
            .stores
            .loads
            .count(&Filter::all().with(LoadCondition::Broker(broker_id)))
            .await?;
        let unbilled_loads = self.stores.loads.count(&unbilled_filter(broker_id)).await?;

        Ok(BrokerStats {
            broker_id,
            total_debt,
            overdue_amount,
            paid_this_month,
            total_invoices,
            unpaid_invoices: open.len() as u64,
            overdue_invoices: overdue.len() as u64,
            total_loads,
            unbilled_loads,
            last_payment_date,
        })
    }

    async fn unsettled_invoices(
        &self,
        filter: Filter<InvoiceCondition>,
    ) -> BillingResult<Vec<Invoice>> {
        let filter = filter.with(InvoiceCondition::StatusIn(InvoiceStatus::UNSETTLED.to_vec()));
        Ok(self
            .stores
            .invoices
            .find_many(
                &filter,
                Sort::desc(InvoiceSortKey::CreatedAt),
                Window::first(self.config.batch_limit),
            )
            .await?)
    }

    async fn payments_in(
        &self,
        filter: Filter<PaymentCondition>,
        period: Period,
    ) -> BillingResult<Vec<Payment>> {
        let filter = filter
            .with(PaymentCondition::PaidFrom(period.start))
            .with(PaymentCondition::PaidBefore(period.end));
        Ok(self
            .stores
            .payments
            .find_many(
                &filter,
                Sort::desc(PaymentSortKey::PaymentDate),
                Window::first(self.config.batch_limit),
            )
            .await?)
    }

    async fn payments_total(
        &self,
        filter: Filter<PaymentCondition>,
        period: Period,
    ) -> BillingResult<Decimal> {
        let payments = self.payments_in(filter, period).await?;
        Ok(payments.iter().map(|p| p.amount.amount()).sum())
    }

    async fn top_debtors(&self, open: &[Invoice]) -> BillingResult<Vec<DebtorSummary>> {
        let mut debts: HashMap<BrokerId, (Decimal, usize)> = HashMap::new();
        for invoice in open {
            let entry = debts.entry(invoice.broker_id).or_default();
            entry.0 += invoice.remaining().amount();
            entry.1 += 1;
        }
        let mut ranked: Vec<(BrokerId, Decimal, usize)> = debts
            .into_iter()
            .map(|(id, (debt, count))| (id, debt, count))
            .filter(|(_, debt, _)| *debt > Decimal::ZERO)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.2.cmp(&a.2)));
        ranked.truncate(self.config.top_debtors);

        let names = broker_names(&self.stores, ranked.iter().map(|(id, _, _)| *id)).await?;
        Ok(ranked
            .into_iter()
            .map(|(broker_id, debt, invoice_count)| DebtorSummary {
                broker_name: names.name(&broker_id),
                broker_id,
                debt,
                invoice_count,
            })
            .collect())
    }

    async fn payments_by_day(&self, now: DateTime<Utc>) -> BillingResult<Vec<DailyAmount>> {
        let days = i64::from(self.config.payment_days.max(1));
        let today = Period::day_of(now);
        let window = Period {
            start: today.start - Duration::days(days - 1),
            end: today.end,
        };
        let payments = self.payments_in(Filter::all(), window).await?;

        let mut buckets: BTreeMap<NaiveDate, (Decimal, usize)> = (0..days)
            .map(|offset| {
                let day = (window.start + Duration::days(offset)).date_naive();
                (day, (Decimal::ZERO, 0))
            })
            .collect();
        for payment in &payments {
            if let Some(bucket) = buckets.get_mut(&payment.payment_date.date_naive()) {
                bucket.0 += payment.amount.amount();
                bucket.1 += 1;
            }
        }
        Ok(buckets
            .into_iter()
            .map(|(date, (amount, count))| DailyAmount { date, amount, count })
            .collect())
    }

    async fn revenue_by_month(&self, now: DateTime<Utc>) -> BillingResult<Vec<MonthlyAmount>> {
        let months = self.config.revenue_months.max(1) as i32;
        let periods: Vec<Period> = (0..months)
            .rev()
            .map(|back| Period::month_offset(now, -back))
            .collect();
        let (Some(first), Some(last)) = (periods.first(), periods.last()) else {
            return Ok(Vec::new());
        };
        let window = Period {
            start: first.start,
            end: last.end,
        };
        let payments = self.payments_in(Filter::all(), window).await?;

        Ok(periods
            .iter()
            .map(|period| MonthlyAmount {
                month: period.start.format("%Y-%m").to_string(),
                amount: payments
                    .iter()
                    .filter(|p| period.contains(p.payment_date))
                    .map(|p| p.amount.amount())
                    .sum(),
            })
            .collect())
    }
}

impl std::fmt::Debug for MetricsRollup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRollup")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
