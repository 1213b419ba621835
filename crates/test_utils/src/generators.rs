//! Property-Based Test Generators
//!
//! Proptest strategies for billing data that respects domain invariants.

use chrono::{DateTime, Duration, TimeZone, Utc};
use core_kernel::{BrokerId, Currency, Money};
use domain_billing::{InvoiceDraft, InvoiceStatus, LoadStatus, PaymentMethod};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for the supported currencies
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![Just(Currency::USD), Just(Currency::EUR), Just(Currency::RUB)]
}

/// Strategy for positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..100_000_000i64
}

/// Strategy for positive Money values
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (positive_amount_minor_strategy(), currency_strategy())
        .prop_map(|(amount, currency)| Money::from_minor(amount, currency))
}

/// Strategy for positive USD amounts with two decimal places
pub fn usd_amount_strategy() -> impl Strategy<Value = Decimal> {
    positive_amount_minor_strategy().prop_map(|minor| Decimal::new(minor, 2))
}

/// Strategy for an invoice amount split into installments that sum to it
pub fn installments_strategy() -> impl Strategy<Value = (Decimal, Vec<Decimal>)> {
    prop::collection::vec(1i64..500_000i64, 1..6).prop_map(|parts| {
        let installments: Vec<Decimal> = parts.iter().map(|minor| Decimal::new(*minor, 2)).collect();
        let total: Decimal = installments.iter().copied().sum();
        (total, installments)
    })
}

pub fn invoice_status_strategy() -> impl Strategy<Value = InvoiceStatus> {
    prop::sample::select(InvoiceStatus::ALL.to_vec())
}

pub fn load_status_strategy() -> impl Strategy<Value = LoadStatus> {
    prop_oneof![
        Just(LoadStatus::Planned),
        Just(LoadStatus::InTransit),
        Just(LoadStatus::Delivered),
        Just(LoadStatus::Canceled),
    ]
}

pub fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::WireTransfer),
        Just(PaymentMethod::Check),
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::Card),
        Just(PaymentMethod::Crypto),
    ]
}

/// Strategy for timestamps within 2026
pub fn datetime_2026_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..365 * 24 * 60).prop_map(|minutes| {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    })
}

/// Strategy for invoice drafts that pass field validation
pub fn valid_invoice_draft_strategy() -> impl Strategy<Value = InvoiceDraft> {
    (usd_amount_strategy(), currency_strategy(), datetime_2026_strategy()).prop_map(
        |(amount, currency, due)| InvoiceDraft {
            broker_id: Some(BrokerId::new()),
            amount,
            currency: currency.code().to_string(),
            due_date: Some(due),
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_positive_money_is_positive(money in positive_money_strategy()) {
            prop_assert!(money.is_positive());
        }

        #[test]
        fn test_installments_sum_to_total((total, parts) in installments_strategy()) {
            let sum: Decimal = parts.iter().copied().sum();
            prop_assert_eq!(sum, total);
            prop_assert!(parts.iter().all(|p| *p > Decimal::ZERO));
        }

        #[test]
        fn test_generated_drafts_validate(draft in valid_invoice_draft_strategy()) {
            prop_assert!(draft.validate().is_ok());
        }

        #[test]
        fn test_status_round_trips_through_name(status in invoice_status_strategy()) {
            prop_assert_eq!(status.as_str().parse::<InvoiceStatus>().ok(), Some(status));
        }
    }
}
