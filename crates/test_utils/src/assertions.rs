//! Custom Test Assertions
//!
//! Assertion helpers for billing types that give more meaningful failure
//! messages than plain `assert_eq!`.

use core_kernel::Money;
use domain_billing::{BillingError, Invoice, InvoiceStatus};
use rust_decimal::Decimal;

/// Asserts that two Money values are approximately equal within a tolerance
///
/// # Panics
///
/// Panics if the currencies differ or the amounts differ by more than `tolerance`
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );

    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts an invoice's status and collected amount together
pub fn assert_invoice_state(invoice: &Invoice, status: InvoiceStatus, paid: Decimal) {
    assert_eq!(
        invoice.status, status,
        "Invoice {} status: expected {:?}, got {:?}",
        invoice.number, status, invoice.status
    );
    assert_eq!(
        invoice.paid_amount.amount(),
        paid,
        "Invoice {} paid amount: expected {}, got {}",
        invoice.number,
        paid,
        invoice.paid_amount.amount()
    );
}

/// Asserts the settlement bookkeeping holds for an invoice
pub fn assert_invoice_consistent(invoice: &Invoice) {
    assert!(
        invoice.paid_amount.amount() >= Decimal::ZERO,
        "Invoice {} has negative paid amount",
        invoice.number
    );
    assert!(
        invoice.paid_amount.amount() <= invoice.amount.amount(),
        "Invoice {} is overpaid: {} of {}",
        invoice.number,
        invoice.paid_amount.amount(),
        invoice.amount.amount()
    );
    assert_eq!(
        invoice.status == InvoiceStatus::Paid,
        invoice.paid_at.is_some(),
        "Invoice {} paid_at must be set exactly when paid",
        invoice.number
    );
}

/// Asserts a billing result failed validation with `message`
pub fn assert_validation_error<T: std::fmt::Debug>(result: Result<T, BillingError>, message: &str) {
    match result {
        Err(BillingError::Validation(actual)) => assert_eq!(actual, message),
        other => panic!("Expected validation error '{message}', got {other:?}"),
    }
}

/// Asserts a billing result failed because `entity` was missing
pub fn assert_not_found<T: std::fmt::Debug>(result: Result<T, BillingError>, entity: &str) {
    match result {
        Err(BillingError::NotFound { entity: actual, .. }) => assert_eq!(actual, entity),
        other => panic!("Expected {entity} not found, got {other:?}"),
    }
}
