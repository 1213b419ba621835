//! Test Data Builders
//!
//! Builder patterns for the billing drafts. Tests set only the fields they
//! care about; everything else gets a valid default.

use chrono::{DateTime, Utc};
use core_kernel::{BrokerId, InvoiceId, LoadId, Money};
use domain_billing::{Address, BrokerDraft, DriverInfo, InvoiceDraft, LoadDraft, PaymentDraft, Route};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::fixtures::{MoneyFixtures, PlaceFixtures, TemporalFixtures};

/// Builder for broker drafts
#[derive(Debug, Clone)]
pub struct BrokerDraftBuilder {
    draft: BrokerDraft,
}

impl Default for BrokerDraftBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerDraftBuilder {
    pub fn new() -> Self {
        Self {
            draft: BrokerDraft {
                company_name: "Acme Freight".to_string(),
                contact_person: "Dana Reyes".to_string(),
                email: "billing@acme-freight.example".to_string(),
                phone: "+1 555 0100".to_string(),
                address: PlaceFixtures::office(),
                credit_limit: dec!(50000),
                reliability_score: dec!(8),
                status: None,
                notes: String::new(),
            },
        }
    }

    /// Sets the company name and derives a matching billing email
    pub fn with_company_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.draft.email = format!("billing@{}.example", name.to_lowercase().replace(' ', "-"));
        self.draft.company_name = name;
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.draft.email = email.into();
        self
    }

    pub fn with_contact_person(mut self, contact: impl Into<String>) -> Self {
        self.draft.contact_person = contact.into();
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.draft.address = address;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.draft.status = Some(status.into());
        self
    }

    pub fn with_reliability_score(mut self, score: Decimal) -> Self {
        self.draft.reliability_score = score;
        self
    }

    pub fn build(self) -> BrokerDraft {
        self.draft
    }
}

/// Builder for invoice drafts
#[derive(Debug, Clone)]
pub struct InvoiceDraftBuilder {
    draft: InvoiceDraft,
}

impl InvoiceDraftBuilder {
    /// A net-30 USD invoice for `broker_id`
    pub fn new(broker_id: BrokerId) -> Self {
        let amount = MoneyFixtures::usd_invoice();
        Self {
            draft: InvoiceDraft {
                broker_id: Some(broker_id),
                amount: amount.amount(),
                currency: amount.currency().code().to_string(),
                due_date: Some(TemporalFixtures::net_30()),
                description: "Linehaul".to_string(),
                load_ids: Vec::new(),
                notes: String::new(),
            },
        }
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.draft.amount = amount.amount();
        self.draft.currency = amount.currency().code().to_string();
        self
    }

    /// Sets a raw currency code, including unsupported ones
    pub fn with_currency(mut self, code: impl Into<String>) -> Self {
        self.draft.currency = code.into();
        self
    }

    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.draft.due_date = Some(due);
        self
    }

    pub fn with_loads(mut self, load_ids: Vec<LoadId>) -> Self {
        self.draft.load_ids = load_ids;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.draft.description = description.into();
        self
    }

    pub fn build(self) -> InvoiceDraft {
        self.draft
    }
}

/// Builder for payment drafts
#[derive(Debug, Clone)]
pub struct PaymentDraftBuilder {
    draft: PaymentDraft,
}

impl PaymentDraftBuilder {
    /// A USD wire transfer of [`MoneyFixtures::usd_partial_payment`]
    pub fn new(invoice_id: InvoiceId, broker_id: BrokerId) -> Self {
        let amount = MoneyFixtures::usd_partial_payment();
        Self {
            draft: PaymentDraft {
                invoice_id: Some(invoice_id),
                broker_id: Some(broker_id),
                amount: amount.amount(),
                currency: amount.currency().code().to_string(),
                payment_date: Some(TemporalFixtures::now()),
                method: "wire_transfer".to_string(),
                transaction_id: "TX-0001".to_string(),
                reference: String::new(),
                notes: String::new(),
            },
        }
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.draft.amount = amount.amount();
        self.draft.currency = amount.currency().code().to_string();
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.draft.method = method.into();
        self
    }

    pub fn with_payment_date(mut self, at: DateTime<Utc>) -> Self {
        self.draft.payment_date = Some(at);
        self
    }

    pub fn build(self) -> PaymentDraft {
        self.draft
    }
}

/// Builder for load drafts
#[derive(Debug, Clone)]
pub struct LoadDraftBuilder {
    draft: LoadDraft,
}

impl LoadDraftBuilder {
    /// A planned Dallas to Denver dry van load costing 1800 USD
    pub fn new(broker_id: BrokerId) -> Self {
        Self {
            draft: LoadDraft {
                broker_id: Some(broker_id),
                invoice_id: None,
                route: PlaceFixtures::dallas_to_denver(),
                pickup_date: Some(TemporalFixtures::now()),
                delivery_date: None,
                cost: dec!(1800),
                currency: "USD".to_string(),
                status: None,
                weight: 42000.0,
                distance: 790.0,
                equipment: "dry_van".to_string(),
                driver_info: DriverInfo::default(),
                notes: String::new(),
            },
        }
    }

    pub fn with_invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.draft.invoice_id = Some(invoice_id);
        self
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.draft.route = route;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.draft.status = Some(status.into());
        self
    }

    pub fn with_cost(mut self, cost: Money) -> Self {
        self.draft.cost = cost.amount();
        self.draft.currency = cost.currency().code().to_string();
        self
    }

    pub fn build(self) -> LoadDraft {
        self.draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;

    #[test]
    fn test_broker_builder_derives_email() {
        let draft = BrokerDraftBuilder::new().with_company_name("Blue Line").build();
        assert_eq!(draft.company_name, "Blue Line");
        assert_eq!(draft.email, "billing@blue-line.example");
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_invoice_builder_amount_sets_currency() {
        let draft = InvoiceDraftBuilder::new(BrokerId::new())
            .with_amount(Money::new(dec!(900), Currency::EUR))
            .build();
        assert_eq!(draft.amount, dec!(900));
        assert_eq!(draft.currency, "EUR");
    }

    #[test]
    fn test_payment_builder_defaults() {
        let draft = PaymentDraftBuilder::new(InvoiceId::new(), BrokerId::new()).build();
        assert_eq!(draft.method, "wire_transfer");
        assert_eq!(draft.amount, dec!(500.00));
    }

    #[test]
    fn test_load_builder_defaults_to_unbilled() {
        let draft = LoadDraftBuilder::new(BrokerId::new()).build();
        assert!(draft.invoice_id.is_none());
        assert_eq!(draft.route.origin.state, "TX");
    }
}
