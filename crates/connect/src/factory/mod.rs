//! Invoice factory.
//!
//! Pure transformation of an order snapshot into the invoice request
//! payload. No side effects, no network calls; every input is data, so the
//! same order and settings always produce the same payload.

mod lines;

use fakturpro_core::{BillingPayload, InvoicePayload, PayloadMeta, ShippingPayload, ShopInfo};
use thiserror::Error;

use crate::adapter::OrderAccess;
use crate::settings::InvoiceSettings;

/// Data problems that make an order uninvoiceable.
///
/// Both variants are data-integrity failures: retrying cannot help until the
/// order itself is fixed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FactoryError {
    /// The order contains a line that is not a product-backed item.
    #[error("order item {name:?} is not a product")]
    WrongOrderItem { name: String },

    /// A product line references a product that no longer exists.
    #[error("product for order item {name:?} does not exist")]
    MissingProduct { name: String },
}

/// Builds invoice payloads from orders under the current settings.
#[derive(Debug, Clone, Copy)]
pub struct InvoiceFactory<'a> {
    settings: &'a InvoiceSettings,
    shop: &'a ShopInfo,
}

impl<'a> InvoiceFactory<'a> {
    #[must_use]
    pub const fn new(settings: &'a InvoiceSettings, shop: &'a ShopInfo) -> Self {
        Self { settings, shop }
    }

    /// Build the invoice request payload for an order.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError`] when the order contains a non-product line
    /// item or a product line whose product was deleted.
    pub fn build<O: OrderAccess + ?Sized>(
        &self,
        order: &O,
    ) -> Result<InvoicePayload, FactoryError> {
        let snapshot = order.order();

        Ok(InvoicePayload {
            order_id: snapshot.id.to_string(),
            order_key: snapshot.order_key.clone(),
            order_number: self.settings.order_number(&snapshot.order_number),
            order_date: snapshot.created_at.timestamp(),
            invoice_currency: snapshot.currency.clone(),
            invoice_paid: self.settings.mark_invoice_as_paid(&snapshot.payment_method),
            taxes_included: snapshot.prices_include_tax,
            payment_method: snapshot.payment_method.clone(),
            payment_title: snapshot.payment_method_title.clone(),
            payment_date: snapshot.date_paid.map(|paid| paid.timestamp()),
            base_country: self.shop.base_country.clone(),
            customer_note: snapshot.customer_note.clone(),
            vat_exempt: snapshot.vat_exempt,
            meta: Self::meta_data(order),
            billing: self.billing(order),
            shipping: self.shipping(order),
            items: self.items(order)?,
        })
    }

    /// Order metadata, passed through one to one.
    fn meta_data<O: OrderAccess + ?Sized>(order: &O) -> Vec<PayloadMeta> {
        order
            .order()
            .meta
            .iter()
            .map(|entry| PayloadMeta {
                key: entry.key.clone(),
                value: entry.value.clone(),
            })
            .collect()
    }

    fn billing<O: OrderAccess + ?Sized>(&self, order: &O) -> BillingPayload {
        let snapshot = order.order();
        let address = &snapshot.billing;

        BillingPayload {
            customer_no: snapshot.customer_id.to_string(),
            first_name: address.first_name.clone(),
            last_name: address.last_name.clone(),
            company: address.company.clone(),
            address_1: address.address_1.clone(),
            address_2: address.address_2.clone(),
            city: address.city.clone(),
            state: self
                .shop
                .state_name(&address.country, &address.state)
                .to_string(),
            postcode: address.postcode.clone(),
            country: address.country.clone(),
            email: address.email.clone(),
            phone: address.phone.clone(),
            salutation: order.billing_salutation(),
            vat_id: order.billing_vat_id(&self.settings.customer_vat_id_meta_name),
            vat_exempt: snapshot.customer_vat_exempt,
        }
    }

    fn shipping<O: OrderAccess + ?Sized>(&self, order: &O) -> ShippingPayload {
        let address = &order.order().shipping;

        ShippingPayload {
            first_name: address.first_name.clone(),
            last_name: address.last_name.clone(),
            company: address.company.clone(),
            address_1: address.address_1.clone(),
            address_2: address.address_2.clone(),
            city: address.city.clone(),
            state: self
                .shop
                .state_name(&address.country, &address.state)
                .to_string(),
            postcode: address.postcode.clone(),
            country: address.country.clone(),
            salutation: order.shipping_salutation(),
            vat_id: order.shipping_vat_id(),
        }
    }

    /// All invoice lines, in the order the invoice lists them.
    fn items<O: OrderAccess + ?Sized>(
        &self,
        order: &O,
    ) -> Result<Vec<fakturpro_core::InvoiceLine>, FactoryError> {
        let mut items = self.product_lines(order)?;
        items.extend(self.shipping_lines(order));
        items.extend(Self::fee_lines(order));
        items.extend(Self::discount_lines(order));
        items.extend(self.credit_lines(order));
        Ok(items)
    }
}

#[cfg(test)]
mod tests;
