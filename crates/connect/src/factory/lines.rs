//! Invoice line construction.
//!
//! Product, shipping, fee, discount and credit lines, including the tax
//! apportionment for shipping costs that span multiple rates.

use std::collections::HashMap;

use fakturpro_core::{
    FeeLine, InvoiceLine, LineEntry, LineItemType, ProductLine, TaxLine, round_apportioned,
    round_half_up,
};
use rust_decimal::Decimal;

use super::{FactoryError, InvoiceFactory};
use crate::adapter::OrderAccess;
use crate::settings::{LineDescription, LineName};
use crate::text::strip_tags;

/// Per-rate product sums used to apportion shipping costs.
#[derive(Debug, Default, Clone, Copy)]
struct RateAmounts {
    net: Decimal,
    gross: Decimal,
}

impl InvoiceFactory<'_> {
    // =========================================================================
    // Product lines
    // =========================================================================

    pub(super) fn product_lines<O: OrderAccess + ?Sized>(
        &self,
        order: &O,
    ) -> Result<Vec<InvoiceLine>, FactoryError> {
        let snapshot = order.order();
        let mut items = Vec::with_capacity(snapshot.line_entries.len());

        for entry in &snapshot.line_entries {
            let line = match entry {
                LineEntry::Product(line) => line,
                LineEntry::Other { name } => {
                    return Err(FactoryError::WrongOrderItem { name: name.clone() });
                }
            };
            let product = line.product.as_ref().ok_or_else(|| {
                FactoryError::MissingProduct {
                    name: line.name.clone(),
                }
            })?;

            let tax = line
                .tax_rate_id()
                .and_then(|rate_id| snapshot.tax_line(rate_id));

            let quantity = Decimal::from(line.quantity.max(1));
            let mut price_net = line.subtotal / quantity;
            let mut price_gross = (line.subtotal + line.subtotal_tax) / quantity;
            let mut total_price_net = line.total / quantity;
            let mut total_price_gross = (line.total + line.total_tax) / quantity;

            let decimals = self.settings.price_num_decimals;
            if decimals > 0 {
                price_net = round_half_up(price_net, decimals);
                price_gross = round_half_up(price_gross, decimals);
                total_price_net = round_half_up(total_price_net, decimals);
                total_price_gross = round_half_up(total_price_gross, decimals);
            }

            let mut item = InvoiceLine::new(LineItemType::Product, self.product_name(line));
            item.subtype = product_subtype(product);
            item.description = Some(self.product_description(line));
            item.unit = product.unit.clone();
            item.number = Some(product.sku.clone());
            item.quantity = line.quantity;
            item.price_net = price_net;
            item.price_gross = price_gross;
            item.total_price_net = Some(total_price_net);
            item.total_price_gross = Some(total_price_gross);
            item.tax_rate = tax.map(|t| t.rate);
            item.tax_name = tax.map(|t| t.name.clone());
            item.manage_stock = Some(product.manage_stock);
            item.is_in_stock = Some(product.in_stock);
            item.stock_quantity = product.stock_quantity;
            items.push(item);
        }

        Ok(items)
    }

    /// The alternative product title, preferring extension-provided titles
    /// over generic metadata.
    fn alternate_title(&self, line: &ProductLine, setting: LineName) -> Option<String> {
        let product = line.product.as_ref()?;

        if let Some(subtitle) = product.subtitle.as_ref().filter(|s| !s.is_empty()) {
            return Some(subtitle.clone());
        }
        if let Some(secondary) = product.secondary_title.as_ref().filter(|s| !s.is_empty()) {
            return Some(secondary.clone());
        }
        if setting == LineName::SecondaryTitleFormat {
            return None;
        }
        product.alternate_title().map(ToString::to_string)
    }

    fn product_name(&self, line: &ProductLine) -> String {
        let setting = self.settings.line_name;
        let name = line.name.clone();

        if setting == LineName::ProductName {
            return name;
        }
        let Some(alternate) = self.alternate_title(line, setting) else {
            return name;
        };

        match setting {
            LineName::ProductName => name,
            LineName::ProductNameAndAlternateTitle => format!("{name} - {alternate}"),
            LineName::AlternateTitleAndProductName => format!("{alternate} - {name}"),
            LineName::AlternateTitle => alternate,
            LineName::SecondaryTitleFormat => self
                .settings
                .secondary_title_format
                .replace("%title%", &name)
                .replace("%secondary_title%", &alternate),
        }
    }

    fn product_description(&self, line: &ProductLine) -> String {
        let product = line.product.as_ref();
        let variation = line.variation.as_ref();

        // The description of what was actually purchased: the variation for
        // variation lines, the product otherwise.
        let purchased_description = || {
            variation
                .map(|v| v.description.as_str())
                .or(product.map(|p| p.description.as_str()))
                .unwrap_or_default()
        };
        let strict_description =
            || product.map(|p| p.description.as_str()).unwrap_or_default();

        let description = match self.settings.line_description {
            LineDescription::None => String::new(),
            LineDescription::Short => product
                .map(|p| p.short_description.clone())
                .unwrap_or_default(),
            LineDescription::Article => purchased_description().to_string(),
            LineDescription::ArticleOrVariationInherit => {
                let from_variation = variation
                    .map(|v| strip_tags(&v.description))
                    .unwrap_or_default();
                if from_variation.trim().is_empty() {
                    strict_description().to_string()
                } else {
                    from_variation
                }
            }
            LineDescription::ArticleAndVariation => {
                let parts: Vec<String> = [
                    strict_description().to_string(),
                    variation.map(|v| v.description.clone()).unwrap_or_default(),
                ]
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect();
                parts.join(" ")
            }
            LineDescription::ArticleStrict => strict_description().to_string(),
            LineDescription::Variation => variation
                .map(|v| v.description.clone())
                .unwrap_or_default(),
            LineDescription::VariationTitle => variation
                .map(|v| v.attributes.join(", "))
                .unwrap_or_default(),
            LineDescription::MetaData => line
                .meta
                .iter()
                .filter(|entry| !entry.key.starts_with('_'))
                .map(|entry| format!("{}: {}", entry.key, strip_tags(&entry.value)))
                .collect::<Vec<_>>()
                .join("\n"),
            LineDescription::MiniDesc => variation.map_or_else(
                || {
                    product
                        .and_then(|p| p.mini_description.clone())
                        .unwrap_or_default()
                },
                |v| v.mini_description.clone().unwrap_or_default(),
            ),
            LineDescription::VariationMiniDesc => variation
                .and_then(|v| v.mini_description.clone())
                .unwrap_or_default(),
            LineDescription::AlternateTitle => self
                .alternate_title(line, LineName::AlternateTitle)
                .unwrap_or_default(),
        };

        strip_tags(&description)
    }

    // =========================================================================
    // Shipping lines
    // =========================================================================

    pub(super) fn shipping_lines<O: OrderAccess + ?Sized>(&self, order: &O) -> Vec<InvoiceLine> {
        let snapshot = order.order();
        let settings = self.settings;

        // Product net/tax/gross per rate, the reference totals for the
        // proportional split below.
        let mut amounts: HashMap<u64, RateAmounts> = snapshot
            .tax_lines
            .iter()
            .map(|line| (line.rate_id, RateAmounts::default()))
            .collect();
        for entry in &snapshot.line_entries {
            let LineEntry::Product(line) = entry else {
                continue;
            };
            let Some(rate_id) = line
                .subtotal_taxes
                .iter()
                .find(|bucket| !bucket.amount.is_zero())
                .map(|bucket| bucket.rate_id)
            else {
                continue;
            };
            let slot = amounts.entry(rate_id).or_default();
            slot.net += line.subtotal;
            slot.gross += line.subtotal + line.subtotal_tax;
        }
        let total_net: Decimal = amounts.values().map(|a| a.net).sum();
        let total_gross: Decimal = amounts.values().map(|a| a.gross).sum();

        let mut items = Vec::new();
        for shipping in &snapshot.shipping_lines {
            let name = settings
                .article_name_shipping
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| shipping.name.clone());
            let number = settings
                .article_number_shipping
                .clone()
                .filter(|n| !n.is_empty());
            let base = |tax: Option<&TaxLine>| {
                let mut item = InvoiceLine::new(LineItemType::Shipping, name.clone());
                item.number = number.clone();
                item.tax_rate = tax.map(|t| t.rate);
                item.tax_name = tax.map(|t| t.name.clone());
                item
            };

            let gross = shipping.total + shipping.total_tax;
            let buckets: Vec<_> = shipping
                .taxes
                .iter()
                .filter(|bucket| !bucket.amount.is_zero())
                .collect();

            // Untaxed shipping, mostly free shipping: attach the first known
            // order rate when one exists, stay untaxed otherwise.
            if buckets.is_empty() {
                let mut item = base(snapshot.tax_lines.first());
                item.price_net = shipping.total;
                item.price_gross = gross;
                items.push(item);
                continue;
            }

            // A single applied rate is carried over as-is.
            if let [bucket] = buckets.as_slice() {
                let mut item = base(snapshot.tax_line(bucket.rate_id));
                item.price_net = shipping.total;
                item.price_gross = gross;
                items.push(item);
                continue;
            }

            // Several rates with precomputed split amounts annotated by the
            // tax extension: one line per split entry.
            if !shipping.split_taxes.is_empty() {
                for split in &shipping.split_taxes {
                    let mut item = base(snapshot.tax_line(split.rate_id));
                    item.price_net = split.net_amount;
                    item.price_gross = split.taxable_amount;
                    items.push(item);
                }
                continue;
            }

            // Several rates without a precomputed split: apportion the
            // shipping cost by each rate's share of the product totals, net
            // against net and gross against gross.
            for bucket in buckets {
                let rate_amounts = amounts.get(&bucket.rate_id).copied().unwrap_or_default();
                let net_ratio = if total_net > Decimal::ZERO {
                    rate_amounts.net / total_net
                } else {
                    Decimal::ZERO
                };
                let gross_ratio = if total_gross > Decimal::ZERO {
                    rate_amounts.gross / total_gross
                } else {
                    Decimal::ZERO
                };
                let mut item = base(snapshot.tax_line(bucket.rate_id));
                item.price_net = round_apportioned(shipping.total * net_ratio);
                item.price_gross = round_apportioned(gross * gross_ratio);
                items.push(item);
            }
        }

        items
    }

    // =========================================================================
    // Fee lines
    // =========================================================================

    pub(super) fn fee_lines<O: OrderAccess + ?Sized>(order: &O) -> Vec<InvoiceLine> {
        let snapshot = order.order();
        let mut items = Vec::new();

        for fee in &snapshot.fee_lines {
            let buckets: Vec<_> = fee
                .taxes
                .iter()
                .filter(|bucket| !bucket.amount.is_zero())
                .collect();

            if buckets.is_empty() {
                items.push(untaxed_fee_line(fee));
                continue;
            }

            for bucket in buckets {
                let tax = snapshot.tax_line(bucket.rate_id);
                let rate = tax.map(|t| t.rate).unwrap_or_default();
                // A zero rate cannot reconstruct a net amount from the tax;
                // carry the fee total untaxed instead.
                let Some(hundredth_rate) =
                    (!rate.is_zero()).then(|| rate / Decimal::ONE_HUNDRED)
                else {
                    items.push(untaxed_fee_line(fee));
                    continue;
                };
                let price_net = round_apportioned(bucket.amount / hundredth_rate);
                let price_gross = round_apportioned(price_net + bucket.amount);

                let mut item = InvoiceLine::new(LineItemType::Fee, fee.name.clone());
                item.description = Some(fee.name.clone());
                item.quantity = fee.quantity;
                item.price_net = price_net;
                item.price_gross = price_gross;
                item.tax_rate = tax.map(|t| t.rate);
                item.tax_name = tax.map(|t| t.name.clone());
                items.push(item);
            }
        }

        items
    }

    // =========================================================================
    // Discount lines
    // =========================================================================

    pub(super) fn discount_lines<O: OrderAccess + ?Sized>(_order: &O) -> Vec<InvoiceLine> {
        // Discounts are already reflected in the product line totals.
        // Dedicated discount lines per tax bucket are not emitted yet.
        // TODO: needs product sign-off on how coupon discounts split across
        // tax buckets before these lines can go live.
        Vec::new()
    }

    // =========================================================================
    // Credit lines
    // =========================================================================

    pub(super) fn credit_lines<O: OrderAccess + ?Sized>(&self, order: &O) -> Vec<InvoiceLine> {
        let mut credits = order.credits_used();

        if self.settings.merge_credits && !credits.is_empty() {
            let names: Vec<String> = credits.iter().map(|credit| credit.name.clone()).collect();
            let sum: Decimal = credits.iter().map(|credit| credit.amount).sum();
            if !sum.is_zero() {
                credits = vec![fakturpro_core::CreditUsed {
                    name: names.join(", "),
                    amount: sum,
                }];
            }
        }

        credits
            .into_iter()
            .filter(|credit| !credit.amount.is_zero())
            .map(|credit| {
                let name = if credit.name.is_empty() {
                    "Credits".to_string()
                } else {
                    format!("Credits ({})", credit.name)
                };
                let mut item = InvoiceLine::new(LineItemType::Credit, name);
                item.description = Some("Credits".to_string());
                item.price_net = -credit.amount;
                item.price_gross = -credit.amount;
                item
            })
            .collect()
    }
}

/// Product flavor sent as the line subtype.
fn product_subtype(product: &fakturpro_core::ProductInfo) -> Option<String> {
    let mut subtype = product.downloadable.then(|| "download".to_string());
    if product.r#virtual {
        subtype = Some("virtual".to_string());
    }
    if product.service {
        subtype = Some("service".to_string());
    }
    subtype
}

/// Fee line without any tax applied: net equals gross equals the fee total.
fn untaxed_fee_line(fee: &FeeLine) -> InvoiceLine {
    let mut item = InvoiceLine::new(LineItemType::Fee, fee.name.clone());
    item.description = Some(fee.name.clone());
    item.quantity = fee.quantity;
    item.price_net = fee.total;
    item.price_gross = fee.total;
    item
}
