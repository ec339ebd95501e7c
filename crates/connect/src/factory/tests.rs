use chrono::{TimeZone, Utc};
use fakturpro_core::{
    CouponLine, CreditUsed, FeeLine, LineEntry, LineItemType, MetaEntry, OrderSnapshot,
    ProductInfo, ProductLine, ShippingLine, ShopInfo, SplitTax, TaxBucket, TaxLine, VariationInfo,
};
use rust_decimal::Decimal;

use super::{FactoryError, InvoiceFactory};
use crate::adapter::MemoryOrder;
use crate::settings::{InvoiceSettings, LineDescription, LineName};

fn dec(s: &str) -> Decimal {
    s.parse().expect("valid decimal")
}

fn tax_19() -> TaxLine {
    TaxLine {
        rate_id: 1,
        name: "MwSt. 19%".to_string(),
        rate: dec("19"),
    }
}

fn tax_7() -> TaxLine {
    TaxLine {
        rate_id: 2,
        name: "MwSt. 7%".to_string(),
        rate: dec("7"),
    }
}

fn product(sku: &str) -> ProductInfo {
    ProductInfo {
        sku: sku.to_string(),
        in_stock: true,
        ..ProductInfo::default()
    }
}

fn product_line(
    name: &str,
    quantity: u32,
    subtotal: &str,
    subtotal_tax: &str,
    rate_id: u64,
) -> LineEntry {
    LineEntry::Product(ProductLine {
        name: name.to_string(),
        quantity,
        subtotal: dec(subtotal),
        subtotal_tax: dec(subtotal_tax),
        total: dec(subtotal),
        total_tax: dec(subtotal_tax),
        subtotal_taxes: vec![TaxBucket {
            rate_id,
            amount: dec(subtotal_tax),
        }],
        total_taxes: vec![TaxBucket {
            rate_id,
            amount: dec(subtotal_tax),
        }],
        product: Some(product("SKU-1")),
        variation: None,
        meta: Vec::new(),
    })
}

fn base_order() -> MemoryOrder {
    let snapshot = OrderSnapshot {
        id: 1001,
        order_key: "wc_order_abc".to_string(),
        order_number: "1001".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("valid date"),
        currency: "EUR".to_string(),
        total: dec("119"),
        payment_method: "paypal".to_string(),
        payment_method_title: "PayPal".to_string(),
        customer_id: 7,
        tax_lines: vec![tax_19(), tax_7()],
        line_entries: vec![product_line("Widget", 1, "100", "19", 1)],
        ..OrderSnapshot::default()
    };
    MemoryOrder::new(snapshot)
}

fn build(order: &MemoryOrder, settings: &InvoiceSettings) -> fakturpro_core::InvoicePayload {
    let shop = ShopInfo {
        base_country: "DE".to_string(),
        ..ShopInfo::default()
    };
    InvoiceFactory::new(settings, &shop)
        .build(order)
        .expect("payload builds")
}

// =============================================================================
// Header fields
// =============================================================================

#[test]
fn test_header_fields() {
    let mut order = base_order();
    order.snapshot.date_paid = Some(Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).single().expect("valid date"));
    let settings = InvoiceSettings {
        order_number_prefix: "WC-".to_string(),
        paid_for_methods: vec!["paypal".to_string()],
        ..InvoiceSettings::default()
    };

    let payload = build(&order, &settings);
    assert_eq!(payload.order_id, "1001");
    assert_eq!(payload.order_number, "WC-1001");
    assert_eq!(payload.invoice_currency, "EUR");
    assert_eq!(payload.base_country, "DE");
    assert!(payload.invoice_paid);
    assert_eq!(payload.payment_date, order.snapshot.date_paid.map(|d| d.timestamp()));
    assert_eq!(payload.billing.customer_no, "7");
}

#[test]
fn test_unpaid_method_leaves_invoice_open() {
    let order = base_order();
    let payload = build(&order, &InvoiceSettings::default());
    assert!(!payload.invoice_paid);
    assert_eq!(payload.payment_date, None);
}

#[test]
fn test_state_translated_to_full_name() {
    let mut order = base_order();
    order.snapshot.billing.country = "DE".to_string();
    order.snapshot.billing.state = "BY".to_string();

    let mut shop = ShopInfo {
        base_country: "DE".to_string(),
        ..ShopInfo::default()
    };
    shop.states.insert(
        "DE".to_string(),
        [("BY".to_string(), "Bayern".to_string())].into_iter().collect(),
    );
    let settings = InvoiceSettings::default();
    let payload = InvoiceFactory::new(&settings, &shop)
        .build(&order)
        .expect("payload builds");
    assert_eq!(payload.billing.state, "Bayern");
}

#[test]
fn test_meta_passthrough() {
    let mut order = base_order();
    order.snapshot.meta = vec![MetaEntry::new("_some_plugin", "value")];
    let payload = build(&order, &InvoiceSettings::default());
    assert_eq!(payload.meta.len(), 1);
    assert_eq!(payload.meta.first().map(|m| m.key.as_str()), Some("_some_plugin"));
}

// =============================================================================
// Product lines
// =============================================================================

#[test]
fn test_non_product_item_is_refused() {
    let mut order = base_order();
    order
        .snapshot
        .line_entries
        .push(LineEntry::Other { name: "Bundle container".to_string() });

    let settings = InvoiceSettings::default();
    let shop = ShopInfo::default();
    let err = InvoiceFactory::new(&settings, &shop)
        .build(&order)
        .expect_err("must refuse");
    assert_eq!(err, FactoryError::WrongOrderItem { name: "Bundle container".to_string() });
}

#[test]
fn test_deleted_product_is_refused() {
    let mut order = base_order();
    if let Some(LineEntry::Product(line)) = order.snapshot.line_entries.first_mut() {
        line.product = None;
    }

    let settings = InvoiceSettings::default();
    let shop = ShopInfo::default();
    let err = InvoiceFactory::new(&settings, &shop)
        .build(&order)
        .expect_err("must refuse");
    assert_eq!(err, FactoryError::MissingProduct { name: "Widget".to_string() });
}

#[test]
fn test_product_unit_prices_and_rounding() {
    let mut order = base_order();
    // 3 units, line subtotal 100 net / 19 tax: unit prices get rounded.
    order.snapshot.line_entries = vec![product_line("Widget", 3, "100", "19", 1)];

    let payload = build(&order, &InvoiceSettings::default());
    let item = payload.items.first().expect("one item");
    assert_eq!(item.item_type, LineItemType::Product);
    assert_eq!(item.quantity, 3);
    assert_eq!(item.price_net, dec("33.33"));
    assert_eq!(item.price_gross, dec("39.67"));
    assert_eq!(item.tax_rate, Some(dec("19")));
    assert_eq!(item.tax_name.as_deref(), Some("MwSt. 19%"));
}

#[test]
fn test_product_rounding_disabled_with_zero_decimals() {
    let mut order = base_order();
    order.snapshot.line_entries = vec![product_line("Widget", 3, "100", "19", 1)];
    let settings = InvoiceSettings {
        price_num_decimals: 0,
        ..InvoiceSettings::default()
    };

    let payload = build(&order, &settings);
    let item = payload.items.first().expect("one item");
    // Unrounded division result is kept.
    assert!(item.price_net > dec("33.33") && item.price_net < dec("33.34"));
}

#[test]
fn test_product_tax_falls_back_to_last_zero_bucket() {
    let mut order = base_order();
    order.snapshot.line_entries = vec![LineEntry::Product(ProductLine {
        name: "Exempt".to_string(),
        quantity: 1,
        subtotal: dec("50"),
        subtotal_taxes: vec![
            TaxBucket { rate_id: 1, amount: Decimal::ZERO },
            TaxBucket { rate_id: 2, amount: Decimal::ZERO },
        ],
        product: Some(product("SKU-2")),
        ..ProductLine::default()
    })];

    let payload = build(&order, &InvoiceSettings::default());
    let item = payload.items.first().expect("one item");
    // All buckets zero: the last bucket id decides the rate.
    assert_eq!(item.tax_rate, Some(dec("7")));
}

#[test]
fn test_product_without_buckets_is_untaxed() {
    let mut order = base_order();
    order.snapshot.line_entries = vec![LineEntry::Product(ProductLine {
        name: "Untaxed".to_string(),
        quantity: 1,
        subtotal: dec("50"),
        product: Some(product("SKU-3")),
        ..ProductLine::default()
    })];

    let payload = build(&order, &InvoiceSettings::default());
    let item = payload.items.first().expect("one item");
    assert_eq!(item.tax_rate, None);
    assert_eq!(item.tax_name, None);
}

#[test]
fn test_product_subtype_resolution() {
    let mut order = base_order();
    if let Some(LineEntry::Product(line)) = order.snapshot.line_entries.first_mut() {
        let info = line.product.as_mut().expect("product present");
        info.downloadable = true;
        info.r#virtual = true;
    }
    let payload = build(&order, &InvoiceSettings::default());
    assert_eq!(
        payload.items.first().and_then(|i| i.subtype.as_deref()),
        Some("virtual")
    );
}

// =============================================================================
// Name and description strategies
// =============================================================================

fn order_with_subtitled_product() -> MemoryOrder {
    let mut order = base_order();
    if let Some(LineEntry::Product(line)) = order.snapshot.line_entries.first_mut() {
        let info = line.product.as_mut().expect("product present");
        info.subtitle = Some("Deluxe Edition".to_string());
    }
    order
}

#[test]
fn test_line_name_strategies() {
    let order = order_with_subtitled_product();

    let cases = [
        (LineName::ProductName, "Widget"),
        (LineName::ProductNameAndAlternateTitle, "Widget - Deluxe Edition"),
        (LineName::AlternateTitleAndProductName, "Deluxe Edition - Widget"),
        (LineName::AlternateTitle, "Deluxe Edition"),
    ];
    for (line_name, expected) in cases {
        let settings = InvoiceSettings { line_name, ..InvoiceSettings::default() };
        let payload = build(&order, &settings);
        assert_eq!(
            payload.items.first().map(|i| i.name.as_str()),
            Some(expected),
            "strategy {line_name:?}"
        );
    }
}

#[test]
fn test_secondary_title_format() {
    let mut order = base_order();
    if let Some(LineEntry::Product(line)) = order.snapshot.line_entries.first_mut() {
        let info = line.product.as_mut().expect("product present");
        info.secondary_title = Some("Sonderserie".to_string());
    }
    let settings = InvoiceSettings {
        line_name: LineName::SecondaryTitleFormat,
        secondary_title_format: "%secondary_title%: %title%".to_string(),
        ..InvoiceSettings::default()
    };
    let payload = build(&order, &settings);
    assert_eq!(
        payload.items.first().map(|i| i.name.as_str()),
        Some("Sonderserie: Widget")
    );
}

#[test]
fn test_name_falls_back_without_alternate_title() {
    let order = base_order();
    let settings = InvoiceSettings {
        line_name: LineName::AlternateTitle,
        ..InvoiceSettings::default()
    };
    let payload = build(&order, &settings);
    assert_eq!(payload.items.first().map(|i| i.name.as_str()), Some("Widget"));
}

#[test]
fn test_description_from_item_meta_excludes_private_keys() {
    let mut order = base_order();
    if let Some(LineEntry::Product(line)) = order.snapshot.line_entries.first_mut() {
        line.meta = vec![
            MetaEntry::new("Color", "<b>Red</b>"),
            MetaEntry::new("_internal", "hidden"),
            MetaEntry::new("Size", "XL"),
        ];
    }
    let settings = InvoiceSettings {
        line_description: LineDescription::MetaData,
        ..InvoiceSettings::default()
    };
    let payload = build(&order, &settings);
    assert_eq!(
        payload.items.first().and_then(|i| i.description.as_deref()),
        Some("Color: Red\nSize: XL")
    );
}

#[test]
fn test_description_variation_title() {
    let mut order = base_order();
    if let Some(LineEntry::Product(line)) = order.snapshot.line_entries.first_mut() {
        line.variation = Some(VariationInfo {
            attributes: vec!["Red".to_string(), "XL".to_string()],
            ..VariationInfo::default()
        });
    }
    let settings = InvoiceSettings {
        line_description: LineDescription::VariationTitle,
        ..InvoiceSettings::default()
    };
    let payload = build(&order, &settings);
    assert_eq!(
        payload.items.first().and_then(|i| i.description.as_deref()),
        Some("Red, XL")
    );
}

#[test]
fn test_description_inherits_product_when_variation_blank() {
    let mut order = base_order();
    if let Some(LineEntry::Product(line)) = order.snapshot.line_entries.first_mut() {
        line.variation = Some(VariationInfo::default());
        let info = line.product.as_mut().expect("product present");
        info.description = "<p>Product text</p>".to_string();
    }
    let settings = InvoiceSettings {
        line_description: LineDescription::ArticleOrVariationInherit,
        ..InvoiceSettings::default()
    };
    let payload = build(&order, &settings);
    assert_eq!(
        payload.items.first().and_then(|i| i.description.as_deref()),
        Some("Product text")
    );
}

// =============================================================================
// Shipping lines
// =============================================================================

fn shipping(total: &str, total_tax: &str, taxes: Vec<TaxBucket>) -> ShippingLine {
    ShippingLine {
        name: "DHL Paket".to_string(),
        total: dec(total),
        total_tax: dec(total_tax),
        taxes,
        split_taxes: Vec::new(),
    }
}

#[test]
fn test_untaxed_shipping_attaches_first_known_rate() {
    let mut order = base_order();
    order.snapshot.line_entries = vec![
        product_line("A", 1, "100", "19", 1),
        product_line("B", 1, "50", "9.5", 1),
    ];
    order.snapshot.shipping_lines = vec![shipping("4.99", "0", Vec::new())];

    let payload = build(&order, &InvoiceSettings::default());
    let item = payload
        .items
        .iter()
        .find(|i| i.item_type == LineItemType::Shipping)
        .expect("shipping line");
    assert_eq!(item.tax_rate, Some(dec("19")));
    assert_eq!(item.tax_name.as_deref(), Some("MwSt. 19%"));
    assert_eq!(item.price_net, dec("4.99"));
}

#[test]
fn test_untaxed_shipping_stays_untaxed_without_order_rates() {
    let mut order = base_order();
    order.snapshot.tax_lines = Vec::new();
    order.snapshot.shipping_lines = vec![shipping("4.99", "0", Vec::new())];

    let payload = build(&order, &InvoiceSettings::default());
    let item = payload
        .items
        .iter()
        .find(|i| i.item_type == LineItemType::Shipping)
        .expect("shipping line");
    assert_eq!(item.tax_rate, None);
    assert_eq!(item.tax_name, None);
}

#[test]
fn test_single_rate_shipping() {
    let mut order = base_order();
    order.snapshot.shipping_lines = vec![shipping(
        "4.99",
        "0.95",
        vec![TaxBucket { rate_id: 1, amount: dec("0.95") }],
    )];

    let payload = build(&order, &InvoiceSettings::default());
    let item = payload
        .items
        .iter()
        .find(|i| i.item_type == LineItemType::Shipping)
        .expect("shipping line");
    assert_eq!(item.price_net, dec("4.99"));
    assert_eq!(item.price_gross, dec("5.94"));
    assert_eq!(item.tax_rate, Some(dec("19")));
}

#[test]
fn test_shipping_name_and_number_overrides() {
    let mut order = base_order();
    order.snapshot.shipping_lines = vec![shipping("4.99", "0", Vec::new())];
    let settings = InvoiceSettings {
        article_name_shipping: Some("Versand".to_string()),
        article_number_shipping: Some("SHIP-01".to_string()),
        ..InvoiceSettings::default()
    };

    let payload = build(&order, &settings);
    let item = payload
        .items
        .iter()
        .find(|i| i.item_type == LineItemType::Shipping)
        .expect("shipping line");
    assert_eq!(item.name, "Versand");
    assert_eq!(item.number.as_deref(), Some("SHIP-01"));
}

#[test]
fn test_shipping_split_annotation_wins() {
    let mut order = base_order();
    let mut line = shipping(
        "10",
        "1.62",
        vec![
            TaxBucket { rate_id: 1, amount: dec("1.27") },
            TaxBucket { rate_id: 2, amount: dec("0.35") },
        ],
    );
    line.split_taxes = vec![
        SplitTax { rate_id: 1, net_amount: dec("6.67"), taxable_amount: dec("7.94") },
        SplitTax { rate_id: 2, net_amount: dec("3.33"), taxable_amount: dec("3.56") },
    ];
    order.snapshot.shipping_lines = vec![line];

    let payload = build(&order, &InvoiceSettings::default());
    let shippings: Vec<_> = payload
        .items
        .iter()
        .filter(|i| i.item_type == LineItemType::Shipping)
        .collect();
    assert_eq!(shippings.len(), 2);
    assert_eq!(shippings.first().map(|i| i.price_net), Some(dec("6.67")));
    assert_eq!(shippings.last().map(|i| i.price_gross), Some(dec("3.56")));
}

#[test]
fn test_shipping_proportional_apportionment_sums_back_up() {
    let mut order = base_order();
    order.snapshot.line_entries = vec![
        product_line("A", 1, "100", "19", 1),
        product_line("B", 1, "50", "3.5", 2),
    ];
    let shipping_net = dec("10");
    let shipping_tax = dec("1.62");
    order.snapshot.shipping_lines = vec![shipping(
        "10",
        "1.62",
        vec![
            TaxBucket { rate_id: 1, amount: dec("1.27") },
            TaxBucket { rate_id: 2, amount: dec("0.35") },
        ],
    )];

    let payload = build(&order, &InvoiceSettings::default());
    let shippings: Vec<_> = payload
        .items
        .iter()
        .filter(|i| i.item_type == LineItemType::Shipping)
        .collect();
    assert_eq!(shippings.len(), 2);

    let net_sum: Decimal = shippings.iter().map(|i| i.price_net).sum();
    let gross_sum: Decimal = shippings.iter().map(|i| i.price_gross).sum();
    let tolerance = dec("0.0002");
    assert!((net_sum - shipping_net).abs() <= tolerance, "net sum {net_sum}");
    assert!(
        (gross_sum - (shipping_net + shipping_tax)).abs() <= tolerance,
        "gross sum {gross_sum}"
    );

    // The 19% bucket covers two thirds of the product net.
    let first = shippings.first().expect("first split");
    assert_eq!(first.tax_rate, Some(dec("19")));
    assert_eq!(first.price_net, dec("6.6667"));
}

// =============================================================================
// Fee lines
// =============================================================================

#[test]
fn test_untaxed_fee() {
    let mut order = base_order();
    order.snapshot.fee_lines = vec![FeeLine {
        name: "Nachnahme".to_string(),
        quantity: 1,
        total: dec("3.50"),
        taxes: Vec::new(),
    }];

    let payload = build(&order, &InvoiceSettings::default());
    let item = payload
        .items
        .iter()
        .find(|i| i.item_type == LineItemType::Fee)
        .expect("fee line");
    assert_eq!(item.price_net, dec("3.50"));
    assert_eq!(item.price_gross, dec("3.50"));
    assert_eq!(item.tax_rate, None);
    assert_eq!(item.description.as_deref(), Some("Nachnahme"));
}

#[test]
fn test_taxed_fee_reconstructs_net_from_tax() {
    let mut order = base_order();
    order.snapshot.fee_lines = vec![FeeLine {
        name: "Payment fee".to_string(),
        quantity: 1,
        total: dec("10"),
        taxes: vec![TaxBucket { rate_id: 1, amount: dec("1.9") }],
    }];

    let payload = build(&order, &InvoiceSettings::default());
    let item = payload
        .items
        .iter()
        .find(|i| i.item_type == LineItemType::Fee)
        .expect("fee line");
    // net = 1.9 / 0.19 = 10, gross = 11.9
    assert_eq!(item.price_net, dec("10.0000"));
    assert_eq!(item.price_gross, dec("11.9000"));
    assert_eq!(item.tax_rate, Some(dec("19")));
}

// =============================================================================
// Discounts and credits
// =============================================================================

#[test]
fn test_coupons_produce_no_discount_lines() {
    let mut order = base_order();
    order.snapshot.coupon_lines = vec![CouponLine {
        name: "SPRING".to_string(),
        code: "spring24".to_string(),
    }];
    let payload = build(&order, &InvoiceSettings::default());
    assert!(
        payload
            .items
            .iter()
            .all(|i| i.item_type != LineItemType::Discount)
    );
}

#[test]
fn test_credits_merged_into_single_line() {
    let mut order = base_order();
    order.snapshot.credits = vec![
        CreditUsed { name: "A".to_string(), amount: dec("5") },
        CreditUsed { name: "B".to_string(), amount: dec("3") },
    ];
    let settings = InvoiceSettings {
        merge_credits: true,
        ..InvoiceSettings::default()
    };

    let payload = build(&order, &settings);
    let credits: Vec<_> = payload
        .items
        .iter()
        .filter(|i| i.item_type == LineItemType::Credit)
        .collect();
    assert_eq!(credits.len(), 1);
    let credit = credits.first().expect("credit line");
    assert_eq!(credit.name, "Credits (A, B)");
    assert_eq!(credit.price_net, dec("-8"));
    assert_eq!(credit.price_gross, dec("-8"));
    assert_eq!(credit.tax_rate, None);
}

#[test]
fn test_credits_unmerged_and_zero_amounts_dropped() {
    let mut order = base_order();
    order.snapshot.credits = vec![
        CreditUsed { name: "A".to_string(), amount: dec("5") },
        CreditUsed { name: "Empty".to_string(), amount: Decimal::ZERO },
        CreditUsed { name: "B".to_string(), amount: dec("3") },
    ];

    let payload = build(&order, &InvoiceSettings::default());
    let credits: Vec<_> = payload
        .items
        .iter()
        .filter(|i| i.item_type == LineItemType::Credit)
        .collect();
    assert_eq!(credits.len(), 2);
    assert_eq!(credits.first().map(|i| i.name.as_str()), Some("Credits (A)"));
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_build_is_deterministic() {
    let mut order = base_order();
    order.snapshot.line_entries = vec![
        product_line("A", 3, "100", "19", 1),
        product_line("B", 2, "50", "3.5", 2),
    ];
    order.snapshot.shipping_lines = vec![shipping(
        "10",
        "1.62",
        vec![
            TaxBucket { rate_id: 1, amount: dec("1.27") },
            TaxBucket { rate_id: 2, amount: dec("0.35") },
        ],
    )];

    let settings = InvoiceSettings::default();
    let first = serde_json::to_value(build(&order, &settings)).expect("serializes");
    let second = serde_json::to_value(build(&order, &settings)).expect("serializes");
    assert_eq!(first, second);
}
