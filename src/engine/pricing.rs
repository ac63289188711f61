use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::booking::{BookingItem, RequestedService};
use crate::models::service::{HomeDetails, Service};

/// Platform take rate: 18%.
const COMMISSION_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 2);
/// Card processing: 2.9% + $0.30.
const PROCESSING_RATE: Decimal = Decimal::from_parts(29, 0, 0, false, 3);
const PROCESSING_FLAT_FEE: Decimal = Decimal::from_parts(30, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub commission: Decimal,
    pub processing_fee: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedBooking {
    pub items: Vec<BookingItem>,
    pub breakdown: PriceBreakdown,
}

fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn commission(subtotal: Decimal) -> Decimal {
    round_cents(subtotal * COMMISSION_RATE)
}

pub fn processing_fee(subtotal: Decimal) -> Decimal {
    round_cents(subtotal * PROCESSING_RATE + PROCESSING_FLAT_FEE)
}

pub fn breakdown(subtotal: Decimal) -> PriceBreakdown {
    let subtotal = round_cents(subtotal);
    let commission = commission(subtotal);
    let processing_fee = processing_fee(subtotal);

    PriceBreakdown {
        subtotal,
        commission,
        processing_fee,
        total: subtotal + commission + processing_fee,
    }
}

/// Prices every requested line item against already-resolved catalog
/// entries. `lookup` returning `None` aborts the whole calculation.
pub fn price<F>(
    mut lookup: F,
    home: &HomeDetails,
    requested: &[RequestedService],
) -> Result<PricedBooking, AppError>
where
    F: FnMut(Uuid) -> Option<Service>,
{
    let square_footage = Decimal::from(home.square_footage);
    let mut items = Vec::with_capacity(requested.len());

    for line in requested {
        let service = lookup(line.service_id)
            .filter(|service| service.is_active)
            .ok_or(AppError::ServiceNotFound(line.service_id))?;

        // Lines stay exact; rounding happens once on the subtotal.
        let unit_price = service.base_price + service.price_per_sqft * square_footage;
        let total_price = unit_price * Decimal::from(line.quantity);

        items.push(BookingItem {
            service_id: service.id,
            name: service.name,
            quantity: line.quantity,
            unit_price,
            total_price,
        });
    }

    let subtotal = items.iter().map(|item| item.total_price).sum();

    Ok(PricedBooking {
        items,
        breakdown: breakdown(subtotal),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::service::ServiceCategory;

    fn cents(value: i64) -> Decimal {
        Decimal::new(value, 2)
    }

    fn service(seed: u128, name: &str, base: Decimal, per_sqft: Decimal) -> Service {
        Service {
            id: Uuid::from_u128(seed),
            name: name.to_string(),
            category: ServiceCategory::Standard,
            base_price: base,
            price_per_sqft: per_sqft,
            duration_minutes: 120,
            is_active: true,
        }
    }

    fn home(square_footage: u32) -> HomeDetails {
        HomeDetails {
            bedrooms: 2,
            bathrooms: 1,
            square_footage,
            floors: 1,
            pets: false,
            pet_details: None,
            access_instructions: None,
        }
    }

    fn catalog(services: Vec<Service>) -> HashMap<Uuid, Service> {
        services.into_iter().map(|s| (s.id, s)).collect()
    }

    #[test]
    fn hundred_dollar_subtotal_breakdown() {
        let result = breakdown(cents(10_000));

        assert_eq!(result.commission, cents(1_800));
        assert_eq!(result.processing_fee, cents(320));
        assert_eq!(result.total, cents(12_120));
    }

    #[test]
    fn standard_clean_on_thousand_square_feet() {
        let standard = service(1, "Standard Clean", cents(6_000), cents(8));
        let catalog = catalog(vec![standard]);

        let priced = price(
            |id| catalog.get(&id).cloned(),
            &home(1000),
            &[RequestedService {
                service_id: Uuid::from_u128(1),
                quantity: 1,
            }],
        )
        .unwrap();

        assert_eq!(priced.items[0].name, "Standard Clean");
        assert_eq!(priced.items[0].unit_price, cents(14_000));
        assert_eq!(priced.breakdown.subtotal, cents(14_000));
        assert_eq!(priced.breakdown.commission, cents(2_520));
        assert_eq!(priced.breakdown.processing_fee, cents(436));
        assert_eq!(priced.breakdown.total, cents(16_956));
    }

    #[test]
    fn quantity_multiplies_unit_price() {
        let window = service(2, "Window Washing", cents(2_500), Decimal::ZERO);
        let fridge = service(3, "Inside Fridge", cents(3_000), cents(1));
        let catalog = catalog(vec![window, fridge]);

        let priced = price(
            |id| catalog.get(&id).cloned(),
            &home(500),
            &[
                RequestedService {
                    service_id: Uuid::from_u128(2),
                    quantity: 3,
                },
                RequestedService {
                    service_id: Uuid::from_u128(3),
                    quantity: 1,
                },
            ],
        )
        .unwrap();

        assert_eq!(priced.items[0].total_price, cents(7_500));
        assert_eq!(priced.items[1].unit_price, cents(3_500));
        assert_eq!(priced.breakdown.subtotal, cents(11_000));
    }

    #[test]
    fn fractional_unit_price_is_not_rounded_before_quantity() {
        let edging = service(5, "Baseboard Edging", cents(1_000), Decimal::new(5, 3));
        let catalog = catalog(vec![edging]);

        let priced = price(
            |id| catalog.get(&id).cloned(),
            &home(101),
            &[RequestedService {
                service_id: Uuid::from_u128(5),
                quantity: 2,
            }],
        )
        .unwrap();

        // 10.00 + 0.005 * 101 = 10.505, times two is 21.01 exactly.
        assert_eq!(priced.items[0].unit_price, Decimal::new(10_505, 3));
        assert_eq!(priced.breakdown.subtotal, cents(2_101));
        assert_eq!(priced.breakdown.commission, cents(378));
        assert_eq!(priced.breakdown.processing_fee, cents(91));
        assert_eq!(priced.breakdown.total, cents(2_570));
    }

    #[test]
    fn fee_rounds_half_cents_up() {
        // 5.00 * 0.029 + 0.30 = 0.445
        assert_eq!(processing_fee(cents(500)), cents(45));
        // 0.25 * 0.18 = 0.045
        assert_eq!(commission(cents(25)), cents(5));
    }

    #[test]
    fn unknown_service_aborts_pricing() {
        let catalog = catalog(vec![service(1, "Standard Clean", cents(6_000), cents(8))]);

        let result = price(
            |id| catalog.get(&id).cloned(),
            &home(1000),
            &[
                RequestedService {
                    service_id: Uuid::from_u128(1),
                    quantity: 1,
                },
                RequestedService {
                    service_id: Uuid::from_u128(99),
                    quantity: 1,
                },
            ],
        );

        assert!(matches!(result, Err(AppError::ServiceNotFound(id)) if id == Uuid::from_u128(99)));
    }

    #[test]
    fn inactive_service_is_treated_as_missing() {
        let mut retired = service(4, "Move-out Clean", cents(20_000), cents(10));
        retired.is_active = false;
        let catalog = catalog(vec![retired]);

        let result = price(
            |id| catalog.get(&id).cloned(),
            &home(1000),
            &[RequestedService {
                service_id: Uuid::from_u128(4),
                quantity: 1,
            }],
        );

        assert!(matches!(result, Err(AppError::ServiceNotFound(_))));
    }
}
