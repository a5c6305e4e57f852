//! Demo fuel-station dataset.
//!
//! Served by the mock transport and written into a fresh cache by the
//! `seed` binary, so the console has something to show before it has ever
//! been online.

use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::entity::Record;
use crate::types::Collection;

/// Returns the demo dataset keyed by collection.
///
/// Entities are listed newest first, the order list endpoints return.
pub fn dataset() -> BTreeMap<Collection, Vec<Record>> {
    let mut data = BTreeMap::new();

    data.insert(
        Collection::ProductCategories,
        records(vec![
            json!({"id": 1, "name": "Fuel"}),
            json!({"id": 2, "name": "Lubricants"}),
            json!({"id": 3, "name": "Shop"}),
        ]),
    );

    data.insert(
        Collection::Products,
        records(vec![
            json!({"id": 1, "name": "Unleaded 95", "categoryId": 1, "priceCents": 189, "isFuel": true, "active": true}),
            json!({"id": 2, "name": "Diesel", "categoryId": 1, "priceCents": 179, "isFuel": true, "active": true}),
            json!({"id": 3, "name": "Engine Oil 5W-30 (1L)", "categoryId": 2, "priceCents": 1250, "isFuel": false, "active": true}),
            json!({"id": 4, "name": "Bottled Water 500ml", "categoryId": 3, "priceCents": 120, "isFuel": false, "active": true}),
        ]),
    );

    data.insert(
        Collection::Branches,
        records(vec![
            json!({"id": 1, "name": "Central", "address": "12 Ring Road", "managerId": 1}),
            json!({"id": 2, "name": "Airport", "address": "Terminal Way", "managerId": 2}),
        ]),
    );

    data.insert(
        Collection::Outlets,
        records(vec![
            json!({"id": 1, "name": "Central Forecourt", "branchId": 1}),
            json!({"id": 2, "name": "Airport Forecourt", "branchId": 2}),
        ]),
    );

    data.insert(
        Collection::Tanks,
        records(vec![
            json!({"id": 1, "name": "T1 Unleaded", "outletId": 1, "productId": 1, "capacityLitres": 30000, "levelLitres": 18250}),
            json!({"id": 2, "name": "T2 Diesel", "outletId": 1, "productId": 2, "capacityLitres": 30000, "levelLitres": 9400}),
            json!({"id": 3, "name": "T1 Unleaded", "outletId": 2, "productId": 1, "capacityLitres": 20000, "levelLitres": 15100}),
        ]),
    );

    data.insert(
        Collection::Customers,
        records(vec![
            json!({"id": 1, "name": "Walk-in", "phone": null, "email": null}),
            json!({"id": 2, "name": "Metro Haulage", "phone": "+1 555 0102", "email": "fleet@metrohaulage.example", "creditLimitCents": 500000}),
        ]),
    );

    data.insert(
        Collection::Managers,
        records(vec![
            json!({"id": 1, "name": "Dana Reyes", "email": "dana@fuelpos.example", "branchId": 1}),
            json!({"id": 2, "name": "Sam Okafor", "email": "sam@fuelpos.example", "branchId": 2}),
        ]),
    );

    data.insert(
        Collection::Users,
        records(vec![
            json!({"id": 1, "name": "Admin", "email": "admin@fuelpos.example", "role": "admin", "outletId": null}),
            json!({"id": 2, "name": "Lee Park", "email": null, "role": "cashier", "outletId": 1}),
        ]),
    );

    data.insert(
        Collection::Sales,
        records(vec![json!({
            "id": 1,
            "productId": 1,
            "outletId": 1,
            "customerId": 1,
            "quantity": 40,
            "unitPriceCents": 189,
            "soldAt": "2024-03-01T08:15:00Z"
        })]),
    );

    data.insert(Collection::SalesReturns, Vec::new());
    data.insert(Collection::Audit, Vec::new());

    data
}

fn records(values: Vec<Value>) -> Vec<Record> {
    values
        .into_iter()
        .filter_map(|value| Record::from_value(value).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Customer, Product, Sale, Tank};
    use crate::Entity;

    #[test]
    fn test_every_collection_present() {
        let data = dataset();
        for collection in Collection::ALL {
            assert!(data.contains_key(&collection), "{} missing", collection);
        }
    }

    #[test]
    fn test_records_parse_and_validate_as_typed_entities() {
        let data = dataset();

        for record in &data[&Collection::Products] {
            record.to_entity::<Product>().unwrap().validate().unwrap();
        }
        for record in &data[&Collection::Tanks] {
            record.to_entity::<Tank>().unwrap().validate().unwrap();
        }
        for record in &data[&Collection::Customers] {
            record.to_entity::<Customer>().unwrap().validate().unwrap();
        }
        for record in &data[&Collection::Sales] {
            record.to_entity::<Sale>().unwrap().validate().unwrap();
        }
        assert_eq!(data[&Collection::Products].len(), 4);
    }
}
