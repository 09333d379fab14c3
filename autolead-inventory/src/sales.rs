use serde::Serialize;
use std::collections::HashMap;

use autolead_core::analytics::LabelCount;
use autolead_core::inventory::SaleRecord;

pub const TOP_MODELS: usize = 10;

/// Chart-ready aggregation of a sales window.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SalesSummary {
    pub total_sales: i64,
    pub by_brand: Vec<LabelCount>,
    pub top_models: Vec<LabelCount>,
    pub price_ranges: Vec<LabelCount>,
}

/// Counts per key, most frequent first. Ties keep first-seen order.
struct Tally {
    order: Vec<String>,
    counts: HashMap<String, i64>,
}

impl Tally {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            counts: HashMap::new(),
        }
    }

    fn add(&mut self, key: String) {
        match self.counts.get_mut(&key) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(key.clone(), 1);
                self.order.push(key);
            }
        }
    }

    fn ranked(self) -> Vec<LabelCount> {
        let counts = self.counts;
        let mut ranked: Vec<LabelCount> = self
            .order
            .into_iter()
            .map(|label| {
                let count = counts.get(&label).copied().unwrap_or(0);
                LabelCount { label, count }
            })
            .collect();
        // sort_by is stable
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked
    }
}

const PRICE_RANGES: [&str; 4] = ["<$20k", "$20k-$30k", "$30k-$40k", ">$40k"];

fn price_range_index(price: f64) -> usize {
    if price < 20_000.0 {
        0
    } else if price < 30_000.0 {
        1
    } else if price < 40_000.0 {
        2
    } else {
        3
    }
}

pub fn summarize(sales: &[SaleRecord]) -> SalesSummary {
    let mut brands = Tally::new();
    let mut models = Tally::new();
    let mut ranges = [0i64; 4];

    for sale in sales {
        brands.add(sale.brand.clone());
        models.add(format!("{} {}", sale.brand, sale.model));
        ranges[price_range_index(sale.price)] += 1;
    }

    let mut top_models = models.ranked();
    top_models.truncate(TOP_MODELS);

    SalesSummary {
        total_sales: sales.len() as i64,
        by_brand: brands.ranked(),
        top_models,
        price_ranges: PRICE_RANGES
            .iter()
            .zip(ranges)
            .map(|(label, count)| LabelCount {
                label: label.to_string(),
                count,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sale(brand: &str, model: &str, price: f64) -> SaleRecord {
        SaleRecord {
            brand: brand.to_string(),
            model: model.to_string(),
            price,
            sale_date: Utc::now(),
        }
    }

    #[test]
    fn test_brand_counts_descending_with_stable_ties() {
        let sales = vec![
            sale("Kia", "Rio", 15_000.0),
            sale("Ford", "Ranger", 35_000.0),
            sale("Toyota", "RAV4", 32_000.0),
            sale("Toyota", "Corolla", 21_000.0),
            sale("Ford", "Focus", 18_000.0),
            sale("Toyota", "RAV4", 41_000.0),
        ];

        let summary = summarize(&sales);
        let brands: Vec<(&str, i64)> = summary
            .by_brand
            .iter()
            .map(|b| (b.label.as_str(), b.count))
            .collect();
        assert_eq!(brands, vec![("Toyota", 3), ("Ford", 2), ("Kia", 1)]);
        assert_eq!(summary.top_models[0].label, "Toyota RAV4");
        assert_eq!(summary.top_models[1].label, "Kia Rio");
        assert_eq!(summary.total_sales, 6);
    }

    #[test]
    fn test_price_buckets() {
        let sales = vec![
            sale("A", "a", 19_999.0),
            sale("A", "a", 20_000.0),
            sale("A", "a", 30_000.0),
            sale("A", "a", 40_000.0),
            sale("A", "a", 250_000.0),
        ];
        let counts: Vec<i64> = summarize(&sales).price_ranges.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![1, 1, 1, 2]);
    }

    #[test]
    fn test_top_models_capped() {
        let sales: Vec<SaleRecord> = (0..15).map(|i| sale("Brand", &format!("M{}", i), 1.0)).collect();
        assert_eq!(summarize(&sales).top_models.len(), TOP_MODELS);
    }

    #[test]
    fn test_empty_window() {
        let summary = summarize(&[]);
        assert!(summary.by_brand.is_empty());
        assert_eq!(summary.price_ranges.len(), 4);
        assert!(summary.price_ranges.iter().all(|r| r.count == 0));
    }
}
