use tracing::{debug, instrument};

use crate::salesbridge::tools::model::{
    AggregatedSales, LookupTable, Resolution, ResolvedRecord, RowOrder,
};

/// Left-joins the aggregated sales against the lookup table.
///
/// The sales side decides which articles appear: every aggregated article
/// yields exactly one record, matched or not. Unmatched articles are listed
/// once each, in the order the sales export first mentions them, whatever
/// the record order.
#[instrument(level = "debug", skip_all, fields(articles = sales.len(), lookup = lookup.len(), ?order))]
pub fn resolve(sales: &AggregatedSales, lookup: &LookupTable, order: RowOrder) -> Resolution {
    let mut resolution = Resolution {
        records: Vec::with_capacity(sales.len()),
        unmatched_articles: Vec::new(),
    };

    for (article, quantity) in sales.iter() {
        let canonical_id = lookup.get(article).map(str::to_string);
        if canonical_id.is_none() {
            resolution.unmatched_articles.push(article.to_string());
        }
        resolution.records.push(ResolvedRecord {
            article: article.to_string(),
            canonical_id,
            quantity,
        });
    }
    if order == RowOrder::Article {
        resolution
            .records
            .sort_by(|lhs, rhs| lhs.article.cmp(&rhs.article));
    }

    debug!(
        matched = resolution.matched_count(),
        unmatched = resolution.unmatched_articles.len(),
        "joined sales with lookup"
    );
    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::salesbridge::tools::model::{LookupEntry, OutputRow, SalesRecord};

    fn sales(rows: &[(&str, u64)]) -> AggregatedSales {
        rows.iter()
            .map(|(article, quantity)| SalesRecord {
                article: article.to_string(),
                quantity: *quantity,
            })
            .collect()
    }

    fn lookup(entries: &[(&str, &str)]) -> LookupTable {
        entries
            .iter()
            .map(|(article, canonical_id)| LookupEntry {
                article: article.to_string(),
                canonical_id: canonical_id.to_string(),
            })
            .collect()
    }

    #[test]
    fn matches_and_flags_unmatched_articles() {
        let sales = sales(&[("A1", 3), ("A2", 5), ("A1", 2)]);
        let lookup = lookup(&[("A1", "UID-100"), ("A3", "UID-300")]);

        let resolution = resolve(&sales, &lookup, RowOrder::FirstAppearance);

        assert_eq!(
            resolution.records,
            vec![
                ResolvedRecord {
                    article: "A1".into(),
                    canonical_id: Some("UID-100".into()),
                    quantity: 5,
                },
                ResolvedRecord {
                    article: "A2".into(),
                    canonical_id: None,
                    quantity: 5,
                },
            ]
        );
        assert_eq!(resolution.unmatched_articles, vec!["A2".to_string()]);
        assert_eq!(
            resolution.output_rows(),
            vec![OutputRow {
                canonical_id: "UID-100".into(),
                quantity: 5,
            }]
        );
    }

    #[test]
    fn every_sales_article_yields_one_record() {
        let sales = sales(&[("C", 1), ("B", 2), ("A", 3), ("B", 4), ("D", 0)]);
        let lookup = lookup(&[("B", "UID-B"), ("D", "UID-D"), ("Z", "UID-Z")]);

        let resolution = resolve(&sales, &lookup, RowOrder::FirstAppearance);

        assert_eq!(resolution.records.len(), sales.len());
        let articles: Vec<&str> = resolution.records.iter().map(|r| r.article.as_str()).collect();
        assert_eq!(articles, vec!["C", "B", "A", "D"]);
        assert_eq!(resolution.unmatched_articles, vec!["C".to_string(), "A".to_string()]);
        let total: u64 = resolution.records.iter().map(|r| r.quantity).sum();
        assert_eq!(total, sales.total_quantity());
    }

    #[test]
    fn article_order_sorts_records() {
        let sales = sales(&[("C", 1), ("A", 2), ("B", 3)]);
        let lookup = lookup(&[("A", "1"), ("B", "2"), ("C", "3")]);

        let resolution = resolve(&sales, &lookup, RowOrder::Article);

        let ids: Vec<String> = resolution
            .output_rows()
            .into_iter()
            .map(|row| row.canonical_id)
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn article_order_keeps_unmatched_in_encounter_order() {
        let sales = sales(&[("Z", 1), ("B", 2), ("M", 3), ("A", 4)]);
        let lookup = lookup(&[("B", "UID-B")]);

        let resolution = resolve(&sales, &lookup, RowOrder::Article);

        let articles: Vec<&str> = resolution.records.iter().map(|r| r.article.as_str()).collect();
        assert_eq!(articles, vec!["A", "B", "M", "Z"]);
        assert_eq!(
            resolution.unmatched_articles,
            vec!["Z".to_string(), "M".to_string(), "A".to_string()]
        );
    }

    #[test]
    fn no_matches_yields_full_unmatched_list() {
        let sales = sales(&[("X", 1), ("Y", 2)]);
        let resolution = resolve(&sales, &LookupTable::new(), RowOrder::FirstAppearance);

        assert!(resolution.output_rows().is_empty());
        assert_eq!(resolution.unmatched_articles, vec!["X".to_string(), "Y".to_string()]);
    }

    #[test]
    fn duplicate_lookup_entries_resolve_to_first_seen_consistently() {
        let sales = sales(&[("A1", 1)]);
        for _ in 0..10 {
            let lookup = lookup(&[("A1", "UID-FIRST"), ("A1", "UID-SECOND")]);
            let resolution = resolve(&sales, &lookup, RowOrder::FirstAppearance);
            assert_eq!(
                resolution.records[0].canonical_id.as_deref(),
                Some("UID-FIRST")
            );
        }
    }
}
