//! Parsing of the vendor's period report strings
//!
//! The period status and period sales queries answer with pipe-delimited
//! `KEY=VALUE` lists, for example:
//!
//! ```text
//! DID=0142|DTI=2024-05-02 06:00|SSD=2024-05-02
//! QT=2|G1NR=1|G1MN=10550.00|G1VO=85.20|G2NR=3|G2MN=7200.00|G2VO=61.02
//! ```

use std::collections::HashMap;

use crate::types::GradeTotals;
use crate::{FusionError, Result};

/// Period type code for the current day
pub const DAY_PERIOD: char = 'D';

/// Keys that carry the id of the current day period, in priority order
const PERIOD_ID_PREFIXES: [&str; 3] = ["DID", "DTI", "SSD"];

/// Split a vendor report into trimmed `(key, value)` pairs
///
/// Segments without `=` are ignored. Only the first `=` separates key from
/// value.
pub fn fields(raw: &str) -> impl Iterator<Item = (&str, &str)> {
    raw.split('|').filter_map(|segment| {
        let (key, value) = segment.split_once('=')?;
        Some((key.trim(), value.trim()))
    })
}

/// Extract the day period id from a period status string
///
/// The id is the value of the first field whose key starts with `DID`,
/// `DTI` or `SSD`.
pub fn day_period_id(status: &str) -> Result<String> {
    fields(status)
        .find(|(key, value)| {
            !value.is_empty() && PERIOD_ID_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
        })
        .map(|(_, value)| value.to_string())
        .ok_or_else(|| {
            let keys: Vec<&str> = fields(status).map(|(key, _)| key).collect();
            FusionError::parse_error(
                "period status",
                format!("no day period id (DID/DTI/SSD) among fields [{}]", keys.join(", ")),
            )
        })
}

/// Parse per-grade totals from a period sales by grade string
///
/// `QT` gives the number of grades; grade `i` is described by `G{i}NR`
/// (grade), `G{i}MN` (money) and `G{i}VO` (volume). Entries without a grade
/// number are skipped. A missing `QT` means no grades.
pub fn parse_grade_totals(raw: &str) -> Result<Vec<GradeTotals>> {
    let mut map: HashMap<&str, &str> = HashMap::new();
    for (key, value) in fields(raw) {
        map.entry(key).or_insert(value);
    }

    let count: u32 = match map.get("QT") {
        None => 0,
        Some(qt) => qt.parse().map_err(|_| {
            FusionError::parse_error("period sales", format!("invalid grade count QT={}", qt))
        })?,
    };

    let lookup = |i: u32, suffix: &str| {
        map.get(format!("G{}{}", i, suffix).as_str())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    };

    let totals = (1..=count)
        .filter_map(|i| {
            let grade = lookup(i, "NR")?;
            Some(GradeTotals { grade, money: lookup(i, "MN"), volume: lookup(i, "VO") })
        })
        .collect();

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn period_id_prefers_first_matching_field() {
        let id = day_period_id("ST=1|DTI=2024-05-02|DID=0142").unwrap();
        assert_eq!(id, "2024-05-02");
    }

    #[test]
    fn period_id_skips_empty_values() {
        let id = day_period_id(" DID= | SSD=2024-05-02 ").unwrap();
        assert_eq!(id, "2024-05-02");
    }

    #[test]
    fn missing_period_id_lists_keys() {
        let err = day_period_id("ST=1|PT=D").unwrap_err();
        assert!(matches!(err, FusionError::Parse { .. }));
        assert!(err.to_string().contains("ST, PT"));
    }

    #[test]
    fn grade_totals_parse() {
        let totals =
            parse_grade_totals("QT=2|G1NR=1|G1MN=10550.00|G1VO=85.20|G2NR=3|G2MN=7200.00")
                .unwrap();

        assert_eq!(
            totals,
            vec![
                GradeTotals {
                    grade: "1".into(),
                    money: Some("10550.00".into()),
                    volume: Some("85.20".into()),
                },
                GradeTotals { grade: "3".into(), money: Some("7200.00".into()), volume: None },
            ]
        );
    }

    #[test]
    fn tenth_grade_does_not_shadow_first() {
        let totals = parse_grade_totals("QT=1|G10NR=9|G1NR=1").unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].grade, "1");
    }

    #[test]
    fn missing_count_means_no_grades() {
        assert!(parse_grade_totals("G1NR=1|G1MN=5").unwrap().is_empty());
        assert!(parse_grade_totals("").unwrap().is_empty());
    }

    #[test]
    fn invalid_count_is_a_parse_error() {
        assert!(parse_grade_totals("QT=two").is_err());
    }

    proptest! {
        #[test]
        fn field_order_does_not_matter(
            grades in prop::collection::vec((1u32..100, 0u32..100_000, 0u32..1_000), 1..8),
            seed in any::<u64>()
        ) {
            let mut segments = vec![format!("QT={}", grades.len())];
            for (i, (nr, money, volume)) in grades.iter().enumerate() {
                let i = i + 1;
                segments.push(format!("G{}NR={}", i, nr));
                segments.push(format!("G{}MN={}", i, money));
                segments.push(format!("G{}VO={}", i, volume));
            }
            segments.push("PT=D".to_string());
            let len = segments.len();
            segments.rotate_left((seed as usize) % len);

            let totals = parse_grade_totals(&segments.join("|")).unwrap();

            prop_assert_eq!(totals.len(), grades.len());
            for (total, (nr, money, volume)) in totals.iter().zip(&grades) {
                prop_assert_eq!(&total.grade, &nr.to_string());
                let money = money.to_string();
                let volume = volume.to_string();
                prop_assert_eq!(total.money.as_deref(), Some(money.as_str()));
                prop_assert_eq!(total.volume.as_deref(), Some(volume.as_str()));
            }
        }
    }
}
