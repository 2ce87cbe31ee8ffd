//! Package grouping and per-group limits.
//!
//! Folds one person's rows into choice groups keyed by the secondary
//! letter. Limits: one addon and one service item per group, at most two
//! distinct grouped-print codes, no multi-quantity addon/service items.
//! Choice groups accept and reject independently; a failure in one group
//! never discards the person's other groups.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::classify::{classify, normalize};
use crate::model::{
    Category, ChoiceGroup, LineItem, RawRow, RejectReason, RejectedEntry, Target,
};

/// Raw text attached to the synthesized per-group grouped item.
const COMBINED_GROUPED_TEXT: &str = "combined group prints";

#[derive(Debug, Default)]
pub struct GroupingOutput {
    pub groups: Vec<ChoiceGroup>,
    pub rejected: Vec<RejectedEntry>,
    /// Rows intentionally discarded with no error.
    pub ignored: usize,
}

#[derive(Debug, Default)]
struct GroupAccum {
    package_codes: String,
    has_package: bool,
    grouped_types: BTreeSet<String>,
    grouped_codes: String,
    has_addon: bool,
    has_service: bool,
    /// Addon/service items in encounter order.
    slot_items: Vec<(Category, String, String)>,
}

/// Fold one person's rows (input order) into choice groups.
pub fn group_and_limit(rows: &[RawRow]) -> GroupingOutput {
    let mut out = GroupingOutput::default();
    let mut accums: BTreeMap<Option<String>, GroupAccum> = BTreeMap::new();
    let mut seen: HashSet<(Option<String>, String)> = HashSet::new();

    for row in rows {
        let raw_text = row.payload.clone().unwrap_or_default();
        let classified = classify(&raw_text);

        if classified.category == Category::Ignored {
            out.ignored += 1;
            continue;
        }

        let secondary = row
            .secondary
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        if !seen.insert((secondary.clone(), normalize(&raw_text))) {
            out.rejected
                .push(RejectedEntry::new(row.clone(), RejectReason::DuplicateLineItem));
            continue;
        }

        if classified.category == Category::Unknown {
            out.rejected
                .push(RejectedEntry::new(row.clone(), RejectReason::UnrecognizedItem));
            continue;
        }

        let code = match classified.code {
            Some(code) => code,
            None => {
                out.rejected
                    .push(RejectedEntry::new(row.clone(), RejectReason::UnrecognizedItem));
                continue;
            }
        };

        let quantity = row.quantity.max(1);
        let accum = accums.entry(secondary).or_default();

        match classified.category {
            Category::Standard => {
                accum.package_codes.push_str(&code.repeat(quantity as usize));
                accum.has_package = true;
            }
            Category::Grouped => {
                if !accum.grouped_types.contains(code) && accum.grouped_types.len() >= 2 {
                    out.rejected
                        .push(RejectedEntry::new(row.clone(), RejectReason::TooManyGroupedTypes));
                    continue;
                }
                accum.grouped_types.insert(code.to_string());
                accum.grouped_codes.push_str(&code.repeat(quantity as usize));
            }
            Category::Addon | Category::Service => {
                if quantity > 1 {
                    out.rejected.push(RejectedEntry::new(
                        row.clone(),
                        RejectReason::QuantityNotAllowed {
                            category: classified.category,
                            quantity,
                        },
                    ));
                    continue;
                }
                let occupied = match classified.category {
                    Category::Addon => &mut accum.has_addon,
                    _ => &mut accum.has_service,
                };
                if *occupied {
                    out.rejected.push(RejectedEntry::new(
                        row.clone(),
                        RejectReason::DuplicateCategoryItem(classified.category),
                    ));
                    continue;
                }
                *occupied = true;
                accum
                    .slot_items
                    .push((classified.category, code.to_string(), raw_text.clone()));
            }
            // handled above
            Category::Ignored | Category::Unknown => {}
        }
    }

    out.groups = accums.into_iter().map(|(secondary, accum)| finalize(secondary, accum)).collect();
    out
}

/// Route the accumulated items and emit the finished group. The combined
/// grouped item is synthesized here so exactly one is emitted per group.
fn finalize(secondary: Option<String>, accum: GroupAccum) -> ChoiceGroup {
    let mut items: Vec<LineItem> = accum
        .slot_items
        .into_iter()
        .map(|(category, code, raw_text)| LineItem {
            code,
            category,
            target: match category {
                Category::Addon => Target::AddonSlot,
                _ => Target::ServiceSlot,
            },
            raw_text,
        })
        .collect();

    if !accum.grouped_codes.is_empty() {
        items.push(LineItem {
            code: accum.grouped_codes,
            category: Category::Grouped,
            target: if accum.has_package {
                Target::GroupWithPackage
            } else {
                Target::GroupAlone
            },
            raw_text: COMBINED_GROUPED_TEXT.into(),
        });
    }

    ChoiceGroup {
        secondary,
        package_codes: accum.package_codes,
        has_package: accum.has_package,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn item(n: usize, text: &str, secondary: Option<&str>, quantity: u32) -> RawRow {
        RawRow {
            row: n,
            person_key: "1001".into(),
            display_name: "Arafat".into(),
            payload: Some(text.into()),
            timestamp_raw: None,
            secondary: secondary.map(String::from),
            quantity,
            raw_fields: BTreeMap::new(),
        }
    }

    #[test]
    fn quantity_expands_standard_codes() {
        let out = group_and_limit(&[item(1, "3x5 Package", Some("a"), 2)]);
        assert_eq!(out.groups.len(), 1);
        assert_eq!(out.groups[0].package_codes, "ff");
        assert!(out.groups[0].has_package);
        assert!(out.rejected.is_empty());
    }

    #[test]
    fn service_routed_alongside_packages() {
        let out = group_and_limit(&[
            item(1, "3x5 Package", Some("a"), 1),
            item(2, "3x5 Package", Some("a"), 1),
            item(3, "Touch Up Photos", Some("a"), 1),
        ]);
        // second 3x5 row is an exact repeat → duplicate
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].reason, RejectReason::DuplicateLineItem);

        assert_eq!(out.groups.len(), 1);
        let group = &out.groups[0];
        assert_eq!(group.package_codes, "f");
        assert_eq!(group.items.len(), 1);
        assert_eq!(group.items[0].code, "Pending");
        assert_eq!(group.items[0].target, Target::ServiceSlot);
    }

    #[test]
    fn duplicate_requires_same_secondary_key() {
        let out = group_and_limit(&[
            item(1, "3x5 Package", Some("a"), 1),
            item(2, "3x5 Package", Some("b"), 1),
        ]);
        assert!(out.rejected.is_empty());
        assert_eq!(out.groups.len(), 2);
    }

    #[test]
    fn grouped_codes_accumulate_into_one_item() {
        let out = group_and_limit(&[
            item(1, "5” x 7” (127 x 178 mm) Group Print", Some("a"), 2),
            item(2, "8” x 10” (203 x 254 mm) Group Print", Some("a"), 1),
        ]);
        assert_eq!(out.groups.len(), 1);
        let group = &out.groups[0];
        assert_eq!(group.items.len(), 1);
        assert_eq!(group.items[0].code, "mml");
        assert_eq!(group.items[0].category, Category::Grouped);
        assert_eq!(group.items[0].target, Target::GroupAlone);
    }

    #[test]
    fn grouped_item_routes_with_package_when_present() {
        let out = group_and_limit(&[
            item(1, "Economy Package", Some("a"), 1),
            item(2, "5” x 7” Group Print", Some("a"), 1),
        ]);
        let group = &out.groups[0];
        assert_eq!(group.package_codes, "e");
        assert_eq!(group.items[0].target, Target::GroupWithPackage);
    }

    #[test]
    fn two_distinct_grouped_types_stay_within_cap() {
        let out = group_and_limit(&[
            item(1, "5” x 7” Group Print", Some("a"), 1),
            item(2, "8” x 10” Group Print", Some("a"), 1),
            item(3, "5” x 7” (127 x 178 mm) Group Print", Some("a"), 1),
        ]);
        // third row repeats a code under different raw text: not a
        // duplicate line, and the distinct set holds at two
        assert!(out.rejected.is_empty());
        assert_eq!(out.groups[0].items[0].code, "mlm");
    }

    #[test]
    fn addon_quantity_above_one_rejected() {
        let out = group_and_limit(&[item(1, "Photo CD", Some("a"), 2)]);
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(
            out.rejected[0].reason,
            RejectReason::QuantityNotAllowed { category: Category::Addon, quantity: 2 }
        );
    }

    #[test]
    fn second_addon_in_group_rejected() {
        let out = group_and_limit(&[
            item(1, "Photo CD", Some("a"), 1),
            item(2, "All 4 digital portraits in Hi-Resolution jpg format", Some("a"), 1),
        ]);
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(
            out.rejected[0].reason,
            RejectReason::DuplicateCategoryItem(Category::Addon)
        );
        assert_eq!(out.groups[0].items.len(), 1);
    }

    #[test]
    fn ignored_rows_are_silent_and_not_duplicates() {
        let out = group_and_limit(&[
            item(1, "No Photo Package Wanted", Some("a"), 1),
            item(2, "No Photo Package Wanted", Some("a"), 1),
        ]);
        assert!(out.rejected.is_empty());
        assert!(out.groups.is_empty());
        assert_eq!(out.ignored, 2);
    }

    #[test]
    fn unknown_item_rejected() {
        let out = group_and_limit(&[item(1, "Lost Order Form", Some("a"), 1)]);
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].reason, RejectReason::UnrecognizedItem);
        assert!(out.groups.is_empty());
    }

    #[test]
    fn missing_secondary_key_forms_implicit_group() {
        let out = group_and_limit(&[item(1, "8” x 10” Group Print", None, 1)]);
        assert_eq!(out.groups.len(), 1);
        assert!(out.groups[0].secondary.is_none());
        assert_eq!(out.groups[0].items[0].target, Target::GroupAlone);
    }

    #[test]
    fn implicit_group_sorts_before_lettered_groups() {
        let out = group_and_limit(&[
            item(1, "Economy Package", Some("b"), 1),
            item(2, "8” x 10” Group Print", None, 1),
        ]);
        assert_eq!(out.groups.len(), 2);
        assert!(out.groups[0].secondary.is_none());
        assert_eq!(out.groups[1].secondary.as_deref(), Some("b"));
    }
}
