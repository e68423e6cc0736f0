use std::collections::BTreeMap;

use serde::Serialize;
use time::Date;

use super::repo::{CartLine, CartOwner};

/// One consolidated line of the shopping list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Groups cart rows by (name, unit) and sums their amounts.
///
/// Lines come back sorted by name, then unit. The same name with a
/// different unit stays a separate line.
pub fn aggregate<I>(lines: I) -> Vec<ShoppingItem>
where
    I: IntoIterator<Item = CartLine>,
{
    let mut groups: BTreeMap<(String, String), i64> = BTreeMap::new();
    for line in lines {
        *groups
            .entry((line.name, line.measurement_unit))
            .or_insert(0) += i64::from(line.amount);
    }
    groups
        .into_iter()
        .map(|((name, measurement_unit), amount)| ShoppingItem {
            name,
            measurement_unit,
            amount,
        })
        .collect()
}

pub fn display_name(owner: &CartOwner) -> String {
    let full = format!("{} {}", owner.first_name.trim(), owner.last_name.trim());
    let full = full.trim();
    if full.is_empty() {
        owner.username.clone()
    } else {
        full.to_string()
    }
}

pub fn attachment_name(username: &str) -> String {
    format!("{}_shopping_list.txt", username)
}

/// Renders the downloadable text report.
pub fn render(owner_name: &str, today: Date, brand: &str, items: &[ShoppingItem]) -> String {
    let mut out = format!(
        "Shopping list for: {}\n\nDate: {:02}.{:02}.{}\n",
        owner_name,
        today.day(),
        u8::from(today.month()),
        today.year()
    );
    let body: Vec<String> = items
        .iter()
        .map(|i| format!("+ {} ({}) - {}", i.name, i.measurement_unit, i.amount))
        .collect();
    out.push_str(&body.join("\n"));
    out.push_str(&format!("\n\n{} ({})", brand, today.year()));
    out
}
