use std::collections::HashMap;

use chrono::{Datelike, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    constants::{SHOPPING_LIST_RULE_WIDTH, SHOPPING_LIST_SIGNATURE, SHOPPING_LIST_TITLE},
    error::Error,
    jwt::SessionData,
    schema::{CartLine, Id},
    store::Store,
};

/// One ingredient of the shopping list, summed over the whole cart.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListEntry {
    pub name: String,
    pub amount: i64,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListDocument {
    pub file_name: String,
    pub content: String,
}

/// Groups lines by ingredient name and sums their amounts. The unit of the
/// first line seen for a name wins. Sorted by name.
pub fn aggregate_lines(lines: Vec<CartLine>) -> Vec<ShoppingListEntry> {
    let mut entries: HashMap<String, ShoppingListEntry> = HashMap::new();

    for line in lines {
        entries
            .entry(line.name.to_owned())
            .and_modify(|entry| entry.amount += i64::from(line.amount))
            .or_insert(ShoppingListEntry {
                name: line.name,
                amount: i64::from(line.amount),
                measurement_unit: line.measurement_unit,
            });
    }

    let mut entries: Vec<ShoppingListEntry> = entries.into_values().collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

pub async fn aggregate(user_id: Id, store: &dyn Store) -> Result<Vec<ShoppingListEntry>, Error> {
    Ok(aggregate_lines(store.cart_lines(user_id).await?))
}

/// Hex SHA-256 over the entries; identical lists hash identically.
pub fn content_hash(entries: &[ShoppingListEntry]) -> String {
    let mut hasher = Sha256::new();
    for entry in entries {
        hasher.update(entry.name.as_bytes());
        hasher.update([0]);
        hasher.update(entry.amount.to_string().as_bytes());
        hasher.update([0]);
        hasher.update(entry.measurement_unit.as_bytes());
        hasher.update([b'\n']);
    }

    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

pub fn file_name(entries: &[ShoppingListEntry]) -> String {
    let hash = content_hash(entries);
    format!("shopping_list_{}.txt", &hash[..16])
}

pub fn render(entries: &[ShoppingListEntry], year: i32) -> String {
    let mut content = format!("{SHOPPING_LIST_TITLE}\n\n");

    if entries.is_empty() {
        content.push_str("Your shopping cart is empty.\n");
    }
    for (index, entry) in entries.iter().enumerate() {
        content.push_str(&format!(
            "{}. {} - {} {}\n",
            index + 1,
            entry.name,
            entry.amount,
            entry.measurement_unit
        ));
    }

    content.push('\n');
    content.push_str(&"-".repeat(SHOPPING_LIST_RULE_WIDTH));
    content.push_str(&format!("\n{SHOPPING_LIST_SIGNATURE}, {year}\n"));
    content
}

/// The caller's cart as a downloadable plain-text document.
pub async fn export_shopping_list(
    session: &SessionData,
    store: &dyn Store,
) -> Result<ShoppingListDocument, Error> {
    let entries = aggregate(session.user_id, store).await?;
    log::debug!(
        "> Exporting {} shopping list entries for user {}",
        entries.len(),
        session.user_id
    );

    Ok(ShoppingListDocument {
        file_name: file_name(&entries),
        content: render(&entries, Utc::now().year()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actions::{recipes::tests::seed_recipe, users::tests::register},
        memory::MemoryStore,
        schema::Relation,
    };

    fn line(name: &str, amount: i32, unit: &str) -> CartLine {
        CartLine {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    fn entry(name: &str, amount: i64, unit: &str) -> ShoppingListEntry {
        ShoppingListEntry {
            name: name.to_string(),
            amount,
            measurement_unit: unit.to_string(),
        }
    }

    #[test]
    fn test_sums_by_name() {
        let lines = vec![
            line("flour", 200, "g"),
            line("flour", 300, "g"),
            line("egg", 2, "pcs"),
        ];
        assert_eq!(
            aggregate_lines(lines),
            vec![entry("egg", 2, "pcs"), entry("flour", 500, "g")]
        );
    }

    #[test]
    fn test_order_independent_and_first_unit_wins() {
        let a = aggregate_lines(vec![
            line("milk", 1, "l"),
            line("egg", 2, "pcs"),
            line("milk", 200, "ml"),
        ]);
        let b = aggregate_lines(vec![
            line("egg", 2, "pcs"),
            line("milk", 1, "l"),
            line("milk", 200, "ml"),
        ]);

        assert_eq!(a, b);
        assert_eq!(a[1], entry("milk", 201, "l"));
        assert_eq!(file_name(&a), file_name(&b));
        assert_ne!(file_name(&a), file_name(&a[..1]));
    }

    #[test]
    fn test_render() {
        let content = render(&[entry("egg", 2, "pcs"), entry("flour", 500, "g")], 2024);
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], SHOPPING_LIST_TITLE);
        assert_eq!(lines[2], "1. egg - 2 pcs");
        assert_eq!(lines[3], "2. flour - 500 g");
        assert_eq!(lines[5], "-".repeat(SHOPPING_LIST_RULE_WIDTH));
        assert_eq!(lines[6], format!("{SHOPPING_LIST_SIGNATURE}, 2024"));
    }

    #[test]
    fn test_file_name_shape() {
        let name = file_name(&[]);
        assert!(name.starts_with("shopping_list_"));
        assert!(name.ends_with(".txt"));
        assert_eq!(name.len(), "shopping_list_".len() + 16 + ".txt".len());
    }

    #[tokio::test]
    async fn test_export_from_cart() {
        let store = MemoryStore::new();
        let alice = register("alice", &store).await;
        let soup = seed_recipe(&alice, "Soup", &store).await;
        let stew = seed_recipe(&alice, "Stew", &store).await;
        for recipe in [soup, stew] {
            store
                .insert_pair(Relation::ShoppingCart, alice.user_id, recipe)
                .await
                .unwrap();
        }

        let entries = aggregate(alice.user_id, &store).await.unwrap();
        assert_eq!(
            entries,
            vec![entry("salt", 2, "g"), entry("water", 1000, "ml")]
        );

        let document = export_shopping_list(&alice, &store).await.unwrap();
        assert_eq!(document.file_name, file_name(&entries));
        assert!(document.content.contains("2. water - 1000 ml"));
    }
}
