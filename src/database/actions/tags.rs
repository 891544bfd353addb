use std::sync::OnceLock;

use regex::Regex;

use crate::{
    error::Error,
    records::parse_tags,
    schema::{Id, NewTag, Tag},
    store::Store,
};

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug pattern"))
}

fn color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid color pattern"))
}

pub async fn list_tags(store: &dyn Store) -> Result<Vec<Tag>, Error> {
    store.list_tags().await
}

pub async fn get_tag(id: Id, store: &dyn Store) -> Result<Tag, Error> {
    store
        .get_tag(id)
        .await?
        .ok_or_else(|| Error::not_found("Tag does not exist"))
}

fn validate_tag(tag: &NewTag) -> Result<(), Error> {
    if !color_pattern().is_match(&tag.color) {
        return Err(Error::validation(
            "color",
            format!("{}: expected a hex color such as #E26C2D", tag.color),
        ));
    }
    if !slug_pattern().is_match(&tag.slug) {
        return Err(Error::validation(
            "slug",
            format!("{}: letters, digits, - and _ only", tag.slug),
        ));
    }
    Ok(())
}

/// Loads `name,color,slug` lines; tags clashing with existing ones are
/// skipped. Returns how many were created.
pub async fn import_tags(text: &str, store: &dyn Store) -> Result<u64, Error> {
    let tags = parse_tags(text)?;
    for tag in tags.iter() {
        validate_tag(tag)?;
    }

    let mut created = 0;
    for tag in tags {
        let name = tag.name.to_owned();
        match store.create_tag(tag).await {
            Ok(_) => created += 1,
            Err(Error::Conflict(_)) => log::warn!("> Skipped duplicate tag {name}"),
            Err(e) => return Err(e),
        }
    }
    log::info!("> Imported {created} tags");

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn test_import_skips_duplicates() {
        let store = MemoryStore::new();
        let text = "name,color,slug\nBreakfast,#E26C2D,breakfast\nLunch,#49B64E,lunch\n";

        assert_eq!(import_tags(text, &store).await.unwrap(), 2);
        assert_eq!(import_tags(text, &store).await.unwrap(), 0);

        let tags = list_tags(&store).await.unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(get_tag(tags[1].id, &store).await.unwrap().slug, "lunch");
    }

    #[tokio::test]
    async fn test_import_validates_before_writing() {
        let store = MemoryStore::new();
        let text = "name,color,slug\nBreakfast,#E26C2D,breakfast\nLunch,green,lunch\n";

        match import_tags(text, &store).await {
            Err(Error::Validation { field, .. }) => assert_eq!(field, "color"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(list_tags(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_tag() {
        let store = MemoryStore::new();
        assert!(matches!(
            get_tag(1, &store).await,
            Err(Error::NotFound(_))
        ));
    }
}
