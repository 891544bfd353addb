use csv::{ReaderBuilder, Trim};
use serde::{de::DeserializeOwned, Deserialize};

use super::{
    error::Error,
    schema::{NewIngredient, NewTag},
};

/*
Catalog seed files

name,measurement_unit
Cabbage,kg
"Salt, coarse",g

The header row is required and columns are matched by name. Values follow
the usual CSV quoting rules and are trimmed.
*/

#[derive(Deserialize, Debug)]
struct IngredientRecord {
    name: String,
    measurement_unit: String,
}

#[derive(Deserialize, Debug)]
struct TagRecord {
    name: String,
    color: String,
    slug: String,
}

fn invalid_file(e: csv::Error) -> Error {
    let message = match e.position() {
        Some(position) => format!("Line {}: {e}", position.line()),
        None => e.to_string(),
    };
    Error::validation("file", message)
}

pub fn parse_records<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes());
    let headers = reader.headers().map_err(invalid_file)?.clone();

    let mut records = vec![];
    for record in reader.records() {
        let record = record.map_err(invalid_file)?;
        if record.iter().any(str::is_empty) {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(Error::validation(
                "file",
                format!("Line {line}: values may not be blank"),
            ));
        }
        records.push(record.deserialize(Some(&headers)).map_err(invalid_file)?);
    }

    Ok(records)
}

pub fn parse_ingredients(text: &str) -> Result<Vec<NewIngredient>, Error> {
    Ok(parse_records::<IngredientRecord>(text)?
        .into_iter()
        .map(|record| NewIngredient {
            name: record.name,
            measurement_unit: record.measurement_unit,
        })
        .collect())
}

pub fn parse_tags(text: &str) -> Result<Vec<NewTag>, Error> {
    Ok(parse_records::<TagRecord>(text)?
        .into_iter()
        .map(|record| NewTag {
            name: record.name,
            color: record.color,
            slug: record.slug,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_ingredient_names() {
        let text = "name,measurement_unit\nCabbage, kg\n\n\"Salt, coarse\",g\n\"12\"\" pizza stone\",pcs\n";
        let ingredients = parse_ingredients(text).unwrap();

        assert_eq!(
            ingredients,
            vec![
                NewIngredient {
                    name: "Cabbage".to_string(),
                    measurement_unit: "kg".to_string(),
                },
                NewIngredient {
                    name: "Salt, coarse".to_string(),
                    measurement_unit: "g".to_string(),
                },
                NewIngredient {
                    name: "12\" pizza stone".to_string(),
                    measurement_unit: "pcs".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_tag_columns_are_matched_by_header() {
        let tags = parse_tags("\u{feff}slug,name,color\nbreakfast,Breakfast,#E26C2D\n").unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "Breakfast");
        assert_eq!(tags[0].color, "#E26C2D");
        assert_eq!(tags[0].slug, "breakfast");
    }

    #[test]
    fn test_malformed_records_are_reported() {
        for text in [
            "name,measurement_unit\nCabbage,kg\nPepper\n",
            "name,unit\nCabbage,kg\n",
        ] {
            match parse_ingredients(text) {
                Err(Error::Validation { field, .. }) => assert_eq!(field, "file"),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_blank_value_names_the_line() {
        match parse_ingredients("name,measurement_unit\nCabbage,kg\nPepper,\n") {
            Err(Error::Validation { field, message }) => {
                assert_eq!(field, "file");
                assert!(message.starts_with("Line 3"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
