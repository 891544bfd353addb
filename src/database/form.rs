use std::str::FromStr;

use super::{error::Error, pagination::PageRequest};

/// Raw query pairs; keys may repeat (`?tags=a&tags=b`).
pub type FormData = Vec<(String, String)>;

pub struct Form {
    inner: FormData,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.inner
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.to_owned())
            .collect()
    }

    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, Error>
    where
        T: FromStr,
    {
        match self.get_str(key) {
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_e| Error::validation(key, "A valid integer is required")),
            None => Ok(None),
        }
    }

    pub fn get_flag(&self, key: &str) -> Result<bool, Error> {
        match self.get_str(key) {
            Some("1") | Some("true") | Some("True") => Ok(true),
            Some("0") | Some("false") | Some("False") | Some("") | None => Ok(false),
            Some(_) => Err(Error::validation(key, "A valid boolean is required")),
        }
    }

    pub fn page(&self) -> Result<PageRequest, Error> {
        Ok(PageRequest::new(
            self.get_number("page")?,
            self.get_number("limit")?,
        ))
    }
}
