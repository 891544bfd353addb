pub const PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const RECIPE_NAME_MAX_LENGTH: usize = 200;
pub const USER_NAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;

pub const AUTH_HEADER_PREFIX: &str = "Token ";

pub const SHOPPING_LIST_TITLE: &str = "Shopping list";
pub const SHOPPING_LIST_SIGNATURE: &str = "Thank you for using Foodgram";
pub const SHOPPING_LIST_RULE_WIDTH: usize = 50;

pub const IMAGE_DIRECTORY: &str = "recipes";
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

pub const RECIPE_CACHE_BIND_KEY: &str = "recipe-cache-key";

pub const MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;
