use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Category;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CategoryCreate {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CategoryResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl CategoryResponse {
    pub(crate) fn from_db(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            description: category.description,
            is_active: category.is_active,
            created_at: format_primitive(category.created_at),
        }
    }
}
