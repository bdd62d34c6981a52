use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Entity not found: {entity_type} {key}")]
    NotFound { entity_type: String, key: String },

    #[error("Duplicate entry: {entity_type} {key}")]
    Duplicate { entity_type: String, key: String },

    /// The backend does not support this mutation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl CatalogError {
    pub fn not_found(entity_type: &str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            key: key.into(),
        }
    }

    pub fn duplicate(entity_type: &str, key: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type: entity_type.to_string(),
            key: key.into(),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
