use serde_json::{Map, Value};

/// Key under which the store keeps the document identifier
pub const ID_KEY: &str = "_id";
pub const PRODUCT_ID_KEY: &str = "productId";
pub const SUGGESTION_ID_KEY: &str = "suggestionId";
pub const CATEGORY_ID_KEY: &str = "categoryId";

/// Raised when a recommendation payload cannot be accepted
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid recommendation: missing {0}")]
    MissingField(&'static str),

    #[error("Invalid recommendation: {0} must be a string or null")]
    WrongType(&'static str),

    #[error("Invalid recommendation: body of request contained bad or no data")]
    NotAnObject,

    #[error("productId attribute is not set")]
    ProductIdNotSet,
}

/// A product-to-suggestion recommendation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recommendation {
    /// Store-assigned document id, `None` until the record is created
    pub id: Option<String>,
    pub product_id: Option<String>,
    pub suggestion_id: Option<String>,
    pub category_id: Option<String>,
}

impl Recommendation {
    /// Creates an unsaved recommendation for a product
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: Some(product_id.into()),
            ..Self::default()
        }
    }

    pub fn with_suggestion(mut self, suggestion_id: impl Into<String>) -> Self {
        self.suggestion_id = Some(suggestion_id.into());
        self
    }

    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    /// Serializes the recommendation into a document mapping
    ///
    /// Unset optional fields are written as `null` so the mapping always
    /// deserializes back into an equal record.
    pub fn serialize(&self) -> Map<String, Value> {
        let mut document = Map::new();
        document.insert(PRODUCT_ID_KEY.to_string(), optional(&self.product_id));
        document.insert(SUGGESTION_ID_KEY.to_string(), optional(&self.suggestion_id));
        document.insert(CATEGORY_ID_KEY.to_string(), optional(&self.category_id));
        if let Some(id) = &self.id {
            document.insert(ID_KEY.to_string(), Value::String(id.clone()));
        }
        document
    }

    /// Populates the recommendation from a document mapping
    ///
    /// All three field keys must be present. Nothing is modified when
    /// validation fails. An id already held by the record is kept; otherwise
    /// a string `_id` in `data` is adopted.
    pub fn deserialize(&mut self, data: &Value) -> Result<&mut Self, ValidationError> {
        tracing::debug!(data = %data, "Deserializing recommendation");

        let fields = data.as_object().ok_or(ValidationError::NotAnObject)?;
        let product_id = required_field(fields, PRODUCT_ID_KEY)?;
        let suggestion_id = required_field(fields, SUGGESTION_ID_KEY)?;
        let category_id = required_field(fields, CATEGORY_ID_KEY)?;

        self.product_id = product_id;
        self.suggestion_id = suggestion_id;
        self.category_id = category_id;

        if self.id.is_none() {
            if let Some(Value::String(id)) = fields.get(ID_KEY) {
                self.id = Some(id.clone());
            }
        }

        Ok(self)
    }

    /// Replaces suggestion and category from an update payload
    ///
    /// `productId` and `_id` in the payload are ignored.
    pub fn replace_details(&mut self, data: &Value) -> Result<&mut Self, ValidationError> {
        let fields = data.as_object().ok_or(ValidationError::NotAnObject)?;
        let suggestion_id = required_field(fields, SUGGESTION_ID_KEY)?;
        let category_id = required_field(fields, CATEGORY_ID_KEY)?;

        self.suggestion_id = suggestion_id;
        self.category_id = category_id;
        Ok(self)
    }

    /// Checks the record can be persisted
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.product_id.as_deref() {
            Some(product_id) if !product_id.is_empty() => Ok(()),
            _ => Err(ValidationError::ProductIdNotSet),
        }
    }
}

/// Reads the replacement category from a bulk category update payload
pub fn category_from(data: &Value) -> Result<Option<String>, ValidationError> {
    let fields = data.as_object().ok_or(ValidationError::NotAnObject)?;
    required_field(fields, CATEGORY_ID_KEY)
}

fn optional(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

fn required_field(
    fields: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>, ValidationError> {
    match fields.get(key) {
        None => Err(ValidationError::MissingField(key)),
        Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(ValidationError::WrongType(key)),
    }
}
