use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Trait for types the model is forced to emit through tool-use.
///
/// Automatically implemented for any type that implements
/// `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// JSON schema sent as the forced tool's `input_schema`.
    fn input_schema() -> serde_json::Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("$schema");
        }

        value
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct Sample {
        #[allow(dead_code)]
        name: String,
        #[allow(dead_code)]
        count: u32,
    }

    #[test]
    fn schema_has_properties_and_no_meta() {
        let schema = Sample::input_schema();
        assert!(schema.get("$schema").is_none());
        assert!(schema["properties"].get("name").is_some());
        assert!(schema["properties"].get("count").is_some());
    }
}
