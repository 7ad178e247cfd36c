mod validated_json;

pub use validated_json::{ValidatedJson, field_errors};
