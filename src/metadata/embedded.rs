//! Metadata documents bundled with the binary.

/// Document names resolved per provider type.
pub mod file {
    /// Type key and field schemas.
    pub const CORE: &str = "core.json";
    /// Display label, description and icon.
    pub const UI: &str = "ui.json";
    /// Setup instructions.
    pub const INSTRUCTIONS: &str = "instructions.md";
    /// JSON Schema for `{config, credentials}`.
    pub const VALIDATION: &str = "validation.json";
}

macro_rules! bundle {
    ($provider:literal) => {
        [
            include_str!(concat!("providers/", $provider, "/core.json")),
            include_str!(concat!("providers/", $provider, "/ui.json")),
            include_str!(concat!("providers/", $provider, "/instructions.md")),
            include_str!(concat!("providers/", $provider, "/validation.json")),
        ]
    };
}

/// Provider types with bundled metadata.
pub const PROVIDER_TYPES: &[&str] = &[
    "webhook",
    "hookdeck",
    "rabbitmq",
    "aws_sqs",
    "aws_kinesis",
    "aws_s3",
    "azure_servicebus",
    "gcp_pubsub",
];

fn bundle(provider_type: &str) -> Option<[&'static str; 4]> {
    let documents = match provider_type {
        "webhook" => bundle!("webhook"),
        "hookdeck" => bundle!("hookdeck"),
        "rabbitmq" => bundle!("rabbitmq"),
        "aws_sqs" => bundle!("aws_sqs"),
        "aws_kinesis" => bundle!("aws_kinesis"),
        "aws_s3" => bundle!("aws_s3"),
        "azure_servicebus" => bundle!("azure_servicebus"),
        "gcp_pubsub" => bundle!("gcp_pubsub"),
        _ => return None,
    };
    Some(documents)
}

/// Returns the bundled document, if any.
pub fn document(provider_type: &str, name: &str) -> Option<&'static str> {
    let [core, ui, instructions, validation] = bundle(provider_type)?;
    match name {
        file::CORE => Some(core),
        file::UI => Some(ui),
        file::INSTRUCTIONS => Some(instructions),
        file::VALIDATION => Some(validation),
        _ => None,
    }
}
