//! Human-readable descriptions of payout account requirement codes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A requirement code paired with a description suitable for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DescribedRequirement {
    pub code: String,
    pub description: String,
}

impl DescribedRequirement {
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        let description = describe_requirement(&code);
        Self { code, description }
    }
}

/// Describe a gateway requirement code.
///
/// Known codes map to fixed text; unknown codes fall back to the last path
/// segment with underscores replaced by spaces.
pub fn describe_requirement(code: &str) -> String {
    let known = match code {
        "external_account" => Some("Bank account for payouts"),
        "business_type" => Some("Business type"),
        "business_profile.url" => Some("Business website"),
        "business_profile.mcc" => Some("Business category"),
        "business_profile.product_description" => Some("Description of products or services"),
        "tos_acceptance.date" | "tos_acceptance.ip" => Some("Terms of service acceptance"),
        "individual.first_name" => Some("First name"),
        "individual.last_name" => Some("Last name"),
        "individual.email" => Some("Email address"),
        "individual.phone" => Some("Phone number"),
        "individual.dob.day" | "individual.dob.month" | "individual.dob.year" => {
            Some("Date of birth")
        }
        "individual.ssn_last_4" => Some("Last 4 digits of SSN"),
        "individual.id_number" => Some("Government ID number"),
        "individual.address.line1" => Some("Street address"),
        "individual.address.city" => Some("City"),
        "individual.address.state" => Some("State"),
        "individual.address.postal_code" => Some("Postal code"),
        "individual.verification.document" => Some("Identity document"),
        "individual.verification.additional_document" => Some("Additional identity document"),
        _ => None,
    };

    match known {
        Some(text) => text.to_string(),
        None => {
            let tail = code.rsplit('.').next().unwrap_or(code);
            let spaced = tail.replace('_', " ");
            let mut chars = spaced.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// Describe every code in a list, preserving order.
pub fn describe_all<'a>(codes: impl IntoIterator<Item = &'a String>) -> Vec<DescribedRequirement> {
    codes.into_iter().map(|c| DescribedRequirement::new(c.as_str())).collect()
}
