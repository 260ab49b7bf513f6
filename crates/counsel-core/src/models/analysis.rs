use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Classification of an analyzed document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Contract,
    CourtFiling,
    Correspondence,
    EmploymentRecord,
    Evidence,
    Identification,
    #[default]
    Other,
}

/// Broad category of legal case a document suggests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    EmploymentDispute,
    ContractDispute,
    HousingDispute,
    ConsumerDispute,
    PersonalInjury,
    FamilyLaw,
    Immigration,
    #[default]
    Other,
}

impl CaseType {
    pub fn display_name(&self) -> &'static str {
        match self {
            CaseType::EmploymentDispute => "Employment dispute",
            CaseType::ContractDispute => "Contract dispute",
            CaseType::HousingDispute => "Housing dispute",
            CaseType::ConsumerDispute => "Consumer dispute",
            CaseType::PersonalInjury => "Personal injury",
            CaseType::FamilyLaw => "Family law",
            CaseType::Immigration => "Immigration",
            CaseType::Other => "Other",
        }
    }
}

/// A case proposal inferred from document analysis. Not yet persisted; the
/// coordinator decides whether it becomes a case record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuggestedCase {
    pub title: String,
    pub case_type: CaseType,
    pub description: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub field_confidences: HashMap<String, f32>,
}

/// Everything the analyzer extracted from one document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentAnalysisResult {
    pub extracted_text: String,
    #[serde(default)]
    pub key_facts: Vec<String>,
    #[serde(default)]
    pub dates_found: Vec<String>,
    #[serde(default)]
    pub parties_identified: Vec<String>,
    #[serde(default)]
    pub document_type: DocumentType,
    /// Analyzer confidence in the extraction as a whole, in [0, 1].
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_case: Option<SuggestedCase>,
}
