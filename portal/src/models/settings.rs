//! Scoring configuration chosen by the user and the outbound request.
//!
//! Field names and enum spellings follow the scoring backend's JSON
//! contract (`aggregation_method`, `filter_time_frame`, `"WATS"`, `"s1s2"`...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Record;

// =============================================================================
// Enumerations
// =============================================================================

/// Portfolio aggregation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregationMethod {
    /// Weighted average temperature score.
    Wats,
    /// Total emissions weighted temperature score.
    Tets,
    /// Market-owned emissions weighted temperature score.
    Mots,
    /// Enterprise-owned emissions weighted temperature score.
    Eots,
    /// EV + cash owned emissions weighted temperature score.
    Ecots,
    /// Total-assets owned emissions weighted temperature score.
    Aots,
    /// Revenue owned emissions weighted temperature score.
    Rots,
}

impl AggregationMethod {
    pub const ALL: [AggregationMethod; 7] = [
        Self::Wats,
        Self::Tets,
        Self::Mots,
        Self::Eots,
        Self::Ecots,
        Self::Aots,
        Self::Rots,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wats => "WATS",
            Self::Tets => "TETS",
            Self::Mots => "MOTS",
            Self::Eots => "EOTS",
            Self::Ecots => "ECOTS",
            Self::Aots => "AOTS",
            Self::Rots => "ROTS",
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| format!("unknown aggregation method '{}'", s))
    }
}

/// Target time frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFrame {
    Short,
    Mid,
    Long,
}

impl TimeFrame {
    pub const ALL: [TimeFrame; 3] = [Self::Short, Self::Mid, Self::Long];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Mid => "mid",
            Self::Long => "long",
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "mid" => Ok(Self::Mid),
            "long" => Ok(Self::Long),
            _ => Err(format!("unknown time frame '{}'", s)),
        }
    }
}

/// Emission scope category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeCategory {
    S1S2,
    S3,
    S1S2S3,
}

impl ScopeCategory {
    pub const ALL: [ScopeCategory; 3] = [Self::S1S2, Self::S3, Self::S1S2S3];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S1S2 => "s1s2",
            Self::S3 => "s3",
            Self::S1S2S3 => "s1s2s3",
        }
    }
}

impl fmt::Display for ScopeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('+', "");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown scope category '{}'", s))
    }
}

// =============================================================================
// Scenarios
// =============================================================================

/// What-if scenario, sent to the backend as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ScenarioNumber {
    /// All companies set targets.
    Targets = 1,
    /// All companies with targets get them approved.
    ApprovedTargets = 2,
    /// The highest contributors set targets.
    HighestContributors = 3,
    /// The highest contributors get their targets approved.
    HighestContributorsApproved = 4,
}

impl TryFrom<u8> for ScenarioNumber {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Targets),
            2 => Ok(Self::ApprovedTargets),
            3 => Ok(Self::HighestContributors),
            4 => Ok(Self::HighestContributorsApproved),
            other => Err(format!("unknown scenario number {}", other)),
        }
    }
}

impl From<ScenarioNumber> for u8 {
    fn from(number: ScenarioNumber) -> Self {
        number as u8
    }
}

impl FromStr for ScenarioNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u8 = s
            .trim()
            .parse()
            .map_err(|_| format!("scenario must be a number, got '{}'", s))?;
        Self::try_from(value)
    }
}

/// How the portfolio holder engages companies in a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngagementType {
    SetTargets,
    SetSbtiTargets,
}

impl FromStr for EngagementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SET_TARGETS" => Ok(Self::SetTargets),
            "SET_SBTI_TARGETS" => Ok(Self::SetSbtiTargets),
            _ => Err(format!("unknown engagement type '{}'", s)),
        }
    }
}

/// Optional what-if parameters. Passed to the backend uninterpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub number: ScenarioNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_type: Option<EngagementType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_cap: Option<f64>,
}

impl Scenario {
    pub fn new(number: ScenarioNumber) -> Self {
        Self {
            number,
            engagement_type: None,
            score_cap: None,
        }
    }
}

// =============================================================================
// Settings and Request
// =============================================================================

/// A data provider known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataProvider {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Everything the user selects besides the portfolio itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringSettings {
    pub aggregation_method: AggregationMethod,
    #[serde(default)]
    pub data_providers: Vec<String>,
    #[serde(default)]
    pub filter_scope_category: Vec<ScopeCategory>,
    #[serde(default)]
    pub filter_time_frame: Vec<TimeFrame>,
    #[serde(default)]
    pub include_columns: Vec<String>,
    #[serde(default)]
    pub grouping_columns: Vec<String>,
    /// Score for companies without a disclosed target.
    #[serde(default = "default_score")]
    pub default_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<Scenario>,
}

fn default_score() -> f64 {
    crate::config::DEFAULT_SCORE
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            aggregation_method: AggregationMethod::Wats,
            data_providers: Vec::new(),
            filter_scope_category: Vec::new(),
            filter_time_frame: Vec::new(),
            include_columns: Vec::new(),
            grouping_columns: Vec::new(),
            default_score: default_score(),
            scenario: None,
        }
    }
}

/// Body posted to the scoring endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRequest {
    #[serde(flatten)]
    pub settings: ScoringSettings,
    pub companies: Vec<Record>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enum_spellings() {
        assert_eq!(serde_json::to_value(AggregationMethod::Ecots).unwrap(), "ECOTS");
        assert_eq!(serde_json::to_value(ScopeCategory::S1S2S3).unwrap(), "s1s2s3");
        assert_eq!(serde_json::to_value(TimeFrame::Mid).unwrap(), "mid");
        assert_eq!(
            serde_json::to_value(EngagementType::SetSbtiTargets).unwrap(),
            "SET_SBTI_TARGETS"
        );
    }

    #[test]
    fn test_from_str_is_lenient_on_case() {
        assert_eq!("rots".parse::<AggregationMethod>().unwrap(), AggregationMethod::Rots);
        assert_eq!("S1+S2".parse::<ScopeCategory>().unwrap(), ScopeCategory::S1S2);
        assert_eq!("LONG".parse::<TimeFrame>().unwrap(), TimeFrame::Long);
        assert!("XATS".parse::<AggregationMethod>().is_err());
    }

    #[test]
    fn test_scenario_number_as_integer() {
        let scenario = Scenario {
            number: ScenarioNumber::HighestContributors,
            engagement_type: Some(EngagementType::SetTargets),
            score_cap: None,
        };
        let value = serde_json::to_value(&scenario).unwrap();
        assert_eq!(value, json!({"number": 3, "engagement_type": "SET_TARGETS"}));

        let back: Scenario = serde_json::from_value(json!({"number": 2, "score_cap": 1.75})).unwrap();
        assert_eq!(back.number, ScenarioNumber::ApprovedTargets);
        assert_eq!(back.score_cap, Some(1.75));

        assert!(serde_json::from_value::<Scenario>(json!({"number": 9})).is_err());
    }

    #[test]
    fn test_request_flattens_settings() {
        let request = ScoringRequest {
            settings: ScoringSettings {
                filter_time_frame: vec![TimeFrame::Short],
                ..ScoringSettings::default()
            },
            companies: vec![json!({"company_id": "A"}).as_object().unwrap().clone()],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["aggregation_method"], "WATS");
        assert_eq!(value["filter_time_frame"], json!(["short"]));
        assert_eq!(value["default_score"], 3.2);
        assert_eq!(value["companies"][0]["company_id"], "A");
        assert!(value.get("scenario").is_none());
    }

    #[test]
    fn test_settings_defaults_when_missing() {
        let settings: ScoringSettings =
            serde_json::from_value(json!({"aggregation_method": "TETS"})).unwrap();
        assert_eq!(settings.aggregation_method, AggregationMethod::Tets);
        assert_eq!(settings.default_score, 3.2);
        assert!(settings.filter_scope_category.is_empty());
    }
}
