use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// htsget ticket response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtsgetResponse {
    pub htsget: HtsgetResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtsgetResponseBody {
    pub format: Format,
    pub urls: Vec<UrlEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlEntry {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<DataClass>,
}

/// htsget error response
#[derive(Debug, Serialize)]
pub struct HtsgetError {
    pub htsget: HtsgetErrorBody,
}

#[derive(Debug, Serialize)]
pub struct HtsgetErrorBody {
    pub error: String,
    pub message: String,
}

/// File formats known to the htsnexus index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Format {
    Bam,
    Cram,
    Vcf,
    Bcf,
}

impl Format {
    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Bam => "application/vnd.ga4gh.bam",
            Format::Cram => "application/vnd.ga4gh.cram",
            Format::Vcf => "application/vnd.ga4gh.vcf",
            Format::Bcf => "application/vnd.ga4gh.bcf",
        }
    }

    pub fn is_reads(&self) -> bool {
        matches!(self, Format::Bam | Format::Cram)
    }

    pub fn is_variants(&self) -> bool {
        matches!(self, Format::Vcf | Format::Bcf)
    }

    /// Name used in the `htsfiles.format` column and in data URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Bam => "bam",
            Format::Cram => "cram",
            Format::Vcf => "vcf",
            Format::Bcf => "bcf",
        }
    }

    /// Parse a format name, case-insensitively.
    pub fn parse(s: &str) -> Option<Format> {
        match s.to_ascii_lowercase().as_str() {
            "bam" => Some(Format::Bam),
            "cram" => Some(Format::Cram),
            "vcf" => Some(Format::Vcf),
            "bcf" => Some(Format::Bcf),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data class - header only or full data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataClass {
    Body,
    Header,
}

impl DataClass {
    pub fn parse(s: &str) -> Option<DataClass> {
        match s {
            "header" => Some(DataClass::Header),
            "body" => Some(DataClass::Body),
            _ => None,
        }
    }
}

/// Raw ticket query parameters. Everything arrives as a string and is
/// validated by the server so that malformed values produce htsget errors.
#[derive(Debug, Deserialize, Default)]
pub struct TicketParams {
    pub format: Option<String>,
    pub class: Option<String>,
    #[serde(rename = "referenceName")]
    pub reference_name: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Service info response (GA4GH service-info)
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub r#type: ServiceType,
    pub description: Option<String>,
    pub organization: Organization,
    pub version: String,
    pub htsget: HtsgetCapabilities,
}

#[derive(Debug, Serialize)]
pub struct ServiceType {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct Organization {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct HtsgetCapabilities {
    pub datatype: String,
    pub formats: Vec<Format>,
    #[serde(rename = "fieldsParameterEffective")]
    pub fields_parameter_effective: bool,
    #[serde(rename = "tagsParametersEffective")]
    pub tags_parameters_effective: bool,
}
