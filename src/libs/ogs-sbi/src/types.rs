//! SBI Types and Constants
//!
//! NF types and service names accepted by the NRF access token service
//! (TS 29.510 clause 6.1.6.3), plus the PLMN and slice identifiers carried
//! in token requests and claims.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// NF types (TS 29.510 clause 6.1.6.3.3)
pub const NF_TYPES: &[&str] = &[
    "NRF", "UDM", "AMF", "SMF", "AUSF", "NEF", "PCF", "SMSF", "NSSF", "UDR", "LMF", "GMLC",
    "5G_EIR", "SEPP", "UPF", "N3IWF", "AF", "UDSF", "BSF", "CHF", "NWDAF", "PCSCF", "HSS",
    "UCMF", "SOR_AF", "SPAF", "MME", "SCSAS", "SCEF", "SCP", "NSSAAF", "ICSCF", "SCSCF",
];

/// Service names (TS 29.510 clause 6.1.6.3.11)
pub const SERVICE_NAMES: &[&str] = &[
    "nnrf-nfm",
    "nnrf-disc",
    "nnrf-oauth2",
    "nudm-sdm",
    "nudm-uecm",
    "nudm-ueau",
    "nudm-ee",
    "nudm-pp",
    "nudm-niddau",
    "nudm-mt",
    "namf-comm",
    "namf-evts",
    "namf-mt",
    "namf-loc",
    "nsmf-pdusession",
    "nsmf-event-exposure",
    "nsmf-nidd",
    "nausf-auth",
    "nausf-sorprotection",
    "nausf-upuprotection",
    "nnef-pfdmanagement",
    "nnef-smcontext",
    "nnef-eventexposure",
    "npcf-am-policy-control",
    "npcf-smpolicycontrol",
    "npcf-policyauthorization",
    "npcf-bdtpolicycontrol",
    "npcf-eventexposure",
    "npcf-ue-policy-control",
    "nsmsf-sms",
    "nnssf-nsselection",
    "nnssf-nssaiavailability",
    "nudr-dr",
    "nudr-group-id-map",
    "nlmf-loc",
    "n5g-eir-eica",
    "nbsf-management",
    "nchf-spendinglimitcontrol",
    "nchf-convergedcharging",
    "nchf-offlineonlycharging",
    "nnwdaf-eventssubscription",
    "nnwdaf-analyticsinfo",
    "ngmlc-loc",
    "nucmf-provisioning",
    "nucmf-uecapabilitymanagement",
    "nhss-sdm",
    "nhss-uecm",
    "nhss-ueau",
    "nhss-ee",
    "nhss-ims-sdm",
    "nhss-ims-uecm",
    "nhss-ims-ueau",
    "nsepp-telescopic",
    "nsoraf-sor",
    "nspaf-secured-packed",
    "nudsf-dr",
    "nnssaaf-nssaa",
];

fn nf_type_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| NF_TYPES.iter().copied().collect())
}

fn service_name_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| SERVICE_NAMES.iter().copied().collect())
}

/// Exact, case-sensitive membership in the NF type set.
pub fn is_valid_nf_type(nf_type: &str) -> bool {
    nf_type_set().contains(nf_type)
}

/// Exact, case-sensitive membership in the service name set.
pub fn is_valid_service_name(service_name: &str) -> bool {
    service_name_set().contains(service_name)
}

/// PLMN identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlmnId {
    pub mcc: String,
    pub mnc: String,
}

impl PlmnId {
    pub fn new(mcc: impl Into<String>, mnc: impl Into<String>) -> Self {
        Self {
            mcc: mcc.into(),
            mnc: mnc.into(),
        }
    }
}

/// S-NSSAI
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Snssai {
    pub sst: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sd: Option<String>,
}

impl Snssai {
    pub fn new(sst: u8, sd: Option<String>) -> Self {
        Self { sst, sd }
    }
}

/// PLMN identity of a stand-alone non-public network
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlmnIdNid {
    pub mcc: String,
    pub mnc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nid: Option<String>,
}

/// URI Scheme - matches OpenAPI_uri_scheme_e
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UriScheme {
    #[default]
    Http,
    Https,
}

impl UriScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

impl FromStr for UriScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(format!("unsupported URI scheme: {other}")),
        }
    }
}

impl fmt::Display for UriScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nf_type_membership() {
        assert_eq!(NF_TYPES.len(), 33);
        assert!(is_valid_nf_type("AMF"));
        assert!(is_valid_nf_type("5G_EIR"));
        assert!(is_valid_nf_type("SOR_AF"));
        assert!(!is_valid_nf_type("amf"));
        assert!(!is_valid_nf_type(" AMF"));
        assert!(!is_valid_nf_type(""));
    }

    #[test]
    fn test_service_name_membership() {
        assert_eq!(SERVICE_NAMES.len(), 57);
        assert!(is_valid_service_name("namf-comm"));
        assert!(is_valid_service_name("nnrf-oauth2"));
        assert!(is_valid_service_name("nnssaaf-nssaa"));
        assert!(!is_valid_service_name("NAMF-COMM"));
        assert!(!is_valid_service_name("namf-comm "));
        assert!(!is_valid_service_name("namf-oam"));
    }

    #[test]
    fn test_snssai_serialization() {
        let json = serde_json::to_string(&Snssai::new(1, None)).unwrap();
        assert_eq!(json, r#"{"sst":1}"#);

        let parsed: Snssai = serde_json::from_str(r#"{"sst":2,"sd":"000001"}"#).unwrap();
        assert_eq!(parsed, Snssai::new(2, Some("000001".into())));

        assert!(serde_json::from_str::<Snssai>(r#"{"sst":256}"#).is_err());
    }

    #[test]
    fn test_uri_scheme() {
        assert_eq!(UriScheme::Http.as_str(), "http");
        assert_eq!(UriScheme::Https.default_port(), 443);
        assert_eq!("https".parse::<UriScheme>(), Ok(UriScheme::Https));
        assert!("ftp".parse::<UriScheme>().is_err());
    }
}
