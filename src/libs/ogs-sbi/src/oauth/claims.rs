//! JWT claims of an NRF access token (3GPP TS 29.510 clause 6.3.5.2.4).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{PlmnId, Snssai};

/// Claims as the JSON object carried in the token payload
pub type ClaimSet = serde_json::Map<String, Value>;

pub const CLAIM_ISSUER: &str = "iss";
pub const CLAIM_SUBJECT: &str = "sub";
pub const CLAIM_AUDIENCE: &str = "aud";
pub const CLAIM_EXPIRATION: &str = "exp";
pub const CLAIM_SCOPE: &str = "scope";
pub const CLAIM_CONSUMER_PLMN_ID: &str = "consumerPlmnId";
pub const CLAIM_PRODUCER_PLMN_ID: &str = "producerPlmnId";
pub const CLAIM_PRODUCER_SNSSAI_LIST: &str = "producerSnssaiList";
pub const CLAIM_PRODUCER_NSI_LIST: &str = "producerNsiList";
pub const CLAIM_PRODUCER_NF_SET_ID: &str = "producerNfSetId";

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("missing scope claim")]
    MissingScope,

    #[error("scope claim is not a string")]
    ScopeNotString,

    #[error("malformed {claim} claim: {source}")]
    Malformed {
        claim: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode claims: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenClaims {
    /// NF instance id of the issuing authority
    pub iss: String,
    /// NF instance id of the consumer
    pub sub: String,
    /// Producer NF instance id or NF type
    pub aud: Vec<String>,
    pub scope: String,
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer_plmn_id: Option<PlmnId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer_plmn_id: Option<PlmnId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub producer_snssai_list: Vec<Snssai>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub producer_nsi_list: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub producer_nf_set_id: String,
}

impl AccessTokenClaims {
    /// Encode into the claim set consumed by the JWT signer. Optional claims
    /// are left out when absent or empty.
    pub fn to_claim_set(&self) -> Result<ClaimSet, ClaimsError> {
        match serde_json::to_value(self).map_err(ClaimsError::Encode)? {
            Value::Object(map) => Ok(map),
            other => Err(ClaimsError::Encode(serde::ser::Error::custom(format!(
                "claims serialized to {other} instead of an object"
            )))),
        }
    }

    /// Decode a verified claim set. `scope` is mandatory; other claims take
    /// their zero value when absent and fail with the claim name when present
    /// with the wrong shape.
    pub fn from_claim_set(set: &ClaimSet) -> Result<Self, ClaimsError> {
        let scope = match set.get(CLAIM_SCOPE) {
            None => return Err(ClaimsError::MissingScope),
            Some(Value::String(scope)) => scope.clone(),
            Some(_) => return Err(ClaimsError::ScopeNotString),
        };

        Ok(Self {
            iss: optional_claim(set, CLAIM_ISSUER)?.unwrap_or_default(),
            sub: optional_claim(set, CLAIM_SUBJECT)?.unwrap_or_default(),
            aud: optional_claim::<Audience>(set, CLAIM_AUDIENCE)?
                .map(Audience::into_vec)
                .unwrap_or_default(),
            scope,
            exp: optional_claim::<NumericDate>(set, CLAIM_EXPIRATION)?
                .map(|d| d.0)
                .unwrap_or_default(),
            consumer_plmn_id: optional_claim(set, CLAIM_CONSUMER_PLMN_ID)?,
            producer_plmn_id: optional_claim(set, CLAIM_PRODUCER_PLMN_ID)?,
            producer_snssai_list: optional_claim(set, CLAIM_PRODUCER_SNSSAI_LIST)?.unwrap_or_default(),
            producer_nsi_list: optional_claim(set, CLAIM_PRODUCER_NSI_LIST)?.unwrap_or_default(),
            producer_nf_set_id: optional_claim(set, CLAIM_PRODUCER_NF_SET_ID)?.unwrap_or_default(),
        })
    }
}

fn optional_claim<T: DeserializeOwned>(set: &ClaimSet, claim: &'static str) -> Result<Option<T>, ClaimsError> {
    match set.get(claim) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::deserialize(value)
            .map(Some)
            .map_err(|source| ClaimsError::Malformed { claim, source }),
    }
}

/// `aud` may be a single string or a list of strings (RFC 7519 4.1.3)
#[derive(Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(aud) => vec![aud],
            Self::Many(aud) => aud,
        }
    }
}

/// NumericDate, fractional seconds are truncated
struct NumericDate(i64);

impl<'de> Deserialize<'de> for NumericDate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(Self(value.trunc() as i64))
    }
}
