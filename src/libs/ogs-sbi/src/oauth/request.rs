//! OAuth2 access token request per RFC 6749 Section 4.4.2 and 3GPP TS 29.510
//! clause 6.3.5.2.3.
//!
//! The canonical encoding is `application/x-www-form-urlencoded`. Nested
//! values use dotted keys: `targetPlmn.mcc=001` for a single object,
//! `requesterSnssaiList.0.sst=1` for a list of objects and
//! `targetNsiList.0=nsi-a` for a list of strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::APPLICATION_JSON;
use crate::oauth::error::{AccessTokenError, AccessTokenErrorCode};
use crate::types::{is_valid_nf_type, is_valid_service_name, PlmnId, PlmnIdNid, Snssai};

pub const GRANT_TYPE_CLIENT_CREDENTIALS: &str = "client_credentials";

/// Reasons a token request is rejected
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("the grant_type {0:?} is not client_credentials")]
    UnsupportedGrantType(String),

    #[error("missing nfInstanceId")]
    MissingNfInstanceId,

    #[error("not a valid scope {0:?}")]
    InvalidScope(String),

    #[error("malformed form body: {0}")]
    MalformedForm(String),

    #[error("malformed JSON body: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

impl RequestError {
    pub fn error_code(&self) -> AccessTokenErrorCode {
        match self {
            Self::UnsupportedGrantType(_) => AccessTokenErrorCode::UnsupportedGrantType,
            Self::InvalidScope(_) => AccessTokenErrorCode::InvalidScope,
            Self::MissingNfInstanceId | Self::MalformedForm(_) | Self::MalformedJson(_) => {
                AccessTokenErrorCode::InvalidRequest
            }
        }
    }

    /// Structured body for the 400 reply
    pub fn to_access_token_error(&self) -> AccessTokenError {
        AccessTokenError::new(self.error_code()).with_description(self.to_string())
    }
}

/// Access token request. Optional strings and lists are empty when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccessTokenRequest {
    #[serde(rename = "grant_type")]
    pub grant_type: String,
    pub nf_instance_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub nf_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target_nf_type: String,
    #[serde(alias = "targetNfInstanceID", skip_serializing_if = "String::is_empty")]
    pub target_nf_instance_id: String,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_plmn: Option<PlmnId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requester_plmn_list: Vec<PlmnId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requester_snssai_list: Vec<Snssai>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub requester_fqdn: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requester_snpn_list: Vec<PlmnIdNid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_plmn: Option<PlmnId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub target_snssai_list: Vec<Snssai>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub target_nsi_list: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target_nf_set_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target_nf_service_set_id: String,
}

impl AccessTokenRequest {
    /// Client credentials request addressed by NF type
    pub fn by_type(
        nf_instance_id: impl Into<String>,
        nf_type: impl Into<String>,
        target_nf_type: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            grant_type: GRANT_TYPE_CLIENT_CREDENTIALS.to_string(),
            nf_instance_id: nf_instance_id.into(),
            nf_type: nf_type.into(),
            target_nf_type: target_nf_type.into(),
            scope: scope.into(),
            ..Default::default()
        }
    }

    pub fn with_target_nf_instance_id(mut self, id: impl Into<String>) -> Self {
        self.target_nf_instance_id = id.into();
        self
    }

    /// Check the mandatory fields: grant type, consumer instance id and a
    /// known service name as scope.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.grant_type != GRANT_TYPE_CLIENT_CREDENTIALS {
            return Err(RequestError::UnsupportedGrantType(self.grant_type.clone()));
        }
        if self.nf_instance_id.is_empty() {
            return Err(RequestError::MissingNfInstanceId);
        }
        if !is_valid_service_name(&self.scope) {
            return Err(RequestError::InvalidScope(self.scope.clone()));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                log::error!("{e}");
                false
            }
        }
    }

    /// True when both nfType and targetNfType are set and known. Only such
    /// requests take part in token caching and claims construction.
    pub fn is_request_by_type(&self) -> bool {
        if self.nf_type.is_empty() || self.target_nf_type.is_empty() {
            return false;
        }
        if !is_valid_nf_type(&self.nf_type) {
            log::error!("Invalid nfType {}", self.nf_type);
            return false;
        }
        if !is_valid_nf_type(&self.target_nf_type) {
            log::error!("Invalid targetNfType {}", self.target_nf_type);
            return false;
        }
        true
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, RequestError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Decode a body by its content type: JSON when the content type names
    /// `application/json`, form encoding otherwise.
    pub fn decode(content_type: Option<&str>, body: &[u8]) -> Result<Self, RequestError> {
        match content_type {
            Some(ct) if ct.contains(APPLICATION_JSON) => Self::from_json(body),
            _ => Self::from_form(body),
        }
    }

    /// Encode as `application/x-www-form-urlencoded`
    pub fn to_form(&self) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());

        form.append_pair("grant_type", &self.grant_type);
        form.append_pair("nfInstanceId", &self.nf_instance_id);
        append_non_empty(&mut form, "nfType", &self.nf_type);
        append_non_empty(&mut form, "targetNfType", &self.target_nf_type);
        append_non_empty(&mut form, "targetNfInstanceId", &self.target_nf_instance_id);
        form.append_pair("scope", &self.scope);

        if let Some(plmn) = &self.requester_plmn {
            append_plmn(&mut form, "requesterPlmn", plmn);
        }
        for (i, plmn) in self.requester_plmn_list.iter().enumerate() {
            append_plmn(&mut form, &format!("requesterPlmnList.{i}"), plmn);
        }
        for (i, snssai) in self.requester_snssai_list.iter().enumerate() {
            append_snssai(&mut form, &format!("requesterSnssaiList.{i}"), snssai);
        }
        append_non_empty(&mut form, "requesterFqdn", &self.requester_fqdn);
        for (i, snpn) in self.requester_snpn_list.iter().enumerate() {
            let prefix = format!("requesterSnpnList.{i}");
            form.append_pair(&format!("{prefix}.mcc"), &snpn.mcc);
            form.append_pair(&format!("{prefix}.mnc"), &snpn.mnc);
            if let Some(nid) = &snpn.nid {
                form.append_pair(&format!("{prefix}.nid"), nid);
            }
        }
        if let Some(plmn) = &self.target_plmn {
            append_plmn(&mut form, "targetPlmn", plmn);
        }
        for (i, snssai) in self.target_snssai_list.iter().enumerate() {
            append_snssai(&mut form, &format!("targetSnssaiList.{i}"), snssai);
        }
        for (i, nsi) in self.target_nsi_list.iter().enumerate() {
            form.append_pair(&format!("targetNsiList.{i}"), nsi);
        }
        append_non_empty(&mut form, "targetNfSetId", &self.target_nf_set_id);
        append_non_empty(&mut form, "targetNfServiceSetId", &self.target_nf_service_set_id);

        form.finish()
    }

    /// Decode from `application/x-www-form-urlencoded`. Unknown keys are
    /// ignored; list entries are ordered by their index.
    pub fn from_form(body: &[u8]) -> Result<Self, RequestError> {
        let mut req = Self::default();
        let mut requester_plmn_list = IndexedList::<PlmnId>::default();
        let mut requester_snssai_list = IndexedList::<Snssai>::default();
        let mut requester_snpn_list = IndexedList::<PlmnIdNid>::default();
        let mut target_snssai_list = IndexedList::<Snssai>::default();
        let mut target_nsi_list = IndexedList::<String>::default();

        for (key, value) in url::form_urlencoded::parse(body) {
            let value = value.into_owned();
            let mut parts = key.splitn(3, '.');
            let head = parts.next().unwrap_or_default();

            match (head, parts.next(), parts.next()) {
                ("grant_type", None, None) => req.grant_type = value,
                ("nfInstanceId", None, None) => req.nf_instance_id = value,
                ("nfType", None, None) => req.nf_type = value,
                ("targetNfType", None, None) => req.target_nf_type = value,
                ("targetNfInstanceId" | "targetNfInstanceID", None, None) => {
                    req.target_nf_instance_id = value
                }
                ("scope", None, None) => req.scope = value,
                ("requesterFqdn", None, None) => req.requester_fqdn = value,
                ("targetNfSetId", None, None) => req.target_nf_set_id = value,
                ("targetNfServiceSetId", None, None) => req.target_nf_service_set_id = value,
                ("requesterPlmn", Some(field), None) => {
                    set_plmn_field(req.requester_plmn.get_or_insert_with(Default::default), field, value, &key)?
                }
                ("targetPlmn", Some(field), None) => {
                    set_plmn_field(req.target_plmn.get_or_insert_with(Default::default), field, value, &key)?
                }
                ("requesterPlmnList", Some(index), Some(field)) => {
                    set_plmn_field(requester_plmn_list.entry(index, &key)?, field, value, &key)?
                }
                ("requesterSnssaiList", Some(index), Some(field)) => {
                    set_snssai_field(requester_snssai_list.entry(index, &key)?, field, value, &key)?
                }
                ("requesterSnpnList", Some(index), Some(field)) => {
                    set_plmn_nid_field(requester_snpn_list.entry(index, &key)?, field, value, &key)?
                }
                ("targetSnssaiList", Some(index), Some(field)) => {
                    set_snssai_field(target_snssai_list.entry(index, &key)?, field, value, &key)?
                }
                ("targetNsiList", Some(index), None) => *target_nsi_list.entry(index, &key)? = value,
                _ => log::debug!("Ignoring unknown form field {key}"),
            }
        }

        req.requester_plmn_list = requester_plmn_list.finish();
        req.requester_snssai_list = requester_snssai_list.finish();
        req.requester_snpn_list = requester_snpn_list.finish();
        req.target_snssai_list = target_snssai_list.finish();
        req.target_nsi_list = target_nsi_list.finish();
        Ok(req)
    }
}

fn append_non_empty(form: &mut url::form_urlencoded::Serializer<'_, String>, key: &str, value: &str) {
    if !value.is_empty() {
        form.append_pair(key, value);
    }
}

fn append_plmn(form: &mut url::form_urlencoded::Serializer<'_, String>, prefix: &str, plmn: &PlmnId) {
    form.append_pair(&format!("{prefix}.mcc"), &plmn.mcc);
    form.append_pair(&format!("{prefix}.mnc"), &plmn.mnc);
}

fn append_snssai(form: &mut url::form_urlencoded::Serializer<'_, String>, prefix: &str, snssai: &Snssai) {
    form.append_pair(&format!("{prefix}.sst"), &snssai.sst.to_string());
    if let Some(sd) = &snssai.sd {
        form.append_pair(&format!("{prefix}.sd"), sd);
    }
}

/// List entries collected by their form index
struct IndexedList<T>(BTreeMap<usize, T>);

impl<T> Default for IndexedList<T> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<T: Default> IndexedList<T> {
    fn entry(&mut self, index: &str, key: &str) -> Result<&mut T, RequestError> {
        let index: usize = index
            .parse()
            .map_err(|_| RequestError::MalformedForm(format!("bad list index in {key}")))?;
        Ok(self.0.entry(index).or_default())
    }

    fn finish(self) -> Vec<T> {
        self.0.into_values().collect()
    }
}

fn unknown_field(key: &str) -> RequestError {
    RequestError::MalformedForm(format!("unknown field {key}"))
}

fn set_plmn_field(plmn: &mut PlmnId, field: &str, value: String, key: &str) -> Result<(), RequestError> {
    match field {
        "mcc" => plmn.mcc = value,
        "mnc" => plmn.mnc = value,
        _ => return Err(unknown_field(key)),
    }
    Ok(())
}

fn set_plmn_nid_field(snpn: &mut PlmnIdNid, field: &str, value: String, key: &str) -> Result<(), RequestError> {
    match field {
        "mcc" => snpn.mcc = value,
        "mnc" => snpn.mnc = value,
        "nid" => snpn.nid = Some(value),
        _ => return Err(unknown_field(key)),
    }
    Ok(())
}

fn set_snssai_field(snssai: &mut Snssai, field: &str, value: String, key: &str) -> Result<(), RequestError> {
    match field {
        "sst" => {
            snssai.sst = value
                .parse()
                .map_err(|_| RequestError::MalformedForm(format!("{key}={value} is not in 0..=255")))?
        }
        "sd" => snssai.sd = Some(value),
        _ => return Err(unknown_field(key)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lmf_to_amf() -> AccessTokenRequest {
        AccessTokenRequest::by_type("12345", "LMF", "AMF", "namf-comm")
    }

    #[test]
    fn test_is_valid() {
        assert!(lmf_to_amf().is_valid());

        let mut req = lmf_to_amf();
        req.grant_type = "password".into();
        assert!(!req.is_valid());
        assert!(matches!(req.validate(), Err(RequestError::UnsupportedGrantType(_))));

        let mut req = lmf_to_amf();
        req.nf_instance_id.clear();
        assert!(matches!(req.validate(), Err(RequestError::MissingNfInstanceId)));

        let mut req = lmf_to_amf();
        req.scope = "namf-oam".into();
        assert!(matches!(req.validate(), Err(RequestError::InvalidScope(_))));
    }

    #[test]
    fn test_is_request_by_type() {
        assert!(lmf_to_amf().is_request_by_type());

        let mut req = lmf_to_amf();
        req.target_nf_type.clear();
        assert!(!req.is_request_by_type());

        let mut req = lmf_to_amf();
        req.nf_type = "lmf".into();
        assert!(!req.is_request_by_type());

        let mut req = lmf_to_amf();
        req.target_nf_type = "XYZ".into();
        assert!(!req.is_request_by_type());
    }

    #[test]
    fn test_error_codes() {
        let mut req = lmf_to_amf();
        req.scope = "bogus".into();
        let err = req.validate().unwrap_err().to_access_token_error();
        assert_eq!(err.error, AccessTokenErrorCode::InvalidScope);
        assert!(err.error_description.unwrap().contains("bogus"));

        assert_eq!(
            RequestError::MissingNfInstanceId.error_code(),
            AccessTokenErrorCode::InvalidRequest
        );
    }

    #[test]
    fn test_form_encoding_omits_absent_fields() {
        let form = lmf_to_amf().to_form();
        assert_eq!(
            form,
            "grant_type=client_credentials&nfInstanceId=12345&nfType=LMF&targetNfType=AMF&scope=namf-comm"
        );
    }

    #[test]
    fn test_form_decodes_dotted_lists() {
        let body = b"grant_type=client_credentials&nfInstanceId=abc&scope=nsmf-pdusession\
&requesterPlmnList.1.mcc=002&requesterPlmnList.1.mnc=02\
&requesterPlmnList.0.mcc=001&requesterPlmnList.0.mnc=01\
&targetSnssaiList.0.sst=1&targetSnssaiList.0.sd=000001\
&targetNsiList.0=nsi-a&targetNsiList.1=nsi-b\
&targetPlmn.mcc=310&targetPlmn.mnc=410\
&requesterSnpnList.0.mcc=001&requesterSnpnList.0.mnc=01&requesterSnpnList.0.nid=000007ed9d5\
&requesterFqdn=amf.example.org&unknownField=1";

        let req = AccessTokenRequest::from_form(body).unwrap();
        assert_eq!(req.nf_instance_id, "abc");
        assert_eq!(
            req.requester_plmn_list,
            vec![PlmnId::new("001", "01"), PlmnId::new("002", "02")]
        );
        assert_eq!(req.target_snssai_list, vec![Snssai::new(1, Some("000001".into()))]);
        assert_eq!(req.target_nsi_list, vec!["nsi-a", "nsi-b"]);
        assert_eq!(req.target_plmn, Some(PlmnId::new("310", "410")));
        assert_eq!(req.requester_snpn_list[0].nid.as_deref(), Some("000007ed9d5"));
        assert_eq!(req.requester_fqdn, "amf.example.org");
        assert!(req.requester_plmn.is_none());
    }

    #[test]
    fn test_form_round_trip_with_nested_fields() {
        let mut req = lmf_to_amf().with_target_nf_instance_id("amf-instance-7");
        req.requester_plmn = Some(PlmnId::new("001", "01"));
        req.requester_snssai_list = vec![Snssai::new(1, None), Snssai::new(2, Some("abcdef".into()))];
        req.target_nsi_list = vec!["nsi one".into()];
        req.target_nf_service_set_id = "set1.sn1.nfi1.5gc.mnc001.mcc001".into();

        let decoded = AccessTokenRequest::from_form(req.to_form().as_bytes()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_form_rejects_bad_sst() {
        let body = b"grant_type=client_credentials&targetSnssaiList.0.sst=300";
        assert!(matches!(
            AccessTokenRequest::from_form(body),
            Err(RequestError::MalformedForm(_))
        ));

        let body = b"grant_type=client_credentials&targetNsiList.x=nsi";
        assert!(AccessTokenRequest::from_form(body).is_err());
    }

    #[test]
    fn test_json_decoding() {
        let json = br#"{"grant_type":"client_credentials","nfInstanceId":"12345",
            "nfType":"LMF","targetNfType":"AMF","scope":"namf-comm",
            "targetNfInstanceID":"amf-1","targetPlmn":{"mcc":"001","mnc":"01"}}"#;
        let req = AccessTokenRequest::decode(Some("application/json; charset=utf-8"), json).unwrap();
        assert_eq!(req.target_nf_instance_id, "amf-1");
        assert_eq!(req.target_plmn, Some(PlmnId::new("001", "01")));
        assert!(req.is_valid());

        let out = String::from_utf8(req.to_json().unwrap()).unwrap();
        assert!(out.contains(r#""targetNfInstanceId":"amf-1""#));
        assert!(!out.contains("requesterPlmnList"));

        assert!(matches!(
            AccessTokenRequest::decode(Some("application/json"), b"{"),
            Err(RequestError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_decode_defaults_to_form() {
        let req = AccessTokenRequest::decode(None, lmf_to_amf().to_form().as_bytes()).unwrap();
        assert_eq!(req, lmf_to_amf());
    }
}
