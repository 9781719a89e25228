use std::path::Path;
use std::time::Duration;

use camino::Utf8Path;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Map, Value};

use crate::config::PubchemSettings;
use crate::domain::{ArtifactKind, CompoundId};
use crate::error::SpiceError;
use crate::model::DescriptorSet;
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper, retry_with_backoff};
use crate::store::Store;

/// Bodies shorter than this are PubChem error pages served with status 200.
pub const MIN_ARTIFACT_BYTES: usize = 100;

/// Properties requested in the single batched descriptor call.
pub const DESCRIPTOR_PROPERTIES: [&str; 15] = [
    "MolecularFormula",
    "MolecularWeight",
    "XLogP",
    "TPSA",
    "HBondDonorCount",
    "HBondAcceptorCount",
    "RotatableBondCount",
    "HeavyAtomCount",
    "Complexity",
    "Charge",
    "CanonicalSMILES",
    "IsomericSMILES",
    "InChI",
    "InChIKey",
    "IUPACName",
];

/// Raw GET against the remote service.
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>, SpiceError>;
}

/// What the enrichment layer needs from PubChem.
pub trait PubchemClient: Send + Sync {
    /// Stores one structure file at `destination`. With `overwrite` unset an
    /// existing non-empty file counts as success without any request.
    fn fetch_artifact(
        &self,
        cid: CompoundId,
        kind: ArtifactKind,
        destination: &Utf8Path,
        overwrite: bool,
    ) -> bool;

    fn fetch_descriptors(&self, cid: CompoundId) -> Result<DescriptorSet, SpiceError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, SpiceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|err| SpiceError::ConfigParse(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| SpiceError::PubchemHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, SpiceError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "PubChem request failed".to_string());
        Err(SpiceError::PubchemStatus { status, message })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, SpiceError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| SpiceError::PubchemHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let body = response
            .bytes()
            .map_err(|err| SpiceError::PubchemHttp(err.to_string()))?;
        Ok(body.to_vec())
    }
}

pub struct PubchemHttpClient<T: HttpTransport = ReqwestTransport> {
    transport: T,
    base_url: String,
    retry: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl PubchemHttpClient<ReqwestTransport> {
    pub fn new(settings: &PubchemSettings) -> Result<Self, SpiceError> {
        let transport = ReqwestTransport::new(&settings.user_agent, settings.timeout)?;
        Ok(Self::with_transport(transport, settings, ThreadSleeper))
    }
}

impl<T: HttpTransport> PubchemHttpClient<T> {
    pub fn with_transport(
        transport: T,
        settings: &PubchemSettings,
        sleeper: impl Sleeper + 'static,
    ) -> Self {
        Self {
            transport,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            retry: settings.retry,
            sleeper: Box::new(sleeper),
        }
    }

    pub fn artifact_url(&self, cid: CompoundId, kind: ArtifactKind) -> String {
        format!(
            "{}/compound/CID/{cid}/{}",
            self.base_url,
            kind.pubchem_operation()
        )
    }

    pub fn properties_url(&self, cid: CompoundId, properties: &[&str]) -> String {
        format!(
            "{}/compound/CID/{cid}/property/{}/JSON",
            self.base_url,
            properties.join(",")
        )
    }

    pub fn text_property_url(&self, cid: CompoundId, property: &str) -> String {
        format!(
            "{}/compound/CID/{cid}/property/{property}/TXT",
            self.base_url
        )
    }

    /// Downloads `url` into `destination` unless a non-empty file is already there.
    ///
    /// Never fails: exhausted retries or a failed write come back as `false`,
    /// meaning "not available now, try later".
    pub fn download_artifact(&self, url: &str, destination: &Path) -> bool {
        if Store::has_content(destination) {
            return true;
        }
        self.refresh_artifact(url, destination)
    }

    /// Like [`Self::download_artifact`] but always goes to the network.
    pub fn refresh_artifact(&self, url: &str, destination: &Path) -> bool {
        let body = retry_with_backoff(&self.retry, self.sleeper.as_ref(), url, |_| {
            let body = self.transport.get(url)?;
            if body.len() < MIN_ARTIFACT_BYTES {
                return Err(SpiceError::InvalidArtifact(format!(
                    "{} bytes from {url}",
                    body.len()
                )));
            }
            Ok(body)
        });
        let body = match body {
            Ok(body) => body,
            Err(_) => return false,
        };

        let Some(destination) = Utf8Path::from_path(destination) else {
            tracing::warn!("non UTF-8 destination {}", destination.display());
            return false;
        };
        match Store::write_bytes_atomic(destination, &body) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("writing {destination} failed: {err}");
                false
            }
        }
    }

    /// One batched property request, then plain-text fallbacks for the two
    /// SMILES fields when the batch left them empty.
    ///
    /// Any failure of the batched request fails the whole call; a failed
    /// fallback only leaves its field empty.
    pub fn fetch_descriptor_properties(
        &self,
        cid: CompoundId,
        properties: &[&str],
    ) -> Result<DescriptorSet, SpiceError> {
        let url = self.properties_url(cid, properties);
        let body = self.transport.get(&url)?;
        let value: Value = serde_json::from_slice(&body)
            .map_err(|err| SpiceError::PubchemPayload(err.to_string()))?;
        let mut descriptors = parse_properties(&value)?;

        if descriptors.smiles.is_none() {
            descriptors.smiles = self.fetch_text_property(cid, "CanonicalSMILES");
        }
        if descriptors.isomeric_smiles.is_none() {
            descriptors.isomeric_smiles = self.fetch_text_property(cid, "IsomericSMILES");
        }
        Ok(descriptors)
    }

    /// Single property through the TXT endpoint; `None` on any failure or a
    /// literal `null` answer.
    pub fn fetch_text_property(&self, cid: CompoundId, property: &str) -> Option<String> {
        let url = self.text_property_url(cid, property);
        match self.transport.get(&url) {
            Ok(body) => clean_text_property(&String::from_utf8_lossy(&body)),
            Err(err) => {
                tracing::debug!(%cid, property, "text fallback failed: {err}");
                None
            }
        }
    }
}

impl<T: HttpTransport> PubchemClient for PubchemHttpClient<T> {
    fn fetch_artifact(
        &self,
        cid: CompoundId,
        kind: ArtifactKind,
        destination: &Utf8Path,
        overwrite: bool,
    ) -> bool {
        let url = self.artifact_url(cid, kind);
        if overwrite {
            self.refresh_artifact(&url, destination.as_std_path())
        } else {
            self.download_artifact(&url, destination.as_std_path())
        }
    }

    fn fetch_descriptors(&self, cid: CompoundId) -> Result<DescriptorSet, SpiceError> {
        self.fetch_descriptor_properties(cid, &DESCRIPTOR_PROPERTIES)
    }
}

/// Extracts `PropertyTable.Properties[0]` into a [`DescriptorSet`].
pub fn parse_properties(value: &Value) -> Result<DescriptorSet, SpiceError> {
    let record = value
        .get("PropertyTable")
        .and_then(|table| table.get("Properties"))
        .and_then(|props| props.as_array())
        .and_then(|array| array.first())
        .and_then(|first| first.as_object())
        .ok_or_else(|| {
            SpiceError::PubchemPayload("missing PropertyTable.Properties[0]".to_string())
        })?;

    Ok(DescriptorSet {
        molecular_formula: string_field(record, &["MolecularFormula"]),
        molecular_weight: number_field(record, "MolecularWeight"),
        xlogp: number_field(record, "XLogP"),
        tpsa: number_field(record, "TPSA"),
        hbd: integer_field(record, "HBondDonorCount"),
        hba: integer_field(record, "HBondAcceptorCount"),
        rotatable_bonds: integer_field(record, "RotatableBondCount"),
        heavy_atom_count: integer_field(record, "HeavyAtomCount"),
        complexity: number_field(record, "Complexity"),
        charge: integer_field(record, "Charge"),
        // Newer responses rename the SMILES keys.
        smiles: string_field(record, &["CanonicalSMILES", "ConnectivitySMILES"]),
        isomeric_smiles: string_field(record, &["IsomericSMILES", "SMILES"]),
        inchi: string_field(record, &["InChI"]),
        inchikey: string_field(record, &["InChIKey"]),
        iupac_name: string_field(record, &["IUPACName"]),
    })
}

pub fn clean_text_property(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn string_field(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .filter_map(|value| value.as_str())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

// MolecularWeight arrives as a JSON string, the rest as numbers.
fn number_field(record: &Map<String, Value>, key: &str) -> Option<f64> {
    match record.get(key)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn integer_field(record: &Map<String, Value>, key: &str) -> Option<i64> {
    match record.get(key)? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_string_and_numeric_fields() {
        let value = json!({
            "PropertyTable": {
                "Properties": [{
                    "CID": 702,
                    "MolecularFormula": "C2H6O",
                    "MolecularWeight": "46.07",
                    "XLogP": -0.1,
                    "TPSA": 20.2,
                    "HBondDonorCount": 1,
                    "HBondAcceptorCount": 1,
                    "ConnectivitySMILES": "CCO",
                    "InChIKey": "LFQSCWFLJHTTHZ-UHFFFAOYSA-N"
                }]
            }
        });
        let set = parse_properties(&value).unwrap();
        assert_eq!(set.molecular_weight, Some(46.07));
        assert_eq!(set.xlogp, Some(-0.1));
        assert_eq!(set.hbd, Some(1));
        assert_eq!(set.smiles.as_deref(), Some("CCO"));
        assert_eq!(set.isomeric_smiles, None);
        assert_eq!(set.iupac_name, None);
    }

    #[test]
    fn parse_rejects_missing_table() {
        let value = json!({"Fault": {"Code": "PUGREST.NotFound"}});
        assert!(matches!(
            parse_properties(&value),
            Err(SpiceError::PubchemPayload(_))
        ));
    }

    #[test]
    fn text_property_null_marker() {
        assert_eq!(clean_text_property("CCO\n"), Some("CCO".to_string()));
        assert_eq!(clean_text_property("NULL\n"), None);
        assert_eq!(clean_text_property("   "), None);
    }
}
