use crate::domain::{Place, PlaceStatus};
use crate::error::{PlacesError, Result};
use crate::metrics::PlacesMetrics;
use crate::nonce::{NonceSigner, FORM_SUBMIT_ACTION};
use crate::sanitize::sanitize_text_field;
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

pub const SUCCESS_PARAM: &str = "mp_form_submit_success";
pub const DATA_PARAM: &str = "mp_form_data";

/// Raw suggestion form body. Every field is optional at this layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestionForm {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(rename = "mp_name", default)]
    pub name: String,
    #[serde(rename = "mp_address", default)]
    pub address: String,
    #[serde(rename = "mp_city", default)]
    pub city: String,
    #[serde(rename = "_token", default)]
    pub token: String,
}

/// Sanitized field values, echoed back to the form after a failed submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionData {
    pub name: String,
    pub address: String,
    pub city: String,
}

impl SuggestionData {
    pub fn sanitized(form: &SuggestionForm) -> Self {
        Self {
            name: sanitize_text_field(&form.name),
            address: sanitize_text_field(&form.address),
            city: sanitize_text_field(&form.city),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Accepted { place_id: Uuid, redirect: String },
    Failed { data: SuggestionData, redirect: String },
}

impl SubmissionOutcome {
    pub fn redirect(&self) -> &str {
        match self {
            SubmissionOutcome::Accepted { redirect, .. } => redirect,
            SubmissionOutcome::Failed { redirect, .. } => redirect,
        }
    }
}

/// Submission Handler: the only public write path into the place store.
#[derive(Clone)]
pub struct SubmissionHandler {
    storage: Arc<dyn Storage>,
    signer: NonceSigner,
    fallback_redirect: Url,
}

impl SubmissionHandler {
    pub fn new(storage: Arc<dyn Storage>, signer: NonceSigner, fallback_redirect: Url) -> Self {
        Self {
            storage,
            signer,
            fallback_redirect,
        }
    }

    /// Fresh token for rendering the suggestion form.
    pub fn form_token(&self) -> String {
        self.signer.create(FORM_SUBMIT_ACTION)
    }

    /// Verify the token, persist a pending place and compute the redirect target.
    ///
    /// A bad token is returned as `Forbidden` before anything is read or written.
    /// A storage failure is not an error here: it becomes `Failed` with the entered values.
    pub async fn submit(&self, form: &SuggestionForm, referer: Option<&str>) -> Result<SubmissionOutcome> {
        if !self.signer.verify(&form.token, FORM_SUBMIT_ACTION) {
            PlacesMetrics::record_submission_rejected();
            warn!("Rejected suggestion with invalid token");
            return Err(PlacesError::Forbidden("invalid request token".to_string()));
        }

        let data = SuggestionData::sanitized(form);
        let mut place = Place::new(data.name.clone(), PlaceStatus::Pending)
            .with_address(data.address.clone(), data.city.clone());

        let target = self.redirect_base(referer);
        match self.storage.create_place(&mut place).await {
            Ok(()) => {
                let place_id = place.id.unwrap_or_default();
                PlacesMetrics::record_submission_accepted();
                info!(place_id = %place_id, name = %data.name, "Stored place suggestion");
                Ok(SubmissionOutcome::Accepted {
                    place_id,
                    redirect: with_status(target, true, None).into(),
                })
            }
            Err(e) => {
                PlacesMetrics::record_submission_failed();
                warn!(error = %e, "Failed to store place suggestion");
                Ok(SubmissionOutcome::Failed {
                    redirect: with_status(target, false, Some(&data)).into(),
                    data,
                })
            }
        }
    }

    fn redirect_base(&self, referer: Option<&str>) -> Url {
        referer
            .and_then(|r| Url::parse(r).ok())
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or_else(|| self.fallback_redirect.clone())
    }
}

/// Replace any previous status parameters on `url` with the new outcome.
fn with_status(mut url: Url, success: bool, data: Option<&SuggestionData>) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != SUCCESS_PARAM && !k.starts_with(DATA_PARAM))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (k, v) in &kept {
            query.append_pair(k, v);
        }
        query.append_pair(SUCCESS_PARAM, if success { "1" } else { "0" });
        if let Some(data) = data {
            query.append_pair(&format!("{DATA_PARAM}[name]"), &data.name);
            query.append_pair(&format!("{DATA_PARAM}[address]"), &data.address);
            query.append_pair(&format!("{DATA_PARAM}[city]"), &data.city);
        }
    }
    url
}

/// Form status as read back from the redirect query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormStatus {
    pub success: Option<bool>,
    pub data: SuggestionData,
}

impl FormStatus {
    pub fn from_query_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut status = FormStatus::default();
        for (key, value) in pairs {
            match key {
                SUCCESS_PARAM => status.success = Some(matches!(value, "1" | "true")),
                "mp_form_data[name]" => status.data.name = value.to_string(),
                "mp_form_data[address]" => status.data.address = value.to_string(),
                "mp_form_data[city]" => status.data.city = value.to_string(),
                _ => {}
            }
        }
        // Entered values are only echoed after a failure.
        if status.success != Some(false) {
            status.data = SuggestionData::default();
        }
        status
    }
}
