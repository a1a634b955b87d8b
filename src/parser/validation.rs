use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::location::requires_region_selection;
use super::status::Category;
use super::types::NewTicket;

static SUBSCRIBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^DAB\d{1,6}$").expect("SUBSCRIBER_REGEX: invalid pattern"));

static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d{6,15}$").expect("PHONE_REGEX: invalid pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

const REQUIRED: &str = "obligatoire";
const INVALID_FORMAT: &str = "format invalide";

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Valide un formulaire de création ; retourne toutes les erreurs d'un coup.
/// Le nom du client et la description du problème sont facultatifs.
pub fn validate_new_ticket(form: &NewTicket, category: Category) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if blank(&form.subscriber_number) {
        errors.push(FieldError { field: "subscriberNumber", message: REQUIRED });
    } else if !SUBSCRIBER_REGEX.is_match(form.subscriber_number.trim()) {
        errors.push(FieldError { field: "subscriberNumber", message: INVALID_FORMAT });
    }

    if blank(&form.phone) {
        errors.push(FieldError { field: "phone", message: REQUIRED });
    } else if !PHONE_REGEX.is_match(form.phone.trim()) {
        errors.push(FieldError { field: "phone", message: INVALID_FORMAT });
    }

    if blank(&form.wilaya_code) {
        errors.push(FieldError { field: "wilayaCode", message: REQUIRED });
    }
    if blank(&form.subscription_type) {
        errors.push(FieldError { field: "subscriptionType", message: REQUIRED });
    }
    if category == Category::Reclamation
        && form.complaint_type.as_deref().map_or(true, blank)
    {
        errors.push(FieldError { field: "complaintType", message: REQUIRED });
    }
    if requires_region_selection(None, Some(&form.wilaya_code)) && form.region_id.is_none() {
        errors.push(FieldError { field: "regionId", message: "zone obligatoire à Nouakchott" });
    }

    errors
}
