use super::status::fold_status;

const NKC_CODES: &[&str] = &["NKC", "15"];
const NDB_CODES: &[&str] = &["NDB", "08"];

fn normalize_code(code: Option<&str>) -> String {
    code.unwrap_or("").trim().to_uppercase()
}

fn normalize_name(name: Option<&str>) -> String {
    fold_status(name.unwrap_or(""))
}

pub fn is_nouakchott(name: Option<&str>, code: Option<&str>) -> bool {
    if NKC_CODES.contains(&normalize_code(code).as_str()) {
        return true;
    }
    normalize_name(name).contains("nouakchott")
}

/// Accepte aussi les graphies fautives rencontrées dans les données (nouahdibou, nouadibou).
pub fn is_nouadhibou(name: Option<&str>, code: Option<&str>) -> bool {
    if NDB_CODES.contains(&normalize_code(code).as_str()) {
        return true;
    }
    let compact: String = normalize_name(name).chars().filter(|c| *c != '_').collect();
    compact.contains("nouadhibou")
        || compact.contains("nouahdibou")
        || compact.replace('h', "").contains("nouadibou")
}

/// Libellé court d'une wilaya : NKC, NDB, nom, code, ou "Non spécifié".
pub fn format_wilaya_name(name: Option<&str>, code: Option<&str>) -> String {
    if is_nouakchott(name, code) {
        return "NKC".to_string();
    }
    if is_nouadhibou(name, code) {
        return "NDB".to_string();
    }
    if let Some(n) = name.map(str::trim).filter(|n| !n.is_empty()) {
        return n.to_string();
    }
    let c = normalize_code(code);
    if c.is_empty() {
        "Non spécifié".to_string()
    } else {
        c
    }
}

/// La zone (region_id) n'est exigée qu'à Nouakchott.
pub fn requires_region_selection(name: Option<&str>, code: Option<&str>) -> bool {
    is_nouakchott(name, code)
}
