use crate::analyzer::normalizer::normalize;
use crate::error::AppError;
use crate::parser::deserializers::parse_timestamp;
use crate::parser::location::format_wilaya_name;
use crate::parser::types::RawTicket;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const CSV_HEADERS: [&str; 8] = [
    "N° Ticket",
    "N° d'abonné",
    "Téléphone",
    "Région",
    "Zone",
    "Type d'abonnement",
    "Statut",
    "Créé le",
];

/// Date de création au format jj/mm/aaaa hh:mm.
/// Une date absente ou illisible est une erreur : l'export ne fabrique pas de valeur.
fn format_created_at(raw: &RawTicket) -> Result<String, AppError> {
    let value = raw.created_at.as_deref().unwrap_or("");
    parse_timestamp(value)
        .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Ticket {} : date de création illisible '{}'",
                raw.ticket_number, value
            ))
        })
}

/// Export CSV (UTF-8 avec BOM pour Excel).
/// Le statut est exprimé dans le vocabulaire de la catégorie du ticket.
pub fn export_tickets_csv(tickets: &[RawTicket]) -> Result<Vec<u8>, AppError> {
    let mut buf = UTF8_BOM.to_vec();
    {
        let mut wtr = csv::Writer::from_writer(&mut buf);
        wtr.write_record(CSV_HEADERS)?;

        for raw in tickets {
            let created = format_created_at(raw)?;
            let ticket = normalize(raw);
            let region = format_wilaya_name(raw.wilaya_name.as_deref(), raw.wilaya_code.as_deref());
            wtr.write_record([
                raw.ticket_number.as_str(),
                raw.subscriber_number.as_deref().unwrap_or(""),
                raw.phone.as_deref().unwrap_or(""),
                region.as_str(),
                raw.region_name.as_deref().unwrap_or(""),
                raw.subscription_type.as_deref().unwrap_or(""),
                ticket.state.status_str(),
                created.as_str(),
            ])?;
        }
        wtr.flush()?;
    }
    log::debug!("export CSV : {} ticket(s), {} octets", tickets.len(), buf.len());
    Ok(buf)
}
