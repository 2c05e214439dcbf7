use std::fmt;

use serde::Serialize;

use super::address::{decompose, PostalAddress};
use super::availability::Availability;
use super::classifier::{classify, Classification};
use super::domain::{LooseNumber, LooseText, PropertyRecord};
use super::escape::push_escaped;

/// Columns a listing cannot be published without.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    Area,
    Price,
    Description,
}

impl RequiredField {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Area => "area",
            Self::Price => "price",
            Self::Description => "description",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticProblem {
    Missing,
    NotNumeric,
    NotText,
}

impl DiagnosticProblem {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::NotNumeric => "not numeric",
            Self::NotText => "not text",
        }
    }
}

/// Why a record was left out of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordDiagnostic {
    pub record_id: i64,
    pub field: RequiredField,
    pub problem: DiagnosticProblem,
}

impl fmt::Display for RecordDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "property {} skipped: {} is {}",
            self.record_id,
            self.field.label(),
            self.problem.label()
        )
    }
}

/// Validated, normalized listing ready to be written as one `imovel` element.
///
/// Text is stored unescaped; escaping happens in [`ListingEntry::write_xml`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub code: i64,
    pub classification: Classification,
    pub address: PostalAddress,
    pub neighborhood: String,
    pub zip_code: String,
    pub area: f64,
    pub bedrooms: u32,
    pub suites: u32,
    pub bathrooms: u32,
    pub parking_spots: u32,
    /// Two-decimal amount, already formatted.
    pub price: String,
    pub description: String,
    pub features: Vec<String>,
    pub photo_urls: Vec<String>,
    pub availability: Availability,
}

impl ListingEntry {
    pub fn from_record(
        record: &PropertyRecord,
        fallback_state: &str,
    ) -> Result<Self, RecordDiagnostic> {
        let diagnostic = |field, problem| RecordDiagnostic {
            record_id: record.id,
            field,
            problem,
        };

        let area = required_number(record.area.as_ref())
            .map_err(|problem| diagnostic(RequiredField::Area, problem))?;
        let price = required_number(record.price.as_ref())
            .map(|parsed| money(record.price.as_ref(), parsed))
            .map_err(|problem| diagnostic(RequiredField::Price, problem))?;
        let description = required_text(record.description.as_ref())
            .map_err(|problem| diagnostic(RequiredField::Description, problem))?;

        let features = record
            .features
            .iter()
            .flatten()
            .filter(|feature| !feature.trim().is_empty())
            .cloned()
            .collect();
        let photo_urls = record
            .images
            .iter()
            .flatten()
            .map(|image| image.url())
            .filter(|url| !url.trim().is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            code: record.id,
            classification: classify(&record.property_type),
            address: decompose(&record.address, &record.city, fallback_state),
            neighborhood: record.neighborhood.clone().unwrap_or_default(),
            zip_code: record.zip_code.clone().unwrap_or_default(),
            area,
            bedrooms: count(record.bedrooms.as_ref()),
            suites: count(record.suites.as_ref()),
            bathrooms: count(record.bathrooms.as_ref()),
            parking_spots: count(record.parking_spots.as_ref()),
            price,
            description,
            features,
            photo_urls,
            availability: Availability::from_status(&record.status),
        })
    }

    /// Appends the `imovel` element, indented one level under the root.
    pub fn write_xml(&self, out: &mut String) {
        open(out, 1, "imovel");
        element(out, 2, "codigo", &self.code.to_string());
        element(out, 2, "categoria", self.classification.category);
        element(out, 2, "tipo", self.classification.kind);
        element(out, 2, "subtipo", self.classification.subtype);

        open(out, 2, "endereco");
        element(out, 3, "logradouro", &self.address.street);
        element(out, 3, "numero", &self.address.house_number);
        element(out, 3, "bairro", &self.neighborhood);
        element(out, 3, "cidade", &self.address.city);
        element(out, 3, "uf", &self.address.state_code);
        element(out, 3, "cep", &self.zip_code);
        close(out, 2, "endereco");

        let area = self.area.to_string();
        element(out, 2, "area_util", &area);
        element(out, 2, "area_total", &area);
        element(out, 2, "quartos", &self.bedrooms.to_string());
        element(out, 2, "suites", &self.suites.to_string());
        element(out, 2, "banheiros", &self.bathrooms.to_string());
        element(out, 2, "vagas", &self.parking_spots.to_string());
        element(out, 2, "valor", &self.price);
        element(out, 2, "descricao", &self.description);

        if !self.features.is_empty() {
            open(out, 2, "caracteristicas");
            for feature in &self.features {
                element(out, 3, "caracteristica", feature);
            }
            close(out, 2, "caracteristicas");
        }

        if !self.photo_urls.is_empty() {
            open(out, 2, "fotos");
            for url in &self.photo_urls {
                open(out, 3, "foto");
                element(out, 4, "url", url);
                close(out, 3, "foto");
            }
            close(out, 2, "fotos");
        }

        element(out, 2, "disponibilidade", self.availability.label());
        close(out, 1, "imovel");
    }
}

/// Validates one record and appends its `imovel` element to `out`.
///
/// Nothing is written when the record is rejected.
pub fn serialize_record(
    record: &PropertyRecord,
    fallback_state: &str,
    out: &mut String,
) -> Result<(), RecordDiagnostic> {
    let entry = ListingEntry::from_record(record, fallback_state)?;
    entry.write_xml(out);
    Ok(())
}

fn required_number(value: Option<&LooseNumber>) -> Result<f64, DiagnosticProblem> {
    value
        .ok_or(DiagnosticProblem::Missing)?
        .as_f64()
        .ok_or(DiagnosticProblem::NotNumeric)
}

/// Whole amounts are written from their digits so values past `f64`
/// precision stay exact.
fn money(value: Option<&LooseNumber>, parsed: f64) -> String {
    let whole = match value {
        Some(LooseNumber::Number(number)) if number.is_i64() || number.is_u64() => {
            Some(number.to_string())
        }
        Some(LooseNumber::Text(raw)) => raw.trim().parse::<i128>().ok().map(|n| n.to_string()),
        _ => None,
    };
    match whole {
        Some(digits) => format!("{digits}.00"),
        None => format!("{parsed:.2}"),
    }
}

fn required_text(value: Option<&LooseText>) -> Result<String, DiagnosticProblem> {
    match value {
        None => Err(DiagnosticProblem::Missing),
        Some(text) if text.is_null() => Err(DiagnosticProblem::Missing),
        Some(text) => {
            let text = text.as_text().ok_or(DiagnosticProblem::NotText)?;
            if text.trim().is_empty() {
                return Err(DiagnosticProblem::Missing);
            }
            Ok(text.to_string())
        }
    }
}

/// Optional counts render as 0 when absent or unreadable.
fn count(value: Option<&LooseNumber>) -> u32 {
    value
        .and_then(LooseNumber::as_f64)
        .filter(|value| *value >= 0.0)
        .map(|value| value.trunc() as u32)
        .unwrap_or(0)
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn open(out: &mut String, depth: usize, name: &str) {
    indent(out, depth);
    out.push('<');
    out.push_str(name);
    out.push_str(">\n");
}

fn close(out: &mut String, depth: usize, name: &str) {
    indent(out, depth);
    out.push_str("</");
    out.push_str(name);
    out.push_str(">\n");
}

fn element(out: &mut String, depth: usize, name: &str, text: &str) {
    indent(out, depth);
    out.push('<');
    out.push_str(name);
    out.push('>');
    push_escaped(out, text);
    out.push_str("</");
    out.push_str(name);
    out.push_str(">\n");
}
