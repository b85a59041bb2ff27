use std::{cmp::Ordering, collections::BTreeSet, fmt::Write as _};

use icu_collator::{
    Collator, CollatorBorrowed,
    options::{CollatorOptions, Strength},
};
use icu_locale_core::locale;
use schema::{CaseRecord, Contact};

use crate::client::CaseApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortField {
    Firma,
    Email,
    Plz,
}

impl SortField {
    fn value(self, contact: &Contact) -> &str {
        match self {
            Self::Firma => &contact.company,
            Self::Email => &contact.email,
            Self::Plz => &contact.postal_code,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Firma => "Firma",
            Self::Email => "E-Mail",
            Self::Plz => "PLZ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn arrow(self) -> &'static str {
        match self {
            Self::Asc => "↑",
            Self::Desc => "↓",
        }
    }
}

/// View-local state of the contact table. Selection is keyed by a contact's
/// position in the case's contact list, so it survives sorting and filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactTable {
    search: String,
    selected: BTreeSet<usize>,
    sort_field: SortField,
    sort_direction: SortDirection,
}

impl Default for ContactTable {
    fn default() -> Self {
        Self {
            search: String::new(),
            selected: BTreeSet::new(),
            sort_field: SortField::Firma,
            sort_direction: SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRow<'a> {
    pub index: usize,
    pub contact: &'a Contact,
    pub selected: bool,
}

impl ContactTable {
    pub fn sort(&self) -> (SortField, SortDirection) {
        (self.sort_field, self.sort_direction)
    }

    /// Same field flips the direction; a new field starts ascending.
    pub fn toggle_sort(&mut self, field: SortField) {
        if self.sort_field == field {
            self.sort_direction = match self.sort_direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            };
        } else {
            self.sort_field = field;
            self.sort_direction = SortDirection::Asc;
        }
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    pub fn toggle_selected(&mut self, index: usize) {
        if !self.selected.remove(&index) {
            self.selected.insert(index);
        }
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    fn matches(&self, contact: &Contact) -> bool {
        let query = self.search.to_lowercase();
        contact.company.to_lowercase().contains(&query)
            || contact.email.to_lowercase().contains(&query)
            || contact.postal_code.contains(&query)
    }

    /// Filtered rows in display order. The sort is stable.
    pub fn rows<'a>(&self, contacts: &'a [Contact]) -> Vec<ContactRow<'a>> {
        let mut rows: Vec<ContactRow<'a>> = contacts
            .iter()
            .enumerate()
            .filter(|(_, contact)| self.matches(contact))
            .map(|(index, contact)| ContactRow {
                index,
                contact,
                selected: self.selected.contains(&index),
            })
            .collect();
        let collator = contact_collator();
        rows.sort_by(|a, b| {
            let ordering = compare_values(
                collator.as_ref(),
                self.sort_field.value(a.contact),
                self.sort_field.value(b.contact),
            );
            match self.sort_direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        rows
    }

    fn header(&self, field: SortField) -> String {
        if self.sort_field == field {
            format!("{} {}", field.label(), self.sort_direction.arrow())
        } else {
            field.label().to_string()
        }
    }
}

/// German collation at secondary strength: umlauts sort next to their base
/// letter and case is ignored.
fn contact_collator() -> Option<CollatorBorrowed<'static>> {
    let mut options = CollatorOptions::default();
    options.strength = Some(Strength::Secondary);
    match Collator::try_new(locale!("de").into(), options) {
        Ok(collator) => Some(collator),
        Err(err) => {
            tracing::warn!(error = %err, "contact collator unavailable, sorting by code point");
            None
        }
    }
}

fn compare_values(collator: Option<&CollatorBorrowed<'static>>, a: &str, b: &str) -> Ordering {
    match collator {
        Some(collator) => collator.compare(a, b),
        None => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

pub fn render_detail(record: &CaseRecord, table: &ContactTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", record.title);
    let _ = writeln!(out, "Case #{}", record.id);
    out.push('\n');
    let _ = writeln!(out, "CV (original): {}", record.original_cv_url);
    let _ = writeln!(out, "CV (redacted): {}", record.redacted_cv_url);
    out.push('\n');
    let _ = writeln!(out, "E-Mail subject: {}", record.email_subject);
    out.push_str("E-Mail body:\n");
    for line in strip_html(&record.email_body).lines() {
        let _ = writeln!(out, "  {line}");
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "Contacts ({})  {} selected",
        record.contacts.len(),
        table.selected_count()
    );
    if !table.search.is_empty() {
        let _ = writeln!(out, "search: {}", table.search);
    }
    let _ = writeln!(
        out,
        "    #  {:<28} {:<32} {}",
        table.header(SortField::Firma),
        table.header(SortField::Email),
        table.header(SortField::Plz)
    );
    for row in table.rows(&record.contacts) {
        let marker = if row.selected { "[x]" } else { "[ ]" };
        let _ = writeln!(
            out,
            "{marker} {:>2}  {:<28} {:<32} {}",
            row.index, row.contact.company, row.contact.email, row.contact.postal_code
        );
    }
    out
}

/// Plain-text rendering of an HTML fragment: tags dropped, block ends turned
/// into line breaks, common entities decoded.
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('>') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let tag = rest[start + 1..start + end]
            .trim_start_matches('/')
            .split(|ch: char| ch.is_whitespace() || ch == '/')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        if matches!(tag.as_str(), "br" | "p" | "div" | "li" | "tr" | "h1" | "h2" | "h3")
            && !out.ends_with('\n')
            && !out.is_empty()
        {
            out.push('\n');
        }
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);
    decode_entities(out.trim())
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Sent,
    NoUrl,
    Failed(String),
}

/// Signal confirmation to the record's external endpoint. A missing link is
/// not an error.
pub async fn confirm(client: &CaseApiClient, record: &CaseRecord) -> ConfirmOutcome {
    let Some(url) = record.confirm_url() else {
        tracing::warn!(case_id = record.id, "no confirm_url set on case");
        return ConfirmOutcome::NoUrl;
    };
    match client.confirm(url, record.id).await {
        Ok(()) => {
            tracing::info!(case_id = record.id, "case confirmed");
            ConfirmOutcome::Sent
        }
        Err(err) => {
            tracing::error!(case_id = record.id, error = %err, "error confirming case");
            ConfirmOutcome::Failed(err.to_string())
        }
    }
}
