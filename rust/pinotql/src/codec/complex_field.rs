//! Label codec for column references that may point into a composite column.
//!
//! A plain column renders as `name`; a keyed sub-field renders as `name['key']`. Labels are
//! what select widgets show and hand back, so every selection round-trips through here.

use crate::{model::ComplexField, resources::Column};

/// Renders a field label. [`parse_column_name`] inverts it for any key as long as the name
/// itself contains no `[`.
pub fn column_label_of(name: &str, key: &str) -> String {
    if name.is_empty() {
        String::new()
    } else if key.is_empty() {
        name.to_string()
    } else {
        format!("{name}['{key}']")
    }
}

/// Parses a label that is not backed by a known column. Canonical `name['key']` labels keep
/// the key verbatim; anything else (free-typed values such as `arr[0]`) is split on the
/// first `[` on a best-effort basis.
pub fn parse_column_name(label: Option<&str>) -> ComplexField {
    let Some(label) = label else {
        return ComplexField::default();
    };

    if let Some(field) = parse_canonical_label(label) {
        return field;
    }

    match label.split_once('[') {
        Some((name, rest)) => {
            let key = rest.split(']').next().unwrap_or_default();
            let key = key.trim().trim_matches('\'').trim_matches('"');
            ComplexField {
                name: non_empty(name),
                key: non_empty(key),
            }
        }
        None => ComplexField {
            name: non_empty(label),
            key: None,
        },
    }
}

fn parse_canonical_label(label: &str) -> Option<ComplexField> {
    let open = label.find("['")?;
    let body = label.strip_suffix("']")?;
    let key = body.get(open + 2..)?;
    Some(ComplexField {
        name: non_empty(&label[..open]),
        key: non_empty(key),
    })
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl From<&Column> for ComplexField {
    fn from(column: &Column) -> Self {
        ComplexField {
            name: Some(column.name.clone()),
            key: column.key.clone().filter(|key| !key.is_empty()),
        }
    }
}

/// Label to field lookup that keeps insertion order.
#[derive(Debug, Clone, Default)]
struct FieldLookup {
    entries: Vec<(String, ComplexField)>,
}

impl FieldLookup {
    fn seeded<'a>(columns: impl IntoIterator<Item = &'a Column>) -> Self {
        let mut lookup = Self::default();
        for column in columns {
            lookup.insert(ComplexField::from(column));
        }
        lookup
    }

    /// Later inserts replace the field stored under the same label.
    fn insert(&mut self, field: ComplexField) {
        let label = field.label();
        if label.is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|(existing, _)| *existing == label) {
            Some(entry) => entry.1 = field,
            None => self.entries.push((label, field)),
        }
    }

    fn get(&self, label: &str) -> Option<&ComplexField> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, field)| field)
    }

    fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|(label, _)| label.clone()).collect()
    }

    fn resolve(&self, label: &str) -> ComplexField {
        self.get(label)
            .cloned()
            .unwrap_or_else(|| parse_column_name(Some(label)))
    }
}

#[derive(Debug, Clone)]
pub struct ComplexFieldFormData {
    pub options: Vec<String>,
    pub used_option: Option<String>,
    lookup: FieldLookup,
}

impl ComplexFieldFormData {
    /// Maps a chosen label back to a field. Labels outside the known set are parsed.
    pub fn get_change(&self, selected: Option<&str>) -> ComplexField {
        match selected {
            Some(label) => self.lookup.resolve(label),
            None => ComplexField::default(),
        }
    }
}

/// Builds select state for a single column. The selected field is overlaid on the known
/// columns so a choice that dropped out of the schema stays visible and selectable.
pub fn form_data_of(selected: &ComplexField, known_columns: &[Column]) -> ComplexFieldFormData {
    let mut lookup = FieldLookup::seeded(known_columns);
    lookup.insert(selected.clone());

    let used_option = selected.non_empty().map(|field| field.label());
    ComplexFieldFormData {
        options: lookup.labels(),
        used_option,
        lookup,
    }
}

#[derive(Debug, Clone)]
pub struct MultiSelectFormData {
    pub options: Vec<String>,
    pub used_options: Vec<String>,
    lookup: FieldLookup,
}

impl MultiSelectFormData {
    /// Resolves labels in selection order, dropping repeats and labels that name no column.
    pub fn get_change(&self, selected: &[String]) -> Vec<ComplexField> {
        let mut seen = Vec::<String>::new();
        let mut fields = Vec::new();
        for label in selected {
            let field = self.lookup.resolve(label);
            if field.is_empty() {
                continue;
            }
            let canonical = field.label();
            if seen.contains(&canonical) {
                continue;
            }
            seen.push(canonical);
            fields.push(field);
        }
        fields
    }
}

pub fn multi_select_form_data_of(
    selected: &[ComplexField],
    known_columns: &[Column],
) -> MultiSelectFormData {
    let mut lookup = FieldLookup::seeded(known_columns);
    let mut used_options = Vec::new();
    for field in selected {
        lookup.insert(field.clone());
        let label = field.label();
        if !label.is_empty() && !used_options.contains(&label) {
            used_options.push(label);
        }
    }

    MultiSelectFormData {
        options: lookup.labels(),
        used_options,
        lookup,
    }
}
