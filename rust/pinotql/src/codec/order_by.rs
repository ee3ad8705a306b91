use super::complex_field::{column_label_of, parse_column_name};
use crate::model::{ComplexField, OrderByClause, SortDirection};

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByFormData {
    pub options: Vec<String>,
    pub used_options: Vec<String>,
}

impl OrderByFormData {
    pub fn get_change(&self, selected: &[String]) -> Vec<OrderByClause> {
        parse_order_by_labels(selected)
    }
}

pub fn order_by_label(clause: &OrderByClause) -> String {
    let column = column_label_of(
        clause.column_name.as_deref().unwrap_or_default(),
        clause.column_key.as_deref().unwrap_or_default(),
    );
    let direction = clause.direction.unwrap_or(SortDirection::Asc);
    format!("{column} {}", direction.as_str().to_lowercase())
}

/// Selected clauses keep their own label. Columns no clause uses contribute both directions.
pub fn form_data_of(selected: &[OrderByClause], columns: &[ComplexField]) -> OrderByFormData {
    let used_columns: Vec<String> = selected
        .iter()
        .map(|clause| clause.column().label())
        .filter(|label| !label.is_empty())
        .collect();

    let used_options: Vec<String> = selected
        .iter()
        .filter(|clause| !clause.column().is_empty())
        .map(order_by_label)
        .collect();

    let mut options = used_options.clone();
    for column in columns {
        let label = column.label();
        if label.is_empty() || used_columns.contains(&label) {
            continue;
        }
        for direction in [SortDirection::Asc, SortDirection::Desc] {
            let option = format!("{label} {}", direction.as_str().to_lowercase());
            if !options.contains(&option) {
                options.push(option);
            }
        }
    }

    OrderByFormData {
        options,
        used_options,
    }
}

/// Splits the trailing direction token off each label. A label whose last token is not a
/// direction is taken whole as a column sorted ascending.
pub fn parse_order_by_labels(labels: &[String]) -> Vec<OrderByClause> {
    labels
        .iter()
        .filter_map(|label| {
            let trimmed = label.trim();
            let (rest, token) = trimmed
                .rsplit_once(char::is_whitespace)
                .unwrap_or(("", trimmed));
            let (column, direction) = match SortDirection::parse(token) {
                Some(direction) => (rest.trim_end(), direction),
                None => (trimmed, SortDirection::Asc),
            };

            let field = parse_column_name(Some(column));
            if field.is_empty() {
                return None;
            }
            Some(OrderByClause::new(field, direction))
        })
        .collect()
}
