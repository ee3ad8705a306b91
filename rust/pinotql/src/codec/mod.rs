//! Conversions between column references and the labels select widgets work with.

pub mod complex_field;
pub mod order_by;
