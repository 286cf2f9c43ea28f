use calamine::DataType;

/// Largest magnitude at which every integral `f64` is still exact.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Renders a spreadsheet cell as trimmed text.
///
/// Spreadsheet applications store codes such as `12345` as numbers; integral
/// floats are therefore rendered without a fractional part so they compare
/// equal to the same code read from a CSV file.
pub(crate) fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.trim().to_string(),
        Some(DataType::Float(value)) => number_to_string(*value),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

fn number_to_string(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < EXACT_INTEGER_LIMIT {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
