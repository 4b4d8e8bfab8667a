//! Identifier escaping and field-type mapping
//!
//! Both directions go through here: the applier when it emits `ALTER TABLE`
//! statements, the exporter for every identifier and primitive type it
//! writes. Pure functions, no catalog access.

/// Escape an identifier for embedding in SQL text.
///
/// A name that is a letter followed by letters, digits or underscores is
/// returned as-is; anything else is wrapped in double quotes with embedded
/// quotes doubled.
pub fn escape_ident(ident: &str) -> String {
    let mut chars = ident.chars();
    let plain = match chars.next() {
        Some(first) => {
            first.is_alphabetic() && chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        None => false,
    };

    if plain {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// Strip one level of double quotes from an identifier, collapsing doubled
/// quotes. Unquoted input is returned trimmed and unchanged.
pub fn unquote_ident(ident: &str) -> String {
    let ident = ident.trim();
    if ident.len() >= 2 && ident.starts_with('"') && ident.ends_with('"') {
        ident[1..ident.len() - 1].replace("\"\"", "\"")
    } else {
        ident.to_string()
    }
}

/// Map an engine field-type code plus length/precision/scale to SQL type
/// text. Unknown codes fall back to BLOB; this never fails.
pub fn map_field_type(
    field_type: i32,
    length: i32,
    precision: Option<i32>,
    scale: Option<i32>,
) -> String {
    match field_type {
        7 => "SMALLINT".to_string(),
        8 => "INTEGER".to_string(),
        16 => match precision {
            Some(precision) => {
                format!("NUMERIC({},{})", precision, scale.unwrap_or(0).abs())
            }
            None => "BIGINT".to_string(),
        },
        10 => "FLOAT".to_string(),
        27 => "DOUBLE PRECISION".to_string(),
        12 => "DATE".to_string(),
        13 => "TIME".to_string(),
        35 => "TIMESTAMP".to_string(),
        37 => format!("VARCHAR({})", if length > 0 { length } else { 255 }),
        14 => format!("CHAR({})", if length > 0 { length } else { 1 }),
        261 => "BLOB".to_string(),
        _ => "BLOB".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn plain_identifiers_stay_unquoted() {
        assert_eq!(escape_ident("CUSTOMERS"), "CUSTOMERS");
        assert_eq!(escape_ident("tbl_orders_2"), "tbl_orders_2");
    }

    #[rstest]
    #[case("", "\"\"")]
    #[case("2FAST", "\"2FAST\"")]
    #[case("MY COL", "\"MY COL\"")]
    #[case("A\"B", "\"A\"\"B\"")]
    fn awkward_identifiers_get_quoted(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(escape_ident(input), expected);
    }

    #[test]
    fn unquote_reverses_escape() {
        assert_eq!(unquote_ident("\"MY COL\""), "MY COL");
        assert_eq!(unquote_ident("\"A\"\"B\""), "A\"B");
        assert_eq!(unquote_ident("  PLAIN  "), "PLAIN");
    }

    #[rstest]
    #[case(7, 0, None, None, "SMALLINT")]
    #[case(8, 4, None, None, "INTEGER")]
    #[case(10, 0, None, None, "FLOAT")]
    #[case(27, 0, None, None, "DOUBLE PRECISION")]
    #[case(12, 0, None, None, "DATE")]
    #[case(13, 0, None, None, "TIME")]
    #[case(35, 0, None, None, "TIMESTAMP")]
    #[case(261, 0, None, None, "BLOB")]
    fn fixed_type_codes(
        #[case] code: i32,
        #[case] length: i32,
        #[case] precision: Option<i32>,
        #[case] scale: Option<i32>,
        #[case] expected: &str,
    ) {
        assert_eq!(map_field_type(code, length, precision, scale), expected);
    }

    #[test]
    fn numeric_uses_precision_when_present() {
        assert_eq!(map_field_type(16, 8, Some(18), Some(-2)), "NUMERIC(18,2)");
        assert_eq!(map_field_type(16, 8, None, None), "BIGINT");
    }

    #[test]
    fn char_types_carry_length_with_fallbacks() {
        assert_eq!(map_field_type(37, 80, None, None), "VARCHAR(80)");
        assert_eq!(map_field_type(37, 0, None, None), "VARCHAR(255)");
        assert_eq!(map_field_type(14, 3, None, None), "CHAR(3)");
        assert_eq!(map_field_type(14, 0, None, None), "CHAR(1)");
    }

    #[test]
    fn unknown_codes_fall_back_to_blob() {
        assert_eq!(map_field_type(9999, 10, Some(5), Some(2)), "BLOB");
        assert_eq!(map_field_type(-1, 0, None, None), "BLOB");
    }
}
