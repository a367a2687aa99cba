//! Style value helpers

/// Style keys that hold colors (`primaryColor`, `color`, `text-color`, ...)
pub fn is_color_key(key: &str) -> bool {
    key.to_ascii_lowercase().ends_with("color")
}

/// Check that a color value is well-formed.
///
/// Accepts hex notation (`#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`), the
/// `rgb()`/`rgba()`/`hsl()`/`hsla()` functions and the keywords
/// `transparent` and `currentColor`. The empty string is accepted as "unset".
pub fn validate_color(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return true;
    }

    if let Some(hex) = value.strip_prefix('#') {
        return matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
    }

    let lower = value.to_ascii_lowercase();
    if lower == "transparent" || lower == "currentcolor" {
        return true;
    }

    ["rgba", "rgb", "hsla", "hsl"]
        .iter()
        .find_map(|name| lower.strip_prefix(name))
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
        .is_some_and(valid_color_arguments)
}

fn valid_color_arguments(arguments: &str) -> bool {
    let parts: Vec<&str> = arguments
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect();

    (3..=4).contains(&parts.len())
        && parts.iter().all(|part| {
            let number = part
                .strip_suffix('%')
                .or_else(|| part.strip_suffix("deg"))
                .unwrap_or(part);
            number.parse::<f64>().is_ok_and(f64::is_finite)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_keys() {
        assert!(is_color_key("primaryColor"));
        assert!(is_color_key("color"));
        assert!(is_color_key("text-color"));
        assert!(!is_color_key("fontFamily"));
    }

    #[test]
    fn test_hex_colors() {
        assert!(validate_color("#fff"));
        assert!(validate_color("#3b82f6"));
        assert!(validate_color("#3b82f680"));
        assert!(!validate_color("#3b82f"));
        assert!(!validate_color("#ggg"));
        assert!(!validate_color("3b82f6"));
    }

    #[test]
    fn test_functional_colors() {
        assert!(validate_color("rgb(59, 130, 246)"));
        assert!(validate_color("rgba(59,130,246,0.5)"));
        assert!(validate_color("hsl(217deg 91% 60%)"));
        assert!(validate_color("hsla(217, 91%, 60%, 0.4)"));
        assert!(!validate_color("rgb(1, 2)"));
        assert!(!validate_color("rgb(a, b, c)"));
        assert!(!validate_color("rgb 1 2 3"));
    }

    #[test]
    fn test_keywords_and_empty() {
        assert!(validate_color("transparent"));
        assert!(validate_color("currentColor"));
        assert!(validate_color(""));
        assert!(!validate_color("bluish"));
    }
}
