use serde::Serialize;

use crate::error::{EquitrainError, Result};

/// Renders every argument as an aligned `Options:` block, one per line.
pub fn format_options<T: Serialize>(args: &T) -> String {
    let value = match serde_json::to_value(args) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => return "Options:\n".to_string(),
    };

    let width = value.keys().map(String::len).max().unwrap_or(0);
    let mut out = String::from("Options:\n");
    for (key, v) in &value {
        let rendered = match v {
            serde_json::Value::Null => "None".to_string(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out.push_str(&format!("  {key:<width$} : {rendered}\n"));
    }
    out
}

/// Parses a list of atomic numbers such as `[1, 8]` or `1,8`.
pub fn parse_atomic_numbers(text: &str) -> Result<Vec<u32>> {
    let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>().map_err(|_| EquitrainError::InvalidArgument {
                name: "atomic-numbers",
                reason: format!("`{s}` is not an atomic number"),
            })
        })
        .collect()
}

/// Parses a mapping of isolated atom energies such as `{1: -13.6, 8: -2041.8}`.
pub fn parse_atomic_energies(text: &str) -> Result<Vec<(u32, f64)>> {
    let invalid = |reason: String| EquitrainError::InvalidArgument { name: "atomic-energies", reason };

    let inner = text.trim().trim_start_matches('{').trim_end_matches('}');
    let mut pairs = Vec::new();
    for entry in inner.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (z, e) = entry
            .split_once(':')
            .ok_or_else(|| invalid(format!("expected `Z: energy`, got `{entry}`")))?;
        let z = z
            .trim()
            .trim_matches('"')
            .parse::<u32>()
            .map_err(|_| invalid(format!("`{}` is not an atomic number", z.trim())))?;
        let e = e
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(format!("`{}` is not a number", e.trim())))?;
        pairs.push((z, e));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        lr: f64,
        opt: String,
        output_dir: Option<String>,
    }

    #[test]
    fn options_are_aligned() {
        let text = format_options(&Sample { lr: 0.01, opt: "adamw".into(), output_dir: None });
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Options:");
        assert!(lines.contains(&"  lr         : 0.01"));
        assert!(lines.contains(&"  opt        : adamw"));
        assert!(lines.contains(&"  output_dir : None"));
    }

    #[test]
    fn parses_number_lists() {
        assert_eq!(parse_atomic_numbers("[1, 8]").unwrap(), vec![1, 8]);
        assert_eq!(parse_atomic_numbers("6,1").unwrap(), vec![6, 1]);
        assert!(parse_atomic_numbers("[H, O]").is_err());
    }

    #[test]
    fn parses_energy_mappings() {
        let pairs = parse_atomic_energies("{1: -13.6, 8: -2041.8}").unwrap();
        assert_eq!(pairs, vec![(1, -13.6), (8, -2041.8)]);
        assert!(parse_atomic_energies("{1 -13.6}").is_err());
    }
}
