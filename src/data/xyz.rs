//! Extended XYZ reader.
//!
//! Supports the subset used for potential training data: a `Lattice`
//! (optional), a `Properties` column layout, `pbc`, and scalar / tensor
//! labels on the comment line.

use std::collections::HashMap;

use crate::data::elements;
use crate::data::structure::{LabelKeys, Structure};
use crate::math::vec3::{Mat3, Vec3};

/// Error position (1-based line) and message.
pub type ParseError = (usize, String);

struct Column {
    name: String,
    kind: char,
    width: usize,
}

pub fn parse_extxyz(text: &str, keys: &LabelKeys) -> Result<Vec<Structure>, ParseError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut structures = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].trim().is_empty() {
            i += 1;
            continue;
        }
        let n_atoms: usize = lines[i]
            .trim()
            .parse()
            .map_err(|_| (i + 1, format!("expected atom count, found `{}`", lines[i].trim())))?;
        let comment = lines
            .get(i + 1)
            .ok_or_else(|| (i + 2, "missing comment line".to_string()))?;
        let info = parse_info(comment).map_err(|reason| (i + 2, reason))?;
        let columns = parse_properties(
            info.get("Properties").map(String::as_str).unwrap_or("species:S:1:pos:R:3"),
        )
        .map_err(|reason| (i + 2, reason))?;

        let mut atomic_numbers = Vec::with_capacity(n_atoms);
        let mut positions = Vec::with_capacity(n_atoms);
        let mut forces: Vec<Vec3> = Vec::new();
        let has_forces = columns.iter().any(|c| c.name == keys.forces && c.width == 3);

        for a in 0..n_atoms {
            let line_no = i + 3 + a;
            let line = lines
                .get(line_no - 1)
                .ok_or_else(|| (line_no, format!("expected {n_atoms} atom lines")))?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            let mut cursor = 0;
            for column in &columns {
                let values = fields
                    .get(cursor..cursor + column.width)
                    .ok_or_else(|| (line_no, format!("missing values for column `{}`", column.name)))?;
                cursor += column.width;

                match (column.name.as_str(), column.kind) {
                    ("species", 'S') => {
                        let z = elements::atomic_number(values[0])
                            .map_err(|e| (line_no, e.to_string()))?;
                        atomic_numbers.push(z);
                    }
                    ("Z", 'I') => {
                        let z = values[0]
                            .parse()
                            .map_err(|_| (line_no, format!("bad atomic number `{}`", values[0])))?;
                        atomic_numbers.push(z);
                    }
                    ("pos", 'R') => positions.push(parse_vec3(values).map_err(|r| (line_no, r))?),
                    (name, 'R') if name == keys.forces && column.width == 3 => {
                        forces.push(parse_vec3(values).map_err(|r| (line_no, r))?)
                    }
                    _ => {}
                }
            }
        }

        // `species` and `Z` may both be present.
        atomic_numbers.truncate(n_atoms);
        if atomic_numbers.len() != n_atoms || positions.len() != n_atoms {
            return Err((i + 2, "Properties must provide species and pos".to_string()));
        }

        let cell = info
            .get("Lattice")
            .map(|v| parse_mat3(v).map_err(|r| (i + 2, r)))
            .transpose()?;
        let pbc = match info.get("pbc") {
            Some(v) => parse_pbc(v).map_err(|r| (i + 2, r))?,
            None => [cell.is_some(); 3],
        };
        let energy = info
            .get(&keys.energy)
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| (i + 2, format!("bad {} value `{v}`", keys.energy)))
            })
            .transpose()?;
        let stress = info
            .get(&keys.stress)
            .map(|v| parse_stress(v).map_err(|r| (i + 2, r)))
            .transpose()?;

        structures.push(Structure {
            atomic_numbers,
            positions,
            cell,
            pbc,
            energy,
            forces: has_forces.then_some(forces),
            stress,
        });
        i += 2 + n_atoms;
    }

    Ok(structures)
}

/// Splits the comment line into `key=value` pairs. Values may be quoted;
/// bare keys are stored as `T`.
fn parse_info(line: &str) -> Result<HashMap<String, String>, String> {
    let mut info = HashMap::new();
    let mut chars = line.trim().chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c.is_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }

        if chars.peek() != Some(&'=') {
            info.insert(key, "T".to_string());
            continue;
        }
        chars.next();

        let mut value = String::new();
        match chars.peek() {
            Some(&'"') => {
                chars.next();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '"' {
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
                if !closed {
                    return Err(format!("unterminated quote for key `{key}`"));
                }
            }
            _ => {
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
            }
        }
        info.insert(key, value);
    }

    Ok(info)
}

fn parse_properties(spec: &str) -> Result<Vec<Column>, String> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() % 3 != 0 {
        return Err(format!("malformed Properties `{spec}`"));
    }
    parts
        .chunks(3)
        .map(|chunk| {
            let kind = chunk[1]
                .chars()
                .next()
                .ok_or_else(|| format!("empty type in Properties `{spec}`"))?;
            let width = chunk[2]
                .parse()
                .map_err(|_| format!("bad column width `{}`", chunk[2]))?;
            Ok(Column { name: chunk[0].to_string(), kind, width })
        })
        .collect()
}

fn parse_floats(values: &[&str]) -> Result<Vec<f64>, String> {
    values
        .iter()
        .map(|v| v.parse::<f64>().map_err(|_| format!("bad number `{v}`")))
        .collect()
}

fn parse_vec3(values: &[&str]) -> Result<Vec3, String> {
    let v = parse_floats(values)?;
    match v.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(format!("expected 3 components, found {}", v.len())),
    }
}

fn parse_mat3(value: &str) -> Result<Mat3, String> {
    let v = parse_floats(&value.split_whitespace().collect::<Vec<_>>())?;
    if v.len() != 9 {
        return Err(format!("expected 9 numbers, found {}", v.len()));
    }
    Ok([[v[0], v[1], v[2]], [v[3], v[4], v[5]], [v[6], v[7], v[8]]])
}

/// Full 3x3 or Voigt order `xx yy zz yz xz xy`.
fn parse_stress(value: &str) -> Result<Mat3, String> {
    let v = parse_floats(&value.split_whitespace().collect::<Vec<_>>())?;
    match v.len() {
        9 => parse_mat3(value),
        6 => Ok([[v[0], v[5], v[4]], [v[5], v[1], v[3]], [v[4], v[3], v[2]]]),
        n => Err(format!("stress needs 6 or 9 numbers, found {n}")),
    }
}

fn parse_pbc(value: &str) -> Result<[bool; 3], String> {
    let flags = value
        .split_whitespace()
        .map(|f| match f {
            "T" | "True" | "true" | "1" => Ok(true),
            "F" | "False" | "false" | "0" => Ok(false),
            other => Err(format!("bad pbc flag `{other}`")),
        })
        .collect::<Result<Vec<_>, _>>()?;
    match flags.as_slice() {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(format!("pbc needs three flags, found `{value}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"2
Lattice="4.0 0.0 0.0 0.0 4.0 0.0 0.0 0.0 4.0" Properties=species:S:1:pos:R:3:forces:R:3 energy=-10.5 stress="1 2 3 4 5 6" pbc="T T F"
Si 0.0 0.0 0.0 0.1 0.0 0.0
Si 1.0 1.0 1.0 -0.1 0.0 0.0
1
Properties=species:S:1:pos:R:3 energy=-0.5
H 0.0 0.0 0.0
"#;

    #[test]
    fn parses_two_frames() {
        let frames = parse_extxyz(SAMPLE, &LabelKeys::default()).unwrap();
        assert_eq!(frames.len(), 2);

        let si = &frames[0];
        assert_eq!(si.atomic_numbers, vec![14, 14]);
        assert_eq!(si.positions[1], [1.0, 1.0, 1.0]);
        assert_eq!(si.energy, Some(-10.5));
        assert_eq!(si.pbc, [true, true, false]);
        assert_eq!(si.forces.as_ref().unwrap()[1], [-0.1, 0.0, 0.0]);
        assert_eq!(si.cell.unwrap()[2][2], 4.0);
        // Voigt expansion: xy lands off-diagonal.
        assert_eq!(si.stress.unwrap()[0][1], 6.0);
        assert_eq!(si.stress.unwrap()[1][2], 4.0);

        let h = &frames[1];
        assert_eq!(h.pbc, [false; 3]);
        assert!(h.cell.is_none());
        assert!(h.forces.is_none());
    }

    #[test]
    fn custom_energy_key() {
        let text = "1\nProperties=species:S:1:pos:R:3 REF_energy=-3.0\nO 0 0 0\n";
        let keys = LabelKeys { energy: "REF_energy".to_string(), ..LabelKeys::default() };
        let frames = parse_extxyz(text, &keys).unwrap();
        assert_eq!(frames[0].energy, Some(-3.0));
    }

    #[test]
    fn truncated_frame_reports_line() {
        let text = "3\nProperties=species:S:1:pos:R:3\nH 0 0 0\n";
        let (line, _) = parse_extxyz(text, &LabelKeys::default()).unwrap_err();
        assert_eq!(line, 4);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let text = "1\nLattice=\"1 0 0\nH 0 0 0\n";
        assert!(parse_extxyz(text, &LabelKeys::default()).is_err());
    }
}
