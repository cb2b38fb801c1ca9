use crate::error::{EquitrainError, Result};

const SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne",
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca",
    "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn",
    "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr",
    "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn",
    "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd",
    "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th",
    "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm",
    "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds",
    "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Atomic number for a chemical symbol (case-sensitive, e.g. `Si`).
pub fn atomic_number(symbol: &str) -> Result<u32> {
    SYMBOLS
        .iter()
        .position(|&s| s == symbol)
        .map(|i| i as u32 + 1)
        .ok_or_else(|| EquitrainError::UnknownElement(symbol.to_string()))
}

pub fn symbol(z: u32) -> Option<&'static str> {
    SYMBOLS.get((z as usize).checked_sub(1)?).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_agree() {
        assert_eq!(atomic_number("H").unwrap(), 1);
        assert_eq!(atomic_number("Si").unwrap(), 14);
        assert_eq!(atomic_number("Og").unwrap(), 118);
        assert_eq!(symbol(26), Some("Fe"));
        assert_eq!(symbol(0), None);
        assert!(atomic_number("Xx").is_err());
    }
}
