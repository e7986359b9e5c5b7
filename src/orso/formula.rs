//! Chemical formulas and neutron scattering lengths.
//!
//! Formulas follow the notation of ORSO sample models: element symbols with
//! optional (possibly fractional) counts and parenthesised groups, e.g.
//! `D2O`, `SiO2`, `(C8H8)10`. Deuterium is written `D`.

use std::collections::BTreeMap;

use nom::{
    branch::alt,
    character::complete::{char, digit1, satisfy},
    combinator::{all_consuming, map_res, opt, recognize},
    multi::many1,
    sequence::{delimited, pair},
    IResult, Parser,
};
use thiserror::Error;

/// Avogadro constant in 1/mol.
const AVOGADRO: f64 = 6.022_140_76e23;

/// Cubic centimetres per cubic angstrom.
const CM3_PER_A3: f64 = 1e-24;

/// Angstrom per femtometre.
const A_PER_FM: f64 = 1e-5;

/// Coherent neutron scattering length (fm) and molar mass (g/mol).
const ELEMENTS: &[(&str, f64, f64)] = &[
    ("H", -3.7390, 1.008),
    ("D", 6.671, 2.014),
    ("He", 3.26, 4.0026),
    ("Li", -1.90, 6.94),
    ("Be", 7.79, 9.0122),
    ("B", 5.30, 10.81),
    ("C", 6.6460, 12.011),
    ("N", 9.36, 14.007),
    ("O", 5.803, 15.999),
    ("F", 5.654, 18.998),
    ("Na", 3.63, 22.990),
    ("Mg", 5.375, 24.305),
    ("Al", 3.449, 26.982),
    ("Si", 4.1491, 28.085),
    ("P", 5.13, 30.974),
    ("S", 2.847, 32.06),
    ("Cl", 9.577, 35.45),
    ("K", 3.67, 39.098),
    ("Ca", 4.70, 40.078),
    ("Ti", -3.438, 47.867),
    ("V", -0.3824, 50.942),
    ("Cr", 3.635, 51.996),
    ("Mn", -3.73, 54.938),
    ("Fe", 9.45, 55.845),
    ("Co", 2.49, 58.933),
    ("Ni", 10.3, 58.693),
    ("Cu", 7.718, 63.546),
    ("Zn", 5.680, 65.38),
    ("Ga", 7.288, 69.723),
    ("Ge", 8.185, 72.630),
    ("Sr", 7.02, 87.62),
    ("Y", 7.75, 88.906),
    ("Zr", 7.16, 91.224),
    ("Nb", 7.054, 92.906),
    ("Mo", 6.715, 95.95),
    ("Pd", 5.91, 106.42),
    ("Ag", 5.922, 107.87),
    ("In", 4.065, 114.82),
    ("Sn", 6.225, 118.71),
    ("Ba", 5.07, 137.33),
    ("La", 8.24, 138.91),
    ("Hf", 7.7, 178.49),
    ("Ta", 6.91, 180.95),
    ("W", 4.86, 183.84),
    ("Ir", 10.6, 192.22),
    ("Pt", 9.60, 195.08),
    ("Au", 7.63, 196.97),
    ("Pb", 9.405, 207.2),
    ("Bi", 8.532, 208.98),
];

/// Bulk mass densities (g/cm^3) for materials commonly named by formula only.
const KNOWN_DENSITIES: &[(&str, f64)] = &[
    ("Si", 2.329),
    ("SiO2", 2.2),
    ("D2O", 1.107),
    ("H2O", 0.997),
    ("Au", 19.32),
    ("Ni", 8.908),
    ("Ti", 4.506),
    ("Cr", 7.19),
    ("Fe", 7.874),
    ("Co", 8.90),
    ("Cu", 8.96),
    ("Ag", 10.49),
    ("Pd", 12.02),
    ("Pt", 21.45),
    ("Al", 2.70),
    ("Al2O3", 3.95),
    ("Nb", 8.57),
    ("Mo", 10.28),
    ("Ta", 16.69),
    ("W", 19.25),
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("cannot parse formula '{0}'")]
    Syntax(String),

    #[error("unknown element '{0}'")]
    UnknownElement(String),
}

/// A parsed chemical formula: element symbol to atom count.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    text: String,
    counts: BTreeMap<String, f64>,
}

enum Group {
    Element(String, f64),
    Nested(Vec<Group>, f64),
}

fn count(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        str::parse::<f64>,
    )
    .parse(input)
}

fn symbol(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_uppercase()),
        opt(satisfy(|c: char| c.is_ascii_lowercase())),
    ))
    .parse(input)
}

fn element(input: &str) -> IResult<&str, Group> {
    let (input, (sym, n)) = (symbol, opt(count)).parse(input)?;
    Ok((input, Group::Element(sym.to_string(), n.unwrap_or(1.0))))
}

fn nested(input: &str) -> IResult<&str, Group> {
    let (input, (groups, n)) =
        (delimited(char('('), many1(group), char(')')), opt(count)).parse(input)?;
    Ok((input, Group::Nested(groups, n.unwrap_or(1.0))))
}

fn group(input: &str) -> IResult<&str, Group> {
    alt((element, nested)).parse(input)
}

fn accumulate(groups: &[Group], factor: f64, counts: &mut BTreeMap<String, f64>) {
    for g in groups {
        match g {
            Group::Element(sym, n) => *counts.entry(sym.clone()).or_insert(0.0) += n * factor,
            Group::Nested(inner, n) => accumulate(inner, factor * n, counts),
        }
    }
}

fn element_data(symbol: &str) -> Result<(f64, f64), FormulaError> {
    ELEMENTS
        .iter()
        .find(|(s, _, _)| *s == symbol)
        .map(|(_, b, m)| (*b, *m))
        .ok_or_else(|| FormulaError::UnknownElement(symbol.to_string()))
}

impl Formula {
    /// Parse a formula; every symbol must be a known element.
    pub fn parse(text: &str) -> Result<Self, FormulaError> {
        let trimmed = text.trim();
        let (_, groups) = all_consuming(many1(group))
            .parse(trimmed)
            .map_err(|_| FormulaError::Syntax(trimmed.to_string()))?;

        let mut counts = BTreeMap::new();
        accumulate(&groups, 1.0, &mut counts);
        for sym in counts.keys() {
            element_data(sym)?;
        }

        Ok(Self {
            text: trimmed.to_string(),
            counts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Atom count per element symbol.
    pub fn counts(&self) -> &BTreeMap<String, f64> {
        &self.counts
    }

    /// Sum of coherent scattering lengths of one formula unit, in fm.
    pub fn scattering_length_fm(&self) -> f64 {
        self.counts
            .iter()
            .filter_map(|(sym, n)| element_data(sym).ok().map(|(b, _)| b * n))
            .sum()
    }

    /// Molar mass of one formula unit, in g/mol.
    pub fn molar_mass(&self) -> f64 {
        self.counts
            .iter()
            .filter_map(|(sym, n)| element_data(sym).ok().map(|(_, m)| m * n))
            .sum()
    }

    /// SLD (1/angstrom^2) at the given number density of formula units (1/angstrom^3).
    pub fn sld_at_number_density(&self, per_a3: f64) -> f64 {
        per_a3 * self.scattering_length_fm() * A_PER_FM
    }

    /// SLD (1/angstrom^2) at the given mass density (g/cm^3).
    pub fn sld_at_mass_density(&self, g_per_cm3: f64) -> f64 {
        let per_a3 = g_per_cm3 * AVOGADRO / self.molar_mass() * CM3_PER_A3;
        self.sld_at_number_density(per_a3)
    }

    /// Tabulated bulk density for this formula, if known.
    pub fn known_density(&self) -> Option<f64> {
        KNOWN_DENSITIES
            .iter()
            .find(|(f, _)| *f == self.text)
            .map(|(_, d)| *d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_simple_formulas() {
        let f = Formula::parse("SiO2").unwrap();
        assert_eq!(f.counts()["Si"], 1.0);
        assert_eq!(f.counts()["O"], 2.0);

        let f = Formula::parse("(C8H8)10").unwrap();
        assert_eq!(f.counts()["C"], 80.0);
        assert_eq!(f.counts()["H"], 80.0);

        let f = Formula::parse("Fe0.5Ni0.5").unwrap();
        assert_eq!(f.counts()["Fe"], 0.5);
    }

    #[test]
    fn test_parse_rejects_unknown_or_malformed() {
        assert_eq!(
            Formula::parse("Xx2"),
            Err(FormulaError::UnknownElement("Xx".to_string()))
        );
        assert!(matches!(
            Formula::parse("air"),
            Err(FormulaError::Syntax(_))
        ));
        assert!(matches!(Formula::parse("(Si"), Err(FormulaError::Syntax(_))));
    }

    #[test]
    fn test_tabulated_slds() {
        let d2o = Formula::parse("D2O").unwrap();
        let sld = d2o.sld_at_mass_density(d2o.known_density().unwrap());
        assert_relative_eq!(sld, 6.37e-6, max_relative = 0.01);

        let si = Formula::parse("Si").unwrap();
        let sld = si.sld_at_mass_density(si.known_density().unwrap());
        assert_relative_eq!(sld, 2.07e-6, max_relative = 0.01);

        let h2o = Formula::parse("H2O").unwrap();
        let sld = h2o.sld_at_mass_density(h2o.known_density().unwrap());
        assert_relative_eq!(sld, -0.56e-6, max_relative = 0.02);
    }
}
