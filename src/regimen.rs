//! WHO treatment regimen classification of drug susceptibility profiles
//!
//! A profile is assigned the first regimen in [`REGIMEN_RULES`] whose
//! conditions all hold. Drugs missing from a profile are unknown, and an
//! unknown outcome never satisfies a condition.

use crate::Phenotype;
use std::collections::BTreeMap;

const R: Phenotype = Phenotype::Resistant;
const S: Phenotype = Phenotype::Susceptible;

/// Drugs recorded in a DST profile, with their WHO abbreviations
pub const PROFILE_DRUGS: [(&str, &str); 16] = [
    ("Isoniazid", "H"),
    ("Rifampicin", "R"),
    ("Pyrazinamide", "Z"),
    ("Ethambutol", "E"),
    ("Kanamycin", "Km"),
    ("Amikacin", "Am"),
    ("Capreomycin", "Cm"),
    ("Streptomycin", "S"),
    ("Ofloxacin", "Ofx"),
    ("Ciprofloxacin", "Cfx"),
    ("Moxifloxacin", "Mfx"),
    ("Bedaquiline", "Bdq"),
    ("Linezolid", "Lzd"),
    ("Clofazimide", "Cfz"),
    ("Cycloserine", "Cs"),
    ("Terizidone", "Trd"),
];

/// WHO drug groupings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrugGroup {
    One,
    Two,
    Three,
    Four,
    Five,
    A,
    B,
    C,
    D1,
    D2,
    D3,
}

impl DrugGroup {
    pub fn drugs(&self) -> &'static [&'static str] {
        match self {
            DrugGroup::One => &[
                "Rifampicin",
                "Rifabutin",
                "Rifapentine",
                "Isoniazid",
                "Ethambutol",
                "Pyrazinamide",
            ],
            DrugGroup::Two | DrugGroup::B => {
                &["Streptomycin", "Kanamycin", "Amikacin", "Capreomycin"]
            }
            DrugGroup::Three | DrugGroup::A => &["Levofloxacin", "Moxifloxacin", "Gatifloxacin"],
            DrugGroup::Four => &[
                "Ethionamide",
                "Prothionamide",
                "Para-aminosalicylate",
                "Para-aminosalicylate-Sodium",
                "Cycloserine",
                "Terizidone",
            ],
            DrugGroup::Five => &[
                "Thioacetazone",
                "Clofazimide",
                "Linezolid",
                "Amox-Clavulanate",
                "Imipenem/Cilastatin",
                "Meropenem",
                "High dose Isoniazid",
                "Delaminid",
                "Bedaquiline",
            ],
            DrugGroup::C => &[
                "Ethionamide",
                "Prothionamide",
                "Cycloserine",
                "Terizidone",
                "Clofazimide",
                "Linezolid",
            ],
            DrugGroup::D1 => &["Ethambutol", "Pyrazinamide", "High dose Isoniazid"],
            DrugGroup::D2 => &["Delaminid", "Bedaquiline"],
            DrugGroup::D3 => &[
                "Para-aminosalicylate",
                "Para-aminosalicylate-Sodium",
                "Amox-Clavulanate",
                "Imipenem/Cilastatin",
                "Meropenem",
            ],
        }
    }
}

/// Drug requirement of a regimen. Reference data only: classification
/// uses [`REGIMEN_RULES`], not these requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrugRequirement {
    Drug(&'static str),
    OneOf(&'static [&'static str]),
    OneOfGroup(DrugGroup),
    AllOfGroup(DrugGroup),
    AtLeastTwoOf(&'static [&'static str]),
}

/// A WHO treatment regimen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Regimen {
    pub number: u8,
    pub definition: &'static str,
    pub mandatory: &'static [DrugRequirement],
    pub optional: &'static [DrugRequirement],
}

use DrugRequirement::{AllOfGroup, AtLeastTwoOf, Drug, OneOf, OneOfGroup};

pub static REGIMENS: [Regimen; 12] = [
    Regimen {
        number: 1,
        definition: "DS-TB",
        mandatory: &[
            Drug("Isoniazid"),
            Drug("Rifampicin"),
            Drug("Pyrazinamide"),
            Drug("Ethambutol"),
        ],
        optional: &[],
    },
    Regimen {
        number: 2,
        definition: "Mono-H DR-TB",
        mandatory: &[Drug("Rifampicin"), Drug("Pyrazinamide"), Drug("Ethambutol")],
        optional: &[OneOfGroup(DrugGroup::A)],
    },
    Regimen {
        number: 3,
        definition: "Mono-H DR-TB",
        mandatory: &[Drug("Rifampicin"), Drug("Pyrazinamide"), Drug("Ethambutol")],
        optional: &[],
    },
    Regimen {
        number: 4,
        definition: "H-Z DR-TB",
        mandatory: &[Drug("Rifampicin"), Drug("Ethambutol"), OneOfGroup(DrugGroup::A)],
        optional: &[],
    },
    Regimen {
        number: 5,
        definition: "H-E DR-TB",
        mandatory: &[Drug("Rifampicin"), Drug("Pyrazinamide"), OneOfGroup(DrugGroup::A)],
        optional: &[],
    },
    Regimen {
        number: 6,
        definition: "H-Z-E DR-TB",
        mandatory: &[
            Drug("Rifampicin"),
            Drug("Ethionamide"),
            OneOf(&["Moxifloxacin", "Levofloxacin", "Gatifloxacin"]),
            OneOf(&["Kanamycin", "Amikacin", "Capreomycin"]),
        ],
        optional: &[],
    },
    Regimen {
        number: 7,
        definition: "H-Z-E DR-TB",
        mandatory: &[
            Drug("Rifampicin"),
            Drug("Ethionamide"),
            Drug("Streptomycin"),
            OneOf(&["Moxifloxacin", "Levofloxacin", "Gatifloxacin"]),
        ],
        optional: &[],
    },
    Regimen {
        number: 8,
        definition: "Mono-Z DR-TB",
        mandatory: &[Drug("Isoniazid"), Drug("Rifampicin"), Drug("Ethambutol")],
        optional: &[],
    },
    Regimen {
        number: 9,
        definition: "Mono-E DR-TB",
        mandatory: &[Drug("Isoniazid"), Drug("Rifampicin"), Drug("Pyrazinamide")],
        optional: &[],
    },
    Regimen {
        number: 10,
        definition: "RR-TB",
        mandatory: &[
            Drug("Isoniazid"),
            Drug("Bedaquiline"),
            Drug("Linezolid"),
            OneOf(&["Moxifloxacin", "Levofloxacin"]),
            OneOf(&["Clofazimide", "Cycloserine", "Terizidone"]),
        ],
        optional: &[],
    },
    Regimen {
        number: 11,
        definition: "MDR-TB",
        mandatory: &[
            Drug("Bedaquiline"),
            Drug("Linezolid"),
            OneOf(&["Moxifloxacin", "Levofloxacin"]),
            OneOf(&["Clofazimide", "Cycloserine", "Terizidone"]),
        ],
        optional: &[],
    },
    Regimen {
        number: 12,
        definition: "XDR-TB",
        mandatory: &[
            AllOfGroup(DrugGroup::One),
            OneOf(&["Amikacin", "Streptomycin"]),
            OneOf(&["Levofloxacin", "Moxifloxacin", "Gatifloxacin"]),
            AllOfGroup(DrugGroup::Four),
            // group 5 without group D2
            AtLeastTwoOf(&[
                "Thioacetazone",
                "Clofazimide",
                "Linezolid",
                "Amox-Clavulanate",
                "Imipenem/Cilastatin",
                "Meropenem",
                "High dose Isoniazid",
            ]),
            Drug("High dose Isoniazid"),
        ],
        optional: &[],
    },
];

/// Look up a regimen by its number
pub fn regimen(number: u8) -> Option<&'static Regimen> {
    REGIMENS.iter().find(|r| r.number == number)
}

/// One row of the decision table: every condition must hold exactly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegimenRule {
    pub conditions: &'static [(&'static str, Phenotype)],
    pub regimen: u8,
}

impl RegimenRule {
    pub fn matches(&self, phenos: &BTreeMap<String, Phenotype>) -> bool {
        self.conditions
            .iter()
            .all(|(drug, wanted)| phenotype_of(phenos, drug) == *wanted)
    }
}

/// Priority ordered decision table. First match wins; no match means no regimen.
pub static REGIMEN_RULES: [RegimenRule; 12] = [
    RegimenRule {
        conditions: &[("Isoniazid", S), ("Rifampicin", S), ("Pyrazinamide", S), ("Ethambutol", S)],
        regimen: 1,
    },
    RegimenRule {
        conditions: &[
            ("Isoniazid", R),
            ("Rifampicin", S),
            ("Pyrazinamide", S),
            ("Ethambutol", S),
            ("Moxifloxacin", R),
        ],
        regimen: 3,
    },
    RegimenRule {
        conditions: &[("Isoniazid", R), ("Rifampicin", S), ("Pyrazinamide", S), ("Ethambutol", S)],
        regimen: 2,
    },
    RegimenRule {
        conditions: &[("Isoniazid", R), ("Rifampicin", S), ("Pyrazinamide", R), ("Ethambutol", S)],
        regimen: 4,
    },
    RegimenRule {
        conditions: &[("Isoniazid", R), ("Rifampicin", S), ("Pyrazinamide", S), ("Ethambutol", R)],
        regimen: 5,
    },
    RegimenRule {
        conditions: &[
            ("Isoniazid", R),
            ("Rifampicin", S),
            ("Pyrazinamide", R),
            ("Ethambutol", R),
            ("Kanamycin", R),
            ("Amikacin", R),
            ("Capreomycin", R),
            ("Streptomycin", S),
        ],
        regimen: 7,
    },
    RegimenRule {
        conditions: &[("Isoniazid", R), ("Rifampicin", S), ("Pyrazinamide", R), ("Ethambutol", R)],
        regimen: 6,
    },
    RegimenRule {
        conditions: &[("Isoniazid", S), ("Rifampicin", S), ("Pyrazinamide", R), ("Ethambutol", S)],
        regimen: 8,
    },
    RegimenRule {
        conditions: &[("Isoniazid", S), ("Rifampicin", S), ("Pyrazinamide", S), ("Ethambutol", R)],
        regimen: 9,
    },
    RegimenRule {
        conditions: &[("Isoniazid", R), ("Rifampicin", R), ("Moxifloxacin", R)],
        regimen: 12,
    },
    RegimenRule {
        conditions: &[("Isoniazid", R), ("Rifampicin", R)],
        regimen: 11,
    },
    RegimenRule {
        conditions: &[("Rifampicin", R)],
        regimen: 10,
    },
];

fn phenotype_of(phenos: &BTreeMap<String, Phenotype>, drug: &str) -> Phenotype {
    phenos.get(drug).copied().unwrap_or(Phenotype::Unknown)
}

/// Classify a drug -> phenotype map into a regimen
pub fn classify(phenos: &BTreeMap<String, Phenotype>) -> Option<&'static Regimen> {
    REGIMEN_RULES
        .iter()
        .find(|rule| rule.matches(phenos))
        .and_then(|rule| regimen(rule.regimen))
}

/// Drug susceptibility profile restricted to the profile drugs, with its regimen
#[derive(Debug, Clone, PartialEq)]
pub struct DstProfile {
    phenos: BTreeMap<String, Phenotype>,
    regimen: Option<&'static Regimen>,
}

impl DstProfile {
    pub fn new(drug_to_pheno: &BTreeMap<String, Phenotype>) -> Self {
        let phenos: BTreeMap<String, Phenotype> = PROFILE_DRUGS
            .iter()
            .map(|(drug, _)| (drug.to_string(), phenotype_of(drug_to_pheno, drug)))
            .collect();
        let regimen = classify(&phenos);
        Self { phenos, regimen }
    }

    pub fn phenotype(&self, drug: &str) -> Phenotype {
        phenotype_of(&self.phenos, drug)
    }

    pub fn regimen(&self) -> Option<&'static Regimen> {
        self.regimen
    }

    pub fn regimen_number(&self) -> Option<u8> {
        self.regimen.map(|r| r.number)
    }

    /// Two unclassifiable profiles are never the same regimen
    pub fn has_same_regimen(&self, other: &DstProfile) -> bool {
        match (self.regimen, other.regimen) {
            (Some(a), Some(b)) => a.number == b.number,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phenos(pairs: &[(&str, Phenotype)]) -> BTreeMap<String, Phenotype> {
        pairs.iter().map(|(d, p)| (d.to_string(), *p)).collect()
    }

    fn number(pairs: &[(&str, Phenotype)]) -> Option<u8> {
        classify(&phenos(pairs)).map(|r| r.number)
    }

    #[test]
    fn test_first_line_regimens() {
        let first_line = ["Isoniazid", "Rifampicin", "Pyrazinamide", "Ethambutol"];
        let cases = [
            ([S, S, S, S], Some(1)),
            ([R, S, S, S], Some(2)),
            ([R, S, R, S], Some(4)),
            ([R, S, S, R], Some(5)),
            ([R, S, R, R], Some(6)),
            ([S, S, R, S], Some(8)),
            ([S, S, S, R], Some(9)),
            ([S, S, R, R], None),
        ];

        for (outcomes, expected) in cases {
            let pairs: Vec<(&str, Phenotype)> =
                first_line.iter().copied().zip(outcomes.iter().copied()).collect();
            assert_eq!(number(&pairs), expected, "profile {:?}", outcomes);
        }
    }

    #[test]
    fn test_moxifloxacin_guard() {
        let mut p = phenos(&[
            ("Isoniazid", R),
            ("Rifampicin", S),
            ("Pyrazinamide", S),
            ("Ethambutol", S),
        ]);
        assert_eq!(classify(&p).map(|r| r.number), Some(2));

        p.insert("Moxifloxacin".to_string(), S);
        assert_eq!(classify(&p).map(|r| r.number), Some(2));

        p.insert("Moxifloxacin".to_string(), R);
        assert_eq!(classify(&p).map(|r| r.number), Some(3));
    }

    #[test]
    fn test_aminoglycoside_guard() {
        let mut p = phenos(&[
            ("Isoniazid", R),
            ("Rifampicin", S),
            ("Pyrazinamide", R),
            ("Ethambutol", R),
        ]);
        assert_eq!(classify(&p).map(|r| r.number), Some(6));

        p.insert("Kanamycin".to_string(), R);
        p.insert("Amikacin".to_string(), R);
        p.insert("Capreomycin".to_string(), R);
        assert_eq!(classify(&p).map(|r| r.number), Some(6));

        p.insert("Streptomycin".to_string(), S);
        assert_eq!(classify(&p).map(|r| r.number), Some(7));
    }

    #[test]
    fn test_rifampicin_resistant_regimens() {
        assert_eq!(number(&[("Rifampicin", R)]), Some(10));
        assert_eq!(
            number(&[("Rifampicin", R), ("Kanamycin", S), ("Moxifloxacin", S)]),
            Some(10)
        );
        assert_eq!(number(&[("Isoniazid", R), ("Rifampicin", R)]), Some(11));
        assert_eq!(
            number(&[("Isoniazid", R), ("Rifampicin", R), ("Moxifloxacin", S)]),
            Some(11)
        );
        assert_eq!(
            number(&[("Isoniazid", R), ("Rifampicin", R), ("Moxifloxacin", R)]),
            Some(12)
        );
    }

    #[test]
    fn test_unknowns_give_no_regimen() {
        assert_eq!(number(&[]), None);
        assert_eq!(
            number(&[("Isoniazid", Phenotype::Unknown), ("Rifampicin", S), ("Pyrazinamide", S), ("Ethambutol", S)]),
            None
        );
        assert_eq!(number(&[("Rifampicin", S)]), None);
    }

    #[test]
    fn test_rules_point_at_known_regimens() {
        for rule in REGIMEN_RULES.iter() {
            assert!(regimen(rule.regimen).is_some());
        }
        assert_eq!(regimen(12).unwrap().definition, "XDR-TB");
        assert!(regimen(13).is_none());
    }

    #[test]
    fn test_dst_profile_ignores_non_profile_drugs() {
        let profile = DstProfile::new(&phenos(&[("Rifampicin", R), ("Quinolones", R)]));
        assert_eq!(profile.regimen_number(), Some(10));
        assert_eq!(profile.phenotype("Quinolones"), Phenotype::Unknown);
        assert_eq!(profile.phenotype("Rifampicin"), R);
    }

    #[test]
    fn test_has_same_regimen() {
        let mut p = phenos(&[
            ("Isoniazid", Phenotype::Unknown),
            ("Rifampicin", S),
            ("Pyrazinamide", S),
            ("Ethambutol", S),
        ]);
        let dst1 = DstProfile::new(&p);
        let dst2 = DstProfile::new(&p);
        assert!(!dst1.has_same_regimen(&dst2));

        p.insert("Isoniazid".to_string(), S);
        let dst1 = DstProfile::new(&p);
        assert!(!dst1.has_same_regimen(&dst2));

        let dst2 = DstProfile::new(&p);
        assert!(dst1.has_same_regimen(&dst2));

        p.insert("Isoniazid".to_string(), R);
        let dst1 = DstProfile::new(&p);
        let dst2 = DstProfile::new(&p);
        assert!(dst1.has_same_regimen(&dst2));
    }

    #[test]
    fn test_drug_groups() {
        assert!(DrugGroup::A.drugs().contains(&"Moxifloxacin"));
        assert_eq!(DrugGroup::Two.drugs(), DrugGroup::B.drugs());
        assert_eq!(PROFILE_DRUGS.len(), 16);
    }
}
