//! Antiretroviral drug identification from free-text medicine names.
//!
//! Fixed-dose combinations ("TDF/3TC/DTG", "Tenofovir + Lamivudine") resolve to
//! every component they name.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Drug {
    TenofovirDisoproxil,
    TenofovirAlafenamide,
    Lamivudine,
    Emtricitabine,
    Zidovudine,
    Abacavir,
    Didanosine,
    Stavudine,
    Efavirenz,
    Nevirapine,
    Rilpivirine,
    Etravirine,
    Doravirine,
    Dolutegravir,
    Raltegravir,
    Elvitegravir,
    Bictegravir,
    Cabotegravir,
    Lopinavir,
    Atazanavir,
    Darunavir,
    Ritonavir,
    Cobicistat,
}

struct DrugName {
    drug: Drug,
    generic: &'static str,
    abbreviations: &'static [&'static str],
}

const NAMES: &[DrugName] = &[
    DrugName { drug: Drug::TenofovirAlafenamide, generic: "tenofovir alafenamide", abbreviations: &["taf"] },
    DrugName { drug: Drug::TenofovirDisoproxil, generic: "tenofovir", abbreviations: &["tdf"] },
    DrugName { drug: Drug::Lamivudine, generic: "lamivudine", abbreviations: &["3tc"] },
    DrugName { drug: Drug::Emtricitabine, generic: "emtricitabine", abbreviations: &["ftc"] },
    DrugName { drug: Drug::Zidovudine, generic: "zidovudine", abbreviations: &["azt", "zdv"] },
    DrugName { drug: Drug::Abacavir, generic: "abacavir", abbreviations: &["abc"] },
    DrugName { drug: Drug::Didanosine, generic: "didanosine", abbreviations: &["ddi"] },
    DrugName { drug: Drug::Stavudine, generic: "stavudine", abbreviations: &["d4t"] },
    DrugName { drug: Drug::Efavirenz, generic: "efavirenz", abbreviations: &["efv"] },
    DrugName { drug: Drug::Nevirapine, generic: "nevirapine", abbreviations: &["nvp"] },
    DrugName { drug: Drug::Rilpivirine, generic: "rilpivirine", abbreviations: &["rpv"] },
    DrugName { drug: Drug::Etravirine, generic: "etravirine", abbreviations: &["etr"] },
    DrugName { drug: Drug::Doravirine, generic: "doravirine", abbreviations: &["dor"] },
    DrugName { drug: Drug::Dolutegravir, generic: "dolutegravir", abbreviations: &["dtg"] },
    DrugName { drug: Drug::Raltegravir, generic: "raltegravir", abbreviations: &["ral"] },
    DrugName { drug: Drug::Elvitegravir, generic: "elvitegravir", abbreviations: &["evg"] },
    DrugName { drug: Drug::Bictegravir, generic: "bictegravir", abbreviations: &["bic"] },
    DrugName { drug: Drug::Cabotegravir, generic: "cabotegravir", abbreviations: &["cab"] },
    DrugName { drug: Drug::Lopinavir, generic: "lopinavir", abbreviations: &["lpv"] },
    DrugName { drug: Drug::Atazanavir, generic: "atazanavir", abbreviations: &["atv"] },
    DrugName { drug: Drug::Darunavir, generic: "darunavir", abbreviations: &["drv"] },
    DrugName { drug: Drug::Ritonavir, generic: "ritonavir", abbreviations: &["rtv"] },
    DrugName { drug: Drug::Cobicistat, generic: "cobicistat", abbreviations: &["cobi"] },
];

impl Drug {
    pub fn display_name(&self) -> &'static str {
        match self {
            Drug::TenofovirDisoproxil => "tenofovir disoproxil",
            Drug::TenofovirAlafenamide => "tenofovir alafenamide",
            other => NAMES
                .iter()
                .find(|n| n.drug == *other)
                .map(|n| n.generic)
                .unwrap_or("unknown"),
        }
    }
}

impl fmt::Display for Drug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A regimen line and the drugs recognised in it.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifiedMedicine {
    pub name: String,
    pub drugs: Vec<Drug>,
}

/// Drugs named in one medicine line.
pub fn identify(name: &str) -> Vec<Drug> {
    let lower = name.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let mut found = Vec::new();
    for entry in NAMES {
        let by_name = lower.contains(entry.generic);
        let by_abbreviation = entry.abbreviations.iter().any(|a| tokens.contains(a));
        if by_name || by_abbreviation {
            found.push(entry.drug);
        }
    }

    // "tenofovir alafenamide" also contains the bare generic name.
    if found.contains(&Drug::TenofovirAlafenamide)
        && !tokens.contains(&"tdf")
        && !lower.contains("disoproxil")
    {
        found.retain(|d| *d != Drug::TenofovirDisoproxil);
    }

    found.sort();
    found.dedup();
    found
}

pub fn identify_all(names: &[String]) -> Vec<IdentifiedMedicine> {
    names
        .iter()
        .map(|name| IdentifiedMedicine {
            name: name.clone(),
            drugs: identify(name),
        })
        .collect()
}

/// The line that carries `drug`, if any.
pub fn find<'a>(medicines: &'a [IdentifiedMedicine], drug: Drug) -> Option<&'a IdentifiedMedicine> {
    medicines.iter().find(|m| m.drugs.contains(&drug))
}

pub fn contains(medicines: &[IdentifiedMedicine], drug: Drug) -> bool {
    find(medicines, drug).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifies_fixed_dose_combinations() {
        assert_eq!(
            identify("TDF/3TC/DTG 300/300/50mg"),
            vec![Drug::TenofovirDisoproxil, Drug::Lamivudine, Drug::Dolutegravir]
        );
        assert_eq!(
            identify("Tenofovir + Emtricitabine"),
            vec![Drug::TenofovirDisoproxil, Drug::Emtricitabine]
        );
    }

    #[test]
    fn alafenamide_is_not_disoproxil() {
        assert_eq!(identify("Tenofovir alafenamide 25mg"), vec![Drug::TenofovirAlafenamide]);
        assert_eq!(identify("TAF"), vec![Drug::TenofovirAlafenamide]);
    }

    #[test]
    fn abbreviations_need_whole_tokens() {
        assert!(identify("Cabinet syrup").is_empty());
        assert_eq!(identify("LPV/r"), vec![Drug::Lopinavir]);
        assert!(identify("Paracetamol").is_empty());
    }
}
