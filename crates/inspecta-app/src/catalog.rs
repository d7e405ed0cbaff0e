// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogItem {
    pub code: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecklistCategory {
    pub name: &'static str,
    pub items: &'static [CatalogItem],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefectKind {
    Critical,
    NonCritical,
}

impl DefectKind {
    pub const fn field(self) -> &'static str {
        match self {
            Self::Critical => "critical_defects",
            Self::NonCritical => "non_critical_defects",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Critical => "critical defects",
            Self::NonCritical => "non-critical defects",
        }
    }
}

/// Closed item lists the inspection form toggles over. Codes outside the
/// catalog are rejected by the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Catalog {
    pub version: &'static str,
    pub checklist: &'static [ChecklistCategory],
    pub critical_defects: &'static [CatalogItem],
    pub non_critical_defects: &'static [CatalogItem],
}

const fn item(code: &'static str, label: &'static str) -> CatalogItem {
    CatalogItem { code, label }
}

const ONAC_V1_CHECKLIST: &[ChecklistCategory] = &[
    ChecklistCategory {
        name: "Service line and meter",
        items: &[
            item("270", "Meter location is adequate"),
            item("271", "Meter in good condition"),
            item("272", "Shut-off valve accessible"),
            item("273", "No leaks on the service line"),
        ],
    },
    ChecklistCategory {
        name: "Piping",
        items: &[
            item("280", "Appropriate, certified material"),
            item("281", "Adequate diameter"),
            item("282", "Correct supports"),
            item("283", "No visible damage"),
            item("284", "Sealed connections"),
            item("285", "Safety distances respected"),
        ],
    },
    ChecklistCategory {
        name: "Ventilation",
        items: &[
            item("290", "Upper ventilation adequate"),
            item("291", "Lower ventilation adequate"),
            item("292", "Openings free of obstruction"),
            item("293", "Grilles in good condition"),
        ],
    },
    ChecklistCategory {
        name: "Appliances",
        items: &[
            item("300", "Certified appliances"),
            item("301", "Correct installation"),
            item("302", "Proper combustion flames"),
            item("303", "Flue exhaust system"),
            item("304", "Working correctly"),
        ],
    },
    ChecklistCategory {
        name: "Safety",
        items: &[
            item("310", "Shut-off valves operational"),
            item("311", "Signage present"),
            item("312", "Gas extractor (if applicable)"),
            item("313", "Gas detectors (if applicable)"),
        ],
    },
    ChecklistCategory {
        name: "General installation",
        items: &[
            item("320", "Meets current regulations"),
            item("321", "No unauthorized connections"),
            item("322", "Technical documentation complete"),
            item("323", "Installation unaltered"),
        ],
    },
];

const ONAC_V1_CRITICAL: &[CatalogItem] = &[
    item("270", "Gas leak on the service line"),
    item("271", "Gas leak on internal piping"),
    item("272", "Unsupported piping"),
    item("273", "Uncertified material"),
    item("275", "Insufficient ventilation"),
    item("280", "Appliance without flue exhaust"),
    item("285", "Unauthorized installation"),
];

const ONAC_V1_NON_CRITICAL: &[CatalogItem] = &[
    item("310", "Deteriorated paint"),
    item("311", "Incomplete signage"),
    item("312", "Hard-to-reach valve"),
    item("318", "Incomplete documentation"),
    item("320", "Dirty ventilation grille"),
];

impl Catalog {
    pub const fn onac_v1() -> Self {
        Self {
            version: "onac-v1",
            checklist: ONAC_V1_CHECKLIST,
            critical_defects: ONAC_V1_CRITICAL,
            non_critical_defects: ONAC_V1_NON_CRITICAL,
        }
    }

    pub fn checklist_items(&self) -> impl Iterator<Item = &'static CatalogItem> + '_ {
        self.checklist
            .iter()
            .flat_map(|category| category.items.iter())
    }

    pub fn has_checklist_item(&self, code: &str) -> bool {
        self.checklist_items().any(|item| item.code == code)
    }

    pub fn defects(&self, kind: DefectKind) -> &'static [CatalogItem] {
        match kind {
            DefectKind::Critical => self.critical_defects,
            DefectKind::NonCritical => self.non_critical_defects,
        }
    }

    pub fn has_defect(&self, kind: DefectKind, code: &str) -> bool {
        self.defects(kind).iter().any(|item| item.code == code)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::onac_v1()
    }
}

#[cfg(test)]
mod tests {
    use super::{Catalog, DefectKind};
    use std::collections::BTreeSet;

    #[test]
    fn checklist_codes_are_unique() {
        let catalog = Catalog::onac_v1();
        let codes: Vec<&str> = catalog.checklist_items().map(|item| item.code).collect();
        let unique: BTreeSet<&str> = codes.iter().copied().collect();
        assert_eq!(codes.len(), unique.len());
        assert_eq!(codes.len(), 27);
        assert_eq!(catalog.checklist.len(), 6);
    }

    #[test]
    fn defect_lists_are_separate_namespaces() {
        let catalog = Catalog::onac_v1();
        assert!(catalog.has_defect(DefectKind::Critical, "275"));
        assert!(!catalog.has_defect(DefectKind::NonCritical, "275"));
        assert!(catalog.has_defect(DefectKind::NonCritical, "318"));
        assert!(!catalog.has_checklist_item("275"));
    }
}
