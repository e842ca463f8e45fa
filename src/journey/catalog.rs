//! Static destination, job-category and job-offer data.

/// A supported working-holiday destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Country {
    pub id: &'static str,
    pub name: &'static str,
    pub emoji: &'static str,
    pub regions: &'static [&'static str],
    /// Local certificates/registrations employers ask for.
    pub requirements: &'static [&'static str],
}

impl Country {
    /// Region chosen when the country is first picked.
    pub fn default_region(&self) -> &'static str {
        self.regions.first().copied().unwrap_or_default()
    }

    pub fn has_region(&self, region: &str) -> bool {
        self.regions.contains(&region)
    }

    pub fn has_requirement(&self, requirement: &str) -> bool {
        self.requirements.contains(&requirement)
    }
}

pub static COUNTRIES: &[Country] = &[
    Country {
        id: "au",
        name: "Australia",
        emoji: "🇦🇺",
        regions: &["Sydney", "Melbourne", "Brisbane", "Perth"],
        requirements: &["RSA", "TFN", "White Card"],
    },
    Country {
        id: "ca",
        name: "Canada",
        emoji: "🇨🇦",
        regions: &["Toronto", "Vancouver", "Montreal"],
        requirements: &["SIN", "Work Permit"],
    },
    Country {
        id: "de",
        name: "Germany",
        emoji: "🇩🇪",
        regions: &["Berlin", "Munich", "Hamburg"],
        requirements: &["Tax ID", "Anmeldung"],
    },
];

/// A job category the user can list as a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobCategory {
    pub id: &'static str,
    pub name: &'static str,
}

pub static JOB_CATEGORIES: &[JobCategory] = &[
    JobCategory { id: "barista", name: "Barista" },
    JobCategory { id: "cook", name: "Kitchen hand / Cook" },
    JobCategory { id: "it", name: "IT / Tech support" },
    JobCategory { id: "beauty", name: "Hair / Beauty" },
    JobCategory { id: "farm", name: "Farm / Factory" },
];

/// A job offer shown once the profile is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOffer {
    pub id: i64,
    pub company: &'static str,
    pub role: &'static str,
    pub pay: &'static str,
}

pub static JOB_OFFERS: &[JobOffer] = &[
    JobOffer {
        id: 1,
        company: "The Grounds",
        role: "Head Barista",
        pay: "$29.5/hr",
    },
    JobOffer {
        id: 2,
        company: "Google Sydney",
        role: "Kitchen Hand",
        pay: "$26.5/hr",
    },
];

pub fn country(id: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|c| c.id == id)
}

pub fn job_category(id: &str) -> Option<&'static JobCategory> {
    JOB_CATEGORIES.iter().find(|c| c.id == id)
}

pub fn job_offer(id: i64) -> Option<&'static JobOffer> {
    JOB_OFFERS.iter().find(|o| o.id == id)
}
