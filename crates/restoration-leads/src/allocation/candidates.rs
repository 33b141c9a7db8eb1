use super::domain::{Lead, Money, Partner};

/// Partners that pass the hard gates for one lead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    partners: Vec<Partner>,
}

impl CandidateSet {
    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Partner> {
        self.partners.iter()
    }

    pub fn into_partners(self) -> Vec<Partner> {
        self.partners
    }
}

/// Keep active partners that can afford the lead and serve its suburb, postcode or
/// state. An empty set is a normal outcome.
pub fn filter_candidates(lead: &Lead, lead_value: Money, roster: Vec<Partner>) -> CandidateSet {
    let partners = roster
        .into_iter()
        .filter(|partner| partner.is_active())
        .filter(|partner| partner.credit_balance >= lead_value)
        .filter(|partner| partner.serves(&lead.address))
        .collect();

    CandidateSet { partners }
}
