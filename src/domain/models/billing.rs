use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// GSM 03.38 character set.
    Narrow,
    /// UCS-2, anything the GSM tables cannot carry.
    Wide,
}

impl Encoding {
    pub fn single_segment_limit(&self) -> usize {
        match self {
            Encoding::Narrow => 160,
            Encoding::Wide => 70,
        }
    }

    pub fn multi_segment_limit(&self) -> usize {
        match self {
            Encoding::Narrow => 153,
            Encoding::Wide => 67,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DestinationClass {
    Domestic,
    International,
}

/// Billing rates in minor currency units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateCard {
    pub domestic: u64,
    pub international: u64,
    /// Flat per-recipient charge for voice and audio calls.
    pub voice: u64,
}

impl RateCard {
    pub fn base_rate(&self, class: DestinationClass) -> u64 {
        match class {
            DestinationClass::Domestic => self.domestic,
            DestinationClass::International => self.international,
        }
    }
}

impl Default for RateCard {
    fn default() -> Self {
        Self {
            domestic: 80,
            international: 250,
            voice: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipientCost {
    pub address: String,
    pub class: DestinationClass,
    pub cost: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CostEstimate {
    /// `None` for voice and audio, which are not segmented.
    pub encoding: Option<Encoding>,
    pub segments: u32,
    pub domestic_recipients: u32,
    pub international_recipients: u32,
    pub recipients: Vec<RecipientCost>,
    pub total: u64,
}
