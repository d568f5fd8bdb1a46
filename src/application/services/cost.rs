//! Billing cost of a message, computed the way the delivery network segments it.
//!
//! Text is classified as narrow (GSM 03.38) or wide (UCS-2). Narrow length is
//! counted in septets, where extension-table characters take two; wide length
//! is counted in UTF-16 code units. One segment holds 160/70 units; once a
//! message needs concatenation every segment loses its header bytes and holds
//! 153/67 units.

use crate::domain::models::{
    CostEstimate, DestinationClass, Encoding, MessageKind, RateCard, RecipientCost,
};

const GSM_BASIC: &str = "@£$¥èéùìòÇ\nØø\rÅåΔ_ΦΓΛΩΠΨΣΘΞ\u{1b}ÆæßÉ !\"#¤%&'()*+,-./0123456789:;<=>?\
¡ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÑÜ§¿abcdefghijklmnopqrstuvwxyzäöñüà";

const GSM_EXTENSION: &str = "\u{c}^{}\\[~]|€";

fn is_gsm_basic(c: char) -> bool {
    GSM_BASIC.contains(c)
}

fn is_gsm_extension(c: char) -> bool {
    GSM_EXTENSION.contains(c)
}

pub fn classify(content: &str) -> Encoding {
    if content
        .chars()
        .all(|c| is_gsm_basic(c) || is_gsm_extension(c))
    {
        Encoding::Narrow
    } else {
        Encoding::Wide
    }
}

/// Length in the units the network bills: septets for narrow, UTF-16 units for wide.
pub fn encoded_length(content: &str, encoding: Encoding) -> usize {
    match encoding {
        Encoding::Narrow => content
            .chars()
            .map(|c| if is_gsm_extension(c) { 2 } else { 1 })
            .sum(),
        Encoding::Wide => content.encode_utf16().count(),
    }
}

pub fn segments(content: &str) -> u32 {
    let encoding = classify(content);
    let length = encoded_length(content, encoding);
    if length <= encoding.single_segment_limit() {
        1
    } else {
        length.div_ceil(encoding.multi_segment_limit()) as u32
    }
}

#[derive(Debug, Clone)]
pub struct CostCalculator {
    rates: RateCard,
    home_prefix: String,
}

impl CostCalculator {
    pub fn new(rates: RateCard, home_prefix: impl Into<String>) -> Self {
        Self {
            rates,
            home_prefix: home_prefix.into(),
        }
    }

    pub fn rates(&self) -> &RateCard {
        &self.rates
    }

    /// Numbers in the home country code, or in national format, are domestic.
    pub fn destination_class(&self, address: &str) -> DestinationClass {
        let country_digits = self.home_prefix.trim_start_matches('+');
        let domestic = match address.strip_prefix('+') {
            Some(international) => international.starts_with(country_digits),
            None => address.starts_with('0') || address.starts_with(country_digits),
        };
        if domestic {
            DestinationClass::Domestic
        } else {
            DestinationClass::International
        }
    }

    pub fn cost_per_recipient(&self, kind: MessageKind, content: &str, class: DestinationClass) -> u64 {
        match kind {
            MessageKind::Text => self.rates.base_rate(class) * u64::from(segments(content)),
            MessageKind::Voice | MessageKind::Audio => self.rates.voice,
        }
    }

    pub fn total_cost<S: AsRef<str>>(&self, kind: MessageKind, content: &str, recipients: &[S]) -> u64 {
        self.estimate(kind, content, recipients).total
    }

    pub fn estimate<S: AsRef<str>>(&self, kind: MessageKind, content: &str, recipients: &[S]) -> CostEstimate {
        let (encoding, segments) = match kind {
            MessageKind::Text => (Some(classify(content)), segments(content)),
            MessageKind::Voice | MessageKind::Audio => (None, 1),
        };

        let mut domestic_recipients = 0;
        let mut international_recipients = 0;
        let mut costs = Vec::with_capacity(recipients.len());
        for address in recipients {
            let address = address.as_ref();
            let class = self.destination_class(address);
            match class {
                DestinationClass::Domestic => domestic_recipients += 1,
                DestinationClass::International => international_recipients += 1,
            }
            costs.push(RecipientCost {
                address: address.to_string(),
                class,
                cost: self.cost_per_recipient(kind, content, class),
            });
        }

        CostEstimate {
            encoding,
            segments,
            domestic_recipients,
            international_recipients,
            total: costs.iter().map(|c| c.cost).sum(),
            recipients: costs,
        }
    }
}
