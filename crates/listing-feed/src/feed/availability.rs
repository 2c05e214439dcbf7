use super::domain::{FeedConfig, PropertyStatus};

/// Marketplace availability vocabulary rendered in `disponibilidade`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    Active,
    Sold,
    Rented,
    Inactive,
}

impl Availability {
    pub fn from_status(status: &PropertyStatus) -> Self {
        match status {
            PropertyStatus::Available => Self::Active,
            PropertyStatus::Sold => Self::Sold,
            PropertyStatus::Rented => Self::Rented,
            PropertyStatus::Other(_) => Self::Inactive,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "ativo",
            Self::Sold => "vendido",
            Self::Rented => "alugado",
            Self::Inactive => "inativo",
        }
    }
}

/// Decides whether a listing belongs in the feed.
///
/// Sold and rented listings are governed by `include_sold_properties` alone:
/// they stay out unless it is set, even when inactive listings are included,
/// and they get in when it is set, whatever the inactive flag says. Every
/// other non-available status follows `include_inactive_properties`.
pub fn is_included(status: &PropertyStatus, config: &FeedConfig) -> bool {
    if status.is_closed() {
        return config.include_sold_properties;
    }
    status.is_available() || config.include_inactive_properties
}

pub fn availability_label(status: &PropertyStatus) -> &'static str {
    Availability::from_status(status).label()
}
