use serde::Serialize;

/// Marketplace taxonomy triple rendered as `categoria`, `tipo` and `subtipo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: &'static str,
    pub kind: &'static str,
    pub subtype: &'static str,
}

/// Internal property types known to the back-office forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Apartment,
    House,
    Townhouse,
    Commercial,
    Office,
    Land,
    Rural,
    /// Free-text value the forms do not offer; classified like an apartment.
    Unlisted,
}

impl PropertyKind {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Apartment,
            Self::House,
            Self::Townhouse,
            Self::Commercial,
            Self::Office,
            Self::Land,
            Self::Rural,
        ]
    }

    pub const fn tag(self) -> &'static str {
        match self {
            Self::Apartment => "apartment",
            Self::House => "house",
            Self::Townhouse => "townhouse",
            Self::Commercial => "commercial",
            Self::Office => "office",
            Self::Land => "land",
            Self::Rural => "rural",
            Self::Unlisted => "",
        }
    }

    /// Case-insensitive lookup of an internal type tag.
    pub fn from_tag(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ordered()
            .into_iter()
            .find(|kind| kind.tag() == normalized)
            .unwrap_or(Self::Unlisted)
    }

    pub const fn classification(self) -> Classification {
        let (category, kind, subtype) = match self {
            Self::Apartment | Self::Unlisted => ("Residencial", "Apartamento", ""),
            Self::House => ("Residencial", "Casa", ""),
            Self::Townhouse => ("Residencial", "Casa", "Sobrado"),
            Self::Commercial => ("Comercial", "Loja", ""),
            Self::Office => ("Comercial", "Sala", ""),
            Self::Land => ("Terreno", "Lote/Terreno", ""),
            Self::Rural => ("Rural", "Fazenda/Sítio", ""),
        };
        Classification {
            category,
            kind,
            subtype,
        }
    }
}

/// Maps any internal type string to the marketplace taxonomy. Never fails.
pub fn classify(raw_type: &str) -> Classification {
    PropertyKind::from_tag(raw_type).classification()
}
