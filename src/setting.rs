//! Per-application badge settings.

/// Settings properties the service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeProperty {
    /// Whether the launcher shows badges for the application at all.
    OptBadge,
}

impl BadgeProperty {
    pub const ALL: [BadgeProperty; 1] = [BadgeProperty::OptBadge];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Name used in requests.
    pub fn name(&self) -> &'static str {
        match self {
            BadgeProperty::OptBadge => "OPT_BADGE",
        }
    }

    /// Value reported when the service has none stored.
    pub fn default_value(&self) -> &'static str {
        match self {
            BadgeProperty::OptBadge => "ON",
        }
    }
}
