use std::fmt;

use geometry::GeometryError;
use layers::SettingsError;
use picture::LayerId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostError {
    Settings(SettingsError),
    Geometry(GeometryError),
    UnknownLayer(LayerId),
    DuplicateLayer(LayerId),
    NoPendingTree,
}

impl fmt::Display for HostError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Settings(error) => write!(formatter, "invalid settings: {error}"),
            HostError::Geometry(error) => write!(formatter, "invalid tree input: {error}"),
            HostError::UnknownLayer(id) => {
                write!(formatter, "draw properties for {id}, which is not in the tree")
            }
            HostError::DuplicateLayer(id) => write!(formatter, "{id} committed twice"),
            HostError::NoPendingTree => write!(formatter, "no pending tree to activate"),
        }
    }
}

impl std::error::Error for HostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HostError::Settings(error) => Some(error),
            HostError::Geometry(error) => Some(error),
            _ => None,
        }
    }
}

impl From<SettingsError> for HostError {
    fn from(error: SettingsError) -> Self {
        Self::Settings(error)
    }
}

impl From<GeometryError> for HostError {
    fn from(error: GeometryError) -> Self {
        Self::Geometry(error)
    }
}
