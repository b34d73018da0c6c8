use crate::error::Result;
use crate::model::IfcModel;
use serde::{Deserialize, Serialize};

pub const IFC_PROJECT: &str = "IfcProject";
pub const IFC_SITE: &str = "IfcSite";
pub const IFC_BUILDING: &str = "IfcBuilding";

/// Names of the first project, site and building in a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelNames {
    pub project: String,
    pub site: String,
    pub building: String,
}

impl ModelNames {
    /// Read the three names. A null name reads as an empty string; a missing
    /// entity is an error.
    pub fn read(model: &IfcModel) -> Result<Self> {
        Ok(Self {
            project: read_one(model, IFC_PROJECT)?,
            site: read_one(model, IFC_SITE)?,
            building: read_one(model, IFC_BUILDING)?,
        })
    }
}

fn read_one(model: &IfcModel, entity: &str) -> Result<String> {
    let inst = model.first_of_type(entity)?;
    Ok(model.name(inst)?.unwrap_or_default())
}

/// New names to write; `None` leaves the entity untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameUpdate {
    pub project: Option<String>,
    pub site: Option<String>,
    pub building: Option<String>,
}

impl NameUpdate {
    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.site.is_none() && self.building.is_none()
    }

    /// Apply every supplied name to the first instance of its entity.
    /// Nothing is written to the model unless all targeted entities exist.
    pub fn apply(&self, model: &mut IfcModel) -> Result<()> {
        let targets = [
            (IFC_PROJECT, self.project.as_deref()),
            (IFC_SITE, self.site.as_deref()),
            (IFC_BUILDING, self.building.as_deref()),
        ];

        let mut resolved = Vec::with_capacity(targets.len());
        for (entity, value) in targets {
            if let Some(value) = value {
                resolved.push((entity, model.first_of_type(entity)?, value));
            }
        }

        for (entity, inst, value) in resolved {
            tracing::debug!(entity, id = inst.id, "setting name");
            model.set_name(inst, value)?;
        }
        Ok(())
    }
}
