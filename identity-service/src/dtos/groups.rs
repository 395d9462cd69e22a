use serde::Deserialize;
use validator::Validate;

use crate::models::{GroupChanges, NewGroup};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 80, message = "Name must be 1-80 characters"))]
    pub name: String,

    #[serde(default)]
    pub description: String,
}

impl From<CreateGroupRequest> for NewGroup {
    fn from(req: CreateGroupRequest) -> Self {
        NewGroup {
            name: req.name,
            description: req.description,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGroupRequest {
    #[validate(length(min = 1, max = 80, message = "Name must be 1-80 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,
}

impl From<UpdateGroupRequest> for GroupChanges {
    fn from(req: UpdateGroupRequest) -> Self {
        GroupChanges {
            name: req.name,
            description: req.description,
        }
    }
}
