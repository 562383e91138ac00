//! Authorization policies.
//!
//! A policy decision is a pure lookup: the ability and the resource combine
//! into a permission string such as `view_any_metadata::interview::reason`,
//! which the user either holds or not.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator as _, IntoStaticStr};

use crate::user::User;

/// An action a user may attempt on a resource.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Ability {
  ViewAny,
  View,
  Create,
  Update,
  Delete,
  DeleteAny,
  ForceDelete,
  ForceDeleteAny,
  Restore,
  RestoreAny,
  Replicate,
  Reorder,
}

/// An entity type guarded by a policy.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
  Serviceperson,
  AppraisalChecklist,
  InterviewReason,
  OfficerAppraisalGrade,
  EnlistmentType,
  Gender,
  User,
}

impl ResourceKind {
  /// The resource part of a permission string.
  pub fn slug(self) -> &'static str {
    match self {
      Self::Serviceperson => "serviceperson",
      Self::AppraisalChecklist => "officer::performance::appraisal::checklist",
      Self::InterviewReason => "metadata::interview::reason",
      Self::OfficerAppraisalGrade => "metadata::officer::appraisal::grade",
      Self::EnlistmentType => "metadata::enlistment::type",
      Self::Gender => "metadata::gender",
      Self::User => "user",
    }
  }
}

pub fn permission_name(ability: Ability, resource: ResourceKind) -> String {
  let ability: &'static str = ability.into();
  format!("{ability}_{}", resource.slug())
}

/// Whether `user` may perform `ability` on `resource`.
pub fn allows(user: &User, ability: Ability, resource: ResourceKind) -> bool {
  user.can(&permission_name(ability, resource))
}

/// Every permission string the service knows about.
pub fn all_permissions() -> Vec<String> {
  ResourceKind::iter()
    .flat_map(|r| Ability::iter().map(move |a| permission_name(a, r)))
    .collect()
}
