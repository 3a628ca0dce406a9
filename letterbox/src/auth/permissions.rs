//! Role based access control.
//!
//! Each [`Role`] grants a fixed set of `(Resource, Operation)` pairs. Handlers either take a
//! [`RequiresPermission`] extractor, which rejects callers lacking the permission before the
//! handler body runs, or call [`has_permission`] / [`ensure_owner`] for checks that depend on the
//! row being touched. Every rejection is [`Error::InsufficientPermissions`].

use std::marker::PhantomData;
use std::ops::Deref;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    errors::{Error, Result},
    types::{Operation, Permission, Resource, UserId},
};

/// Type-level resources for [`RequiresPermission`].
pub mod resource {
    use crate::types::Resource;

    pub trait ResourceMarker: Send + Sync {
        const RESOURCE: Resource;
    }

    macro_rules! resources {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl ResourceMarker for $name {
                    const RESOURCE: Resource = Resource::$name;
                }
            )*
        };
    }

    resources!(
        Users,
        SubscriptionTiers,
        Subscriptions,
        DonationTiers,
        Donations,
        SponsoredAds,
        CrossPromotions,
        DigitalProducts,
        Purchases,
        AffiliateLinks,
        Funds,
        BrandFunds,
        Billing,
    );
}

/// Type-level operations for [`RequiresPermission`].
pub mod operation {
    use crate::types::Operation;

    pub trait OperationMarker: Send + Sync {
        const OPERATION: Operation;
    }

    macro_rules! operations {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl OperationMarker for $name {
                    const OPERATION: Operation = Operation::$name;
                }
            )*
        };
    }

    operations!(CreateAll, CreateOwn, ReadAll, ReadOwn, UpdateAll, UpdateOwn, DeleteAll, DeleteOwn);
}

use operation::OperationMarker;
use resource::ResourceMarker;

const OWN_CRUD: &[Operation] = &[
    Operation::CreateOwn,
    Operation::ReadOwn,
    Operation::UpdateOwn,
    Operation::DeleteOwn,
];

/// Operations a role may perform on a resource.
fn role_operations(role: Role, resource: Resource) -> &'static [Operation] {
    use Operation::*;
    use Resource::*;

    match (role, resource) {
        (Role::Admin, _) => &[
            CreateAll, CreateOwn, ReadAll, ReadOwn, UpdateAll, UpdateOwn, DeleteAll, DeleteOwn,
        ],

        (_, Users) => &[ReadOwn],
        (_, Subscriptions) => &[CreateOwn, ReadOwn, UpdateOwn],
        (_, Donations) => OWN_CRUD,
        (_, Purchases) => &[CreateOwn, ReadOwn],

        (Role::Creator, SubscriptionTiers | DonationTiers | CrossPromotions | DigitalProducts | AffiliateLinks) => OWN_CRUD,
        (Role::Creator, SponsoredAds) => &[ReadOwn],
        (Role::Creator, Funds) => &[CreateOwn, ReadOwn, DeleteOwn],

        (Role::Brand, SponsoredAds) => &[CreateOwn, ReadOwn, UpdateOwn],
        (Role::Brand, BrandFunds) => &[CreateOwn, ReadOwn],

        _ => &[],
    }
}

/// Whether the user's role grants `operation` on `resource`.
pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    role_operations(user.role, resource).contains(&operation)
}

pub fn can_read_all_resources(user: &CurrentUser, resource: Resource) -> bool {
    has_permission(user, resource, Operation::ReadAll)
}

/// Fail unless the role grants the permission.
pub fn require_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> Result<()> {
    if has_permission(user, resource, operation) {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: Permission::Allow(resource, operation),
            action: operation,
            resource: resource.to_string(),
        })
    }
}

/// Fail unless the user owns the row or may act on every row of the resource.
///
/// `operation` is the `*Own` operation being attempted; the matching `*All` operation is the
/// override.
pub fn ensure_owner(user: &CurrentUser, owner_id: UserId, resource: Resource, operation: Operation) -> Result<()> {
    let unrestricted = match operation {
        Operation::CreateOwn => Operation::CreateAll,
        Operation::ReadOwn => Operation::ReadAll,
        Operation::UpdateOwn => Operation::UpdateAll,
        Operation::DeleteOwn => Operation::DeleteAll,
        other => other,
    };

    if has_permission(user, resource, unrestricted) || (user.id == owner_id && has_permission(user, resource, operation)) {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: Permission::Allow(resource, unrestricted),
            action: operation,
            resource: format!("{resource} owned by another user"),
        })
    }
}

/// Extractor that authenticates the caller and checks a permission.
///
/// Dereferences to the [`CurrentUser`].
pub struct RequiresPermission<R: ResourceMarker, O: OperationMarker> {
    user: CurrentUser,
    _marker: PhantomData<(R, O)>,
}

impl<R: ResourceMarker, O: OperationMarker> RequiresPermission<R, O> {
    pub fn into_inner(self) -> CurrentUser {
        self.user
    }
}

impl<R: ResourceMarker, O: OperationMarker> Deref for RequiresPermission<R, O> {
    type Target = CurrentUser;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl<R: ResourceMarker, O: OperationMarker> FromRequestParts<AppState> for RequiresPermission<R, O> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        require_permission(&user, R::RESOURCE, O::OPERATION)?;
        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}
