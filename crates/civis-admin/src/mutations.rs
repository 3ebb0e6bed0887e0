//! Write operations of the admin dashboard and their cache impact.

use crate::api::AdminApi;
use crate::keys::Domain;
use crate::models::{
    AdminUser, NewObservation, Observation, ObservationUpdate, Report, ReportStatusChange, Secretaria,
    SecretariaInput, UserUpdate,
};
use civis_core::Mutation;

#[derive(Debug, Clone)]
pub struct UpdateUser {
    pub id: String,
    pub changes: UserUpdate,
}

#[derive(Debug, Clone)]
pub struct CreateSecretaria {
    pub city_id: String,
    pub input: SecretariaInput,
}

#[derive(Debug, Clone)]
pub struct UpdateSecretaria {
    pub city_id: String,
    pub id: String,
    pub input: SecretariaInput,
}

#[derive(Debug, Clone)]
pub struct DeleteSecretaria {
    pub city_id: String,
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct UpdateObservation {
    pub id: String,
    pub changes: ObservationUpdate,
}

/// Update an admin account. Updating one's own account refreshes the
/// session identity.
pub fn update_user(api: &AdminApi) -> Mutation<UpdateUser, AdminUser> {
    let api = api.clone();
    Mutation::new(
        "update_user",
        move |input: UpdateUser| {
            let api = api.clone();
            async move { api.update_user(&input.id, &input.changes).await }
        },
        |_, _| Domain::Users.group(),
    )
    .targets_user(|input: &UpdateUser| Some(input.id.clone()))
}

/// Delete an admin account by id.
pub fn delete_user(api: &AdminApi) -> Mutation<String, ()> {
    let api = api.clone();
    Mutation::new(
        "delete_user",
        move |id: String| {
            let api = api.clone();
            async move { api.delete_user(&id).await }
        },
        |_, _| Domain::Users.group(),
    )
}

pub fn create_secretaria(api: &AdminApi) -> Mutation<CreateSecretaria, Secretaria> {
    let api = api.clone();
    Mutation::new(
        "create_secretaria",
        move |input: CreateSecretaria| {
            let api = api.clone();
            async move { api.create_secretaria(&input.city_id, &input.input).await }
        },
        |input: &CreateSecretaria, _| {
            Domain::Secretarias {
                city_id: input.city_id.clone(),
            }
            .group()
        },
    )
}

pub fn update_secretaria(api: &AdminApi) -> Mutation<UpdateSecretaria, Secretaria> {
    let api = api.clone();
    Mutation::new(
        "update_secretaria",
        move |input: UpdateSecretaria| {
            let api = api.clone();
            async move { api.update_secretaria(&input.city_id, &input.id, &input.input).await }
        },
        |input: &UpdateSecretaria, _| {
            Domain::Secretarias {
                city_id: input.city_id.clone(),
            }
            .group()
        },
    )
}

pub fn delete_secretaria(api: &AdminApi) -> Mutation<DeleteSecretaria, ()> {
    let api = api.clone();
    Mutation::new(
        "delete_secretaria",
        move |input: DeleteSecretaria| {
            let api = api.clone();
            async move { api.delete_secretaria(&input.city_id, &input.id).await }
        },
        |input: &DeleteSecretaria, _| {
            Domain::Secretarias {
                city_id: input.city_id.clone(),
            }
            .group()
        },
    )
}

pub fn create_observation(api: &AdminApi) -> Mutation<NewObservation, Observation> {
    let api = api.clone();
    Mutation::new(
        "create_observation",
        move |input: NewObservation| {
            let api = api.clone();
            async move { api.create_observation(&input).await }
        },
        |_, _| Domain::Observations.group(),
    )
}

pub fn update_observation(api: &AdminApi) -> Mutation<UpdateObservation, Observation> {
    let api = api.clone();
    Mutation::new(
        "update_observation",
        move |input: UpdateObservation| {
            let api = api.clone();
            async move { api.update_observation(&input.id, &input.changes).await }
        },
        |_, _| Domain::Observations.group(),
    )
}

/// Move a report to another status. Refreshes the city's report lists and
/// dashboard.
pub fn update_report_status(api: &AdminApi) -> Mutation<ReportStatusChange, Report> {
    let api = api.clone();
    Mutation::new(
        "update_report_status",
        move |change: ReportStatusChange| {
            let api = api.clone();
            async move {
                api.update_report_status(&change.report_id, change.status, change.note.as_deref())
                    .await
            }
        },
        |change: &ReportStatusChange, _| {
            Domain::Reports {
                city_id: change.city_id.clone(),
            }
            .group()
        },
    )
}
