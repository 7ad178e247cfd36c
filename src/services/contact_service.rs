use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::contact::{ContactList, ContactRequest, UpdateContactRequest},
    entity::contacts::{ActiveModel, Column, ContactStatus, Entity as Contacts},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Contact,
    response::{Ack, ApiResponse, Meta},
    routes::params::ContactListQuery,
    state::AppState,
};

pub async fn submit(state: &AppState, payload: ContactRequest) -> AppResult<ApiResponse<Ack>> {
    let now = Utc::now().fixed_offset();
    let contact = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        email: Set(payload.email.trim().to_lowercase()),
        phone: Set(payload.phone),
        subject: Set(payload.subject.trim().to_string()),
        message: Set(payload.message),
        status: Set(ContactStatus::New),
        admin_notes: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(contact_id = %contact.id, "contact message received");
    Ok(ApiResponse::ok(
        "Thank you for contacting us. We will get back to you soon",
        Ack { id: Some(contact.id) },
    ))
}

pub async fn list_contacts(
    state: &AppState,
    user: &AuthUser,
    query: ContactListQuery,
) -> AppResult<ApiResponse<ContactList>> {
    ensure_admin(user)?;
    let pagination = query.pagination();

    let mut finder = Contacts::find();
    if let Some(status) = query.status {
        finder = finder.filter(Column::Status.eq(status));
    }
    let finder = finder.order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Contact::from)
        .collect();

    Ok(ApiResponse::success(
        "Contacts",
        ContactList { items },
        Some(Meta::paged(&pagination, total)),
    ))
}

pub async fn update_contact(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateContactRequest,
) -> AppResult<ApiResponse<Contact>> {
    ensure_admin(user)?;
    let existing = match Contacts::find_by_id(id).one(&state.orm).await? {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    if payload.admin_notes.is_some() {
        active.admin_notes = Set(payload.admin_notes);
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    let contact = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "contact_update",
        "contacts",
        serde_json::json!({ "contact_id": contact.id, "status": contact.status }),
    )
    .await;

    Ok(ApiResponse::ok("Contact updated", Contact::from(contact)))
}

pub async fn delete_contact(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Ack>> {
    ensure_admin(user)?;
    let result = Contacts::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "contact_delete",
        "contacts",
        serde_json::json!({ "contact_id": id }),
    )
    .await;

    Ok(ApiResponse::ok("Contact deleted", Ack { id: Some(id) }))
}
