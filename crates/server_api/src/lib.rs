use shared::{
    domain::{Grievance, GrievanceId, NewGrievance, Status, ANONYMOUS_NAME},
    error::ApiError,
    protocol::{
        GrievancePayload, ReportPayload, StatusCount, StatusUpdateResponse,
        SubmitGrievanceRequest,
    },
};
use smtp_integration::Notifier;
use storage::Storage;
use tracing::{error, info};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub notifier: Notifier,
}

/// Validates and persists a new grievance. Creation is silent: no
/// notification goes out until the first status change.
pub async fn submit_grievance(
    ctx: &ApiContext,
    request: SubmitGrievanceRequest,
) -> Result<GrievanceId, ApiError> {
    let name = request.name.trim();
    let email = request.email.trim();
    let description = request.description.trim();

    if description.is_empty() {
        return Err(ApiError::validation("description is required"));
    }
    if !request.anonymous {
        if name.is_empty() {
            return Err(ApiError::validation("name is required"));
        }
        if email.is_empty() {
            return Err(ApiError::validation("email is required"));
        }
    }

    let new = NewGrievance {
        name: if request.anonymous {
            ANONYMOUS_NAME.to_string()
        } else {
            name.to_string()
        },
        email: if request.anonymous {
            String::new()
        } else {
            email.to_string()
        },
        category: request.category,
        description: description.to_string(),
        anonymous: request.anonymous,
    };

    let id = ctx
        .storage
        .create_grievance(new)
        .await
        .map_err(storage_error)?;
    info!(%id, "grievance submitted");
    Ok(id)
}

/// Applies a status transition and then notifies the submitter. The update
/// is the operation of record: once it has committed, the email outcome is
/// advisory and can never fail the call.
pub async fn change_status(
    ctx: &ApiContext,
    id: &GrievanceId,
    status: Status,
) -> Result<StatusUpdateResponse, ApiError> {
    let updated = ctx
        .storage
        .update_status(id, status)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("no grievance with id '{id}'")))?;

    let notification = ctx.notifier.send_status_update(&updated).await;
    info!(%id, %status, outcome = ?notification, "grievance status updated");
    Ok(StatusUpdateResponse {
        grievance: updated.into(),
        notification,
    })
}

pub async fn list_grievances(ctx: &ApiContext) -> Result<Vec<GrievancePayload>, ApiError> {
    let grievances = ctx
        .storage
        .list_grievances()
        .await
        .map_err(storage_error)?;
    Ok(grievances.into_iter().map(GrievancePayload::from).collect())
}

pub async fn grievance_details(
    ctx: &ApiContext,
    id: &GrievanceId,
) -> Result<GrievancePayload, ApiError> {
    let grievance = ctx
        .storage
        .fetch_grievance(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("no grievance with id '{id}'")))?;
    Ok(grievance.into())
}

pub async fn grievance_report(ctx: &ApiContext) -> Result<ReportPayload, ApiError> {
    let grievances = ctx
        .storage
        .list_grievances()
        .await
        .map_err(storage_error)?;
    Ok(build_report(&grievances))
}

fn build_report(grievances: &[Grievance]) -> ReportPayload {
    let mut report = ReportPayload {
        total_grievances: grievances.len() as u64,
        status_count: StatusCount::default(),
        category_count: Default::default(),
    };
    for grievance in grievances {
        match grievance.status {
            Status::Pending => report.status_count.pending += 1,
            Status::InProgress => report.status_count.in_progress += 1,
            Status::Resolved => report.status_count.resolved += 1,
        }
        *report
            .category_count
            .entry(grievance.category.to_string())
            .or_insert(0) += 1;
    }
    report
}

fn storage_error(err: anyhow::Error) -> ApiError {
    error!(error = %err, "document store operation failed");
    ApiError::storage(err.to_string())
}
